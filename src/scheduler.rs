//! Cron scheduler for the evening and morning passes.
//!
//! The evening scan runs after the close on weekdays and the morning
//! confirmation runs before the open. Cron expressions come from
//! [`ScheduleConfig`]; a scan already in flight makes the tick a no-op
//! rather than queueing.
//!
//! # Schedule Configuration
//!
//! ```json
//! {
//!   "schedule": {
//!     "enabled": true,
//!     "evening_cron": "0 0 18 * * Mon-Fri",
//!     "morning_cron": "0 0 9 * * Mon-Fri"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use cron::Schedule;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::ScannerState;

/// Scheduled task type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledTask {
    /// Evening watchlist scan
    EveningScan,
    /// Morning go-list confirmation
    MorningConfirm,
}

impl ScheduledTask {
    /// Get task name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::EveningScan => "evening_scan",
            Self::MorningConfirm => "morning_confirm",
        }
    }
}

/// A parsed schedule with its task type
struct ParsedSchedule {
    task: ScheduledTask,
    schedule: Schedule,
}

/// Scan scheduler
pub struct ScanScheduler {
    /// Configuration
    config: ScheduleConfig,
    /// Service state
    state: Arc<ScannerState>,
    /// Parsed schedules
    schedules: Vec<ParsedSchedule>,
    /// Last execution times for each task
    last_executions: RwLock<HashMap<ScheduledTask, DateTime<Utc>>>,
}

impl ScanScheduler {
    /// Create a new scheduler
    pub fn new(config: ScheduleConfig, state: Arc<ScannerState>) -> Result<Self> {
        let mut schedules = Vec::new();

        if config.enabled {
            schedules.push(ParsedSchedule {
                task: ScheduledTask::EveningScan,
                schedule: Schedule::from_str(&config.evening_cron)
                    .with_context(|| format!("Invalid evening cron: {}", config.evening_cron))?,
            });

            schedules.push(ParsedSchedule {
                task: ScheduledTask::MorningConfirm,
                schedule: Schedule::from_str(&config.morning_cron)
                    .with_context(|| format!("Invalid morning cron: {}", config.morning_cron))?,
            });

            info!(
                evening = %config.evening_cron,
                morning = %config.morning_cron,
                "scheduler configured"
            );
        }

        Ok(Self {
            config,
            state,
            schedules,
            last_executions: RwLock::new(HashMap::new()),
        })
    }

    /// Run the scheduler loop
    pub async fn run(&self) -> Result<()> {
        if !self.config.enabled {
            info!("scheduler disabled, not starting");
            return Ok(());
        }

        info!("scheduler started");

        // Check every 10 seconds
        let mut check_interval = interval(Duration::from_secs(10));

        loop {
            check_interval.tick().await;

            if let Err(e) = self.check_and_execute().await {
                error!(error = %e, "scheduler check failed");
            }
        }
    }

    /// Check schedules and execute due tasks
    async fn check_and_execute(&self) -> Result<()> {
        let now = Utc::now();

        for parsed in &self.schedules {
            if self.should_execute(&parsed.task, &parsed.schedule, now).await {
                self.execute_task(parsed.task).await;
            }
        }

        Ok(())
    }

    /// Check if a task should be executed
    async fn should_execute(
        &self,
        task: &ScheduledTask,
        schedule: &Schedule,
        now: DateTime<Utc>,
    ) -> bool {
        let last_exec = {
            let executions = self.last_executions.read().await;
            executions.get(task).copied()
        };

        // Check if there's a scheduled time between last execution and now
        let after = last_exec.unwrap_or_else(|| now - chrono::Duration::hours(1));

        for scheduled in schedule.after(&after).take(10) {
            if scheduled <= now {
                // Fire only within a minute of the scheduled time, once
                let since_scheduled = now.signed_duration_since(scheduled);
                if since_scheduled < chrono::Duration::seconds(60) {
                    if let Some(last) = last_exec {
                        if last >= scheduled {
                            continue;
                        }
                    }
                    return true;
                }
            } else {
                break;
            }
        }

        false
    }

    /// Execute a scheduled task
    async fn execute_task(&self, task: ScheduledTask) {
        info!(task = task.name(), "executing scheduled task");

        {
            let mut executions = self.last_executions.write().await;
            executions.insert(task, Utc::now());
        }

        let today = Local::now().date_naive();
        let result = match task {
            ScheduledTask::EveningScan => self.state.spawn_evening_scan(today),
            ScheduledTask::MorningConfirm => self.state.spawn_morning_confirm(today),
        };

        if result.is_err() {
            warn!(task = task.name(), "scan already in flight, skipping tick");
        }
    }
}
