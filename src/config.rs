//! Service configuration.
//!
//! Loaded from a JSON file when one exists, otherwise defaults apply. The
//! data directory and HTTP port also accept env-var overrides so deployments
//! can relocate state without editing the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Env var naming the config file path.
pub const CONFIG_ENV: &str = "EDGESCAN_CONFIG";
/// Env var overriding the data directory.
pub const DATA_DIR_ENV: &str = "EDGESCAN_DATA_DIR";
/// Env var overriding the HTTP port.
pub const PORT_ENV: &str = "EDGESCAN_PORT";

// ============================================================================
// Main Configuration
// ============================================================================

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Data directory for persisted artifacts. Defaults to the platform
    /// data dir under `edgescan/`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Symbols to scan. Empty means the built-in watchlist.
    #[serde(default)]
    pub watchlist: Vec<String>,

    /// Scan behavior
    #[serde(default)]
    pub scan: ScanConfig,

    /// Scheduler behavior
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Logging behavior
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: None,
            watchlist: Vec::new(),
            scan: ScanConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the file named by `EDGESCAN_CONFIG` (or the given path),
    /// then apply env overrides. A missing file yields defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            _ => AppConfig::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            config.port = port
                .parse()
                .with_context(|| format!("invalid {PORT_ENV} value: {port}"))?;
        }
        Ok(config)
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("edgescan")
        })
    }

    /// Effective watchlist.
    pub fn watchlist(&self) -> Vec<String> {
        if self.watchlist.is_empty() {
            crate::data::DEFAULT_WATCHLIST
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.watchlist.clone()
        }
    }
}

fn default_port() -> u16 {
    8090
}

// ============================================================================
// Scan Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Fixed delay between symbols, milliseconds
    #[serde(default = "default_symbol_delay_ms")]
    pub symbol_delay_ms: u64,

    /// Fetch attempts per symbol before skipping it
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Backoff between fetch attempts, milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Shortlist size after scoring
    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            symbol_delay_ms: default_symbol_delay_ms(),
            fetch_attempts: default_fetch_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            shortlist_size: default_shortlist_size(),
        }
    }
}

fn default_symbol_delay_ms() -> u64 {
    500
}

fn default_fetch_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1500
}

fn default_shortlist_size() -> usize {
    15
}

// ============================================================================
// Schedule Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether scheduled scans run at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression for the evening scan (weekday evenings)
    #[serde(default = "default_evening_cron")]
    pub evening_cron: String,

    /// Cron expression for the morning confirmation (weekday pre-open)
    #[serde(default = "default_morning_cron")]
    pub morning_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            evening_cron: default_evening_cron(),
            morning_cron: default_morning_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_evening_cron() -> String {
    "0 0 18 * * Mon-Fri".to_string() // 6 PM on weekdays
}

fn default_morning_cron() -> String {
    "0 0 9 * * Mon-Fri".to_string() // 9 AM on weekdays
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace/debug/info/warn/error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Tests
// ============================================================================
