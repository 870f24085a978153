//! EdgeScan Library
//!
//! End-of-day / pre-market equity screener with outcome feedback.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   edgescan (Rust Service)                   │
//! │                          :8090                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │  Market Data │  │  Scan        │  │  Adjustment  │      │
//! │  │  Provider    │  │  Pipeline    │  │  Model       │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! The evening scan scores the watchlist for the next session: resolve
//! yesterday's outcomes, retrain the adjustment model, then extract features
//! and score each symbol sequentially. The morning confirmation re-checks the
//! shortlist against pre-market data and publishes the go-list. Every run
//! learns from the last: scan history, gap-fill history, earnings reactions
//! and the trade log all feed back into the next score.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backtest;
pub mod config;
pub mod data;
pub mod features;
pub mod history;
pub mod logging;
pub mod model;
pub mod routes;
pub mod scan;
pub mod scheduler;
pub mod scoring;
pub mod store;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::backtest::BacktestReport;
use crate::config::AppConfig;
use crate::data::{MarketDataProvider, YahooProvider};
use crate::history::{TimeHeatmap, TradeLog, TradeRecord};
use crate::scan::{GoListReport, ScanReport};
use crate::store::JsonStore;

// ============================================================================
// Result Cache
// ============================================================================

/// Last-completed-result cache over a persisted artifact.
///
/// Reads serve the in-memory copy, falling back to disk on a cold start;
/// a finished scan replaces the copy wholesale.
pub struct ResultCache<T> {
    inner: RwLock<Option<T>>,
}

impl<T: Clone + DeserializeOwned> ResultCache<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Get the cached value, loading from disk on first access.
    pub async fn get(&self, store: &JsonStore, name: &str) -> Option<T> {
        if let Some(value) = self.inner.read().await.as_ref() {
            return Some(value.clone());
        }
        let loaded: Option<T> = store.load(name);
        if let Some(value) = &loaded {
            *self.inner.write().await = Some(value.clone());
        }
        loaded
    }

    /// Replace the cached value after a completed run.
    pub async fn replace(&self, value: T) {
        *self.inner.write().await = Some(value);
    }
}

impl<T: Clone + DeserializeOwned> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Scanner State
// ============================================================================

/// A second scan was requested while one was already in flight.
#[derive(Debug, Clone, Copy)]
pub struct ScanBusy;

/// What the last dispatched scan was and how it went.
#[derive(Debug, Clone, Serialize)]
pub struct ScanActivity {
    pub kind: &'static str,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
}

/// Scanner service state.
pub struct ScannerState {
    /// Configuration
    pub config: AppConfig,
    /// Persisted artifacts
    pub store: JsonStore,
    /// Market data source
    pub provider: Arc<dyn MarketDataProvider>,
    /// One scan of any kind in flight process-wide
    scan_running: AtomicBool,
    /// Last dispatched scan, for the status endpoint
    last_activity: RwLock<Option<ScanActivity>>,
    /// Serializes trade-log read-modify-write cycles
    trade_lock: tokio::sync::Mutex<()>,
    /// Last completed evening shortlist
    pub scan_cache: ResultCache<ScanReport>,
    /// Last completed morning go-list
    pub golist_cache: ResultCache<GoListReport>,
    /// Last completed backtest
    pub backtest_cache: ResultCache<BacktestReport>,
}

impl ScannerState {
    /// Create state with the default Yahoo provider.
    pub fn new(config: AppConfig) -> Result<Self> {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooProvider::new());
        Self::with_provider(config, provider)
    }

    /// Create state with an explicit provider.
    pub fn with_provider(
        config: AppConfig,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<Self> {
        let store = JsonStore::open(config.data_dir())?;
        Ok(Self {
            config,
            store,
            provider,
            scan_running: AtomicBool::new(false),
            last_activity: RwLock::new(None),
            trade_lock: tokio::sync::Mutex::new(()),
            scan_cache: ResultCache::new(),
            golist_cache: ResultCache::new(),
            backtest_cache: ResultCache::new(),
        })
    }

    /// Whether a scan is currently in flight.
    pub fn is_scanning(&self) -> bool {
        self.scan_running.load(Ordering::Acquire)
    }

    /// Last dispatched scan, for the status endpoint.
    pub async fn last_activity(&self) -> Option<ScanActivity> {
        self.last_activity.read().await.clone()
    }

    fn try_begin_scan(&self) -> Result<(), ScanBusy> {
        self.scan_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ScanBusy)
    }

    async fn finish_scan(&self, kind: &'static str, success: bool) {
        let mut activity = self.last_activity.write().await;
        if let Some(a) = activity.as_mut() {
            if a.kind == kind {
                a.finished_at = Some(Utc::now());
                a.success = Some(success);
            }
        }
        self.scan_running.store(false, Ordering::Release);
    }

    async fn record_start(&self, kind: &'static str) {
        *self.last_activity.write().await = Some(ScanActivity {
            kind,
            started_at: Utc::now(),
            finished_at: None,
            success: None,
        });
    }

    /// Dispatch the evening scan on a background task.
    ///
    /// Returns immediately; read endpoints keep serving the last completed
    /// results while the scan runs.
    pub fn spawn_evening_scan(self: &Arc<Self>, today: NaiveDate) -> Result<(), ScanBusy> {
        self.try_begin_scan()?;
        let state = Arc::clone(self);
        tokio::spawn(async move {
            state.record_start("evening").await;
            let watchlist = state.config.watchlist();
            let result = scan::run_evening_scan(
                state.provider.as_ref(),
                &state.store,
                &state.config.scan,
                &watchlist,
                today,
            )
            .await;
            match result {
                Ok(report) => {
                    state.scan_cache.replace(report).await;
                    state.finish_scan("evening", true).await;
                }
                Err(e) => {
                    error!(error = %e, "evening scan failed");
                    state.finish_scan("evening", false).await;
                }
            }
        });
        Ok(())
    }

    /// Dispatch the morning confirmation on a background task.
    pub fn spawn_morning_confirm(self: &Arc<Self>, today: NaiveDate) -> Result<(), ScanBusy> {
        self.try_begin_scan()?;
        let state = Arc::clone(self);
        tokio::spawn(async move {
            state.record_start("morning").await;
            let result = scan::run_morning_confirm(
                state.provider.as_ref(),
                &state.store,
                &state.config.scan,
                today,
            )
            .await;
            match result {
                Ok(report) => {
                    state.golist_cache.replace(report).await;
                    state.finish_scan("morning", true).await;
                }
                Err(e) => {
                    error!(error = %e, "morning confirmation failed");
                    state.finish_scan("morning", false).await;
                }
            }
        });
        Ok(())
    }

    /// Dispatch a backtest on a background task.
    pub fn spawn_backtest(
        self: &Arc<Self>,
        symbols: Option<Vec<String>>,
        days: Option<usize>,
    ) -> Result<(), ScanBusy> {
        self.try_begin_scan()?;
        let state = Arc::clone(self);
        tokio::spawn(async move {
            state.record_start("backtest").await;
            let symbols = symbols.unwrap_or_else(|| {
                state
                    .config
                    .watchlist()
                    .into_iter()
                    .take(backtest::DEFAULT_SYMBOL_COUNT)
                    .collect()
            });
            let days = days.unwrap_or(backtest::DEFAULT_DAYS);
            let result =
                backtest::run_backtest(state.provider.as_ref(), &state.store, &symbols, days)
                    .await;
            match result {
                Ok(report) => {
                    state.backtest_cache.replace(report).await;
                    state.finish_scan("backtest", true).await;
                }
                Err(e) => {
                    error!(error = %e, "backtest failed");
                    state.finish_scan("backtest", false).await;
                }
            }
        });
        Ok(())
    }

    // ========================================================================
    // Trade Log Operations
    // ========================================================================

    /// Record a new trade.
    pub async fn log_trade(
        &self,
        symbol: &str,
        action: &str,
        price: f64,
        notes: &str,
    ) -> Result<TradeRecord> {
        let _guard = self.trade_lock.lock().await;
        let mut log: TradeLog = self.store.load_or_default(store::TRADE_LOG);
        let record = log.log(symbol, action, price, notes);
        self.store.save(store::TRADE_LOG, &log)?;
        info!(symbol, action, price, "trade logged");
        Ok(record)
    }

    /// Close an open trade and fold its outcome into the time heatmap.
    ///
    /// The heatmap bucket is the trade's entry hour in local time, so the
    /// best-window readout reflects when the entry was actually taken.
    pub async fn close_trade(
        &self,
        trade_id: &str,
        exit_price: f64,
    ) -> Result<Option<TradeRecord>> {
        let _guard = self.trade_lock.lock().await;
        let mut log: TradeLog = self.store.load_or_default(store::TRADE_LOG);
        let closed = log.close(trade_id, exit_price).cloned();
        if let Some(record) = &closed {
            if let Some(pnl) = record.pnl_pct {
                let entry_hour = record.timestamp.with_timezone(&Local).hour();
                let mut heatmap: TimeHeatmap = self.store.load_or_default(store::TIME_HEATMAP);
                heatmap.record(entry_hour, pnl);
                self.store.save(store::TIME_HEATMAP, &heatmap)?;
            }
            self.store.save(store::TRADE_LOG, &log)?;
            info!(
                trade_id,
                symbol = %record.symbol,
                pnl_pct = ?record.pnl_pct,
                "trade closed"
            );
        }
        Ok(closed)
    }

    /// All trades on record, oldest first.
    pub async fn trades(&self) -> Vec<TradeRecord> {
        let _guard = self.trade_lock.lock().await;
        let log: TradeLog = self.store.load_or_default(store::TRADE_LOG);
        log.trades().to_vec()
    }
}

// ============================================================================
// Scanner Service
// ============================================================================

/// Main scanner service: HTTP surface plus the scan scheduler.
pub struct ScannerService {
    state: Arc<ScannerState>,
}

impl ScannerService {
    /// Create a new service with the default provider.
    pub fn new(config: AppConfig) -> Result<Self> {
        let state = Arc::new(ScannerState::new(config)?);
        Ok(Self { state })
    }

    /// Create a new service with an explicit provider.
    pub fn with_provider(
        config: AppConfig,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<Self> {
        let state = Arc::new(ScannerState::with_provider(config, provider)?);
        Ok(Self { state })
    }

    /// Build the HTTP router.
    pub fn router(state: Arc<ScannerState>) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/results", get(routes::get_results))
            .route("/api/v1/golist", get(routes::get_golist))
            .route(
                "/api/v1/backtest",
                get(routes::get_backtest).post(routes::trigger_backtest),
            )
            .route("/api/v1/status", get(routes::get_status))
            .route("/api/v1/scan/evening", post(routes::trigger_evening_scan))
            .route("/api/v1/scan/morning", post(routes::trigger_morning_confirm))
            .route(
                "/api/v1/trades",
                get(routes::get_trades).post(routes::log_trade),
            )
            .route("/api/v1/trades/:id/close", post(routes::close_trade))
            .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Start the service: scheduler plus HTTP server. Runs until shutdown.
    pub async fn start(self) -> Result<()> {
        let port = self.state.config.port;
        let app = Self::router(self.state.clone());

        // Start the cron scheduler for the evening and morning passes.
        let sched_state = self.state.clone();
        let sched = scheduler::ScanScheduler::new(
            self.state.config.schedule.clone(),
            sched_state,
        )?;
        tokio::spawn(async move {
            if let Err(e) = sched.run().await {
                error!(error = %e, "scan scheduler failed");
            }
        });

        let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
        info!(address = %addr, "starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
