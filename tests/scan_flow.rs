//! End-to-end scan flow against a canned provider: evening scan, persisted
//! artifacts, morning confirmation, and the HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, TimeZone, Utc};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use edgescan::config::{AppConfig, ScanConfig, ScheduleConfig};
use edgescan::data::{
    Bar, Fundamentals, Headline, MarketDataProvider, OptionsChain, ProviderError, Timeframe,
};
use edgescan::history::ScanHistory;
use edgescan::scan::{run_evening_scan, run_morning_confirm};
use edgescan::store::{self, JsonStore};
use edgescan::{ScannerService, ScannerState};

// ============================================================================
// Canned Provider
// ============================================================================

#[derive(Default)]
struct CannedProvider {
    daily: HashMap<String, Vec<Bar>>,
    prepost: HashMap<String, Vec<Bar>>,
    m5: HashMap<String, Vec<Bar>>,
}

#[async_trait]
impl MarketDataProvider for CannedProvider {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn get_daily_bars(
        &self,
        symbol: &str,
        _lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.daily
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))
    }

    async fn get_intraday_bars(
        &self,
        symbol: &str,
        interval: Timeframe,
        _include_prepost: bool,
    ) -> Result<Vec<Bar>, ProviderError> {
        let map = match interval {
            Timeframe::H1 => &self.prepost,
            Timeframe::M5 => &self.m5,
            Timeframe::M15 => return Ok(Vec::new()),
            _ => {
                return Err(ProviderError::InvalidRequest(format!(
                    "{} is not an intraday interval",
                    interval
                )))
            }
        };
        Ok(map.get(symbol).cloned().unwrap_or_default())
    }

    async fn get_fundamentals(&self, _symbol: &str) -> Result<Fundamentals, ProviderError> {
        Ok(Fundamentals::default())
    }

    async fn get_options_chain(&self, _symbol: &str) -> Result<OptionsChain, ProviderError> {
        Err(ProviderError::NotConfigured("options".into()))
    }

    async fn get_headlines(&self, _symbol: &str) -> Result<Vec<Headline>, ProviderError> {
        Err(ProviderError::NotConfigured("news".into()))
    }
}

/// Provider that hangs long enough to keep a scan in flight.
struct SlowProvider;

#[async_trait]
impl MarketDataProvider for SlowProvider {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn get_daily_bars(
        &self,
        symbol: &str,
        _lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        Err(ProviderError::DataNotAvailable(symbol.to_string()))
    }

    async fn get_intraday_bars(
        &self,
        _symbol: &str,
        _interval: Timeframe,
        _include_prepost: bool,
    ) -> Result<Vec<Bar>, ProviderError> {
        Ok(Vec::new())
    }

    async fn get_fundamentals(&self, _symbol: &str) -> Result<Fundamentals, ProviderError> {
        Ok(Fundamentals::default())
    }

    async fn get_options_chain(&self, _symbol: &str) -> Result<OptionsChain, ProviderError> {
        Err(ProviderError::NotConfigured("options".into()))
    }

    async fn get_headlines(&self, _symbol: &str) -> Result<Vec<Headline>, ProviderError> {
        Err(ProviderError::NotConfigured("news".into()))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn day(i: i64) -> chrono::DateTime<chrono::FixedOffset> {
    Utc.with_ymd_and_hms(2025, 1, 1, 21, 0, 0).unwrap().fixed_offset() + chrono::Duration::days(i)
}

fn flat_bar(timestamp: chrono::DateTime<chrono::FixedOffset>, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp,
        open: close,
        high: close * 1.02,
        low: close * 0.98,
        close,
        volume,
    }
}

/// Steady uptrend, a faded news spike a week back, then a 4% gap up on
/// elevated volume. The spike high leaves upside room so the morning
/// risk/reward check clears.
fn momo_daily() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..33)
        .map(|i| flat_bar(day(i), 50.0 + i as f64 * 0.4, 2_000_000.0))
        .collect();
    bars.push(Bar {
        timestamp: day(33),
        open: 63.0,
        high: 95.0,
        low: 62.0,
        close: 64.0,
        volume: 5_000_000.0,
    });
    for (j, c) in [64.2, 64.4, 64.6, 64.8, 65.0].into_iter().enumerate() {
        bars.push(flat_bar(day(34 + j as i64), c, 2_000_000.0));
    }
    bars.push(Bar {
        timestamp: day(39),
        open: 67.6,
        high: 68.9,
        low: 66.9,
        close: 68.25,
        volume: 8_000_000.0,
    });
    bars
}

fn spy_daily() -> Vec<Bar> {
    (0..55)
        .map(|i| flat_bar(day(i), 500.0, 50_000_000.0))
        .collect()
}

/// Pre/post hourly series: yesterday's close plus a pre-market print
/// about 1.1% above it.
fn momo_prepost(today: NaiveDate) -> Vec<Bar> {
    let yesterday = (today - chrono::Duration::days(1))
        .and_hms_opt(20, 0, 0)
        .map(|dt| dt.and_utc().fixed_offset())
        .unwrap();
    let pm = today.and_hms_opt(8, 0, 0).map(|dt| dt.and_utc().fixed_offset()).unwrap();
    vec![
        flat_bar(yesterday, 68.25, 500_000.0),
        flat_bar(pm, 69.0, 300_000.0),
    ]
}

fn spy_m5(today: NaiveDate) -> Vec<Bar> {
    (0..8)
        .map(|i| {
            let ts = today
                .and_hms_opt(14, 30, 0)
                .map(|dt| dt.and_utc().fixed_offset())
                .unwrap()
                + chrono::Duration::minutes(5 * i);
            flat_bar(ts, 500.0, 1_000_000.0)
        })
        .collect()
}

fn full_provider(today: NaiveDate) -> CannedProvider {
    let mut daily = HashMap::new();
    daily.insert("MOMO".to_string(), momo_daily());
    daily.insert("SPY".to_string(), spy_daily());

    let mut prepost = HashMap::new();
    prepost.insert("MOMO".to_string(), momo_prepost(today));

    let mut m5 = HashMap::new();
    m5.insert("SPY".to_string(), spy_m5(today));

    CannedProvider {
        daily,
        prepost,
        m5,
    }
}

fn fast_config() -> ScanConfig {
    ScanConfig {
        symbol_delay_ms: 0,
        fetch_attempts: 2,
        retry_backoff_ms: 0,
        shortlist_size: 15,
    }
}

fn test_app_config(dir: &TempDir) -> AppConfig {
    AppConfig {
        data_dir: Some(dir.path().to_path_buf()),
        watchlist: vec!["MOMO".to_string()],
        scan: fast_config(),
        schedule: ScheduleConfig {
            enabled: false,
            ..ScheduleConfig::default()
        },
        ..AppConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_evening_scan_then_morning_confirm() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
    let provider = full_provider(today);
    let config = fast_config();
    let watchlist = vec!["MOMO".to_string()];

    let report = run_evening_scan(&provider, &store, &config, &watchlist, today)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    let pick = &report.results[0];
    assert_eq!(pick.symbol, "MOMO");
    assert!(pick.score >= 3.0);
    assert!((pick.gap_pct - 4.0).abs() < 0.1);
    assert!(!pick.reasons.is_empty());

    // Shortlist and history were persisted
    assert!(store.path(store::SCAN_RESULTS).exists());
    let history: ScanHistory = store.load(store::SCAN_HISTORY).unwrap();
    assert_eq!(history.entries().len(), 1);
    assert_eq!(history.entries()[0].picks[0].symbol, "MOMO");

    // The morning pass confirms the shortlisted pick
    let golist = run_morning_confirm(&provider, &store, &config, today)
        .await
        .unwrap();
    assert_eq!(golist.total_confirmed, 1);
    let entry = &golist.golist[0];
    assert_eq!(entry.symbol, "MOMO");
    assert!(entry.pm_change > 0.3);
    assert!(entry.trade_levels.is_some());
    assert!(store.path(store::MORNING_GOLIST).exists());
}

#[tokio::test]
async fn test_morning_without_evening_results() {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let provider = CannedProvider::default();
    let today = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();

    let report = run_morning_confirm(&provider, &store, &fast_config(), today)
        .await
        .unwrap();
    assert_eq!(report.total_confirmed, 0);
    assert!(report.message.is_some());
    // Nothing to publish, nothing persisted
    assert!(!store.path(store::MORNING_GOLIST).exists());
}

#[tokio::test]
async fn test_second_scan_rejected_while_in_flight() {
    let dir = TempDir::new().unwrap();
    let state = Arc::new(
        ScannerState::with_provider(test_app_config(&dir), Arc::new(SlowProvider)).unwrap(),
    );
    let today = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();

    assert!(state.spawn_evening_scan(today).is_ok());
    assert!(state.is_scanning());
    assert!(state.spawn_morning_confirm(today).is_err());
    assert!(state.spawn_backtest(None, None).is_err());
}

#[tokio::test]
async fn test_http_surface() {
    let dir = TempDir::new().unwrap();
    let state = Arc::new(
        ScannerState::with_provider(test_app_config(&dir), Arc::new(SlowProvider)).unwrap(),
    );
    let app = ScannerService::router(state);

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["service"], "edgescan");

    // No scan has ever completed
    let response = app
        .clone()
        .oneshot(Request::get("/api/v1/golist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // First trigger starts, second answers busy
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/scan/evening")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/scan/evening")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
