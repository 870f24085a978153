//! HTTP routes for the scanner service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::history::TradeRecord;
use crate::scan::{GoListReport, ScanReport};
use crate::store;
use crate::ScanActivity;
use crate::ScannerState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub scanning: bool,
    pub last_scan: Option<ScanActivity>,
    pub shortlist_size: usize,
    pub golist_size: usize,
    pub watchlist_size: usize,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: String,
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<TradeRecord>,
    pub count: usize,
}

/// Log trade request
#[derive(Debug, Deserialize)]
pub struct LogTradeRequest {
    pub symbol: String,
    pub action: String,
    pub price: f64,
    #[serde(default)]
    pub notes: String,
}

/// Close trade request
#[derive(Debug, Deserialize)]
pub struct CloseTradeRequest {
    pub exit_price: f64,
}

/// Backtest trigger request
#[derive(Debug, Default, Deserialize)]
pub struct BacktestRequest {
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    #[serde(default)]
    pub days: Option<usize>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "edgescan".to_string(),
    })
}

/// Get the latest evening shortlist
pub async fn get_results(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<ScanReport>, StatusCode> {
    state
        .scan_cache
        .get(&state.store, store::SCAN_RESULTS)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Get the latest morning go-list
pub async fn get_golist(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<GoListReport>, StatusCode> {
    state
        .golist_cache
        .get(&state.store, store::MORNING_GOLIST)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Get the latest backtest report
pub async fn get_backtest(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<crate::backtest::BacktestReport>, StatusCode> {
    state
        .backtest_cache
        .get(&state.store, store::BACKTEST_RESULTS)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Get service status
pub async fn get_status(State(state): State<Arc<ScannerState>>) -> Json<StatusResponse> {
    let shortlist_size = state
        .scan_cache
        .get(&state.store, store::SCAN_RESULTS)
        .await
        .map(|r| r.results.len())
        .unwrap_or(0);
    let golist_size = state
        .golist_cache
        .get(&state.store, store::MORNING_GOLIST)
        .await
        .map(|r| r.golist.len())
        .unwrap_or(0);

    Json(StatusResponse {
        scanning: state.is_scanning(),
        last_scan: state.last_activity().await,
        shortlist_size,
        golist_size,
        watchlist_size: state.config.watchlist().len(),
    })
}

// ============================================================================
// Scan Triggers
// ============================================================================

/// Trigger the evening scan. Answers 409 when a scan is already in flight.
pub async fn trigger_evening_scan(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<TriggerResponse>, StatusCode> {
    state
        .spawn_evening_scan(Local::now().date_naive())
        .map_err(|_| StatusCode::CONFLICT)?;
    Ok(Json(TriggerResponse {
        status: "started".to_string(),
        kind: "evening".to_string(),
    }))
}

/// Trigger the morning confirmation. Answers 409 when a scan is already
/// in flight.
pub async fn trigger_morning_confirm(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<TriggerResponse>, StatusCode> {
    state
        .spawn_morning_confirm(Local::now().date_naive())
        .map_err(|_| StatusCode::CONFLICT)?;
    Ok(Json(TriggerResponse {
        status: "started".to_string(),
        kind: "morning".to_string(),
    }))
}

/// Trigger a backtest. Answers 409 when a scan is already in flight.
pub async fn trigger_backtest(
    State(state): State<Arc<ScannerState>>,
    body: Option<Json<BacktestRequest>>,
) -> Result<Json<TriggerResponse>, StatusCode> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    state
        .spawn_backtest(request.symbols, request.days)
        .map_err(|_| StatusCode::CONFLICT)?;
    Ok(Json(TriggerResponse {
        status: "started".to_string(),
        kind: "backtest".to_string(),
    }))
}

// ============================================================================
// Trade Log Routes
// ============================================================================

/// List all logged trades
pub async fn get_trades(State(state): State<Arc<ScannerState>>) -> Json<TradesResponse> {
    let trades = state.trades().await;
    let count = trades.len();
    Json(TradesResponse { trades, count })
}

/// Log a new trade
pub async fn log_trade(
    State(state): State<Arc<ScannerState>>,
    Json(request): Json<LogTradeRequest>,
) -> Result<Json<TradeRecord>, StatusCode> {
    match state
        .log_trade(&request.symbol, &request.action, request.price, &request.notes)
        .await
    {
        Ok(record) => Ok(Json(record)),
        Err(e) => {
            tracing::error!(error = %e, "failed to log trade");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Close an open trade by id
pub async fn close_trade(
    State(state): State<Arc<ScannerState>>,
    Path(trade_id): Path<String>,
    Json(request): Json<CloseTradeRequest>,
) -> Result<Json<TradeRecord>, StatusCode> {
    match state.close_trade(&trade_id, request.exit_price).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(error = %e, "failed to close trade");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
