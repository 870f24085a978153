//! Scan orchestration: the evening screening pass and the morning
//! confirmation pass, plus the run-wide market context they share.

pub mod evening;
pub mod market;
pub mod morning;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::features::{FeatureRecord, InstitutionalLevels, OptionsDetail, TradeLevels};
use crate::history::{EarningsReaction, PersonalStats, WinRateReport};
use crate::scoring::Grade;

pub use evening::run_evening_scan;
pub use market::{MarketCondition, SectorRotation};
pub use morning::run_morning_confirm;

// ============================================================================
// Evening Scan Result
// ============================================================================

/// One shortlisted symbol with its score and full enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPick {
    pub symbol: String,
    pub score: f64,
    pub grade: Grade,
    pub last_close: f64,
    pub gap_pct: f64,
    pub rvol: f64,
    pub atr_pct: f64,
    pub adx: f64,
    pub volume: f64,
    pub dollar_vol_m: f64,
    pub pm_change: f64,
    pub pm_vol_pct: f64,
    pub float_m: Option<f64>,
    pub sector_etf: Option<String>,
    pub earnings_risky: bool,
    pub days_to_earnings: Option<i64>,
    pub rs_score: i32,
    pub rr_ratio: Option<f64>,
    pub weekly_trend: i32,
    pub tech_score: i32,
    pub unusual_options: bool,
    pub options_detail: Option<OptionsDetail>,
    pub gap_fill_prob: Option<f64>,
    pub has_catalyst: bool,
    pub sentiment_score: i32,
    pub headlines: Vec<String>,
    pub trade_levels: Option<TradeLevels>,
    pub institutional_levels: InstitutionalLevels,
    pub institutional_score: i32,
    pub short_float_pct: f64,
    pub short_ratio: f64,
    pub short_squeeze_score: i32,
    pub is_sector_leader: bool,
    pub gap_atr_ratio: f64,
    pub earnings_reaction: EarningsReaction,
    pub ml_adjustment: f64,
    pub reasons: Vec<String>,
    /// The exact record the score was computed from; recorded into history
    /// for outcome training
    pub features: FeatureRecord,
}

/// The persisted evening scan report (`scan_results.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub timestamp: DateTime<Utc>,
    /// The session these picks target, the next trading morning
    pub market_date: String,
    pub total_scanned: usize,
    pub market_condition: MarketCondition,
    pub spy_modifier: i32,
    pub sector_rotation: SectorRotation,
    pub best_trading_window: String,
    pub win_rate: Option<WinRateReport>,
    pub personal_stats: Option<PersonalStats>,
    /// Most recent backtest, if one has been run
    pub backtest: Option<crate::backtest::BacktestReport>,
    pub results: Vec<ScoredPick>,
}

// ============================================================================
// Morning Go-List
// ============================================================================

/// One confirmed pick on the morning go-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoListEntry {
    pub symbol: String,
    pub evening_score: f64,
    pub grade: Grade,
    pub prev_close: f64,
    pub pm_change: f64,
    pub pm_volume: f64,
    pub pm_vol_pct: f64,
    pub first_15min_rvol: f64,
    pub has_catalyst: bool,
    pub vwap: Option<f64>,
    pub spy_condition: MarketCondition,
    pub trade_levels: Option<TradeLevels>,
    pub best_window: String,
}

/// The persisted morning report (`morning_golist.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoListReport {
    pub timestamp: DateTime<Utc>,
    pub golist: Vec<GoListEntry>,
    pub total_confirmed: usize,
    pub spy_condition: MarketCondition,
    pub best_window: String,
    pub personal_stats: Option<PersonalStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Display date for the session a scan targets, e.g. "Friday, March 14 2025".
pub fn market_date_label(today: NaiveDate) -> String {
    (today + chrono::Duration::days(1))
        .format("%A, %B %d %Y")
        .to_string()
}
