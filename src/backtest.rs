//! Backtest engine.
//!
//! Replays a simplified version of the scoring policy over historical daily
//! bars with no look-ahead: each step sees only bars up to its date and is
//! judged against the very next close. The simplified policy uses only the
//! features computable from daily bars, normalized against its own smaller
//! maximum.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::data::{Bar, MarketDataProvider};
use crate::features::indicators;
use crate::scoring::{Grade, MIN_DOLLAR_VOLUME};
use crate::store::{self, JsonStore};

/// Sliding-window steps per symbol.
pub const DEFAULT_DAYS: usize = 60;
/// Watchlist prefix used when no explicit symbol set is given.
pub const DEFAULT_SYMBOL_COUNT: usize = 10;
/// A signal wins when the next close moves more than this, percent.
const WIN_THRESHOLD_PCT: f64 = 1.0;
/// Realistic maximum raw points for the simplified policy.
const MAX_RAW_POINTS: f64 = 12.0;
/// Signals below this normalized score are not taken.
const MIN_SIGNAL_SCORE: f64 = 3.0;

const SYMBOL_DELAY_MS: u64 = 500;

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeBucket {
    pub wins: u32,
    pub total: u32,
    pub win_rate: f64,
}

/// The persisted backtest report (`backtest_results.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub run_date: DateTime<Utc>,
    pub total_signals: u32,
    pub winning_signals: u32,
    pub win_rate: f64,
    pub avg_gain: f64,
    pub avg_loss: f64,
    pub by_grade: BTreeMap<String, GradeBucket>,
}

impl Default for BacktestReport {
    fn default() -> Self {
        let mut by_grade = BTreeMap::new();
        for grade in [Grade::A, Grade::B, Grade::C] {
            by_grade.insert(grade.to_string(), GradeBucket::default());
        }
        Self {
            run_date: Utc::now(),
            total_signals: 0,
            winning_signals: 0,
            win_rate: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            by_grade,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Evaluate one historical window under the simplified policy.
///
/// Returns None when the window is filtered out (illiquid or under the
/// signal threshold).
pub fn evaluate_window(bars: &[Bar]) -> Option<(f64, Grade)> {
    if indicators::dollar_volume(bars) < MIN_DOLLAR_VOLUME {
        return None;
    }
    let gap = indicators::gap_percent(bars);
    let rvol = indicators::relative_volume(bars);
    let tech = indicators::technical_score(bars);
    let adx = indicators::adx(bars);
    let last = bars.last()?.close;

    let mut score: i32 = 0;
    if (2.0..=8.0).contains(&gap) {
        score += 3;
    } else if (0.5..2.0).contains(&gap) {
        score += 1;
    }
    if rvol >= 2.0 {
        score += 2;
    } else if rvol >= 1.5 {
        score += 1;
    }
    score += tech;
    if adx > 25.0 {
        score += 1;
    }
    if last < 5.0 {
        score -= 2;
    }

    let normalized =
        ((score as f64 / MAX_RAW_POINTS * 10.0).clamp(0.0, 10.0) * 10.0).round() / 10.0;
    if normalized < MIN_SIGNAL_SCORE {
        return None;
    }
    Some((normalized, Grade::from_score(normalized)))
}

/// Replay the simplified policy over each symbol's history and persist the
/// aggregate report.
pub async fn run_backtest<P: MarketDataProvider + ?Sized>(
    provider: &P,
    store: &JsonStore,
    symbols: &[String],
    days: usize,
) -> anyhow::Result<BacktestReport> {
    info!(symbols = symbols.len(), days, "backtest starting");
    let mut report = BacktestReport::default();
    let mut gains: Vec<f64> = Vec::new();
    let mut losses: Vec<f64> = Vec::new();

    for symbol in symbols {
        sleep(Duration::from_millis(SYMBOL_DELAY_MS)).await;
        let bars = match provider.get_daily_bars(symbol, 180).await {
            Ok(bars) => bars,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "backtest fetch failed, skipped");
                continue;
            }
        };
        if bars.len() < 30 {
            debug!(symbol = %symbol, bars = bars.len(), "thin history, skipped");
            continue;
        }

        let last_step = days.min(bars.len() - 1);
        for i in 20..last_step {
            let window = &bars[..=i];
            let (_, grade) = match evaluate_window(window) {
                Some(signal) => signal,
                None => continue,
            };
            let entry = window[window.len() - 1].close;
            let next = bars[i + 1].close;
            let pct = (next - entry) / entry * 100.0;
            let won = pct > WIN_THRESHOLD_PCT;

            report.total_signals += 1;
            if won {
                report.winning_signals += 1;
                gains.push(pct);
            } else {
                losses.push(pct);
            }
            let bucket = report.by_grade.entry(grade.to_string()).or_default();
            bucket.total += 1;
            if won {
                bucket.wins += 1;
            }
        }
    }

    if report.total_signals > 0 {
        report.win_rate = round1(report.winning_signals as f64 / report.total_signals as f64 * 100.0);
    }
    if !gains.is_empty() {
        report.avg_gain = round2(gains.iter().sum::<f64>() / gains.len() as f64);
    }
    if !losses.is_empty() {
        report.avg_loss = round2(losses.iter().sum::<f64>() / losses.len() as f64);
    }
    for bucket in report.by_grade.values_mut() {
        if bucket.total > 0 {
            bucket.win_rate = round1(bucket.wins as f64 / bucket.total as f64 * 100.0);
        }
    }

    store.save_or_log(store::BACKTEST_RESULTS, &report);
    info!(
        signals = report.total_signals,
        win_rate = report.win_rate,
        "backtest complete"
    );
    Ok(report)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(i: usize, open: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap().fixed_offset()
                + chrono::Duration::days(i as i64),
            open,
            high: close * 1.01,
            low: open * 0.99,
            close,
            volume,
        }
    }

    #[test]
    fn test_illiquid_window_filtered() {
        // $1 x 1M shares is far under the floor
        let bars: Vec<Bar> = (0..30).map(|i| bar(i, 1.0, 1.0, 1_000_000.0)).collect();
        assert!(evaluate_window(&bars).is_none());
    }

    #[test]
    fn test_gap_with_volume_signals() {
        // Flat liquid series, then a 5% gap on tripled volume
        let mut bars: Vec<Bar> = (0..29).map(|i| bar(i, 50.0, 50.0, 2_000_000.0)).collect();
        bars.push(bar(29, 52.5, 53.0, 6_000_000.0));
        let (score, grade) = evaluate_window(&bars).expect("gap day should signal");
        // gap +3, rvol 3x +2, tech counts the fresh high: at least 6 raw points
        assert!(score >= 5.0, "score {score}");
        assert!(matches!(grade, Grade::A | Grade::B | Grade::C));
    }

    #[test]
    fn test_quiet_window_below_threshold() {
        let bars: Vec<Bar> = (0..30).map(|i| bar(i, 50.0, 50.0, 2_000_000.0)).collect();
        assert!(evaluate_window(&bars).is_none());
    }

    #[test]
    fn test_default_report_has_all_grades() {
        let report = BacktestReport::default();
        assert_eq!(report.by_grade.len(), 3);
        assert!(report.by_grade.contains_key("A"));
    }
}
