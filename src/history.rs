//! Persistent learning state: scan history with resolved outcomes, gap-fill
//! and earnings-reaction statistics, the personal trade log and the
//! time-of-day heat map.
//!
//! Everything here is pure in-memory state; [`crate::store`] handles loading
//! and saving, and the scan layer does the fetching. Outcome labels use two
//! deliberately different thresholds: a scored pick counts as a win above
//! +1% (the model's training label), a logged personal trade above +0.5%.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::FeatureRecord;
use crate::model::TrainingSample;
use crate::scoring::Grade;

/// Scan history keeps at most this many daily entries.
pub const HISTORY_CAP: usize = 90;
/// A resolved pick is a win above this next-close move, percent.
pub const PICK_WIN_PCT: f64 = 1.0;
/// A closed personal trade is a win above this PnL, percent.
pub const TRADE_WIN_PCT: f64 = 0.5;
/// Trade log keeps at most this many entries.
pub const TRADE_LOG_CAP: usize = 500;
/// Earnings history keeps the last reactions per symbol.
pub const EARNINGS_REACTION_CAP: usize = 12;
/// Gap-fill statistics need at least this many observations to speak.
pub const GAP_MIN_OBSERVATIONS: u32 = 5;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// Scan History
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

/// One shortlisted pick as recorded the evening it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRecord {
    pub symbol: String,
    pub score: f64,
    pub grade: Grade,
    pub last_close: f64,
    pub features: FeatureRecord,
    pub outcome: Option<Outcome>,
    pub outcome_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub picks: Vec<PickRecord>,
}

/// Rolling scan history, one entry per trading date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanHistory {
    entries: Vec<HistoryEntry>,
}

impl ScanHistory {
    /// Record today's picks. Re-running a scan for the same date replaces
    /// that date's entry instead of duplicating it.
    pub fn upsert(&mut self, date: NaiveDate, picks: Vec<PickRecord>) {
        self.entries.retain(|e| e.date != date);
        self.entries.push(HistoryEntry { date, picks });
        if self.entries.len() > HISTORY_CAP {
            let excess = self.entries.len() - HISTORY_CAP;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Symbols still awaiting an outcome in entries dated before `today`.
    pub fn pending_before(&self, today: NaiveDate) -> Vec<(NaiveDate, String)> {
        self.entries
            .iter()
            .filter(|e| e.date < today)
            .flat_map(|e| {
                e.picks
                    .iter()
                    .filter(|p| p.outcome.is_none())
                    .map(move |p| (e.date, p.symbol.clone()))
            })
            .collect()
    }

    /// Resolve one pending pick from the close observed after its scan date.
    /// Already-resolved picks are left alone. Returns the recorded outcome.
    pub fn resolve(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        next_close: f64,
    ) -> Option<Outcome> {
        let entry = self.entries.iter_mut().find(|e| e.date == date)?;
        let pick = entry
            .picks
            .iter_mut()
            .find(|p| p.symbol == symbol && p.outcome.is_none())?;
        if pick.last_close == 0.0 {
            return None;
        }
        let pct = round2((next_close - pick.last_close) / pick.last_close * 100.0);
        let outcome = if pct > PICK_WIN_PCT {
            Outcome::Win
        } else {
            Outcome::Loss
        };
        pick.outcome = Some(outcome);
        pick.outcome_pct = Some(pct);
        Some(outcome)
    }

    /// Every resolved pick, as model training samples.
    pub fn training_samples(&self) -> Vec<TrainingSample> {
        self.entries
            .iter()
            .flat_map(|e| e.picks.iter())
            .filter_map(|p| {
                p.outcome.map(|o| TrainingSample {
                    features: p.features.clone(),
                    won: o == Outcome::Win,
                })
            })
            .collect()
    }

    /// Overall and per-grade win rates over resolved picks. None until at
    /// least one pick has resolved.
    pub fn win_rate_report(&self) -> Option<WinRateReport> {
        let resolved: Vec<&PickRecord> = self
            .entries
            .iter()
            .flat_map(|e| e.picks.iter())
            .filter(|p| p.outcome.is_some())
            .collect();
        if resolved.is_empty() {
            return None;
        }
        let wins = resolved
            .iter()
            .filter(|p| p.outcome == Some(Outcome::Win))
            .count();
        let mut by_grade = BTreeMap::new();
        for grade in [Grade::A, Grade::B, Grade::C] {
            let graded: Vec<&&PickRecord> =
                resolved.iter().filter(|p| p.grade == grade).collect();
            if graded.is_empty() {
                continue;
            }
            let grade_wins: Vec<&&&PickRecord> = graded
                .iter()
                .filter(|p| p.outcome == Some(Outcome::Win))
                .collect();
            let gain_sum: f64 = grade_wins
                .iter()
                .map(|p| p.outcome_pct.unwrap_or(0.0))
                .sum();
            by_grade.insert(
                grade.to_string(),
                GradeStats {
                    win_rate: round1(grade_wins.len() as f64 / graded.len() as f64 * 100.0),
                    total: graded.len(),
                    avg_gain: round2(gain_sum / grade_wins.len().max(1) as f64),
                },
            );
        }
        Some(WinRateReport {
            overall_win_rate: round1(wins as f64 / resolved.len() as f64 * 100.0),
            total_picks: resolved.len(),
            total_wins: wins,
            by_grade,
        })
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeStats {
    pub win_rate: f64,
    pub total: usize,
    pub avg_gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinRateReport {
    pub overall_win_rate: f64,
    pub total_picks: usize,
    pub total_wins: usize,
    pub by_grade: BTreeMap<String, GradeStats>,
}

// ============================================================================
// Gap-Fill History
// ============================================================================

/// Monotone per-symbol gap outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapHistoryRecord {
    pub total: u32,
    pub filled: u32,
    pub continued: u32,
}

/// Did the day after an up-gap fill the gap or continue it? Filled means the
/// next session traded back down to the pre-gap close; continued means it
/// closed above the gap-day close. Both can be true on a wide reversal day.
pub fn classify_gap_day(
    prior_close: f64,
    gap_day_close: f64,
    next_low: f64,
    next_close: f64,
) -> (bool, bool) {
    (next_low <= prior_close, next_close > gap_day_close)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GapFillHistory {
    symbols: BTreeMap<String, GapHistoryRecord>,
}

impl GapFillHistory {
    pub fn observe(&mut self, symbol: &str, filled: bool, continued: bool) {
        let rec = self.symbols.entry(symbol.to_string()).or_default();
        rec.total += 1;
        if filled {
            rec.filled += 1;
        }
        if continued {
            rec.continued += 1;
        }
    }

    /// Fill rate and score modifier for a symbol gapping `gap_pct` today.
    /// Returns (None, 0) until enough observations exist.
    pub fn modifier(&self, symbol: &str, gap_pct: f64) -> (Option<f64>, i32) {
        let rec = match self.symbols.get(symbol) {
            Some(r) if r.total >= GAP_MIN_OBSERVATIONS => r,
            _ => return (None, 0),
        };
        let fill_rate = rec.filled as f64 / rec.total as f64;
        let continue_rate = rec.continued as f64 / rec.total as f64;
        let modifier = if continue_rate > 0.7 && gap_pct > 0.0 {
            1
        } else if fill_rate > 0.7 && gap_pct > 0.0 {
            -1
        } else {
            0
        };
        (Some(fill_rate), modifier)
    }
}

// ============================================================================
// Earnings History
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub reactions: Vec<f64>,
    pub updated: Option<DateTime<Utc>>,
}

/// Summary of how a symbol historically reacts to earnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsReaction {
    pub avg_move_pct: f64,
    pub avg_direction: f64,
    pub bullish_pct: f64,
    pub samples: usize,
    pub is_reliable_gapper: bool,
}

impl Default for EarningsReaction {
    fn default() -> Self {
        EarningsReaction {
            avg_move_pct: 0.0,
            avg_direction: 0.0,
            bullish_pct: 50.0,
            samples: 0,
            is_reliable_gapper: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EarningsHistory {
    symbols: BTreeMap<String, EarningsRecord>,
}

impl EarningsHistory {
    pub fn record(&mut self, symbol: &str, reaction_pct: f64) {
        let rec = self.symbols.entry(symbol.to_string()).or_default();
        rec.reactions.push(round2(reaction_pct));
        if rec.reactions.len() > EARNINGS_REACTION_CAP {
            let excess = rec.reactions.len() - EARNINGS_REACTION_CAP;
            rec.reactions.drain(..excess);
        }
        rec.updated = Some(Utc::now());
    }

    /// Reaction summary; the neutral default until 3 reactions are on file.
    /// A reliable gapper averages a move over 5% with a bullish majority.
    pub fn reaction_stats(&self, symbol: &str) -> EarningsReaction {
        let reactions = match self.symbols.get(symbol) {
            Some(r) if r.reactions.len() >= 3 => &r.reactions,
            _ => return EarningsReaction::default(),
        };
        let n = reactions.len() as f64;
        let avg_move = reactions.iter().map(|r| r.abs()).sum::<f64>() / n;
        let avg_direction = reactions.iter().sum::<f64>() / n;
        let bullish = reactions.iter().filter(|&&r| r > 0.0).count() as f64 / n;
        EarningsReaction {
            avg_move_pct: round1(avg_move),
            avg_direction: round1(avg_direction),
            bullish_pct: (bullish * 100.0).round(),
            samples: reactions.len(),
            is_reliable_gapper: avg_move > 5.0 && bullish > 0.6,
        }
    }
}

// ============================================================================
// Trade Log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub action: String,
    pub price: f64,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
    pub exit_price: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
}

/// Personal trade log, capped at the most recent entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLog {
    trades: Vec<TradeRecord>,
}

impl TradeLog {
    pub fn log(&mut self, symbol: &str, action: &str, price: f64, notes: &str) -> TradeRecord {
        let trade = TradeRecord {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            action: action.to_string(),
            price,
            notes: notes.to_string(),
            timestamp: Utc::now(),
            exit_price: None,
            pnl_pct: None,
            outcome: None,
        };
        self.trades.push(trade.clone());
        if self.trades.len() > TRADE_LOG_CAP {
            let excess = self.trades.len() - TRADE_LOG_CAP;
            self.trades.drain(..excess);
        }
        trade
    }

    /// Close an open trade. Already-closed trades are left untouched.
    pub fn close(&mut self, trade_id: &str, exit_price: f64) -> Option<&TradeRecord> {
        let trade = self
            .trades
            .iter_mut()
            .find(|t| t.id == trade_id && t.exit_price.is_none())?;
        trade.exit_price = Some(exit_price);
        if trade.price > 0.0 {
            let pnl = round2((exit_price - trade.price) / trade.price * 100.0);
            trade.pnl_pct = Some(pnl);
            trade.outcome = Some(if pnl > TRADE_WIN_PCT {
                Outcome::Win
            } else {
                Outcome::Loss
            });
        }
        Some(trade)
    }

    pub fn get(&self, trade_id: &str) -> Option<&TradeRecord> {
        self.trades.iter().find(|t| t.id == trade_id)
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn personal_stats(&self) -> Option<PersonalStats> {
        let closed: Vec<&TradeRecord> =
            self.trades.iter().filter(|t| t.outcome.is_some()).collect();
        if closed.is_empty() {
            return None;
        }
        let wins: Vec<&&TradeRecord> = closed
            .iter()
            .filter(|t| t.outcome == Some(Outcome::Win))
            .collect();
        let losses: Vec<&&TradeRecord> = closed
            .iter()
            .filter(|t| t.outcome == Some(Outcome::Loss))
            .collect();
        let pnl = |t: &TradeRecord| t.pnl_pct.unwrap_or(0.0);
        let avg = |ts: &[&&TradeRecord]| {
            round2(ts.iter().map(|t| pnl(t)).sum::<f64>() / ts.len().max(1) as f64)
        };
        Some(PersonalStats {
            total_trades: closed.len(),
            wins: wins.len(),
            losses: losses.len(),
            win_rate: round1(wins.len() as f64 / closed.len() as f64 * 100.0),
            avg_win_pct: avg(&wins),
            avg_loss_pct: avg(&losses),
            best_trade: closed.iter().map(|t| pnl(t)).fold(f64::MIN, f64::max),
            worst_trade: closed.iter().map(|t| pnl(t)).fold(f64::MAX, f64::min),
        })
    }
}

// ============================================================================
// Time-of-Day Heat Map
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourBucket {
    pub wins: u32,
    pub total: u32,
    pub pnl_sum: f64,
    pub avg_pnl: f64,
}

/// Win statistics bucketed by trade entry hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeHeatmap {
    hours: BTreeMap<String, HourBucket>,
}

impl TimeHeatmap {
    pub fn record(&mut self, entry_hour: u32, pnl_pct: f64) {
        let bucket = self
            .hours
            .entry(format!("hour_{entry_hour}"))
            .or_default();
        bucket.total += 1;
        bucket.pnl_sum += pnl_pct;
        bucket.avg_pnl = round2(bucket.pnl_sum / bucket.total as f64);
        if pnl_pct > TRADE_WIN_PCT {
            bucket.wins += 1;
        }
    }

    /// Human-readable best entry window. Buckets with fewer than 3 trades
    /// only win the comparison when nothing better exists.
    pub fn best_window(&self) -> String {
        let best = self.hours.iter().max_by(|(_, a), (_, b)| {
            let key = |bucket: &HourBucket| {
                if bucket.total >= 3 {
                    bucket.avg_pnl
                } else {
                    -99.0
                }
            };
            key(a).total_cmp(&key(b))
        });
        let (key, bucket) = match best {
            Some(b) => b,
            None => return "9:30-10:30 AM (collecting data)".to_string(),
        };
        let hour: u32 = key.trim_start_matches("hour_").parse().unwrap_or(9);
        let end = hour + 1;
        let period = if hour < 12 { "AM" } else { "PM" };
        let h12 = if hour <= 12 { hour } else { hour - 12 };
        let e12 = if end <= 12 { end } else { end - 12 };
        let win_rate =
            (bucket.wins as f64 / bucket.total.max(1) as f64 * 100.0).round() as u32;
        format!(
            "{h12}:00-{e12}:00 {period} ({win_rate}% win rate, {} trades)",
            bucket.total
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(symbol: &str, score: f64, last_close: f64) -> PickRecord {
        PickRecord {
            symbol: symbol.to_string(),
            score,
            grade: Grade::from_score(score),
            last_close,
            features: FeatureRecord::default(),
            outcome: None,
            outcome_pct: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_upsert_replaces_same_date() {
        let mut h = ScanHistory::default();
        h.upsert(day(1), vec![pick("AAPL", 8.0, 100.0)]);
        h.upsert(day(1), vec![pick("NVDA", 9.0, 200.0)]);
        assert_eq!(h.entries().len(), 1);
        assert_eq!(h.entries()[0].picks[0].symbol, "NVDA");
    }

    #[test]
    fn test_history_cap() {
        let mut h = ScanHistory::default();
        for d in 0..(HISTORY_CAP + 10) {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days(d as i64);
            h.upsert(date, vec![]);
        }
        assert_eq!(h.entries().len(), HISTORY_CAP);
        // Oldest entries dropped, newest kept
        assert_eq!(
            h.entries().last().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days((HISTORY_CAP + 9) as i64)
        );
    }

    #[test]
    fn test_resolve_once_and_threshold() {
        let mut h = ScanHistory::default();
        h.upsert(day(1), vec![pick("AAPL", 8.0, 100.0)]);

        // +2% is a win
        assert_eq!(h.resolve(day(1), "AAPL", 102.0), Some(Outcome::Win));
        let p = &h.entries()[0].picks[0];
        assert_eq!(p.outcome_pct, Some(2.0));

        // Second resolve is a no-op
        assert_eq!(h.resolve(day(1), "AAPL", 50.0), None);
        assert_eq!(h.entries()[0].picks[0].outcome_pct, Some(2.0));
    }

    #[test]
    fn test_exactly_one_percent_is_a_loss() {
        let mut h = ScanHistory::default();
        h.upsert(day(1), vec![pick("AAPL", 8.0, 100.0)]);
        assert_eq!(h.resolve(day(1), "AAPL", 101.0), Some(Outcome::Loss));
    }

    #[test]
    fn test_pending_before_skips_today() {
        let mut h = ScanHistory::default();
        h.upsert(day(1), vec![pick("AAPL", 8.0, 100.0)]);
        h.upsert(day(2), vec![pick("NVDA", 7.0, 200.0)]);
        let pending = h.pending_before(day(2));
        assert_eq!(pending, vec![(day(1), "AAPL".to_string())]);
    }

    #[test]
    fn test_win_rate_report_by_grade() {
        let mut h = ScanHistory::default();
        h.upsert(day(1), vec![pick("AAPL", 8.5, 100.0), pick("NVDA", 6.5, 100.0)]);
        h.resolve(day(1), "AAPL", 103.0);
        h.resolve(day(1), "NVDA", 99.0);
        let report = h.win_rate_report().unwrap();
        assert_eq!(report.total_picks, 2);
        assert_eq!(report.total_wins, 1);
        assert_eq!(report.overall_win_rate, 50.0);
        assert_eq!(report.by_grade["A"].win_rate, 100.0);
        assert_eq!(report.by_grade["B"].win_rate, 0.0);
        assert!(!report.by_grade.contains_key("C"));
    }

    #[test]
    fn test_training_samples_only_resolved() {
        let mut h = ScanHistory::default();
        h.upsert(day(1), vec![pick("AAPL", 8.0, 100.0), pick("NVDA", 7.0, 200.0)]);
        h.resolve(day(1), "AAPL", 105.0);
        let samples = h.training_samples();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].won);
    }

    #[test]
    fn test_gap_modifier_needs_observations() {
        let mut g = GapFillHistory::default();
        for _ in 0..4 {
            g.observe("AAPL", false, true);
        }
        assert_eq!(g.modifier("AAPL", 3.0), (None, 0));

        g.observe("AAPL", false, true);
        let (rate, modifier) = g.modifier("AAPL", 3.0);
        assert_eq!(rate, Some(0.0));
        assert_eq!(modifier, 1);

        // A down gap never gets a modifier
        assert_eq!(g.modifier("AAPL", -3.0).1, 0);
    }

    #[test]
    fn test_gap_modifier_filler() {
        let mut g = GapFillHistory::default();
        for _ in 0..8 {
            g.observe("XYZ", true, false);
        }
        let (rate, modifier) = g.modifier("XYZ", 2.0);
        assert_eq!(rate, Some(1.0));
        assert_eq!(modifier, -1);
    }

    #[test]
    fn test_classify_gap_day() {
        // Gapped from 100 to close 105; next day held up and closed higher
        assert_eq!(classify_gap_day(100.0, 105.0, 103.0, 106.0), (false, true));
        // Next day traded back through the pre-gap close
        assert_eq!(classify_gap_day(100.0, 105.0, 99.5, 101.0), (true, false));
    }

    #[test]
    fn test_earnings_reaction_stats() {
        let mut e = EarningsHistory::default();
        assert_eq!(e.reaction_stats("AAPL"), EarningsReaction::default());

        e.record("AAPL", 7.0);
        e.record("AAPL", -2.0);
        assert_eq!(e.reaction_stats("AAPL").samples, 0);

        e.record("AAPL", 8.0);
        let stats = e.reaction_stats("AAPL");
        assert_eq!(stats.samples, 3);
        assert!((stats.avg_move_pct - 5.7).abs() < 0.01);
        assert!(stats.is_reliable_gapper);
    }

    #[test]
    fn test_earnings_reaction_cap() {
        let mut e = EarningsHistory::default();
        for i in 0..20 {
            e.record("AAPL", i as f64);
        }
        assert_eq!(e.reaction_stats("AAPL").samples, EARNINGS_REACTION_CAP);
    }

    #[test]
    fn test_trade_log_close_and_stats() {
        let mut log = TradeLog::default();
        let t1 = log.log("AAPL", "buy", 100.0, "gap play");
        let t2 = log.log("NVDA", "buy", 200.0, "");
        assert!(log.personal_stats().is_none());

        log.close(&t1.id, 102.0);
        log.close(&t2.id, 199.0);
        let stats = log.personal_stats().unwrap();
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.win_rate, 50.0);
        assert_eq!(stats.best_trade, 2.0);
        assert_eq!(stats.worst_trade, -0.5);
    }

    #[test]
    fn test_trade_half_percent_is_a_loss() {
        let mut log = TradeLog::default();
        let t = log.log("AAPL", "buy", 100.0, "");
        log.close(&t.id, 100.5);
        assert_eq!(log.get(&t.id).unwrap().outcome, Some(Outcome::Loss));
    }

    #[test]
    fn test_trade_close_is_idempotent() {
        let mut log = TradeLog::default();
        let t = log.log("AAPL", "buy", 100.0, "");
        log.close(&t.id, 110.0);
        assert!(log.close(&t.id, 90.0).is_none());
        assert_eq!(log.get(&t.id).unwrap().pnl_pct, Some(10.0));
    }

    #[test]
    fn test_heatmap_best_window() {
        let mut map = TimeHeatmap::default();
        assert_eq!(map.best_window(), "9:30-10:30 AM (collecting data)");

        for _ in 0..3 {
            map.record(10, 2.0);
        }
        for _ in 0..3 {
            map.record(14, -1.0);
        }
        let window = map.best_window();
        assert!(window.starts_with("10:00-11:00 AM"), "{window}");
        assert!(window.contains("100% win rate, 3 trades"));
    }

    #[test]
    fn test_heatmap_afternoon_formatting() {
        let mut map = TimeHeatmap::default();
        for _ in 0..3 {
            map.record(13, 1.5);
        }
        assert!(map.best_window().starts_with("1:00-2:00 PM"));
    }
}
