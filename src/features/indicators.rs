//! Price-series indicator calculations.
//!
//! Every function here is pure over a bar slice and returns a documented
//! neutral default when the series is too short, so a thin history degrades a
//! single feature instead of failing the symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::Bar;

/// ADX lookback period.
pub const ADX_PERIOD: usize = 14;

/// ATR lookback period (trailing high-low mean).
pub const ATR_PERIOD: usize = 7;

/// Round to two decimals, matching persisted artifact precision.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// Gap / Volume / Volatility
// ============================================================================

/// Gap percent: today's open vs yesterday's close. 0 with fewer than 2 bars.
pub fn gap_percent(bars: &[Bar]) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let prev_close = bars[bars.len() - 2].close;
    if prev_close == 0.0 {
        return 0.0;
    }
    round2((bars[bars.len() - 1].open - prev_close) / prev_close * 100.0)
}

/// Relative volume: last bar volume over the mean of the preceding 5 bars.
/// Neutral default 1.0 with insufficient history or a zero mean.
pub fn relative_volume(bars: &[Bar]) -> f64 {
    if bars.len() < 6 {
        return 1.0;
    }
    let window = &bars[bars.len() - 6..bars.len() - 1];
    let avg = window.iter().map(|b| b.volume).sum::<f64>() / window.len() as f64;
    if avg == 0.0 {
        return 1.0;
    }
    round2(bars[bars.len() - 1].volume / avg)
}

/// ATR as the mean high-low range over the trailing [`ATR_PERIOD`] bars.
pub fn atr(bars: &[Bar]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let tail = &bars[bars.len().saturating_sub(ATR_PERIOD)..];
    tail.iter().map(Bar::range).sum::<f64>() / tail.len() as f64
}

/// ATR as a percent of the last close. 0 if the series is empty.
pub fn atr_percent(bars: &[Bar]) -> f64 {
    let last = match bars.last() {
        Some(b) if b.close > 0.0 => b.close,
        _ => return 0.0,
    };
    round2(atr(bars) / last * 100.0)
}

/// Dollar volume of the last bar (close x volume).
pub fn dollar_volume(bars: &[Bar]) -> f64 {
    bars.last().map(|b| b.close * b.volume).unwrap_or(0.0)
}

/// Gap size normalized to ATR percent. 0 when ATR percent is 0.
pub fn gap_atr_ratio(bars: &[Bar]) -> f64 {
    let atr_pct = atr_percent(bars);
    if atr_pct == 0.0 {
        return 0.0;
    }
    round2(gap_percent(bars) / atr_pct)
}

// ============================================================================
// Trend / Technical
// ============================================================================

/// Clean technical-level score in 0..=3.
///
/// +1 near the 10-day high (within 2%), +1 above the 5-day mean close,
/// +1 closing in the top quarter of the day's range.
pub fn technical_score(bars: &[Bar]) -> i32 {
    let last_bar = match bars.last() {
        Some(b) => b,
        None => return 0,
    };
    let last = last_bar.close;
    let mut score = 0;

    let high10 = bars[bars.len().saturating_sub(10)..]
        .iter()
        .map(|b| b.high)
        .fold(f64::MIN, f64::max);
    if last >= high10 * 0.98 {
        score += 1;
    }

    if bars.len() >= 5 {
        let mean5 = bars[bars.len() - 5..].iter().map(|b| b.close).sum::<f64>() / 5.0;
        if last > mean5 {
            score += 1;
        }
    }

    let range = last_bar.range();
    if range > 0.0 && (last - last_bar.low) / range >= 0.75 {
        score += 1;
    }

    score
}

/// Average Directional Index over [`ADX_PERIOD`].
///
/// Directional movement with the usual dominance test (+DM counts only when
/// the up move exceeds the down move, and vice versa), true range, DI+/DI-,
/// DX, then a rolling mean of DX. Returns 0.0 with fewer than
/// `2 * ADX_PERIOD` bars.
pub fn adx(bars: &[Bar]) -> f64 {
    let period = ADX_PERIOD;
    if bars.len() < 2 * period {
        return 0.0;
    }

    let n = bars.len();
    let mut pdm = vec![0.0; n];
    let mut mdm = vec![0.0; n];
    let mut tr = vec![0.0; n];
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            pdm[i] = up;
        }
        if down > up && down > 0.0 {
            mdm[i] = down;
        }
        let prev_close = bars[i - 1].close;
        tr[i] = (bars[i].high - bars[i].low)
            .max((bars[i].high - prev_close).abs())
            .max((bars[i].low - prev_close).abs());
    }

    let roll = |v: &[f64], end: usize| -> f64 {
        v[end + 1 - period..=end].iter().sum::<f64>() / period as f64
    };

    // DX is defined once the rolling DM/TR means are, i.e. from index
    // `period` onward (index 0 diffs are zero-filled, matching a leading NaN
    // dropped by the rolling window).
    let mut dx = Vec::with_capacity(n - period);
    for i in period..n {
        let atr_i = roll(&tr, i);
        if atr_i == 0.0 {
            dx.push(0.0);
            continue;
        }
        let pdi = 100.0 * roll(&pdm, i) / atr_i;
        let mdi = 100.0 * roll(&mdm, i) / atr_i;
        let sum = pdi + mdi;
        dx.push(if sum == 0.0 { 0.0 } else { 100.0 * (pdi - mdi).abs() / sum });
    }

    if dx.len() < period {
        return 0.0;
    }
    let adx = dx[dx.len() - period..].iter().sum::<f64>() / period as f64;
    (adx * 10.0).round() / 10.0
}

/// Weekly trend direction from weekly bars: +1 when the last weekly close is
/// above its 10-week mean and rising week-over-week, -1 when below and
/// falling, otherwise 0. Needs at least 10 weekly bars.
pub fn weekly_trend(weekly: &[Bar]) -> i32 {
    if weekly.len() < 10 {
        return 0;
    }
    let closes: Vec<f64> = weekly.iter().map(|b| b.close).collect();
    let last = closes[closes.len() - 1];
    let prev = closes[closes.len() - 2];
    if prev == 0.0 {
        return 0;
    }
    let ma10 = closes[closes.len() - 10..].iter().sum::<f64>() / 10.0;
    let wchg = (last - prev) / prev * 100.0;
    if last > ma10 && wchg > 0.0 {
        1
    } else if last < ma10 && wchg < 0.0 {
        -1
    } else {
        0
    }
}

/// Relative strength vs the broad-market proxy, bucketed at +/-1% and +/-3%
/// on the 5-bar return difference. Neutral 0 with insufficient bars.
pub fn relative_strength(bars: &[Bar], spy: &[Bar]) -> i32 {
    if bars.len() < 5 || spy.len() < 5 {
        return 0;
    }
    let ret5 = |s: &[Bar]| {
        let base = s[s.len() - 5].close;
        if base == 0.0 {
            return 0.0;
        }
        (s[s.len() - 1].close - base) / base * 100.0
    };
    let rs = ret5(bars) - ret5(spy);
    if rs > 3.0 {
        2
    } else if rs > 1.0 {
        1
    } else if rs < -3.0 {
        -2
    } else if rs < -1.0 {
        -1
    } else {
        0
    }
}

// ============================================================================
// Levels
// ============================================================================

/// Risk/reward: upside to the 10-day high over downside to the 10-day low.
/// None when the downside denominator is not positive.
pub fn risk_reward(bars: &[Bar]) -> Option<f64> {
    let last = bars.last()?.close;
    let tail = &bars[bars.len().saturating_sub(10)..];
    let high10 = tail.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low10 = tail.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let downside = last - low10;
    if downside <= 0.0 {
        return None;
    }
    Some(round2((high10 - last) / downside))
}

/// Deterministic trade levels derived from the daily window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    /// Suggested entry, a 0.2% buffer above the last close
    pub entry: f64,
    /// Stop: the higher of 1.5x ATR below entry and 1% below the 5-day low
    pub stop: f64,
    /// Stop distance as a percent of entry
    pub stop_pct: f64,
    /// First target at 1x risk
    pub target1: f64,
    /// Second target at 2x risk
    pub target2: f64,
    /// Third target at 3x risk
    pub target3: f64,
    /// 10-day high resistance
    pub resistance: f64,
    /// ATR used for the stop
    pub atr: f64,
}

/// Compute trade levels. None when the series is empty or risk collapses to
/// zero (entry at or below stop).
pub fn trade_levels(bars: &[Bar]) -> Option<TradeLevels> {
    let last = bars.last()?.close;
    let atr_val = atr(bars);
    let entry = round2(last * 1.002);

    let low5 = bars[bars.len().saturating_sub(5)..]
        .iter()
        .map(|b| b.low)
        .fold(f64::MAX, f64::min);
    let stop = round2((entry - 1.5 * atr_val).max(low5 * 0.99));
    let risk = entry - stop;
    if risk <= 0.0 {
        return None;
    }

    let high10 = bars[bars.len().saturating_sub(10)..]
        .iter()
        .map(|b| b.high)
        .fold(f64::MIN, f64::max);

    Some(TradeLevels {
        entry,
        stop,
        stop_pct: round2(risk / entry * 100.0),
        target1: round2(entry + risk),
        target2: round2(entry + 2.0 * risk),
        target3: round2(entry + 3.0 * risk),
        resistance: round2(high10),
        atr: round2(atr_val),
    })
}

/// Institutional reference levels: session VWAP over the window plus the
/// 20/50/200-bar moving averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalLevels {
    pub vwap: Option<f64>,
    pub ma20: Option<f64>,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub above_vwap: bool,
    pub above_ma20: bool,
    pub above_ma50: bool,
    pub above_ma200: bool,
}

/// Compute institutional levels and the 0..=4 count of levels held.
pub fn institutional_levels(bars: &[Bar]) -> (InstitutionalLevels, i32) {
    if bars.len() < 5 {
        return (InstitutionalLevels::default(), 0);
    }
    let last = bars[bars.len() - 1].close;
    let mut levels = InstitutionalLevels::default();

    let ma = |n: usize| -> Option<f64> {
        if bars.len() >= n {
            Some(round2(
                bars[bars.len() - n..].iter().map(|b| b.close).sum::<f64>() / n as f64,
            ))
        } else {
            None
        }
    };
    levels.ma20 = ma(20);
    levels.ma50 = ma(50);
    levels.ma200 = ma(200);

    let total_vol: f64 = bars.iter().map(|b| b.volume).sum();
    if total_vol > 0.0 {
        let vwap = bars.iter().map(|b| b.typical_price() * b.volume).sum::<f64>() / total_vol;
        levels.vwap = Some(round2(vwap));
        levels.above_vwap = last > vwap;
    }
    levels.above_ma20 = levels.ma20.map(|m| last > m).unwrap_or(false);
    levels.above_ma50 = levels.ma50.map(|m| last > m).unwrap_or(false);
    levels.above_ma200 = levels.ma200.map(|m| last > m).unwrap_or(false);

    let score = [levels.above_vwap, levels.above_ma20, levels.above_ma50, levels.above_ma200]
        .iter()
        .filter(|&&b| b)
        .count() as i32;
    (levels, score)
}

/// VWAP over an intraday session. None when the session has no volume.
pub fn session_vwap(bars: &[Bar]) -> Option<f64> {
    let total_vol: f64 = bars.iter().map(|b| b.volume).sum();
    if total_vol == 0.0 || bars.is_empty() {
        return None;
    }
    Some(round2(
        bars.iter().map(|b| b.typical_price() * b.volume).sum::<f64>() / total_vol,
    ))
}

// ============================================================================
// Pre-market
// ============================================================================

/// Hour before which an intraday bar counts as pre-market. Bars carry the
/// exchange's local offset, so this is a wall-clock comparison regardless of
/// where the process runs.
const PREMARKET_END_HOUR: u32 = 9;

fn is_premarket(bar: &Bar) -> bool {
    use chrono::Timelike;
    bar.timestamp.hour() < PREMARKET_END_HOUR
}

/// Pre-market percent change: last pre-market close today vs the final close
/// of any prior day in the series. 0 when either side is missing.
pub fn premarket_change(prepost: &[Bar], today: NaiveDate) -> f64 {
    let pm_last = prepost
        .iter()
        .filter(|b| b.date() == today && is_premarket(b))
        .next_back();
    let prev_close = prepost.iter().filter(|b| b.date() < today).next_back();
    match (pm_last, prev_close) {
        (Some(pm), Some(prev)) if prev.close > 0.0 => {
            round2((pm.close - prev.close) / prev.close * 100.0)
        }
        _ => 0.0,
    }
}

/// Pre-market volume today and its percent of the average daily volume.
/// Returns (0, 0.0) with no pre-market bars; percent is 0.0 when the average
/// volume is unknown or zero.
pub fn premarket_volume(prepost: &[Bar], today: NaiveDate, average_volume: Option<f64>) -> (f64, f64) {
    let pm_vol: f64 = prepost
        .iter()
        .filter(|b| b.date() == today && is_premarket(b))
        .map(|b| b.volume)
        .sum();
    if pm_vol == 0.0 {
        return (0.0, 0.0);
    }
    match average_volume {
        Some(avg) if avg > 0.0 => (pm_vol, ((pm_vol / avg) * 1000.0).round() / 10.0),
        _ => (pm_vol, 0.0),
    }
}

/// First-15-minute relative volume: today's opening 15-minute bar volume over
/// the average opening-bar volume of prior days in the series. Neutral 1.0
/// when today's bar or the history is missing.
pub fn first_15min_rvol(m15: &[Bar], today: NaiveDate) -> (f64, f64) {
    let today_first = m15.iter().find(|b| b.date() == today && !is_premarket(b));
    let first_vol = match today_first {
        Some(b) => b.volume,
        None => return (1.0, 0.0),
    };

    let mut hist: Vec<f64> = Vec::new();
    let mut seen_date: Option<NaiveDate> = None;
    for bar in m15 {
        let d = bar.date();
        if d == today || is_premarket(bar) {
            continue;
        }
        if seen_date != Some(d) {
            seen_date = Some(d);
            hist.push(bar.volume);
        }
    }
    if hist.is_empty() {
        return (1.0, first_vol);
    }
    let avg = hist.iter().sum::<f64>() / hist.len() as f64;
    if avg == 0.0 {
        return (1.0, first_vol);
    }
    (round2(first_vol / avg), first_vol)
}

// ============================================================================
// Tests
// ============================================================================
