//! Scoring engine: additive rule evaluation over a [`FeatureRecord`].
//!
//! Every rule contributes points and, when it fires, a human-readable reason.
//! Raw points are normalized against the realistic maximum of 26, clamped to
//! [0, 10] and rounded to one decimal. The rule order is fixed so reason
//! lists are stable across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::features::FeatureRecord;

/// Dollar-volume floor below which a symbol scores 0 outright.
pub const MIN_DOLLAR_VOLUME: f64 = 10_000_000.0;

/// Realistic maximum raw points; used to normalize to the 0..10 scale.
const MAX_RAW_POINTS: f64 = 26.0;

// ============================================================================
// Grade
// ============================================================================

/// Letter grade derived from the normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Grade::A
        } else if score >= 6.0 {
            Grade::B
        } else {
            Grade::C
        }
    }

    /// Sort rank for the morning go-list, A first.
    pub fn rank(self) -> u8 {
        match self {
            Grade::A => 0,
            Grade::B => 1,
            Grade::C => 2,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::A => f.write_str("A"),
            Grade::B => f.write_str("B"),
            Grade::C => f.write_str("C"),
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Score one feature record. `ml_adjustment` is the model's signed confidence
/// in [-1, 1]; it contributes `round(adj * 2)` points when nonzero.
///
/// Returns the normalized score and the ordered reason list.
pub fn score(r: &FeatureRecord, ml_adjustment: f64) -> (f64, Vec<String>) {
    let mut score: i32 = 0;
    let mut reasons: Vec<String> = Vec::new();

    if r.dollar_vol < MIN_DOLLAR_VOLUME {
        return (0.0, vec!["Dollar volume under $10M, excluded".to_string()]);
    }

    // Gap quality
    let g = r.gap_pct;
    if (2.0..=8.0).contains(&g) {
        score += 3;
        reasons.push(format!("Ideal gap ({g}%)"));
    } else if g > 8.0 && g <= 15.0 {
        score += 2;
        reasons.push(format!("Large gap ({g}%), may be extended"));
    } else if (0.5..2.0).contains(&g) {
        score += 1;
        reasons.push(format!("Small gap ({g}%)"));
    } else if g < -2.0 {
        score -= 1;
        reasons.push(format!("Gapping down ({g}%)"));
    }
    if r.gap_atr_ratio >= 3.0 {
        score += 1;
        reasons.push(format!("Gap is {}x ATR, significant move", r.gap_atr_ratio));
    } else if r.gap_atr_ratio >= 2.0 {
        reasons.push(format!("Gap is {}x ATR, solid move", r.gap_atr_ratio));
    }

    // Gap-fill history
    score += r.gap_fill_modifier;
    if r.gap_fill_modifier > 0 {
        reasons.push("Historically continues gaps".to_string());
    } else if r.gap_fill_modifier < 0 {
        reasons.push("Historically fills gaps, caution".to_string());
    }

    // Pre-market action
    let pm = r.pm_change;
    if pm > 2.0 {
        score += 2;
        reasons.push(format!("Strong pre-market ({pm}%)"));
    } else if pm > 0.5 {
        score += 1;
        reasons.push(format!("Pre-market positive ({pm}%)"));
    } else if pm < -1.0 {
        score -= 1;
        reasons.push(format!("Pre-market weak ({pm}%)"));
    }
    if r.pm_vol_pct > 20.0 {
        score += 1;
        reasons.push(format!("Heavy pre-market volume ({}% of avg daily)", r.pm_vol_pct));
    } else if r.pm_vol_pct > 10.0 {
        reasons.push(format!("Decent pre-market volume ({}% of avg daily)", r.pm_vol_pct));
    }

    // Relative volume
    let rvol = r.rvol;
    if rvol >= 3.0 {
        score += 3;
        reasons.push(format!("Very high RVOL ({rvol}x)"));
    } else if rvol >= 2.0 {
        score += 2;
        reasons.push(format!("High RVOL ({rvol}x)"));
    } else if rvol >= 1.5 {
        score += 1;
        reasons.push(format!("Above avg RVOL ({rvol}x)"));
    } else {
        reasons.push(format!("Low RVOL ({rvol}x)"));
    }

    // Technical setup
    score += r.tech_score;
    match r.tech_score {
        3 => reasons.push("Strong technical setup".to_string()),
        2 => reasons.push("Decent technical setup".to_string()),
        1 => reasons.push("Weak technical setup".to_string()),
        _ => {}
    }

    // Institutional levels
    if r.institutional_score >= 3 {
        score += 2;
        reasons.push("Above VWAP + all key MAs, institutional support".to_string());
    } else if r.institutional_score == 2 {
        score += 1;
        reasons.push("Above most key levels".to_string());
    } else if r.institutional_score == 1 {
        reasons.push("Mixed signals on key levels".to_string());
    } else {
        score -= 1;
        reasons.push("Below key institutional levels".to_string());
    }

    // Trend strength
    if r.adx > 30.0 {
        score += 2;
        reasons.push(format!("Very strong trend (ADX {})", r.adx));
    } else if r.adx > 25.0 {
        score += 1;
        reasons.push(format!("Strong trend (ADX {})", r.adx));
    } else if r.adx < 20.0 {
        score -= 1;
        reasons.push(format!("Choppy/weak trend (ADX {})", r.adx));
    }

    // Weekly trend
    if r.weekly_trend == 1 {
        score += 2;
        reasons.push("Weekly uptrend confirmed".to_string());
    } else if r.weekly_trend == -1 {
        score -= 2;
        reasons.push("Fighting weekly downtrend".to_string());
    }

    // Short squeeze
    if r.short_squeeze_score >= 2 {
        score += 2;
        reasons.push("High short interest, squeeze potential".to_string());
    } else if r.short_squeeze_score == 1 {
        score += 1;
        reasons.push("Moderate short interest, some squeeze risk".to_string());
    }

    // Sector leadership
    if r.sector_leader_score >= 2 {
        score += 2;
        reasons.push("Sector leader, strongest in hot sector".to_string());
    } else if r.sector_leader_score == 1 {
        score += 1;
        reasons.push("Outperforming sector peers".to_string());
    }

    // News sentiment, falling back to the bare catalyst flag
    let s = r.sentiment_score;
    if s >= 2 {
        score += 2;
        reasons.push("Strongly bullish news sentiment".to_string());
    } else if s == 1 {
        score += 1;
        reasons.push("Positive news sentiment".to_string());
    } else if r.has_catalyst && s == 0 {
        score += 1;
        reasons.push("News catalyst detected".to_string());
    } else if s <= -2 {
        score -= 2;
        reasons.push("Bearish news sentiment".to_string());
    } else if s == -1 {
        score -= 1;
        reasons.push("Slightly negative news".to_string());
    }

    // Options flow
    if r.unusual_options {
        score += 1;
        reasons.push("Unusual options activity".to_string());
    }

    // Earnings risk, waived for proven gappers
    if r.earnings_risky && r.earnings_is_reliable_gapper {
        score += 1;
        reasons.push("Earnings risk but historically gaps up big".to_string());
    } else if r.earnings_risky {
        score -= 3;
        reasons.push("Earnings within 3 days, high risk".to_string());
    }

    // Market and sector context
    score += r.spy_modifier;
    if r.spy_modifier > 0 {
        reasons.push("Market bullish (SPY)".to_string());
    } else if r.spy_modifier < 0 {
        reasons.push("Market bearish (SPY), caution".to_string());
    }
    score += r.sector_score;
    if r.sector_score > 0 {
        reasons.push("Sector strong".to_string());
    } else if r.sector_score < 0 {
        reasons.push("Sector weak".to_string());
    }

    // Float
    score += r.float_score;
    match r.float_score {
        2 => reasons.push("Low float, big move potential".to_string()),
        1 => reasons.push("Moderate float".to_string()),
        f if f < 0 => reasons.push("High float".to_string()),
        _ => {}
    }

    // Relative strength
    score += r.rs_score;
    if r.rs_score > 0 {
        reasons.push("Outperforming SPY".to_string());
    } else if r.rs_score < 0 {
        reasons.push("Underperforming SPY".to_string());
    }

    // Volatility and price sanity
    if r.atr_pct < 1.5 {
        score -= 1;
        reasons.push(format!("Low volatility ({}% ATR)", r.atr_pct));
    } else if r.atr_pct >= 3.0 {
        reasons.push(format!("Good daily range ({}% ATR)", r.atr_pct));
    }
    if r.last_close < 5.0 {
        score -= 2;
        reasons.push("Price under $5".to_string());
    } else if r.last_close > 500.0 {
        reasons.push("High price, size accordingly".to_string());
    }

    // Risk/reward
    if let Some(rr) = r.rr_ratio {
        if rr >= 2.0 {
            score += 1;
            reasons.push(format!("Good R/R ({rr}:1)"));
        } else if rr < 1.0 {
            score -= 1;
            reasons.push(format!("Poor R/R ({rr}:1)"));
        }
    }

    // Model adjustment
    if ml_adjustment != 0.0 {
        let pts = (ml_adjustment * 2.0).round() as i32;
        if pts != 0 {
            score += pts;
            let label = if pts > 0 { "boost" } else { "caution" };
            reasons.push(format!("Model {label} ({pts:+}pts)"));
        }
    }

    (normalize(score), reasons)
}

/// Normalize raw points to the 0..10 scale, one decimal.
fn normalize(raw: i32) -> f64 {
    let scaled = raw as f64 / MAX_RAW_POINTS * 10.0;
    (scaled.clamp(0.0, 10.0) * 10.0).round() / 10.0
}

// ============================================================================
// Tests
// ============================================================================
