//! Broad-market and sector context computed once per scan run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::Bar;
use crate::features::indicators::{round2, session_vwap};

// ============================================================================
// Market Condition
// ============================================================================

/// Broad-market regime derived from SPY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCondition {
    Bullish,
    Bearish,
    Neutral,
    /// SPY data unavailable; treated as neutral downstream
    Unknown,
}

impl fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketCondition::Bullish => "bullish",
            MarketCondition::Bearish => "bearish",
            MarketCondition::Neutral => "neutral",
            MarketCondition::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Daily SPY condition and score modifier from ~60 days of bars.
///
/// Combines the one-day change with the 20/50-day moving averages. Returns
/// neutral with modifier 0 when fewer than 21 bars are available.
pub fn spy_condition(daily: &[Bar]) -> (MarketCondition, i32) {
    if daily.len() < 21 {
        return (MarketCondition::Neutral, 0);
    }
    let last = daily[daily.len() - 1].close;
    let prev = daily[daily.len() - 2].close;
    let mean = |n: usize| {
        let tail = &daily[daily.len() - n..];
        tail.iter().map(|b| b.close).sum::<f64>() / tail.len() as f64
    };
    let ma20 = mean(20);
    let ma50 = if daily.len() >= 50 { mean(50) } else { ma20 };
    let chg = (last - prev) / prev * 100.0;

    if chg > 0.5 && last > ma20 && last > ma50 {
        (MarketCondition::Bullish, 2)
    } else if chg > 0.2 && last > ma20 {
        (MarketCondition::Bullish, 1)
    } else if chg < -0.5 || (last < ma20 && last < ma50) {
        (MarketCondition::Bearish, -2)
    } else if chg < -0.2 || last < ma20 {
        (MarketCondition::Bearish, -1)
    } else {
        (MarketCondition::Neutral, 0)
    }
}

/// Intraday SPY condition for the morning confirmation pass.
///
/// Compares the latest price to the session open and to session VWAP over
/// 5-minute bars. Returns unknown when fewer than 5 bars arrived.
pub fn morning_spy_condition(intraday: &[Bar]) -> (MarketCondition, f64) {
    if intraday.len() < 5 {
        return (MarketCondition::Unknown, 0.0);
    }
    let open = intraday[0].open;
    let price = intraday[intraday.len() - 1].close;
    if open == 0.0 {
        return (MarketCondition::Unknown, 0.0);
    }
    let chg = (price - open) / open * 100.0;
    let vwap = session_vwap(intraday).unwrap_or(price);

    let condition = if chg > 0.3 && price > vwap {
        MarketCondition::Bullish
    } else if chg < -0.3 && price < vwap {
        MarketCondition::Bearish
    } else {
        MarketCondition::Neutral
    };
    (condition, round2(chg))
}

// ============================================================================
// Sector Rotation
// ============================================================================

/// Sector momentum bucket from the 5-day ETF return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Hot,
    Neutral,
    Cold,
}

/// Performance snapshot for one sector ETF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorPerf {
    pub perf_5d: f64,
    pub perf_20d: f64,
    pub momentum: Momentum,
}

impl SectorPerf {
    /// Build from daily ETF bars; None when fewer than 20 bars arrived.
    pub fn from_daily(daily: &[Bar]) -> Option<Self> {
        if daily.len() < 20 {
            return None;
        }
        let last = daily[daily.len() - 1].close;
        let pct = |base: f64| {
            if base == 0.0 {
                0.0
            } else {
                (last - base) / base * 100.0
            }
        };
        let p5 = pct(daily[daily.len() - 5].close);
        let p20 = pct(daily[daily.len() - 20].close);
        let momentum = if p5 > 2.0 {
            Momentum::Hot
        } else if p5 < -2.0 {
            Momentum::Cold
        } else {
            Momentum::Neutral
        };
        Some(SectorPerf {
            perf_5d: round2(p5),
            perf_20d: round2(p20),
            momentum,
        })
    }
}

/// Per-ETF rotation snapshot for one scan run. ETFs whose data failed to
/// load are simply absent and read as neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorRotation {
    sectors: BTreeMap<String, SectorPerf>,
}

impl SectorRotation {
    pub fn insert(&mut self, etf: &str, perf: SectorPerf) {
        self.sectors.insert(etf.to_string(), perf);
    }

    pub fn momentum(&self, etf: &str) -> Momentum {
        self.sectors
            .get(etf)
            .map(|p| p.momentum)
            .unwrap_or(Momentum::Neutral)
    }

    pub fn get(&self, etf: &str) -> Option<&SectorPerf> {
        self.sectors.get(etf)
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
