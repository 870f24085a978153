//! Market data types and the provider abstraction.
//!
//! All price data flows through the [`MarketDataProvider`] trait so the
//! scoring pipeline can be exercised with canned bars in tests. The Yahoo
//! binding in [`yahoo`] is the default vendor.

mod provider;
pub mod universe;
pub mod yahoo;

pub use provider::{MarketDataProvider, ProviderError};
pub use universe::{sector_etf_for, DEFAULT_WATCHLIST, SECTOR_ETFS, SPY};
pub use yahoo::YahooProvider;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Timeframe for bar data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 5-minute bars
    M5,
    /// 15-minute bars
    M15,
    /// Hourly bars
    H1,
    /// Daily bars
    Daily,
    /// Weekly bars
    Weekly,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::M5 => write!(f, "5m"),
            Self::M15 => write!(f, "15m"),
            Self::H1 => write!(f, "1h"),
            Self::Daily => write!(f, "1d"),
            Self::Weekly => write!(f, "1wk"),
        }
    }
}

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time in the exchange's local offset, so hour and date
    /// reflect the trading session rather than UTC
    pub timestamp: DateTime<FixedOffset>,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

impl Bar {
    /// Full high-low range of the bar.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Typical price (HLC mean), used for VWAP.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Trading date of the bar.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Fundamental data for a symbol.
///
/// Every field is optional; upstream vendors are patchy about coverage and a
/// missing field degrades the corresponding feature to its neutral default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    /// Shares available for public trading
    pub float_shares: Option<f64>,
    /// Average daily volume
    pub average_volume: Option<f64>,
    /// Short interest as a percent of float (0-100 scale)
    pub short_percent_of_float: Option<f64>,
    /// Days-to-cover short ratio
    pub short_ratio: Option<f64>,
    /// Next scheduled earnings date, if known
    pub next_earnings_date: Option<NaiveDate>,
}

/// One side of an options chain, aggregated across contracts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionSide {
    /// Total traded volume
    pub volume: f64,
    /// Total open interest
    pub open_interest: f64,
}

/// Options chain snapshot for the nearest expiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsChain {
    /// Call side aggregate
    pub calls: OptionSide,
    /// Put side aggregate
    pub puts: OptionSide,
}

/// A news headline for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    /// Headline title
    pub title: String,
    /// Optional summary/description text
    pub description: Option<String>,
    /// Publication timestamp
    pub published_at: DateTime<Utc>,
}

impl Headline {
    /// Combined lowercase text used for keyword matching.
    pub fn matchable_text(&self) -> String {
        match &self.description {
            Some(desc) => format!("{} {}", self.title, desc).to_lowercase(),
            None => self.title.to_lowercase(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
