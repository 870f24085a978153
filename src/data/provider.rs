//! Market data provider abstraction.
//!
//! Defines the [`MarketDataProvider`] trait the scan pipeline consumes.
//! The Yahoo binding in [`super::yahoo`] is the default vendor; tests use
//! a canned in-memory implementation.

use async_trait::async_trait;
use thiserror::Error;

use super::{Bar, Fundamentals, Headline, OptionsChain, Timeframe};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors a data provider can surface.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),
    /// Rate limit exceeded upstream
    #[error("rate limited")]
    RateLimited,
    /// No data available for the requested symbol/timeframe
    #[error("data not available: {0}")]
    DataNotAvailable(String),
    /// The signal source is not configured (e.g. no news API key)
    #[error("source not configured: {0}")]
    NotConfigured(String),
    /// Invalid request parameters
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Internal provider error
    #[error("internal provider error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Whether a retry within the same run is worthwhile.
    ///
    /// Transient transport failures are retried with backoff; everything else
    /// skips the symbol for this run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited)
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for market data providers.
///
/// Every method fetches for a single symbol; the scan loop is responsible for
/// pacing between calls (the upstream rate limit is the real constraint).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging (e.g. "yahoo").
    fn name(&self) -> &'static str;

    /// Fetch up to `lookback` daily bars, oldest first.
    async fn get_daily_bars(&self, symbol: &str, lookback: usize)
        -> Result<Vec<Bar>, ProviderError>;

    /// Fetch intraday bars at the given interval, oldest first.
    ///
    /// When `include_prepost` is set the series includes pre-market and
    /// after-hours bars.
    async fn get_intraday_bars(
        &self,
        symbol: &str,
        interval: Timeframe,
        include_prepost: bool,
    ) -> Result<Vec<Bar>, ProviderError>;

    /// Fetch weekly bars, oldest first. Defaults to daily bars rolled up by
    /// ISO week for providers without a native weekly endpoint.
    async fn get_weekly_bars(&self, symbol: &str, lookback: usize)
        -> Result<Vec<Bar>, ProviderError> {
        let daily = self.get_daily_bars(symbol, lookback * 5).await?;
        Ok(super::universe::rollup_weekly(&daily))
    }

    /// Fetch fundamentals (float, short interest, earnings date).
    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ProviderError>;

    /// Fetch the aggregated options chain for the nearest expiry.
    async fn get_options_chain(&self, symbol: &str) -> Result<OptionsChain, ProviderError>;

    /// Fetch recent headlines for a symbol.
    ///
    /// Providers without a configured news source return
    /// [`ProviderError::NotConfigured`]; the sentiment feature then
    /// contributes its neutral default.
    async fn get_headlines(&self, symbol: &str) -> Result<Vec<Headline>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
