//! Yahoo Finance provider binding.
//!
//! Uses the public chart, options and search endpoints. No API key; the real
//! constraint is the upstream rate limit, which the scan loop respects by
//! pacing symbol fetches.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Offset, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use super::provider::{MarketDataProvider, ProviderError};
use super::{Bar, Fundamentals, Headline, OptionSide, OptionsChain, Timeframe};

const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const OPTIONS_BASE: &str = "https://query1.finance.yahoo.com/v7/finance/options";
const SEARCH_BASE: &str = "https://query1.finance.yahoo.com/v1/finance/search";
const QUOTE_SUMMARY_BASE: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) edgescan/0.1";

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Yahoo Finance adapter.
pub struct YahooProvider {
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProviderError> {
        debug!(url = %url, "fetching from yahoo");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Network("request timeout".into())
            } else if e.is_connect() {
                ProviderError::Network("connection failed".into())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::DataNotAvailable(url.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Internal(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("failed to parse response: {}", e)))
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        interval: Timeframe,
        range: &str,
        include_prepost: bool,
    ) -> Result<Vec<Bar>, ProviderError> {
        let url = format!(
            "{}/{}?range={}&interval={}&includePrePost={}",
            CHART_BASE, symbol, range, interval, include_prepost
        );
        let body: ChartEnvelope = self.get_json(&url).await?;

        let result = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| {
                let msg = body
                    .chart
                    .error
                    .map(|e| e.description)
                    .unwrap_or_else(|| symbol.to_string());
                ProviderError::DataNotAvailable(msg)
            })?;

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))?;

        // Timestamp bars in the exchange's offset so downstream session
        // logic (pre-market hours, trading date) sees local wall-clock time.
        let offset = result
            .meta
            .gmtoffset
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());

        let mut bars = Vec::with_capacity(result.timestamp.len());
        for (i, &ts) in result.timestamp.iter().enumerate() {
            // Yahoo pads live sessions with null rows; skip incomplete bars.
            let (open, high, low, close) = match (
                value_at(&quote.open, i),
                value_at(&quote.high, i),
                value_at(&quote.low, i),
                value_at(&quote.close, i),
            ) {
                (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
                _ => continue,
            };
            let volume = value_at(&quote.volume, i).unwrap_or(0.0);
            let timestamp = offset
                .timestamp_opt(ts, 0)
                .single()
                .ok_or_else(|| ProviderError::Internal(format!("bad timestamp {}", ts)))?;
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(bars)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn value_at(series: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    series.as_ref().and_then(|v| v.get(i).copied().flatten())
}

/// Chart range for an intraday interval. M5 only needs the live session;
/// M15 carries a month so opening-bar volume has prior days to average
/// against; H1 carries enough days to span yesterday's post-market and
/// today's pre-market.
fn intraday_range(interval: Timeframe) -> Option<&'static str> {
    match interval {
        Timeframe::M5 => Some("1d"),
        Timeframe::M15 => Some("1mo"),
        Timeframe::H1 => Some("5d"),
        _ => None,
    }
}

/// Chart range string covering at least `lookback` daily bars, with slack for
/// weekends and holidays.
fn daily_range(lookback: usize) -> &'static str {
    match lookback {
        0..=20 => "2mo",
        21..=60 => "6mo",
        61..=250 => "1y",
        _ => "2y",
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn get_daily_bars(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let mut bars = self
            .fetch_chart(symbol, Timeframe::Daily, daily_range(lookback), false)
            .await?;
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }
        Ok(bars)
    }

    async fn get_intraday_bars(
        &self,
        symbol: &str,
        interval: Timeframe,
        include_prepost: bool,
    ) -> Result<Vec<Bar>, ProviderError> {
        let range = intraday_range(interval).ok_or_else(|| {
            ProviderError::InvalidRequest(format!("{} is not an intraday interval", interval))
        })?;
        self.fetch_chart(symbol, interval, range, include_prepost)
            .await
    }

    async fn get_weekly_bars(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let range = if lookback <= 26 { "6mo" } else { "2y" };
        let mut bars = self
            .fetch_chart(symbol, Timeframe::Weekly, range, false)
            .await?;
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }
        Ok(bars)
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ProviderError> {
        let url = format!(
            "{}/{}?modules=defaultKeyStatistics,calendarEvents,summaryDetail",
            QUOTE_SUMMARY_BASE, symbol
        );
        let body: QuoteSummaryEnvelope = self.get_json(&url).await?;
        let result = body
            .quote_summary
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))?;

        let stats = result.default_key_statistics.unwrap_or_default();
        let summary = result.summary_detail.unwrap_or_default();
        let next_earnings_date = result
            .calendar_events
            .and_then(|c| c.earnings)
            .and_then(|e| e.earnings_date.into_iter().next())
            .and_then(|d| d.raw)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|dt| dt.date_naive());

        Ok(Fundamentals {
            float_shares: stats.float_shares.and_then(|v| v.raw),
            average_volume: summary.average_volume.and_then(|v| v.raw),
            short_percent_of_float: stats.short_percent_of_float.and_then(|v| v.raw),
            short_ratio: stats.short_ratio.and_then(|v| v.raw),
            next_earnings_date,
        })
    }

    async fn get_options_chain(&self, symbol: &str) -> Result<OptionsChain, ProviderError> {
        let url = format!("{}/{}", OPTIONS_BASE, symbol);
        let body: OptionsEnvelope = self.get_json(&url).await?;

        let result = body
            .option_chain
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))?;
        let chain = result
            .options
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("{} has no options", symbol)))?;

        Ok(OptionsChain {
            calls: aggregate_contracts(&chain.calls),
            puts: aggregate_contracts(&chain.puts),
        })
    }

    async fn get_headlines(&self, symbol: &str) -> Result<Vec<Headline>, ProviderError> {
        let url = format!("{}?q={}&newsCount=10&quotesCount=0", SEARCH_BASE, symbol);
        let body: SearchEnvelope = self.get_json(&url).await?;

        let headlines = body
            .news
            .unwrap_or_default()
            .into_iter()
            .filter_map(|n| {
                let published_at = Utc.timestamp_opt(n.provider_publish_time?, 0).single()?;
                Some(Headline {
                    title: n.title?,
                    description: None,
                    published_at,
                })
            })
            .collect();
        Ok(headlines)
    }
}

fn aggregate_contracts(contracts: &[OptionContract]) -> OptionSide {
    OptionSide {
        volume: contracts.iter().filter_map(|c| c.volume).sum(),
        open_interest: contracts.iter().filter_map(|c| c.open_interest).sum(),
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange UTC offset in seconds, e.g. -18000 for US/Eastern standard time
    gmtoffset: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    #[serde(rename = "defaultKeyStatistics")]
    default_key_statistics: Option<KeyStatistics>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetail>,
    #[serde(rename = "calendarEvents")]
    calendar_events: Option<CalendarEvents>,
}

#[derive(Debug, Default, Deserialize)]
struct KeyStatistics {
    #[serde(rename = "floatShares")]
    float_shares: Option<RawValue>,
    #[serde(rename = "shortPercentOfFloat")]
    short_percent_of_float: Option<RawValue>,
    #[serde(rename = "shortRatio")]
    short_ratio: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryDetail {
    #[serde(rename = "averageVolume")]
    average_volume: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct CalendarEvents {
    earnings: Option<EarningsCalendar>,
}

#[derive(Debug, Deserialize)]
struct EarningsCalendar {
    #[serde(rename = "earningsDate", default)]
    earnings_date: Vec<RawTimestamp>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTimestamp {
    raw: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OptionsEnvelope {
    #[serde(rename = "optionChain")]
    option_chain: OptionChainBody,
}

#[derive(Debug, Deserialize)]
struct OptionChainBody {
    result: Option<Vec<OptionChainResult>>,
}

#[derive(Debug, Deserialize)]
struct OptionChainResult {
    #[serde(default)]
    options: Vec<OptionExpiry>,
}

#[derive(Debug, Deserialize)]
struct OptionExpiry {
    #[serde(default)]
    calls: Vec<OptionContract>,
    #[serde(default)]
    puts: Vec<OptionContract>,
}

#[derive(Debug, Deserialize)]
struct OptionContract {
    volume: Option<f64>,
    #[serde(rename = "openInterest")]
    open_interest: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    news: Option<Vec<SearchNews>>,
}

#[derive(Debug, Deserialize)]
struct SearchNews {
    title: Option<String>,
    #[serde(rename = "providerPublishTime")]
    provider_publish_time: Option<i64>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_parse_skips_null_rows() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1700000000, 1700086400, 1700172800],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, null, 102.0],
                            "high": [101.0, null, 103.5],
                            "low": [99.0, null, 101.0],
                            "close": [100.5, null, 103.0],
                            "volume": [1000000.0, null, 1200000.0]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let envelope: ChartEnvelope = serde_json::from_str(json).unwrap();
        let result = envelope.chart.result.unwrap().remove(0);
        assert_eq!(result.timestamp.len(), 3);

        let quote = &result.indicators.quote[0];
        assert_eq!(value_at(&quote.close, 0), Some(100.5));
        assert_eq!(value_at(&quote.close, 1), None);
        assert_eq!(value_at(&quote.close, 2), Some(103.0));
    }

    #[test]
    fn test_chart_meta_offset_yields_exchange_local_hours() {
        use chrono::Timelike;

        // 1736774400 = 2025-01-13 13:20 UTC = 08:20 US/Eastern (gmtoffset -5h)
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": -18000, "timezone": "EST"},
                    "timestamp": [1736774400],
                    "indicators": {
                        "quote": [{
                            "open": [100.0], "high": [101.0], "low": [99.0],
                            "close": [100.5], "volume": [50000.0]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let envelope: ChartEnvelope = serde_json::from_str(json).unwrap();
        let result = envelope.chart.result.unwrap().remove(0);
        assert_eq!(result.meta.gmtoffset, Some(-18000));

        let offset = result
            .meta
            .gmtoffset
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        let ts = offset.timestamp_opt(result.timestamp[0], 0).unwrap();
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.date_naive(), chrono::NaiveDate::from_ymd_opt(2025, 1, 13).unwrap());
    }

    #[test]
    fn test_intraday_ranges() {
        assert_eq!(intraday_range(Timeframe::M5), Some("1d"));
        // Opening-bar volume averages need prior days in the series
        assert_eq!(intraday_range(Timeframe::M15), Some("1mo"));
        assert_eq!(intraday_range(Timeframe::H1), Some("5d"));
        assert_eq!(intraday_range(Timeframe::Daily), None);
    }

    #[test]
    fn test_quote_summary_parse() {
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "defaultKeyStatistics": {
                        "floatShares": {"raw": 45000000.0},
                        "shortPercentOfFloat": {"raw": 0.12},
                        "shortRatio": {"raw": 3.4}
                    },
                    "summaryDetail": {
                        "averageVolume": {"raw": 2500000.0}
                    },
                    "calendarEvents": {
                        "earnings": {
                            "earningsDate": [{"raw": 1760000000}]
                        }
                    }
                }]
            }
        }"#;
        let envelope: QuoteSummaryEnvelope = serde_json::from_str(json).unwrap();
        let result = envelope.quote_summary.result.unwrap().remove(0);
        let stats = result.default_key_statistics.unwrap();
        assert_eq!(stats.float_shares.unwrap().raw, Some(45_000_000.0));
        assert_eq!(stats.short_ratio.unwrap().raw, Some(3.4));
        assert!(result.calendar_events.unwrap().earnings.is_some());
    }

    #[test]
    fn test_options_aggregation() {
        let calls = vec![
            OptionContract {
                volume: Some(100.0),
                open_interest: Some(500.0),
            },
            OptionContract {
                volume: None,
                open_interest: Some(200.0),
            },
            OptionContract {
                volume: Some(50.0),
                open_interest: None,
            },
        ];
        let side = aggregate_contracts(&calls);
        assert_eq!(side.volume, 150.0);
        assert_eq!(side.open_interest, 700.0);
    }

    #[test]
    fn test_daily_range_buckets() {
        assert_eq!(daily_range(10), "2mo");
        assert_eq!(daily_range(60), "6mo");
        assert_eq!(daily_range(180), "1y");
        assert_eq!(daily_range(400), "2y");
    }
}
