//! Morning confirmation pass.
//!
//! Reads the prior evening shortlist and re-checks each pick against live
//! pre-market action. Three filters gate the go-list: the pick must be up in
//! pre-market, the broad market must not be bearish, and the recomputed
//! risk/reward must clear 2.0.

use chrono::{NaiveDate, Utc};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::data::{MarketDataProvider, Timeframe, SPY};
use crate::features::indicators;
use crate::history::{TimeHeatmap, TradeLog};
use crate::scoring::Grade;
use crate::store::{self, JsonStore};

use super::market::{self, MarketCondition};
use super::{GoListEntry, GoListReport, ScanReport};

/// Minimum pre-market change to confirm a pick, percent.
pub const MIN_PM_CHANGE: f64 = 0.3;
/// Minimum recomputed risk/reward to confirm a pick.
pub const MIN_RISK_REWARD: f64 = 2.0;

/// Run the morning confirmation over the latest evening shortlist.
pub async fn run_morning_confirm<P: MarketDataProvider + ?Sized>(
    provider: &P,
    store: &JsonStore,
    config: &ScanConfig,
    today: NaiveDate,
) -> anyhow::Result<GoListReport> {
    let heatmap: TimeHeatmap = store.load_or_default(store::TIME_HEATMAP);
    let trade_log: TradeLog = store.load_or_default(store::TRADE_LOG);
    let best_window = heatmap.best_window();

    let evening: Option<ScanReport> = store.load(store::SCAN_RESULTS);
    let picks = match evening {
        Some(report) if !report.results.is_empty() => report.results,
        _ => {
            info!("no evening shortlist on file, nothing to confirm");
            return Ok(GoListReport {
                timestamp: Utc::now(),
                golist: Vec::new(),
                total_confirmed: 0,
                spy_condition: MarketCondition::Unknown,
                best_window,
                personal_stats: trade_log.personal_stats(),
                message: Some("No evening scan results found".to_string()),
            });
        }
    };

    let spy_condition = match provider.get_intraday_bars(SPY, Timeframe::M5, false).await {
        Ok(bars) => {
            let (condition, chg) = market::morning_spy_condition(&bars);
            info!(condition = %condition, change_pct = chg, "morning SPY condition");
            condition
        }
        Err(err) => {
            warn!(error = %err, "SPY intraday fetch failed");
            MarketCondition::Unknown
        }
    };

    let mut golist: Vec<GoListEntry> = Vec::new();
    for pick in &picks {
        sleep(Duration::from_millis(config.symbol_delay_ms)).await;
        match confirm_pick(provider, pick, spy_condition, today, &best_window).await {
            Ok(Some(entry)) => {
                info!(symbol = %entry.symbol, pm_change = entry.pm_change, "pick confirmed");
                golist.push(entry);
            }
            Ok(None) => {}
            Err(err) => warn!(symbol = %pick.symbol, error = %err, "morning check failed"),
        }
    }

    sort_golist(&mut golist);

    let report = GoListReport {
        timestamp: Utc::now(),
        total_confirmed: golist.len(),
        golist,
        spy_condition,
        best_window,
        personal_stats: trade_log.personal_stats(),
        message: None,
    };
    store.save_or_log(store::MORNING_GOLIST, &report);
    info!(confirmed = report.total_confirmed, of = picks.len(), "morning confirmation complete");
    Ok(report)
}

/// Catalyst names lead, then grade, then pre-market strength.
fn sort_golist(golist: &mut [GoListEntry]) {
    golist.sort_by(|a, b| {
        let key = |e: &GoListEntry| (u8::from(!e.has_catalyst), e.grade.rank());
        key(a)
            .cmp(&key(b))
            .then_with(|| b.pm_change.total_cmp(&a.pm_change))
    });
}

/// Re-check one evening pick against pre-market action. `Ok(None)` means a
/// filter rejected it.
async fn confirm_pick<P: MarketDataProvider + ?Sized>(
    provider: &P,
    pick: &super::ScoredPick,
    spy_condition: MarketCondition,
    today: NaiveDate,
    best_window: &str,
) -> anyhow::Result<Option<GoListEntry>> {
    let daily = provider.get_daily_bars(&pick.symbol, 10).await?;
    let prepost = provider
        .get_intraday_bars(&pick.symbol, Timeframe::H1, true)
        .await
        .unwrap_or_default();
    let pm_change = indicators::premarket_change(&prepost, today);

    if pm_change <= MIN_PM_CHANGE {
        debug!(symbol = %pick.symbol, pm_change, "flat pre-market, rejected");
        return Ok(None);
    }
    if spy_condition == MarketCondition::Bearish {
        debug!(symbol = %pick.symbol, "SPY bearish, rejected");
        return Ok(None);
    }
    if let Some(rr) = indicators::risk_reward(&daily) {
        if rr < MIN_RISK_REWARD {
            debug!(symbol = %pick.symbol, rr, "risk/reward too thin, rejected");
            return Ok(None);
        }
    }

    let fundamentals = provider
        .get_fundamentals(&pick.symbol)
        .await
        .unwrap_or_default();
    let (pm_volume, pm_vol_pct) =
        indicators::premarket_volume(&prepost, today, fundamentals.average_volume);
    let m15 = provider
        .get_intraday_bars(&pick.symbol, Timeframe::M15, false)
        .await
        .unwrap_or_default();
    let (first_15min_rvol, _) = indicators::first_15min_rvol(&m15, today);
    let vwap = provider
        .get_intraday_bars(&pick.symbol, Timeframe::M5, false)
        .await
        .ok()
        .and_then(|bars| indicators::session_vwap(&bars))
        .map(indicators::round2);

    Ok(Some(GoListEntry {
        symbol: pick.symbol.clone(),
        evening_score: pick.score,
        grade: pick.grade,
        prev_close: pick.last_close,
        pm_change,
        pm_volume,
        pm_vol_pct,
        first_15min_rvol,
        has_catalyst: pick.has_catalyst,
        vwap,
        spy_condition,
        trade_levels: indicators::trade_levels(&daily),
        best_window: best_window.to_string(),
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(symbol: &str, grade: Grade, pm_change: f64, has_catalyst: bool) -> GoListEntry {
        GoListEntry {
            symbol: symbol.to_string(),
            evening_score: 7.0,
            grade,
            prev_close: 100.0,
            pm_change,
            pm_volume: 0.0,
            pm_vol_pct: 0.0,
            first_15min_rvol: 0.0,
            has_catalyst,
            vwap: None,
            spy_condition: MarketCondition::Neutral,
            trade_levels: None,
            best_window: String::new(),
        }
    }

    #[test]
    fn test_golist_sort_order() {
        let mut list = vec![
            entry("NOCAT_A", Grade::A, 5.0, false),
            entry("CAT_B", Grade::B, 1.0, true),
            entry("CAT_A_WEAK", Grade::A, 0.5, true),
            entry("CAT_A_STRONG", Grade::A, 3.0, true),
        ];
        sort_golist(&mut list);
        let order: Vec<&str> = list.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(order, vec!["CAT_A_STRONG", "CAT_A_WEAK", "CAT_B", "NOCAT_A"]);
    }

    use crate::data::{Bar, Fundamentals, Headline, OptionsChain, ProviderError};
    use chrono::TimeZone;

    /// Flat daily series plus a configurable pre-market print.
    struct MorningProvider {
        pm_change_pct: f64,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
    }

    fn flat_bar(timestamp: chrono::DateTime<chrono::FixedOffset>, close: f64) -> Bar {
        Bar {
            timestamp,
            open: close,
            high: close * 1.02,
            low: close * 0.98,
            close,
            volume: 1_000_000.0,
        }
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for MorningProvider {
        fn name(&self) -> &'static str {
            "morning-canned"
        }

        async fn get_daily_bars(
            &self,
            _symbol: &str,
            _lookback: usize,
        ) -> Result<Vec<Bar>, ProviderError> {
            let base = Utc.with_ymd_and_hms(2025, 1, 25, 21, 0, 0).unwrap().fixed_offset();
            Ok((0..10)
                .map(|i| flat_bar(base + chrono::Duration::days(i), 100.0))
                .collect())
        }

        async fn get_intraday_bars(
            &self,
            _symbol: &str,
            interval: Timeframe,
            _include_prepost: bool,
        ) -> Result<Vec<Bar>, ProviderError> {
            if interval != Timeframe::H1 {
                return Ok(Vec::new());
            }
            let yesterday = Utc.with_ymd_and_hms(2025, 2, 9, 20, 0, 0).unwrap().fixed_offset();
            let pm = Utc.with_ymd_and_hms(2025, 2, 10, 8, 0, 0).unwrap().fixed_offset();
            Ok(vec![
                flat_bar(yesterday, 100.0),
                flat_bar(pm, 100.0 * (1.0 + self.pm_change_pct / 100.0)),
            ])
        }

        async fn get_fundamentals(&self, _symbol: &str) -> Result<Fundamentals, ProviderError> {
            Ok(Fundamentals::default())
        }

        async fn get_options_chain(&self, _symbol: &str) -> Result<OptionsChain, ProviderError> {
            Err(ProviderError::NotConfigured("options".into()))
        }

        async fn get_headlines(&self, _symbol: &str) -> Result<Vec<Headline>, ProviderError> {
            Err(ProviderError::NotConfigured("news".into()))
        }
    }

    fn a_grade_pick() -> super::super::ScoredPick {
        use crate::features::{FeatureRecord, InstitutionalLevels};
        use crate::history::EarningsReaction;
        super::super::ScoredPick {
            symbol: "TEST".to_string(),
            score: 8.5,
            grade: Grade::A,
            last_close: 100.0,
            gap_pct: 4.0,
            rvol: 2.5,
            atr_pct: 3.0,
            adx: 28.0,
            volume: 2_000_000.0,
            dollar_vol_m: 200.0,
            pm_change: 0.0,
            pm_vol_pct: 0.0,
            float_m: None,
            sector_etf: None,
            earnings_risky: false,
            days_to_earnings: None,
            rs_score: 1,
            rr_ratio: Some(2.2),
            weekly_trend: 1,
            tech_score: 3,
            unusual_options: false,
            options_detail: None,
            gap_fill_prob: None,
            has_catalyst: false,
            sentiment_score: 0,
            headlines: Vec::new(),
            trade_levels: None,
            institutional_levels: InstitutionalLevels::default(),
            institutional_score: 2,
            short_float_pct: 0.0,
            short_ratio: 0.0,
            short_squeeze_score: 0,
            is_sector_leader: false,
            gap_atr_ratio: 1.3,
            earnings_reaction: EarningsReaction::default(),
            ml_adjustment: 0.0,
            reasons: Vec::new(),
            features: FeatureRecord::default(),
        }
    }

    #[tokio::test]
    async fn test_flat_premarket_rejected_even_for_grade_a() {
        let provider = MorningProvider { pm_change_pct: 0.2 };
        let entry = confirm_pick(
            &provider,
            &a_grade_pick(),
            MarketCondition::Neutral,
            today(),
            "",
        )
        .await
        .unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_bearish_market_rejects_every_pick() {
        // Pre-market strength does not save a pick when SPY is bearish
        let provider = MorningProvider { pm_change_pct: 2.0 };
        let entry = confirm_pick(
            &provider,
            &a_grade_pick(),
            MarketCondition::Bearish,
            today(),
            "",
        )
        .await
        .unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_thin_risk_reward_rejected() {
        // Flat daily series: upside to the 10-day high equals downside to
        // the 10-day low, rr = 1.0
        let provider = MorningProvider { pm_change_pct: 2.0 };
        let entry = confirm_pick(
            &provider,
            &a_grade_pick(),
            MarketCondition::Neutral,
            today(),
            "",
        )
        .await
        .unwrap();
        assert!(entry.is_none());
    }
}
