//! Evening screening pass.
//!
//! Runs after the close: resolves outcomes for earlier picks, retrains the
//! adjustment model, snapshots the broad market once, then walks the
//! watchlist strictly sequentially with a fixed delay per symbol. One failed
//! symbol never aborts the run.

use chrono::{NaiveDate, Utc};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::data::{sector_etf_for, Bar, MarketDataProvider, ProviderError, Timeframe, SECTOR_ETFS, SPY};
use crate::features::{self, indicators, sentiment, ScanContext, SymbolSnapshot};
use crate::history::{
    classify_gap_day, EarningsHistory, GapFillHistory, PickRecord, ScanHistory, TimeHeatmap,
    TradeLog,
};
use crate::model::{self, ModelWeights};
use crate::scoring::{self, Grade};
use crate::store::{self, JsonStore};

use super::market::{self, SectorPerf, SectorRotation};
use super::{market_date_label, ScanReport, ScoredPick};

/// Symbols below this dollar volume are skipped before feature extraction.
/// The scoring engine applies its own, higher floor.
pub const PREFILTER_DOLLAR_VOL: f64 = 5_000_000.0;
/// Picks scoring below this never make the shortlist.
pub const MIN_KEEP_SCORE: f64 = 3.0;
/// Daily bars fetched per symbol.
const DAILY_LOOKBACK: usize = 60;
/// Delay between sector-ETF fetches and outcome fetches, milliseconds.
const SIDE_FETCH_DELAY_MS: u64 = 300;

/// Run the full evening pass and persist every artifact it touches.
pub async fn run_evening_scan<P: MarketDataProvider + ?Sized>(
    provider: &P,
    store: &JsonStore,
    config: &ScanConfig,
    watchlist: &[String],
    today: NaiveDate,
) -> anyhow::Result<ScanReport> {
    info!(symbols = watchlist.len(), provider = provider.name(), "evening scan starting");

    // Learning first: yesterday's outcomes, then the model they feed.
    let mut history: ScanHistory = store.load_or_default(store::SCAN_HISTORY);
    let mut gap_history: GapFillHistory = store.load_or_default(store::GAP_HISTORY);
    let mut earnings_history: EarningsHistory = store.load_or_default(store::EARNINGS_HISTORY);
    resolve_outcomes(
        provider,
        &mut history,
        &mut gap_history,
        &mut earnings_history,
        today,
    )
    .await;
    store.save_or_log(store::SCAN_HISTORY, &history);
    store.save_or_log(store::GAP_HISTORY, &gap_history);
    store.save_or_log(store::EARNINGS_HISTORY, &earnings_history);

    let model_weights = match model::train(&history.training_samples()) {
        Some(m) => {
            store.save_or_log(store::MODEL_WEIGHTS, &m);
            Some(m)
        }
        None => store.load::<ModelWeights>(store::MODEL_WEIGHTS),
    };

    // Broad market snapshot, fetched once for the whole run.
    let spy_daily = match provider.get_daily_bars(SPY, DAILY_LOOKBACK).await {
        Ok(bars) => bars,
        Err(err) => {
            warn!(error = %err, "SPY fetch failed, scanning with neutral market context");
            Vec::new()
        }
    };
    let (spy_condition, spy_modifier) = market::spy_condition(&spy_daily);
    info!(condition = %spy_condition, modifier = spy_modifier, "market condition");
    let rotation = fetch_sector_rotation(provider).await;

    let ctx = ScanContext {
        today,
        spy_daily: &spy_daily,
        spy_modifier,
        rotation: &rotation,
    };

    let mut results: Vec<ScoredPick> = Vec::new();
    for (idx, symbol) in watchlist.iter().enumerate() {
        sleep(Duration::from_millis(config.symbol_delay_ms)).await;
        debug!(symbol = %symbol, progress = idx + 1, total = watchlist.len(), "scanning");

        match scan_symbol(
            provider,
            config,
            symbol,
            &ctx,
            &gap_history,
            &earnings_history,
            model_weights.as_ref(),
        )
        .await
        {
            Ok(Some(pick)) => {
                info!(symbol = %symbol, score = pick.score, grade = %pick.grade, "setup found");
                results.push(pick);
            }
            Ok(None) => {}
            Err(err) => warn!(symbol = %symbol, error = %err, "symbol skipped"),
        }
    }

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(config.shortlist_size);

    let picks: Vec<PickRecord> = results
        .iter()
        .map(|r| PickRecord {
            symbol: r.symbol.clone(),
            score: r.score,
            grade: r.grade,
            last_close: r.last_close,
            features: r.features.clone(),
            outcome: None,
            outcome_pct: None,
        })
        .collect();
    history.upsert(today, picks);
    store.save_or_log(store::SCAN_HISTORY, &history);

    let heatmap: TimeHeatmap = store.load_or_default(store::TIME_HEATMAP);
    let trade_log: TradeLog = store.load_or_default(store::TRADE_LOG);
    let report = ScanReport {
        timestamp: Utc::now(),
        market_date: market_date_label(today),
        total_scanned: watchlist.len(),
        market_condition: spy_condition,
        spy_modifier,
        sector_rotation: rotation,
        best_trading_window: heatmap.best_window(),
        win_rate: history.win_rate_report(),
        personal_stats: trade_log.personal_stats(),
        backtest: store.load(store::BACKTEST_RESULTS),
        results,
    };
    store.save_or_log(store::SCAN_RESULTS, &report);

    info!(
        setups = report.results.len(),
        scanned = report.total_scanned,
        market = %report.market_condition,
        "evening scan complete"
    );
    Ok(report)
}

/// Scan one symbol: fetch, extract, score, enrich. `Ok(None)` means the
/// symbol was legitimately filtered out.
async fn scan_symbol<P: MarketDataProvider + ?Sized>(
    provider: &P,
    config: &ScanConfig,
    symbol: &str,
    ctx: &ScanContext<'_>,
    gap_history: &GapFillHistory,
    earnings_history: &EarningsHistory,
    model_weights: Option<&ModelWeights>,
) -> Result<Option<ScoredPick>, ProviderError> {
    let daily = daily_with_retry(provider, symbol, DAILY_LOOKBACK, config).await?;
    if daily.len() < 10 {
        debug!(symbol = %symbol, bars = daily.len(), "thin daily series, skipped");
        return Ok(None);
    }
    let dollar_vol = indicators::dollar_volume(&daily);
    if dollar_vol < PREFILTER_DOLLAR_VOL {
        return Ok(None);
    }

    // Secondary data degrades to neutral defaults per signal.
    let weekly = match provider.get_weekly_bars(symbol, 15).await {
        Ok(bars) => bars,
        Err(err) => {
            debug!(symbol = %symbol, error = %err, "weekly bars unavailable");
            Vec::new()
        }
    };
    let prepost_hourly = match provider
        .get_intraday_bars(symbol, Timeframe::H1, true)
        .await
    {
        Ok(bars) => bars,
        Err(err) => {
            debug!(symbol = %symbol, error = %err, "prepost bars unavailable");
            Vec::new()
        }
    };
    let fundamentals = match provider.get_fundamentals(symbol).await {
        Ok(f) => f,
        Err(err) => {
            debug!(symbol = %symbol, error = %err, "fundamentals unavailable");
            Default::default()
        }
    };
    let options = provider.get_options_chain(symbol).await.ok();
    let headlines = provider.get_headlines(symbol).await.unwrap_or_default();

    let snapshot = SymbolSnapshot {
        symbol: symbol.to_string(),
        daily,
        weekly,
        prepost_hourly,
        fundamentals,
        options,
        headlines,
    };

    let gap_pct = indicators::gap_percent(&snapshot.daily);
    let (gap_fill_prob, gap_fill_modifier) = gap_history.modifier(symbol, gap_pct);
    let reaction = earnings_history.reaction_stats(symbol);

    let record = features::extract(&snapshot, ctx, gap_fill_modifier, reaction.is_reliable_gapper);
    let ml_adjustment = model::adjustment(model_weights, &record);
    let (score, reasons) = scoring::score(&record, ml_adjustment);
    if score < MIN_KEEP_SCORE {
        return Ok(None);
    }

    // Enrichment beyond the scored features
    let (inst_levels, inst_score) = indicators::institutional_levels(&snapshot.daily);
    let (_, float_m) = features::float_score(&snapshot.fundamentals);
    let (_, days_to_earnings) = features::earnings_risk(&snapshot.fundamentals, ctx.today);
    let (_, short_float_pct, short_ratio) = features::short_squeeze_score(&snapshot.fundamentals);
    let (_, options_detail) = features::unusual_options(snapshot.options.as_ref());
    let (_, is_sector_leader) =
        features::sector_leader_score(symbol, ctx.rotation, &snapshot.daily, ctx.spy_daily);
    let news = sentiment::score_headlines(&snapshot.headlines, ctx.today);
    let last_bar = snapshot.daily.last().map(|b| (b.close, b.volume)).unwrap_or((0.0, 0.0));

    Ok(Some(ScoredPick {
        symbol: symbol.to_string(),
        score,
        grade: Grade::from_score(score),
        last_close: indicators::round2(last_bar.0),
        gap_pct: record.gap_pct,
        rvol: record.rvol,
        atr_pct: record.atr_pct,
        adx: record.adx,
        volume: last_bar.1,
        dollar_vol_m: (dollar_vol / 1_000_000.0 * 10.0).round() / 10.0,
        pm_change: record.pm_change,
        pm_vol_pct: record.pm_vol_pct,
        float_m,
        sector_etf: sector_etf_for(symbol).map(|s| s.to_string()),
        earnings_risky: record.earnings_risky,
        days_to_earnings,
        rs_score: record.rs_score,
        rr_ratio: record.rr_ratio,
        weekly_trend: record.weekly_trend,
        tech_score: record.tech_score,
        unusual_options: record.unusual_options,
        options_detail,
        gap_fill_prob,
        has_catalyst: record.has_catalyst,
        sentiment_score: record.sentiment_score,
        headlines: news.headlines,
        trade_levels: indicators::trade_levels(&snapshot.daily),
        institutional_levels: inst_levels,
        institutional_score: inst_score,
        short_float_pct,
        short_ratio,
        short_squeeze_score: record.short_squeeze_score,
        is_sector_leader,
        gap_atr_ratio: record.gap_atr_ratio,
        earnings_reaction: reaction,
        ml_adjustment,
        reasons,
        features: record,
    }))
}

/// Fetch daily bars, retrying transient failures with a fixed backoff.
async fn daily_with_retry<P: MarketDataProvider + ?Sized>(
    provider: &P,
    symbol: &str,
    lookback: usize,
    config: &ScanConfig,
) -> Result<Vec<Bar>, ProviderError> {
    let mut last_err = ProviderError::Internal("no attempts configured".to_string());
    for attempt in 1..=config.fetch_attempts.max(1) {
        match provider.get_daily_bars(symbol, lookback).await {
            Ok(bars) => return Ok(bars),
            Err(err) if err.is_transient() && attempt < config.fetch_attempts => {
                debug!(symbol = %symbol, attempt, error = %err, "transient fetch failure, retrying");
                sleep(Duration::from_millis(config.retry_backoff_ms)).await;
                last_err = err;
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err)
}

/// Fetch the rotation snapshot for every sector ETF. Failed ETFs are simply
/// absent from the map.
async fn fetch_sector_rotation<P: MarketDataProvider + ?Sized>(provider: &P) -> SectorRotation {
    let mut rotation = SectorRotation::default();
    for &(etf, _) in SECTOR_ETFS {
        match provider.get_daily_bars(etf, 30).await {
            Ok(bars) => {
                if let Some(perf) = SectorPerf::from_daily(&bars) {
                    rotation.insert(etf, perf);
                }
            }
            Err(err) => debug!(etf = %etf, error = %err, "sector ETF fetch failed"),
        }
        sleep(Duration::from_millis(SIDE_FETCH_DELAY_MS)).await;
    }
    rotation
}

/// Resolve every pending pick dated before today against the first close
/// observed after its scan date. Resolved gappers feed the gap-fill history;
/// resolved earnings plays feed the earnings-reaction history. Fetch failures
/// leave the pick pending for a later pass.
async fn resolve_outcomes<P: MarketDataProvider + ?Sized>(
    provider: &P,
    history: &mut ScanHistory,
    gap_history: &mut GapFillHistory,
    earnings_history: &mut EarningsHistory,
    today: NaiveDate,
) {
    let pending = history.pending_before(today);
    if pending.is_empty() {
        return;
    }
    info!(pending = pending.len(), "resolving pick outcomes");

    for (date, symbol) in pending {
        sleep(Duration::from_millis(SIDE_FETCH_DELAY_MS)).await;
        let bars = match provider.get_daily_bars(&symbol, 10).await {
            Ok(bars) => bars,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "outcome fetch failed, still pending");
                continue;
            }
        };
        let next = match bars.iter().find(|b| b.date() > date) {
            Some(b) => *b,
            None => continue,
        };

        let pick = history
            .entries()
            .iter()
            .find(|e| e.date == date)
            .and_then(|e| e.picks.iter().find(|p| p.symbol == symbol))
            .cloned();
        let pick = match pick {
            Some(p) => p,
            None => continue,
        };

        if history.resolve(date, &symbol, next.close).is_none() {
            continue;
        }
        let gap_pct = pick.features.gap_pct;
        if gap_pct > 0.5 && pick.last_close > 0.0 {
            let prior_close = pick.last_close / (1.0 + gap_pct / 100.0);
            let (filled, continued) =
                classify_gap_day(prior_close, pick.last_close, next.low, next.close);
            gap_history.observe(&symbol, filled, continued);
        }
        if pick.features.earnings_risky {
            let reaction = (next.close - pick.last_close) / pick.last_close * 100.0;
            earnings_history.record(&symbol, reaction);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::data::{Fundamentals, Headline, OptionsChain};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CannedProvider {
        daily: HashMap<String, Vec<Bar>>,
        fail_first: AtomicU32,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn get_daily_bars(
            &self,
            symbol: &str,
            _lookback: usize,
        ) -> Result<Vec<Bar>, ProviderError> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(ProviderError::Network("flaky".into()));
            }
            self.daily
                .get(symbol)
                .cloned()
                .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))
        }

        async fn get_intraday_bars(
            &self,
            _symbol: &str,
            _interval: Timeframe,
            _include_prepost: bool,
        ) -> Result<Vec<Bar>, ProviderError> {
            Ok(Vec::new())
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

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 21, 0, 0).unwrap().fixed_offset()
                    + chrono::Duration::days(i as i64),
                open: c,
                high: c * 1.02,
                low: c * 0.98,
                close: c,
                volume: 2_000_000.0,
            })
            .collect()
    }

    fn fast_config() -> ScanConfig {
        ScanConfig {
            symbol_delay_ms: 0,
            fetch_attempts: 2,
            retry_backoff_ms: 0,
            shortlist_size: 15,
        }
    }

    #[tokio::test]
    async fn test_daily_retry_recovers_from_transient_failure() {
        let mut daily = HashMap::new();
        daily.insert("AAPL".to_string(), bars(&[100.0, 101.0]));
        let provider = CannedProvider {
            daily,
            fail_first: AtomicU32::new(1),
        };
        let got = daily_with_retry(&provider, "AAPL", 60, &fast_config())
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
    }

    #[tokio::test]
    async fn test_daily_retry_gives_up_on_permanent_failure() {
        let provider = CannedProvider {
            daily: HashMap::new(),
            fail_first: AtomicU32::new(0),
        };
        let err = daily_with_retry(&provider, "ZZZZ", 60, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DataNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_outcome_resolution_updates_histories() {
        let scan_date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();

        let mut history = ScanHistory::default();
        let mut features = crate::features::FeatureRecord::default();
        features.gap_pct = 4.0;
        history.upsert(
            scan_date,
            vec![PickRecord {
                symbol: "AAPL".to_string(),
                score: 8.0,
                grade: Grade::A,
                last_close: 104.0,
                features,
                outcome: None,
                outcome_pct: None,
            }],
        );

        // Bars continue up after the scan date
        let mut daily = HashMap::new();
        daily.insert("AAPL".to_string(), bars(&[100.0, 104.0, 107.0]));
        let provider = CannedProvider {
            daily,
            fail_first: AtomicU32::new(0),
        };

        let mut gap_history = GapFillHistory::default();
        let mut earnings_history = EarningsHistory::default();
        resolve_outcomes(
            &provider,
            &mut history,
            &mut gap_history,
            &mut earnings_history,
            today,
        )
        .await;

        let pick = &history.entries()[0].picks[0];
        assert_eq!(pick.outcome, Some(crate::history::Outcome::Win));
        assert!(pick.outcome_pct.unwrap() > 1.0);
        // The up-gap that continued was observed
        assert_eq!(history.pending_before(today).len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_pick_pending() {
        let scan_date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();

        let mut history = ScanHistory::default();
        history.upsert(
            scan_date,
            vec![PickRecord {
                symbol: "GONE".to_string(),
                score: 7.0,
                grade: Grade::B,
                last_close: 50.0,
                features: Default::default(),
                outcome: None,
                outcome_pct: None,
            }],
        );

        let provider = CannedProvider {
            daily: HashMap::new(),
            fail_first: AtomicU32::new(0),
        };
        let mut gap_history = GapFillHistory::default();
        let mut earnings_history = EarningsHistory::default();
        resolve_outcomes(
            &provider,
            &mut history,
            &mut gap_history,
            &mut earnings_history,
            today,
        )
        .await;

        assert_eq!(history.pending_before(today).len(), 1);
    }

    #[tokio::test]
    async fn test_scan_symbol_prefilters_illiquid() {
        let mut daily = HashMap::new();
        // $2 close x 2M shares = $4M dollar volume, under the pre-filter
        daily.insert("PENNY".to_string(), bars(&[2.0; 30]));
        let provider = CannedProvider {
            daily,
            fail_first: AtomicU32::new(0),
        };
        let rotation = SectorRotation::default();
        let ctx = ScanContext {
            today: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            spy_daily: &[],
            spy_modifier: 0,
            rotation: &rotation,
        };
        let result = scan_symbol(
            &provider,
            &fast_config(),
            "PENNY",
            &ctx,
            &GapFillHistory::default(),
            &EarningsHistory::default(),
            None,
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_scan_symbol_scores_strong_setup() {
        // Uptrend with a gap and a volume spike on the last bar
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + i as f64 * 0.4).collect();
        let mut b = bars(&closes);
        let last_idx = b.len() - 1;
        b[last_idx].open = b[last_idx - 1].close * 1.04;
        b[last_idx].close = b[last_idx - 1].close * 1.05;
        b[last_idx].high = b[last_idx].close * 1.01;
        b[last_idx].low = b[last_idx].open * 0.99;
        b[last_idx].volume = 8_000_000.0;

        let mut daily = HashMap::new();
        daily.insert("MOMO".to_string(), b);
        let provider = CannedProvider {
            daily,
            fail_first: AtomicU32::new(0),
        };
        let rotation = SectorRotation::default();
        let ctx = ScanContext {
            today: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            spy_daily: &[],
            spy_modifier: 0,
            rotation: &rotation,
        };
        let result = scan_symbol(
            &provider,
            &fast_config(),
            "MOMO",
            &ctx,
            &GapFillHistory::default(),
            &EarningsHistory::default(),
            None,
        )
        .await
        .unwrap();
        let pick = result.expect("strong setup should pass the keep threshold");
        assert!(pick.score >= MIN_KEEP_SCORE);
        assert!(pick.gap_pct > 2.0);
        assert!(!pick.reasons.is_empty());
        assert!(pick.trade_levels.is_some());
    }
}
