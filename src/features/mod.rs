//! Feature extraction: raw bars and fundamentals in, one fixed-shape
//! [`FeatureRecord`] out.
//!
//! The extractor is a pure function of its inputs; all network access happens
//! in the scan loop before this module is called, so every computation can be
//! tested with canned data. Each feature independently degrades to a
//! documented neutral default when its inputs are missing.

pub mod indicators;
pub mod sentiment;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{sector_etf_for, Bar, Fundamentals, OptionsChain};
use crate::scan::market::{Momentum, SectorRotation};

pub use indicators::{InstitutionalLevels, TradeLevels};
pub use sentiment::Sentiment;

// ============================================================================
// Feature Record
// ============================================================================

/// Fixed-shape feature record for one symbol in one scan.
///
/// Immutable once produced; embedded verbatim into the scan history so the
/// adjustment model can train on exactly what was scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Open vs prior close, percent
    pub gap_pct: f64,
    /// Last volume over trailing 5-bar mean
    pub rvol: f64,
    /// Trailing 7-bar mean range as percent of close
    pub atr_pct: f64,
    /// Clean technical-level score, 0..=3
    pub tech_score: i32,
    /// 14-period ADX
    pub adx: f64,
    /// Weekly trend direction, -1/0/1
    pub weekly_trend: i32,
    /// Shares-float bucket, -1..=2
    pub float_score: i32,
    /// Earnings within the next 3 days
    pub earnings_risky: bool,
    /// Relative strength vs SPY, -2..=2
    pub rs_score: i32,
    /// Pre-market percent change vs prior close
    pub pm_change: f64,
    /// Pre-market volume as percent of average daily volume
    pub pm_vol_pct: f64,
    /// Upside/downside ratio over the 10-day window; None when downside <= 0
    pub rr_ratio: Option<f64>,
    /// Last close x last volume
    pub dollar_vol: f64,
    /// Gap continuation/fill modifier from gap history, -1/0/1
    pub gap_fill_modifier: i32,
    /// Options volume/OI elevated with calls dominating
    pub unusual_options: bool,
    /// Count of institutional levels held (VWAP + 20/50/200 MA), 0..=4
    pub institutional_score: i32,
    /// Short-interest squeeze score, 0..=2 plus short-ratio bonus (max 3)
    pub short_squeeze_score: i32,
    /// Sector-leader score, 0..=2, only in a hot sector
    pub sector_leader_score: i32,
    /// Bullish minus bearish headline keyword hits
    pub sentiment_score: i32,
    /// Gap normalized to ATR percent
    pub gap_atr_ratio: f64,
    /// Historically gaps big and bullish around earnings
    pub earnings_is_reliable_gapper: bool,
    /// At least one headline published today
    pub has_catalyst: bool,
    /// Last daily close
    pub last_close: f64,
    /// Broad-market condition modifier, roughly -2..=2
    pub spy_modifier: i32,
    /// Sector rotation score, -1/0/1
    pub sector_score: i32,
}

impl FeatureRecord {
    /// Numeric value of a named feature, for the model feature matrix.
    /// Unknown keys and absent optionals read as 0.0.
    pub fn value(&self, key: &str) -> f64 {
        match key {
            "gap_pct" => self.gap_pct,
            "rvol" => self.rvol,
            "atr_pct" => self.atr_pct,
            "tech_score" => self.tech_score as f64,
            "adx" => self.adx,
            "weekly_trend" => self.weekly_trend as f64,
            "float_score" => self.float_score as f64,
            "rs_score" => self.rs_score as f64,
            "pm_change" => self.pm_change,
            "pm_vol_pct" => self.pm_vol_pct,
            "rr_ratio" => self.rr_ratio.unwrap_or(0.0),
            "dollar_vol" => self.dollar_vol,
            "gap_fill_modifier" => self.gap_fill_modifier as f64,
            "institutional_score" => self.institutional_score as f64,
            "short_squeeze_score" => self.short_squeeze_score as f64,
            "sector_leader_score" => self.sector_leader_score as f64,
            "sentiment_score" => self.sentiment_score as f64,
            "gap_atr_ratio" => self.gap_atr_ratio,
            "last_close" => self.last_close,
            "spy_modifier" => self.spy_modifier as f64,
            "sector_score" => self.sector_score as f64,
            _ => 0.0,
        }
    }
}

// ============================================================================
// Extraction Inputs
// ============================================================================

/// Everything fetched for one symbol before extraction.
#[derive(Debug, Clone, Default)]
pub struct SymbolSnapshot {
    pub symbol: String,
    /// Daily bars, oldest first (60 preferred, degrades below)
    pub daily: Vec<Bar>,
    /// Weekly bars, oldest first
    pub weekly: Vec<Bar>,
    /// Hourly bars including pre/post-market, last two sessions
    pub prepost_hourly: Vec<Bar>,
    pub fundamentals: Fundamentals,
    /// Nearest-expiry options chain; None when the source is unconfigured
    pub options: Option<OptionsChain>,
    /// Recent headlines; empty when the news source is unconfigured
    pub headlines: Vec<crate::data::Headline>,
}

/// Run-wide context shared by every symbol in a scan.
#[derive(Debug, Clone)]
pub struct ScanContext<'a> {
    pub today: NaiveDate,
    /// SPY daily bars for relative strength
    pub spy_daily: &'a [Bar],
    /// Broad-market condition modifier
    pub spy_modifier: i32,
    /// Sector rotation snapshot for the run
    pub rotation: &'a SectorRotation,
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract the full feature record for one symbol.
///
/// `gap_fill_modifier` and `reliable_gapper` come from the persistent
/// histories the caller owns; everything else derives from the snapshot.
pub fn extract(
    snapshot: &SymbolSnapshot,
    ctx: &ScanContext<'_>,
    gap_fill_modifier: i32,
    reliable_gapper: bool,
) -> FeatureRecord {
    let daily = &snapshot.daily;
    let last_close = daily.last().map(|b| b.close).unwrap_or(0.0);

    let (_, institutional_score) = indicators::institutional_levels(daily);
    let (squeeze, _, _) = short_squeeze_score(&snapshot.fundamentals);
    let (float_sc, _) = float_score(&snapshot.fundamentals);
    let (risky, _) = earnings_risk(&snapshot.fundamentals, ctx.today);
    let (sector_sc, _) = sector_score(&snapshot.symbol, ctx.rotation);
    let (leader_sc, _) = sector_leader_score(&snapshot.symbol, ctx.rotation, daily, ctx.spy_daily);
    let (unusual, _) = unusual_options(snapshot.options.as_ref());
    let news = sentiment::score_headlines(&snapshot.headlines, ctx.today);
    let (_, pm_vol_pct) = indicators::premarket_volume(
        &snapshot.prepost_hourly,
        ctx.today,
        snapshot.fundamentals.average_volume,
    );

    FeatureRecord {
        gap_pct: indicators::gap_percent(daily),
        rvol: indicators::relative_volume(daily),
        atr_pct: indicators::atr_percent(daily),
        tech_score: indicators::technical_score(daily),
        adx: indicators::adx(daily),
        weekly_trend: indicators::weekly_trend(&snapshot.weekly),
        float_score: float_sc,
        earnings_risky: risky,
        rs_score: indicators::relative_strength(daily, ctx.spy_daily),
        pm_change: indicators::premarket_change(&snapshot.prepost_hourly, ctx.today),
        pm_vol_pct,
        rr_ratio: indicators::risk_reward(daily),
        dollar_vol: indicators::dollar_volume(daily),
        gap_fill_modifier,
        unusual_options: unusual,
        institutional_score,
        short_squeeze_score: squeeze,
        sector_leader_score: leader_sc,
        sentiment_score: news.score,
        gap_atr_ratio: indicators::gap_atr_ratio(daily),
        earnings_is_reliable_gapper: reliable_gapper,
        has_catalyst: news.has_news,
        last_close,
        spy_modifier: ctx.spy_modifier,
        sector_score: sector_sc,
    }
}

// ============================================================================
// Fundamentals-Derived Features
// ============================================================================

/// Shares-float bucket and float in millions. Unknown float is neutral.
pub fn float_score(fundamentals: &Fundamentals) -> (i32, Option<f64>) {
    let shares = match fundamentals.float_shares {
        Some(s) => s,
        None => return (0, None),
    };
    let float_m = shares / 1_000_000.0;
    let score = if float_m < 20.0 {
        2
    } else if float_m < 50.0 {
        1
    } else if float_m > 500.0 {
        -1
    } else {
        0
    };
    (score, Some((float_m * 10.0).round() / 10.0))
}

/// Short-interest squeeze score plus the underlying short float percent and
/// short ratio. Vendors report short float either as a fraction or a percent;
/// values below 1 are treated as fractions and rescaled.
pub fn short_squeeze_score(fundamentals: &Fundamentals) -> (i32, f64, f64) {
    let mut short_float = fundamentals.short_percent_of_float.unwrap_or(0.0);
    if short_float > 0.0 && short_float < 1.0 {
        short_float *= 100.0;
    }
    let short_ratio = fundamentals.short_ratio.unwrap_or(0.0);

    let mut score = 0;
    if short_float > 20.0 {
        score += 2;
    } else if short_float > 10.0 {
        score += 1;
    }
    if short_ratio > 5.0 {
        score += 1;
    }
    (
        score,
        (short_float * 10.0).round() / 10.0,
        (short_ratio * 10.0).round() / 10.0,
    )
}

/// Earnings risk: true when a known earnings date is 0..=3 days out.
/// Also returns the signed day count when a date is known.
pub fn earnings_risk(fundamentals: &Fundamentals, today: NaiveDate) -> (bool, Option<i64>) {
    match fundamentals.next_earnings_date {
        Some(date) => {
            let days = (date - today).num_days();
            ((0..=3).contains(&days), Some(days))
        }
        None => (false, None),
    }
}

/// Aggregate options detail carried into the scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsDetail {
    pub put_call_ratio: f64,
    pub vol_oi_ratio: f64,
    pub call_volume: f64,
    pub put_volume: f64,
}

/// Unusual options activity: chain volume over open interest above 0.5 with
/// call volume at least 1.5x put volume. No chain means no signal.
pub fn unusual_options(chain: Option<&OptionsChain>) -> (bool, Option<OptionsDetail>) {
    let chain = match chain {
        Some(c) => c,
        None => return (false, None),
    };
    let total_oi = chain.calls.open_interest + chain.puts.open_interest;
    if chain.calls.open_interest == 0.0 || total_oi == 0.0 {
        return (false, None);
    }
    let cv = chain.calls.volume;
    let pv = chain.puts.volume;
    let voi = (cv + pv) / total_oi;
    let unusual = voi > 0.5 && cv > pv * 1.5;
    let detail = OptionsDetail {
        put_call_ratio: if cv > 0.0 { indicators::round2(pv / cv) } else { 0.0 },
        vol_oi_ratio: indicators::round2(voi),
        call_volume: cv,
        put_volume: pv,
    };
    (unusual, Some(detail))
}

// ============================================================================
// Sector Features
// ============================================================================

/// Sector rotation score: +1 in a hot sector, -1 in a cold one, 0 otherwise.
/// Returns the sector ETF symbol when the symbol has one.
pub fn sector_score(symbol: &str, rotation: &SectorRotation) -> (i32, Option<&'static str>) {
    let etf = match sector_etf_for(symbol) {
        Some(e) => e,
        None => return (0, None),
    };
    let score = match rotation.momentum(etf) {
        Momentum::Hot => 1,
        Momentum::Cold => -1,
        Momentum::Neutral => 0,
    };
    (score, Some(etf))
}

/// Sector-leader score: only meaningful inside a hot sector, comparing the
/// symbol's 5-day return to SPY's. Returns (score, is_clear_leader).
pub fn sector_leader_score(
    symbol: &str,
    rotation: &SectorRotation,
    daily: &[Bar],
    spy: &[Bar],
) -> (i32, bool) {
    let etf = match sector_etf_for(symbol) {
        Some(e) => e,
        None => return (0, false),
    };
    if rotation.momentum(etf) != Momentum::Hot {
        return (0, false);
    }
    if daily.len() < 5 || spy.len() < 5 {
        return (0, false);
    }
    let ret5 = |s: &[Bar]| {
        let base = s[s.len() - 5].close;
        if base == 0.0 {
            return 0.0;
        }
        (s[s.len() - 1].close - base) / base * 100.0
    };
    let sym_5d = ret5(daily);
    let spy_5d = ret5(spy);
    if sym_5d > spy_5d * 1.5 {
        (2, true)
    } else if sym_5d > spy_5d {
        (1, false)
    } else {
        (0, false)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionSide;
    use crate::scan::market::SectorPerf;

    fn fundamentals(float_m: f64, short_pct: f64, short_ratio: f64) -> Fundamentals {
        Fundamentals {
            float_shares: Some(float_m * 1_000_000.0),
            average_volume: Some(1_000_000.0),
            short_percent_of_float: Some(short_pct),
            short_ratio: Some(short_ratio),
            next_earnings_date: None,
        }
    }

    #[test]
    fn test_float_score_buckets() {
        assert_eq!(float_score(&fundamentals(10.0, 0.0, 0.0)).0, 2);
        assert_eq!(float_score(&fundamentals(30.0, 0.0, 0.0)).0, 1);
        assert_eq!(float_score(&fundamentals(100.0, 0.0, 0.0)).0, 0);
        assert_eq!(float_score(&fundamentals(600.0, 0.0, 0.0)).0, -1);
        assert_eq!(float_score(&Fundamentals::default()), (0, None));
    }

    #[test]
    fn test_short_squeeze_score() {
        assert_eq!(short_squeeze_score(&fundamentals(50.0, 25.0, 0.0)).0, 2);
        assert_eq!(short_squeeze_score(&fundamentals(50.0, 15.0, 0.0)).0, 1);
        assert_eq!(short_squeeze_score(&fundamentals(50.0, 25.0, 6.0)).0, 3);
        assert_eq!(short_squeeze_score(&fundamentals(50.0, 2.0, 1.0)).0, 0);
    }

    #[test]
    fn test_short_float_fraction_rescaled() {
        // Vendor reporting 0.22 means 22%
        let (score, pct, _) = short_squeeze_score(&fundamentals(50.0, 0.22, 0.0));
        assert_eq!(score, 2);
        assert!((pct - 22.0).abs() < 0.01);
    }

    #[test]
    fn test_earnings_risk_window() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut f = Fundamentals::default();

        f.next_earnings_date = NaiveDate::from_ymd_opt(2025, 3, 12);
        assert_eq!(earnings_risk(&f, today), (true, Some(2)));

        f.next_earnings_date = NaiveDate::from_ymd_opt(2025, 3, 10);
        assert_eq!(earnings_risk(&f, today), (true, Some(0)));

        f.next_earnings_date = NaiveDate::from_ymd_opt(2025, 3, 20);
        assert_eq!(earnings_risk(&f, today), (false, Some(10)));

        // Yesterday's earnings are no longer a risk
        f.next_earnings_date = NaiveDate::from_ymd_opt(2025, 3, 9);
        assert_eq!(earnings_risk(&f, today), (false, Some(-1)));

        assert_eq!(earnings_risk(&Fundamentals::default(), today), (false, None));
    }

    #[test]
    fn test_unusual_options() {
        let chain = OptionsChain {
            calls: OptionSide { volume: 9000.0, open_interest: 10000.0 },
            puts: OptionSide { volume: 3000.0, open_interest: 8000.0 },
        };
        // voi = 12000/18000 = 0.67 > 0.5, calls 9000 > 1.5*3000
        let (unusual, detail) = unusual_options(Some(&chain));
        assert!(unusual);
        let d = detail.unwrap();
        assert!((d.vol_oi_ratio - 0.67).abs() < 0.01);
        assert!((d.put_call_ratio - 0.33).abs() < 0.01);

        assert_eq!(unusual_options(None), (false, None));
    }

    #[test]
    fn test_unusual_options_put_heavy() {
        let chain = OptionsChain {
            calls: OptionSide { volume: 3000.0, open_interest: 5000.0 },
            puts: OptionSide { volume: 9000.0, open_interest: 5000.0 },
        };
        let (unusual, detail) = unusual_options(Some(&chain));
        assert!(!unusual);
        assert!(detail.is_some());
    }

    #[test]
    fn test_sector_scores() {
        let mut rotation = SectorRotation::default();
        rotation.insert("XLK", SectorPerf { perf_5d: 3.0, perf_20d: 5.0, momentum: Momentum::Hot });

        assert_eq!(sector_score("NVDA", &rotation), (1, Some("XLK")));
        assert_eq!(sector_score("ZZZZ", &rotation), (0, None));

        rotation.insert("XLK", SectorPerf { perf_5d: -3.0, perf_20d: -5.0, momentum: Momentum::Cold });
        assert_eq!(sector_score("NVDA", &rotation).0, -1);
    }

    #[test]
    fn test_feature_record_value_lookup() {
        let record = FeatureRecord {
            gap_pct: 6.6,
            rvol: 2.5,
            rr_ratio: None,
            tech_score: 3,
            ..Default::default()
        };
        assert!((record.value("gap_pct") - 6.6).abs() < f64::EPSILON);
        assert!((record.value("tech_score") - 3.0).abs() < f64::EPSILON);
        assert_eq!(record.value("rr_ratio"), 0.0);
        assert_eq!(record.value("nonexistent"), 0.0);
    }
}
