//! News sentiment scoring over headline text.
//!
//! Fixed keyword lexicons; the score is bullish hits minus bearish hits
//! summed across today's headlines. No news source configured means no
//! catalyst and a neutral score.

use chrono::NaiveDate;

use crate::data::Headline;

/// Bullish headline keywords.
const BULLISH_KEYWORDS: &[&str] = &[
    "beat", "beats", "exceeded", "raised", "upgrade", "upgraded", "buy",
    "outperform", "partnership", "deal", "contract", "launch", "record",
    "growth", "positive", "strong", "surge", "rally", "breakthrough",
    "fda approved", "approval", "wins", "awarded", "expansion",
];

/// Bearish headline keywords.
const BEARISH_KEYWORDS: &[&str] = &[
    "miss", "missed", "below", "lowered", "downgrade", "downgraded", "sell",
    "underperform", "lawsuit", "investigation", "probe", "recall", "cut",
    "loss", "weak", "decline", "warning", "guidance cut", "disappoints",
    "layoffs", "restructuring", "debt", "bankruptcy", "fraud",
];

/// Maximum headline titles carried into the scan result.
const MAX_HEADLINES: usize = 3;

/// Sentiment over today's headlines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sentiment {
    /// True when at least one headline was published today
    pub has_news: bool,
    /// Bullish hits minus bearish hits across today's headlines
    pub score: i32,
    /// Up to three of today's headline titles, for the result payload
    pub headlines: Vec<String>,
}

/// Score headlines published on `today`. Empty input yields the neutral
/// default (no catalyst, score 0).
pub fn score_headlines(headlines: &[Headline], today: NaiveDate) -> Sentiment {
    let todays: Vec<&Headline> = headlines
        .iter()
        .filter(|h| h.published_at.date_naive() == today)
        .collect();
    if todays.is_empty() {
        return Sentiment::default();
    }

    let mut score = 0i32;
    let mut titles = Vec::new();
    for h in &todays {
        let text = h.matchable_text();
        let bull = BULLISH_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count() as i32;
        let bear = BEARISH_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count() as i32;
        score += bull - bear;
        if titles.len() < MAX_HEADLINES {
            titles.push(h.title.clone());
        }
    }

    Sentiment {
        has_news: true,
        score,
        headlines: titles,
    }
}
