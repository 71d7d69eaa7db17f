use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{NewsItem, PolarityScorer, PriceBar, SentimentPoint};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod lexicon;
pub mod news;

pub use lexicon::LexiconScorer;
pub use news::{NewsFilter, NewsFilterConfig, PreparedNews, SourceCount};

/// Scores above this are positive, below its negation negative
const NEUTRAL_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score > NEUTRAL_BAND {
            SentimentLabel::Positive
        } else if score < -NEUTRAL_BAND {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Negative => "Negative",
        }
    }
}

/// One news item with its polarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNews {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub date: NaiveDate,
    pub score: f64,
}

/// Close-to-close move over the analysed period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub start_price: f64,
    pub end_price: f64,
    pub change_pct: f64,
}

impl PriceChange {
    /// `None` with fewer than two bars or a non-positive starting close.
    pub fn from_bars(bars: &[PriceBar]) -> Option<Self> {
        if bars.len() < 2 {
            return None;
        }
        let start_price = bars.first()?.close;
        let end_price = bars.last()?.close;
        if start_price <= 0.0 {
            return None;
        }
        Some(Self {
            start_price,
            end_price,
            change_pct: (end_price - start_price) / start_price * 100.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    /// Mean item score; absent when no item was scored
    pub average: Option<f64>,
    pub label: Option<SentimentLabel>,
    pub item_count: usize,
    pub sentiment_days: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub sources: Vec<SourceCount>,
    pub price_change: Option<PriceChange>,
}

/// Scores headlines and aggregates them into a daily series.
pub struct SentimentScorer {
    scorer: Arc<dyn PolarityScorer>,
}

impl SentimentScorer {
    pub fn new() -> Self {
        Self::with_scorer(Arc::new(LexiconScorer::new()))
    }

    pub fn with_scorer(scorer: Arc<dyn PolarityScorer>) -> Self {
        Self { scorer }
    }

    /// Title polarity; out-of-range or non-finite scorer output is clamped to [-1, 1] / 0.
    pub fn score_text(&self, text: &str) -> f64 {
        let raw = self.scorer.polarity(text);
        if raw.is_finite() {
            raw.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn score_item(&self, item: &NewsItem) -> ScoredNews {
        ScoredNews {
            title: item.title.clone(),
            source: item.source.clone(),
            published_at: item.published_at,
            date: item.date(),
            score: self.score_text(&item.title),
        }
    }

    pub fn score_items(&self, items: &[NewsItem]) -> Vec<ScoredNews> {
        items.iter().map(|item| self.score_item(item)).collect()
    }

    /// Mean score per UTC calendar date, ascending. Days without items are absent.
    pub fn daily_series(&self, scored: &[ScoredNews]) -> Vec<SentimentPoint> {
        let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for item in scored {
            let entry = by_date.entry(item.date).or_insert((0.0, 0));
            entry.0 += item.score;
            entry.1 += 1;
        }

        by_date
            .into_iter()
            .map(|(date, (sum, count))| SentimentPoint {
                date,
                value: (sum / count as f64).clamp(-1.0, 1.0),
                item_count: count,
            })
            .collect()
    }

    /// Score and aggregate in one pass.
    pub fn score_daily(&self, items: &[NewsItem]) -> Vec<SentimentPoint> {
        self.daily_series(&self.score_items(items))
    }

    pub fn summarize(
        &self,
        scored: &[ScoredNews],
        series: &[SentimentPoint],
        sources: Vec<SourceCount>,
        price_change: Option<PriceChange>,
    ) -> SentimentSummary {
        let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        let average = analysis_core::stats::mean(&scores);

        let mut positive_count = 0;
        let mut negative_count = 0;
        let mut neutral_count = 0;
        for score in &scores {
            match SentimentLabel::from_score(*score) {
                SentimentLabel::Positive => positive_count += 1,
                SentimentLabel::Negative => negative_count += 1,
                SentimentLabel::Neutral => neutral_count += 1,
            }
        }

        SentimentSummary {
            average,
            label: average.map(SentimentLabel::from_score),
            item_count: scored.len(),
            sentiment_days: series.len(),
            positive_count,
            negative_count,
            neutral_count,
            sources,
            price_change,
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(f64);

    impl PolarityScorer for FixedScorer {
        fn polarity(&self, _text: &str) -> f64 {
            self.0
        }
    }

    fn item(title: &str, published: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            source: "Wire".to_string(),
            published_at: published.parse().unwrap(),
            symbols: vec!["TSLA".to_string()],
        }
    }

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn test_empty_input_gives_empty_series() {
        let scorer = SentimentScorer::new();
        assert!(scorer.score_daily(&[]).is_empty());

        let summary = scorer.summarize(&[], &[], Vec::new(), None);
        assert_eq!(summary.average, None);
        assert_eq!(summary.label, None);
        assert_eq!(summary.item_count, 0);
    }

    #[test]
    fn test_daily_aggregation_uses_utc_date() {
        let scorer = SentimentScorer::new();
        let items = vec![
            item("Tesla shares surge on record deliveries", "2024-03-01T09:00:00Z"),
            item("Tesla faces recall probe", "2024-03-01T23:30:00Z"),
            item("Tesla schedules investor day", "2024-03-03T00:15:00Z"),
        ];
        let series = scorer.score_daily(&items);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(series[0].item_count, 2);
        assert_eq!(series[1].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(series[1].value, 0.0);

        let first = scorer.score_text(&items[0].title);
        let second = scorer.score_text(&items[1].title);
        assert!((series[0].value - (first + second) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_values_within_bounds_even_for_wild_scorer() {
        let scorer = SentimentScorer::with_scorer(Arc::new(FixedScorer(7.5)));
        let series = scorer.score_daily(&[item("Some headline here", "2024-03-01T10:00:00Z")]);
        assert_eq!(series[0].value, 1.0);

        let scorer = SentimentScorer::with_scorer(Arc::new(FixedScorer(f64::NAN)));
        assert_eq!(scorer.score_text("anything at all"), 0.0);
    }

    #[test]
    fn test_summary_counts_and_label() {
        let scorer = SentimentScorer::new();
        let items = vec![
            item("Tesla shares surge on strong demand", "2024-03-01T09:00:00Z"),
            item("Tesla upgraded to buy by analysts", "2024-03-02T09:00:00Z"),
            item("Tesla hit by lawsuit over autopilot", "2024-03-02T12:00:00Z"),
            item("Tesla schedules investor day", "2024-03-04T09:00:00Z"),
        ];
        let scored = scorer.score_items(&items);
        let series = scorer.daily_series(&scored);
        let change = PriceChange::from_bars(&[bar(1, 200.0), bar(4, 210.0)]);
        let summary = scorer.summarize(&scored, &series, Vec::new(), change);

        assert_eq!(summary.item_count, 4);
        assert_eq!(summary.sentiment_days, 3);
        assert_eq!(summary.positive_count, 2);
        assert_eq!(summary.negative_count, 1);
        assert_eq!(summary.neutral_count, 1);
        assert_eq!(summary.label, Some(SentimentLabel::Positive));
        assert!((summary.price_change.unwrap().change_pct - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(0.05), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(0.051), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(-0.051), SentimentLabel::Negative);
    }

    #[test]
    fn test_price_change_needs_two_bars() {
        assert_eq!(PriceChange::from_bars(&[bar(1, 100.0)]), None);
    }
}
