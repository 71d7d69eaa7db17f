//! News preparation: quality filter, de-duplication, relevance and limiting.

use std::collections::{HashMap, HashSet};

use analysis_core::{AnalysisError, NewsItem};
use serde::{Deserialize, Serialize};

/// Configuration for [`NewsFilter`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsFilterConfig {
    /// Titles shorter than this (after trimming) are dropped
    pub min_title_chars: usize,
    /// Number of leading lower-cased title characters used as the duplicate key
    pub dedup_prefix_chars: usize,
    /// Maximum number of items kept, newest first
    pub news_limit: usize,
}

impl Default for NewsFilterConfig {
    fn default() -> Self {
        Self {
            min_title_chars: 10,
            dedup_prefix_chars: 60,
            news_limit: 100,
        }
    }
}

impl NewsFilterConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.dedup_prefix_chars == 0 {
            return Err(AnalysisError::InvalidParameter(
                "dedup_prefix_chars must be positive".to_string(),
            ));
        }
        if self.news_limit == 0 {
            return Err(AnalysisError::InvalidParameter(
                "news_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: usize,
}

/// Outcome of [`NewsFilter::prepare`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedNews {
    /// Relevant, de-duplicated items, newest first
    pub items: Vec<NewsItem>,
    /// Items that passed all filters before the limit was applied
    pub matched: usize,
    /// Per-source tally of `items`, descending by count then by name
    pub sources: Vec<SourceCount>,
}

pub struct NewsFilter {
    config: NewsFilterConfig,
}

impl NewsFilter {
    pub fn new(config: NewsFilterConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NewsFilterConfig {
        &self.config
    }

    /// Filter raw provider items down to the relevant set for `symbol`.
    ///
    /// An item is relevant when tagged with the symbol, or when its title
    /// contains the symbol or `company_term` (case-insensitive).
    pub fn prepare(&self, items: &[NewsItem], symbol: &str, company_term: Option<&str>) -> PreparedNews {
        let symbol_upper = symbol.to_uppercase();
        let term_upper = company_term
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty());

        let mut seen: HashSet<String> = HashSet::new();
        let mut kept: Vec<NewsItem> = Vec::new();

        for item in items {
            let title = item.title.trim();
            if title.chars().count() < self.config.min_title_chars {
                continue;
            }

            let title_upper = title.to_uppercase();
            let relevant = item.is_tagged(&symbol_upper)
                || title_upper.contains(&symbol_upper)
                || term_upper.as_ref().is_some_and(|t| title_upper.contains(t.as_str()));
            if !relevant {
                continue;
            }

            let key: String = title
                .to_lowercase()
                .chars()
                .take(self.config.dedup_prefix_chars)
                .collect();
            if !seen.insert(key) {
                continue;
            }

            kept.push(item.clone());
        }

        // Stable sort keeps provider order among equal timestamps
        kept.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        let matched = kept.len();
        kept.truncate(self.config.news_limit);

        tracing::debug!(
            "News for {}: {} raw, {} relevant, {} kept",
            symbol_upper,
            items.len(),
            matched,
            kept.len()
        );

        let sources = tally_sources(&kept);
        PreparedNews {
            items: kept,
            matched,
            sources,
        }
    }
}

fn tally_sources(items: &[NewsItem]) -> Vec<SourceCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item.source.as_str()).or_insert(0) += 1;
    }
    let mut sources: Vec<SourceCount> = counts
        .into_iter()
        .map(|(source, count)| SourceCount {
            source: source.to_string(),
            count,
        })
        .collect();
    sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn item(title: &str, source: &str, hours_ago: i64, symbols: &[&str]) -> NewsItem {
        let base: DateTime<Utc> = "2024-03-01T12:00:00Z".parse().unwrap();
        NewsItem {
            title: title.to_string(),
            source: source.to_string(),
            published_at: base - Duration::hours(hours_ago),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn filter() -> NewsFilter {
        NewsFilter::new(NewsFilterConfig::default()).unwrap()
    }

    #[test]
    fn test_short_titles_dropped() {
        let items = vec![item("TSLA up", "A", 1, &["TSLA"]), item("TSLA rallies on deliveries", "A", 2, &[])];
        let prepared = filter().prepare(&items, "TSLA", None);
        assert_eq!(prepared.items.len(), 1);
        assert_eq!(prepared.items[0].title, "TSLA rallies on deliveries");
    }

    #[test]
    fn test_duplicates_by_prefix() {
        let items = vec![
            item("Tesla deliveries beat estimates", "A", 1, &["TSLA"]),
            item("TESLA DELIVERIES BEAT ESTIMATES", "B", 2, &["TSLA"]),
        ];
        let prepared = filter().prepare(&items, "TSLA", None);
        assert_eq!(prepared.items.len(), 1);
        assert_eq!(prepared.items[0].source, "A");
    }

    #[test]
    fn test_relevance_by_tag_symbol_or_company() {
        let items = vec![
            item("Automaker results later today", "A", 1, &["TSLA"]),
            item("Analysts weigh in on TSLA margins", "A", 2, &[]),
            item("Tesla opens new factory in Berlin", "B", 3, &[]),
            item("Apple unveils a new phone lineup", "C", 4, &["AAPL"]),
        ];
        let prepared = filter().prepare(&items, "tsla", Some("Tesla"));
        assert_eq!(prepared.items.len(), 3);
        assert!(prepared.items.iter().all(|i| i.source != "C"));

        let without_term = filter().prepare(&items, "TSLA", None);
        assert_eq!(without_term.items.len(), 2);
    }

    #[test]
    fn test_newest_first_and_limit() {
        let config = NewsFilterConfig {
            news_limit: 2,
            ..NewsFilterConfig::default()
        };
        let items = vec![
            item("TSLA headline number one", "A", 30, &[]),
            item("TSLA headline number two", "A", 10, &[]),
            item("TSLA headline number three", "B", 20, &[]),
        ];
        let prepared = NewsFilter::new(config).unwrap().prepare(&items, "TSLA", None);
        assert_eq!(prepared.matched, 3);
        assert_eq!(prepared.items.len(), 2);
        assert_eq!(prepared.items[0].title, "TSLA headline number two");
        assert_eq!(prepared.items[1].title, "TSLA headline number three");
    }

    #[test]
    fn test_source_tally_order() {
        let items = vec![
            item("TSLA headline number one", "Zeta", 1, &[]),
            item("TSLA headline number two", "Alpha", 2, &[]),
            item("TSLA headline number three", "Zeta", 3, &[]),
            item("TSLA headline number four", "Beta", 4, &[]),
        ];
        let prepared = filter().prepare(&items, "TSLA", None);
        let order: Vec<(&str, usize)> = prepared.sources.iter().map(|s| (s.source.as_str(), s.count)).collect();
        assert_eq!(order, vec![("Zeta", 2), ("Alpha", 1), ("Beta", 1)]);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = NewsFilterConfig {
            news_limit: 0,
            ..NewsFilterConfig::default()
        };
        assert!(NewsFilter::new(config).is_err());
    }
}
