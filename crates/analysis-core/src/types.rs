use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// News headline as delivered by a news provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl NewsItem {
    /// Calendar date used for daily aggregation (UTC).
    pub fn date(&self) -> NaiveDate {
        self.published_at.date_naive()
    }

    pub fn is_tagged(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

/// Mean sentiment of all items published on one calendar date.
/// Dates without items never appear in a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub item_count: usize,
}

/// One row of the sentiment/return join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    /// Date of the return observation
    pub date: NaiveDate,
    /// Date of the sentiment observation; differs from `date` only when forward-filled
    pub sentiment_date: NaiveDate,
    pub sentiment_value: f64,
    pub return_value: f64,
}

impl AlignedPair {
    pub fn is_filled(&self) -> bool {
        self.sentiment_date != self.date
    }
}

/// Lookback window requested from the providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisPeriod {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl AnalysisPeriod {
    /// Calendar days covered by the period
    pub fn days(&self) -> i64 {
        match self {
            AnalysisPeriod::OneDay => 1,
            AnalysisPeriod::FiveDays => 7,
            AnalysisPeriod::OneMonth => 30,
            AnalysisPeriod::ThreeMonths => 90,
            AnalysisPeriod::SixMonths => 180,
            AnalysisPeriod::OneYear => 365,
            AnalysisPeriod::TwoYears => 730,
            AnalysisPeriod::FiveYears => 1825,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPeriod::OneDay => "1d",
            AnalysisPeriod::FiveDays => "5d",
            AnalysisPeriod::OneMonth => "1mo",
            AnalysisPeriod::ThreeMonths => "3mo",
            AnalysisPeriod::SixMonths => "6mo",
            AnalysisPeriod::OneYear => "1y",
            AnalysisPeriod::TwoYears => "2y",
            AnalysisPeriod::FiveYears => "5y",
        }
    }
}

impl fmt::Display for AnalysisPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisPeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(AnalysisPeriod::OneDay),
            "5d" => Ok(AnalysisPeriod::FiveDays),
            "1mo" => Ok(AnalysisPeriod::OneMonth),
            "3mo" => Ok(AnalysisPeriod::ThreeMonths),
            "6mo" => Ok(AnalysisPeriod::SixMonths),
            "1y" => Ok(AnalysisPeriod::OneYear),
            "2y" => Ok(AnalysisPeriod::TwoYears),
            "5y" => Ok(AnalysisPeriod::FiveYears),
            other => Err(AnalysisError::InvalidParameter(format!(
                "Unknown period '{}'",
                other
            ))),
        }
    }
}

/// Bar interval for price history requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Hour1,
    Day1,
    Week1,
    Month1,
}

impl Timeframe {
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::Hour1 => 60,
            Timeframe::Day1 => 1440,
            Timeframe::Week1 => 10080,
            Timeframe::Month1 => 43200,
        }
    }
}

/// Normalize a ticker the way every entry point expects it: trimmed, upper-case, non-empty.
pub fn normalize_symbol(symbol: &str) -> Result<String, AnalysisError> {
    let normalized = symbol.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(AnalysisError::InvalidParameter(
            "Symbol must not be empty".to_string(),
        ));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_round_trip_codes() {
        for code in ["1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y"] {
            let period: AnalysisPeriod = code.parse().unwrap();
            assert_eq!(period.as_str(), code);
        }
        assert_eq!(AnalysisPeriod::FiveDays.days(), 7);
        assert_eq!(AnalysisPeriod::FiveYears.days(), 1825);
    }

    #[test]
    fn test_period_serializes_as_code() {
        let json = serde_json::to_string(&AnalysisPeriod::ThreeMonths).unwrap();
        assert_eq!(json, "\"3mo\"");
        let parsed: AnalysisPeriod = serde_json::from_str("\"2y\"").unwrap();
        assert_eq!(parsed, AnalysisPeriod::TwoYears);
    }

    #[test]
    fn test_unknown_period_rejected() {
        let err = "10y".parse::<AnalysisPeriod>().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter(_)));
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("  tsla ").unwrap(), "TSLA");
        assert!(normalize_symbol("   ").is_err());
    }

    #[test]
    fn test_news_item_tags_case_insensitive() {
        let item = NewsItem {
            title: "Tesla deliveries beat estimates".to_string(),
            source: "Wire".to_string(),
            published_at: "2024-03-01T15:30:00Z".parse().unwrap(),
            symbols: vec!["tsla".to_string()],
        };
        assert!(item.is_tagged("TSLA"));
        assert!(!item.is_tagged("AAPL"));
        assert_eq!(item.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
