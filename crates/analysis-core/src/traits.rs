use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AnalysisError, AnalysisPeriod, NewsItem, PriceBar, Timeframe};

/// Minimum number of bars a price provider must return for a request to succeed.
pub const MIN_PRICE_BARS: usize = 30;

/// Source of ordered price histories.
///
/// Implementations fail with [`AnalysisError::DataUnavailable`] when fewer than
/// [`MIN_PRICE_BARS`] bars exist for the request.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn price_history(
        &self,
        symbol: &str,
        period: AnalysisPeriod,
        interval: Timeframe,
    ) -> Result<Vec<PriceBar>, AnalysisError>;
}

/// Source of news items for a symbol; an empty list is a valid answer.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn news(&self, symbol: &str, period: AnalysisPeriod) -> Result<Vec<NewsItem>, AnalysisError>;
}

/// Exchange calendar used to date forecast steps
pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> bool;
}

/// Text polarity scoring capability.
///
/// Scores must lie in [-1, 1]; text the scorer cannot interpret scores 0.
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}
