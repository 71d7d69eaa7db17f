use std::collections::BTreeMap;
use std::ops::Bound;

use analysis_core::{AlignedPair, AnalysisError, ReturnSeries, SentimentPoint};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Upper bound on the forward-fill gap in calendar days
pub const MAX_FORWARD_FILL_DAYS: u32 = 7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Calendar days a sentiment value may be carried forward to a later return; 0 disables filling
    pub max_fill_days: u32,
}

impl AlignmentConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_fill_days > MAX_FORWARD_FILL_DAYS {
            return Err(AnalysisError::InvalidParameter(format!(
                "max_fill_days must be at most {}, got {}",
                MAX_FORWARD_FILL_DAYS, self.max_fill_days
            )));
        }
        Ok(())
    }
}

/// Joins a daily sentiment series with a return series on date.
pub struct TimeSeriesAligner {
    config: AlignmentConfig,
}

impl TimeSeriesAligner {
    pub fn new(config: AlignmentConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Inner join on date, ascending.
    ///
    /// With forward fill enabled, a sentiment point dated between two return
    /// dates is carried to the later one when that return has no sentiment of
    /// its own and lies within `max_fill_days`. The latest such point wins.
    pub fn align(
        &self,
        sentiment: &[SentimentPoint],
        returns: &ReturnSeries,
    ) -> Result<Vec<AlignedPair>, AnalysisError> {
        if let Some(w) = sentiment.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(AnalysisError::InvalidData(format!(
                "Sentiment dates must be strictly increasing ({} then {})",
                w[0].date, w[1].date
            )));
        }

        let by_date: BTreeMap<NaiveDate, f64> = sentiment.iter().map(|p| (p.date, p.value)).collect();
        let fill = Duration::days(i64::from(self.config.max_fill_days));

        let mut pairs = Vec::with_capacity(returns.len().min(sentiment.len()));
        let mut previous_return: Option<NaiveDate> = None;

        for point in returns.points() {
            if let Some(&value) = by_date.get(&point.date) {
                pairs.push(AlignedPair {
                    date: point.date,
                    sentiment_date: point.date,
                    sentiment_value: value,
                    return_value: point.log_return,
                });
            } else if self.config.max_fill_days > 0 {
                let window_start = point.date - fill;
                let lower = match previous_return {
                    Some(prev) if prev >= window_start => Bound::Excluded(prev),
                    _ => Bound::Included(window_start),
                };
                if let Some((&date, &value)) = by_date.range((lower, Bound::Excluded(point.date))).next_back() {
                    pairs.push(AlignedPair {
                        date: point.date,
                        sentiment_date: date,
                        sentiment_value: value,
                        return_value: point.log_return,
                    });
                }
            }
            previous_return = Some(point.date);
        }

        Ok(pairs)
    }
}
