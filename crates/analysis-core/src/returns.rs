use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, PriceBar};

/// Log return between two consecutive closes, dated at the later bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub log_return: f64,
}

/// Strictly date-ordered log-return series derived from a price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Build the series from bars; `len == bars.len() - 1`.
    ///
    /// Bars must be strictly ascending by date and every close must be positive
    /// and finite, otherwise the history is rejected as invalid.
    pub fn from_bars(bars: &[PriceBar]) -> Result<Self, AnalysisError> {
        validate_bars(bars)?;
        let points = bars
            .windows(2)
            .map(|w| ReturnPoint {
                date: w[1].date,
                log_return: (w[1].close / w[0].close).ln(),
            })
            .collect();
        Ok(Self { points })
    }

    /// Build directly from points, enforcing the ordering invariant.
    pub fn from_points(points: Vec<ReturnPoint>) -> Result<Self, AnalysisError> {
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(AnalysisError::InvalidData(format!(
                "Return dates must be strictly increasing ({} then {})",
                w[0].date, w[1].date
            )));
        }
        if points.iter().any(|p| !p.log_return.is_finite()) {
            return Err(AnalysisError::InvalidData(
                "Return series contains non-finite values".to_string(),
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.log_return).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

fn validate_bars(bars: &[PriceBar]) -> Result<(), AnalysisError> {
    if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(AnalysisError::InvalidData(format!(
            "Price bars must be strictly ordered with unique dates ({} then {})",
            w[0].date, w[1].date
        )));
    }
    if let Some(bar) = bars.iter().find(|b| !(b.close.is_finite() && b.close > 0.0)) {
        return Err(AnalysisError::InvalidData(format!(
            "Non-positive close {} on {}",
            bar.close, bar.date
        )));
    }
    Ok(())
}
