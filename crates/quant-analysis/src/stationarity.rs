//! Augmented Dickey-Fuller unit-root test (constant, no trend).

use analysis_core::AnalysisError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::arima::FitFailure;
use crate::regression::{least_squares, OlsFit};

pub const MIN_OBSERVATIONS: usize = 12;
const SIGNIFICANCE: f64 = 0.05;

// MacKinnon (1994) response surface, constant-only case
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) critical value surfaces, constant-only case
const CV_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CV_5PCT: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.04];
const CV_10PCT: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityReport {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    /// Observations in the final regression
    pub n_obs: usize,
    pub critical_values: CriticalValues,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StationarityTester;

impl StationarityTester {
    pub fn new() -> Self {
        Self
    }

    /// Run the test with the lag order chosen by AIC.
    pub fn test(&self, series: &[f64]) -> Result<StationarityReport, AnalysisError> {
        let n = series.len();
        if n < MIN_OBSERVATIONS {
            return Err(AnalysisError::InsufficientData(format!(
                "ADF test needs at least {} observations, got {}",
                MIN_OBSERVATIONS, n
            )));
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidData(
                "ADF input contains non-finite values".to_string(),
            ));
        }

        let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
        let max_lag = schwert.min((n / 2).saturating_sub(3));
        let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

        // Lag selection on the sample shared by every candidate lag
        let mut best: Option<(usize, f64)> = None;
        for lag in 0..=max_lag {
            let Ok(fit) = adf_regression(series, &diffs, lag, max_lag) else {
                continue;
            };
            let nobs = fit.residuals.len() as f64;
            let k = (lag + 2) as f64;
            let sigma2 = (fit.sse / nobs).max(f64::MIN_POSITIVE);
            let aic = nobs * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0) + 2.0 * k;
            if best.map_or(true, |(_, b)| aic < b) {
                best = Some((lag, aic));
            }
        }
        let (used_lag, _) = best.ok_or_else(|| {
            AnalysisError::CalculationError("ADF regression is singular for every lag".to_string())
        })?;

        let fit = adf_regression(series, &diffs, used_lag, used_lag)
            .map_err(|e| AnalysisError::CalculationError(format!("ADF regression: {}", e)))?;
        let se = fit
            .standard_error(1)
            .filter(|se| *se > 0.0)
            .ok_or_else(|| AnalysisError::CalculationError("ADF standard error is zero".to_string()))?;
        let statistic = fit.coefficients[1] / se;
        let n_obs = fit.residuals.len();
        let p_value = mackinnon_p_value(statistic)?;

        Ok(StationarityReport {
            statistic,
            p_value,
            used_lag,
            n_obs,
            critical_values: critical_values(n_obs),
            is_stationary: p_value < SIGNIFICANCE,
        })
    }
}

/// dy_t = a + b y_{t-1} + sum_{i=1..lag} g_i dy_{t-i}, for t with t - 1 - skip >= 0.
///
/// `skip` fixes the first usable row so different lags share one sample.
fn adf_regression(series: &[f64], diffs: &[f64], lag: usize, skip: usize) -> Result<OlsFit, FitFailure> {
    // diffs[j] = series[j + 1] - series[j]; row j uses diffs[j - i] for i <= lag
    let start = skip.max(lag);
    let rows = diffs.len().saturating_sub(start);
    let design = DMatrix::from_fn(rows, lag + 2, |r, c| {
        let j = start + r;
        match c {
            0 => 1.0,
            1 => series[j],
            _ => diffs[j - (c - 1)],
        }
    });
    let target = DVector::from_iterator(rows, diffs[start..].iter().copied());
    least_squares(&design, &target)
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate asymptotic p-value of an ADF statistic.
pub fn mackinnon_p_value(statistic: f64) -> Result<f64, AnalysisError> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AnalysisError::CalculationError(format!("Normal distribution: {}", e)))?;
    Ok(normal.cdf(z))
}

pub fn critical_values(n_obs: usize) -> CriticalValues {
    let surface = |b: &[f64; 4]| {
        let inv = 1.0 / n_obs as f64;
        b[0] + b[1] * inv + b[2] * inv.powi(2) + b[3] * inv.powi(3)
    };
    CriticalValues {
        one_percent: surface(&CV_1PCT),
        five_percent: surface(&CV_5PCT),
        ten_percent: surface(&CV_10PCT),
    }
}
