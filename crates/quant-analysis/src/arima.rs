//! ARIMA(p, d, q) with constant, fitted by conditional sum of squares.

use std::fmt;

use analysis_core::AnalysisError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::regression::least_squares;

/// Hard upper bound for each of p, d and q
pub const MAX_ORDER: usize = 5;

/// Usable observations required beyond the parameter count
const EXTRA_OBSERVATIONS: usize = 10;
const DEGENERATE_VARIANCE: f64 = 1e-14;
const SIGMA2_FLOOR: f64 = 1e-12;

const LM_MAX_ITERATIONS: usize = 100;
const LM_INITIAL_LAMBDA: f64 = 1e-3;
const LM_MAX_LAMBDA: f64 = 1e10;
const LM_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Result<Self, AnalysisError> {
        if p > MAX_ORDER || d > MAX_ORDER || q > MAX_ORDER {
            return Err(AnalysisError::InvalidParameter(format!(
                "ARIMA order ({},{},{}) exceeds the limit of {}",
                p, d, q, MAX_ORDER
            )));
        }
        Ok(Self { p, d, q })
    }

    /// Estimated parameters: constant, AR, MA and the innovation variance
    pub fn parameter_count(&self) -> usize {
        self.p + self.q + 2
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// Why a candidate order could not be fitted
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitFailure {
    #[error("design matrix is singular")]
    Singular,

    #[error("optimisation did not converge: {0}")]
    NonConvergence(String),

    #[error("series has near-zero variance")]
    DegenerateSeries,

    #[error("AR polynomial is not stationary")]
    NonStationary,

    #[error("MA polynomial is not invertible")]
    NonInvertible,

    #[error("needs {needed} usable observations, has {available}")]
    InsufficientObservations { needed: usize, available: usize },
}

/// A fitted model, ready to forecast the series it was fitted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedArima {
    pub order: ArimaOrder,
    pub constant: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    /// Observations entering the conditional likelihood
    pub n_obs: usize,
    /// Innovations on the differenced series (zero over the conditioning prefix)
    residuals: Vec<f64>,
    /// Undifferenced input series
    history: Vec<f64>,
}

/// Point forecasts and psi weights of the undifferenced series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    pub mean: Vec<f64>,
    /// psi_0 = 1, psi_1, ..., psi_{h-1}
    pub psi: Vec<f64>,
}

/// d-th order difference; shorter by `d` elements.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Stationarity of 1 - a_1 z - ... - a_k z^k via the Levinson step-down recursion:
/// every partial autocorrelation must lie strictly inside the unit interval.
pub fn is_stationary(coefficients: &[f64]) -> bool {
    let mut a = coefficients.to_vec();
    while let Some(&kappa) = a.last() {
        if !kappa.is_finite() || kappa.abs() >= 1.0 {
            return false;
        }
        let k = a.len();
        let denom = 1.0 - kappa * kappa;
        let reduced: Vec<f64> = (0..k - 1)
            .map(|i| (a[i] + kappa * a[k - 2 - i]) / denom)
            .collect();
        a = reduced;
    }
    true
}

/// Invertibility of 1 + t_1 z + ... + t_q z^q.
pub fn is_invertible(ma: &[f64]) -> bool {
    let negated: Vec<f64> = ma.iter().map(|t| -t).collect();
    is_stationary(&negated)
}

impl FittedArima {
    /// Fit `order` to `series` (undifferenced, e.g. log returns).
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<Self, FitFailure> {
        let ArimaOrder { p, d, q } = order;
        let x = difference(series, d);
        let n = x.len();

        let needed = p + q + 1 + EXTRA_OBSERVATIONS;
        let available = n.saturating_sub(p);
        if available < needed {
            return Err(FitFailure::InsufficientObservations { needed, available });
        }

        let mean = x.iter().sum::<f64>() / n as f64;
        let variance = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        if p + q > 0 && variance < DEGENERATE_VARIANCE {
            return Err(FitFailure::DegenerateSeries);
        }

        let params = if q == 0 {
            fit_autoregression(&x, p)?
        } else {
            let initial = hannan_rissanen(&x, p, q, mean);
            refine_css(&x, p, q, initial)?
        };

        let CssParams { constant, ar, ma } = params;
        if !is_stationary(&ar) {
            return Err(FitFailure::NonStationary);
        }
        if !is_invertible(&ma) {
            return Err(FitFailure::NonInvertible);
        }

        let residuals = css_residuals(&x, p, constant, &ar, &ma);
        let sse: f64 = residuals[p..].iter().map(|e| e * e).sum();
        if !sse.is_finite() {
            return Err(FitFailure::NonConvergence("non-finite residuals".to_string()));
        }

        let n_obs = n - p;
        let sigma2 = (sse / n_obs as f64).max(SIGMA2_FLOOR);
        let log_likelihood =
            -(n_obs as f64) / 2.0 * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let aic = -2.0 * log_likelihood + 2.0 * order.parameter_count() as f64;

        Ok(Self {
            order,
            constant,
            ar,
            ma,
            sigma2,
            log_likelihood,
            aic,
            n_obs,
            residuals,
            history: series.to_vec(),
        })
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// AR polynomial of the integrated model: phi(B) (1 - B)^d = 1 - sum a_i B^i.
    fn integrated_ar(&self) -> Vec<f64> {
        // Coefficients of phi(B) as a polynomial in B, constant term first
        let mut poly: Vec<f64> = std::iter::once(1.0)
            .chain(self.ar.iter().map(|phi| -phi))
            .collect();
        for _ in 0..self.order.d {
            let mut next = vec![0.0; poly.len() + 1];
            for (i, c) in poly.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= c;
            }
            poly = next;
        }
        poly.iter().skip(1).map(|c| -c).collect()
    }

    /// `horizon` point forecasts of the undifferenced series plus psi weights.
    pub fn forecast(&self, horizon: usize) -> SeriesForecast {
        let a = self.integrated_ar();
        let d = self.order.d;
        let n = self.history.len();

        let mut values = self.history.clone();
        // Innovations indexed like `history`
        let mut shocks: Vec<f64> = (0..n)
            .map(|t| if t >= d { self.residuals[t - d] } else { 0.0 })
            .collect();

        let mut mean = Vec::with_capacity(horizon);
        for step in 0..horizon {
            let t = n + step;
            let mut value = self.constant;
            for (i, ai) in a.iter().enumerate() {
                if let Some(prev) = t.checked_sub(i + 1) {
                    value += ai * values[prev];
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if let Some(prev) = t.checked_sub(j + 1) {
                    value += theta * shocks[prev];
                }
            }
            values.push(value);
            shocks.push(0.0);
            mean.push(value);
        }

        let mut psi = Vec::with_capacity(horizon);
        for j in 0..horizon {
            let weight = if j == 0 {
                1.0
            } else {
                let theta = self.ma.get(j - 1).copied().unwrap_or(0.0);
                let ar_part: f64 = a
                    .iter()
                    .enumerate()
                    .take(j)
                    .map(|(i, ai)| ai * psi[j - 1 - i])
                    .sum();
                theta + ar_part
            };
            psi.push(weight);
        }

        SeriesForecast { mean, psi }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CssParams {
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl CssParams {
    fn to_vector(&self) -> DVector<f64> {
        DVector::from_iterator(
            1 + self.ar.len() + self.ma.len(),
            std::iter::once(self.constant)
                .chain(self.ar.iter().copied())
                .chain(self.ma.iter().copied()),
        )
    }

    fn from_vector(v: &DVector<f64>, p: usize, q: usize) -> Self {
        Self {
            constant: v[0],
            ar: (1..=p).map(|i| v[i]).collect(),
            ma: (1..=q).map(|j| v[p + j]).collect(),
        }
    }

    fn is_admissible(&self) -> bool {
        self.constant.is_finite() && is_stationary(&self.ar) && is_invertible(&self.ma)
    }
}

/// Design matrix [1, x_{t-1}, ..., x_{t-p}, e_{t-1}, ..., e_{t-q}] for t in start..n.
fn lagged_design(x: &[f64], shocks: Option<&[f64]>, p: usize, q: usize, start: usize) -> DMatrix<f64> {
    let rows = x.len() - start;
    DMatrix::from_fn(rows, 1 + p + q, |r, c| {
        let t = start + r;
        if c == 0 {
            1.0
        } else if c <= p {
            x[t - c]
        } else {
            shocks.map_or(0.0, |e| e[t - (c - p)])
        }
    })
}

fn fit_autoregression(x: &[f64], p: usize) -> Result<CssParams, FitFailure> {
    let design = lagged_design(x, None, p, 0, p);
    let target = DVector::from_column_slice(&x[p..]);
    let fit = least_squares(&design, &target)?;
    Ok(CssParams {
        constant: fit.coefficients[0],
        ar: (1..=p).map(|i| fit.coefficients[i]).collect(),
        ma: Vec::new(),
    })
}

/// Two-stage regression estimates; falls back to white noise around the mean.
fn hannan_rissanen(x: &[f64], p: usize, q: usize, mean: f64) -> CssParams {
    let fallback = CssParams {
        constant: mean,
        ar: vec![0.0; p],
        ma: vec![0.0; q],
    };

    let n = x.len();
    let long_order = (p.max(q) + 4)
        .max(((n as f64).ln() * 2.0) as usize)
        .min(n / 3);
    if long_order == 0 || long_order + q + p + 1 >= n {
        return fallback;
    }

    let Ok(long_ar) = fit_autoregression(x, long_order) else {
        return fallback;
    };
    let mut shocks = vec![0.0; n];
    for t in long_order..n {
        let predicted: f64 = long_ar.constant
            + (1..=long_order)
                .map(|i| long_ar.ar[i - 1] * x[t - i])
                .sum::<f64>();
        shocks[t] = x[t] - predicted;
    }

    let start = long_order + q.max(p);
    if n - start < p + q + 1 {
        return fallback;
    }
    let design = lagged_design(x, Some(&shocks), p, q, start);
    let target = DVector::from_column_slice(&x[start..]);
    let Ok(fit) = least_squares(&design, &target) else {
        return fallback;
    };

    let mut params = CssParams::from_vector(&fit.coefficients, p, q);
    // Pull inadmissible starting points back towards zero
    for _ in 0..10 {
        if params.is_admissible() {
            return params;
        }
        params.ar.iter_mut().for_each(|v| *v *= 0.5);
        params.ma.iter_mut().for_each(|v| *v *= 0.5);
    }
    fallback
}

/// Conditional residuals; zero for t < p and pre-sample innovations are zero.
fn css_residuals(x: &[f64], p: usize, constant: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut e = vec![0.0; x.len()];
    for t in p..x.len() {
        let mut value = x[t] - constant;
        for (i, phi) in ar.iter().enumerate() {
            value -= phi * x[t - i - 1];
        }
        for (j, theta) in ma.iter().enumerate() {
            if let Some(prev) = t.checked_sub(j + 1) {
                value -= theta * e[prev];
            }
        }
        e[t] = value;
    }
    e
}

/// Residuals for t >= p and the Jacobian of those residuals w.r.t. (c, phi, theta).
fn css_jacobian(x: &[f64], p: usize, params: &CssParams) -> (DVector<f64>, DMatrix<f64>) {
    let n = x.len();
    let k = 1 + params.ar.len() + params.ma.len();
    let e = css_residuals(x, p, params.constant, &params.ar, &params.ma);

    // de[t][m]: derivative of e_t with respect to parameter m
    let mut de = vec![vec![0.0; k]; n];
    for t in p..n {
        let mut row = vec![0.0; k];
        row[0] = -1.0;
        for i in 1..=params.ar.len() {
            row[i] = -x[t - i];
        }
        for j in 1..=params.ma.len() {
            if let Some(prev) = t.checked_sub(j) {
                row[params.ar.len() + j] = -e[prev];
            }
        }
        for (j, theta) in params.ma.iter().enumerate() {
            if let Some(prev) = t.checked_sub(j + 1) {
                for m in 0..k {
                    row[m] -= theta * de[prev][m];
                }
            }
        }
        de[t] = row;
    }

    let rows = n - p;
    let residuals = DVector::from_iterator(rows, e[p..].iter().copied());
    let jacobian = DMatrix::from_fn(rows, k, |r, c| de[p + r][c]);
    (residuals, jacobian)
}

/// Levenberg-Marquardt minimisation of the conditional sum of squares.
fn refine_css(x: &[f64], p: usize, q: usize, initial: CssParams) -> Result<CssParams, FitFailure> {
    let mut params = initial;
    let (mut residuals, mut jacobian) = css_jacobian(x, p, &params);
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(FitFailure::NonConvergence("non-finite starting point".to_string()));
    }

    let mut lambda = LM_INITIAL_LAMBDA;
    for _ in 0..LM_MAX_ITERATIONS {
        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        let gradient = &jt * &residuals;

        let mut accepted = false;
        while lambda <= LM_MAX_LAMBDA {
            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(cholesky) = damped.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let step = cholesky.solve(&(-&gradient));
            let proposal = CssParams::from_vector(&(params.to_vector() + &step), p, q);
            if !proposal.is_admissible() {
                lambda *= 10.0;
                continue;
            }

            let (new_residuals, new_jacobian) = css_jacobian(x, p, &proposal);
            let new_sse = new_residuals.norm_squared();
            if new_sse.is_finite() && new_sse < sse {
                let improvement = (sse - new_sse) / sse.max(f64::MIN_POSITIVE);
                params = proposal;
                residuals = new_residuals;
                jacobian = new_jacobian;
                sse = new_sse;
                lambda = (lambda / 10.0).max(1e-12);
                accepted = true;
                if improvement < LM_TOLERANCE || step.norm() < LM_TOLERANCE {
                    return Ok(params);
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No descent direction left: local minimum of the CSS surface
            return Ok(params);
        }
    }

    Err(FitFailure::NonConvergence(format!(
        "no convergence after {} iterations",
        LM_MAX_ITERATIONS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn white_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| 0.01 * rng.sample::<f64, _>(StandardNormal)).collect()
    }

    fn simulate_arma(n: usize, c: f64, phi: f64, theta: f64, seed: u64) -> Vec<f64> {
        let noise = white_noise(n + 100, seed);
        let mut x = vec![0.0; n + 100];
        for t in 1..n + 100 {
            x[t] = c + phi * x[t - 1] + noise[t] + theta * noise[t - 1];
        }
        x.split_off(100)
    }

    #[test]
    fn test_order_limit() {
        assert!(ArimaOrder::new(5, 2, 5).is_ok());
        assert!(ArimaOrder::new(6, 0, 0).is_err());
        assert_eq!(ArimaOrder::new(2, 1, 0).unwrap().to_string(), "(2,1,0)");
    }

    #[test]
    fn test_difference() {
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 2), vec![1.0, 1.0]);
        assert_eq!(difference(&[1.0, 2.0], 0), vec![1.0, 2.0]);
    }

    #[test]
    fn test_stationarity_check() {
        assert!(is_stationary(&[]));
        assert!(is_stationary(&[0.5]));
        assert!(!is_stationary(&[1.0]));
        assert!(is_stationary(&[0.5, 0.3]));
        // (1 - z)(1 - 0.5 z) has a unit root
        assert!(!is_stationary(&[1.5, -0.5]));
        assert!(!is_stationary(&[0.5, 0.6]));
        assert!(is_invertible(&[0.9]));
        assert!(!is_invertible(&[-1.2]));
    }

    #[test]
    fn test_white_noise_mean_model() {
        let series: Vec<f64> = white_noise(200, 7).iter().map(|v| v + 0.002).collect();
        let model = FittedArima::fit(&series, ArimaOrder::new(0, 0, 0).unwrap()).unwrap();

        let mean = series.iter().sum::<f64>() / series.len() as f64;
        assert!((model.constant - mean).abs() < 1e-12);
        assert_eq!(model.n_obs, 200);
        assert!(model.aic.is_finite());

        let forecast = model.forecast(3);
        assert!(forecast.mean.iter().all(|m| (m - mean).abs() < 1e-12));
        assert_eq!(forecast.psi, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_ar1_estimate() {
        let series = simulate_arma(500, 0.001, 0.6, 0.0, 11);
        let model = FittedArima::fit(&series, ArimaOrder::new(1, 0, 0).unwrap()).unwrap();
        assert!((model.ar[0] - 0.6).abs() < 0.1);

        let forecast = model.forecast(4);
        assert_eq!(forecast.psi.len(), 4);
        assert!((forecast.psi[2] - model.ar[0].powi(2)).abs() < 1e-12);
    }

    #[test]
    fn test_ma1_estimate() {
        let series = simulate_arma(600, 0.0, 0.0, 0.5, 23);
        let model = FittedArima::fit(&series, ArimaOrder::new(0, 0, 1).unwrap()).unwrap();
        assert!((model.ma[0] - 0.5).abs() < 0.12);
        assert!(is_invertible(&model.ma));
        assert!(model.sigma2 > 0.0);
    }

    #[test]
    fn test_arma11_is_fitted_and_admissible() {
        let series = simulate_arma(600, 0.0005, 0.5, 0.3, 5);
        let model = FittedArima::fit(&series, ArimaOrder::new(1, 0, 1).unwrap()).unwrap();
        assert!(is_stationary(&model.ar));
        assert!(is_invertible(&model.ma));
        assert_eq!(model.ar.len(), 1);
        assert_eq!(model.ma.len(), 1);
    }

    #[test]
    fn test_degenerate_series_rejected() {
        let series = vec![0.01; 60];
        let err = FittedArima::fit(&series, ArimaOrder::new(1, 0, 0).unwrap()).unwrap_err();
        assert_eq!(err, FitFailure::DegenerateSeries);

        // The mean model still fits with a floored variance
        let model = FittedArima::fit(&series, ArimaOrder::new(0, 0, 0).unwrap()).unwrap();
        assert_eq!(model.sigma2, SIGMA2_FLOOR);
        assert!((model.constant - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_too_short_series() {
        let err = FittedArima::fit(&white_noise(12, 1), ArimaOrder::new(1, 0, 1).unwrap()).unwrap_err();
        assert!(matches!(err, FitFailure::InsufficientObservations { .. }));
    }

    #[test]
    fn test_integrated_forecast_continues_level() {
        // Random walk with drift; d = 1 mean model forecasts last + k * drift
        let steps = white_noise(120, 3);
        let mut level = 0.0;
        let series: Vec<f64> = steps
            .iter()
            .map(|s| {
                level += 0.01 + s;
                level
            })
            .collect();
        let model = FittedArima::fit(&series, ArimaOrder::new(0, 1, 0).unwrap()).unwrap();
        let forecast = model.forecast(3);

        let last = *series.last().unwrap();
        for (k, value) in forecast.mean.iter().enumerate() {
            let expected = last + (k + 1) as f64 * model.constant;
            assert!((value - expected).abs() < 1e-12);
        }
        assert_eq!(forecast.psi, vec![1.0, 1.0, 1.0]);
    }
}
