//! Ordinary least squares on small dense design matrices.

use nalgebra::{DMatrix, DVector};

use crate::arima::FitFailure;

/// Singular value ratio below which a design matrix is treated as rank deficient
const CONDITION_RATIO_MIN: f64 = 1e-12;

#[derive(Debug, Clone)]
pub(crate) struct OlsFit {
    pub coefficients: DVector<f64>,
    pub residuals: DVector<f64>,
    pub sse: f64,
    /// (X'X)^-1, used for coefficient standard errors
    pub xtx_inverse: DMatrix<f64>,
}

impl OlsFit {
    /// Standard error of coefficient `idx` with the unbiased residual variance.
    pub fn standard_error(&self, idx: usize) -> Option<f64> {
        let n = self.residuals.len();
        let k = self.coefficients.len();
        if n <= k || idx >= k {
            return None;
        }
        let s2 = self.sse / (n - k) as f64;
        let var = s2 * self.xtx_inverse[(idx, idx)];
        (var.is_finite() && var >= 0.0).then(|| var.sqrt())
    }
}

/// Solve min ||y - Xb||² through the normal equations.
pub(crate) fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, FitFailure> {
    let (rows, cols) = x.shape();
    if rows < cols || cols == 0 {
        return Err(FitFailure::InsufficientObservations {
            needed: cols.max(1),
            available: rows,
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitFailure::NonConvergence(
            "non-finite values in regression input".to_string(),
        ));
    }

    let singular_values = x.clone().svd(false, false).singular_values;
    let s_max = singular_values.max();
    let s_min = singular_values.min();
    if s_max <= 0.0 || s_min / s_max < CONDITION_RATIO_MIN {
        return Err(FitFailure::Singular);
    }

    let xt = x.transpose();
    let xtx = &xt * x;
    let xty = &xt * y;
    let cholesky = xtx.cholesky().ok_or(FitFailure::Singular)?;
    let coefficients = cholesky.solve(&xty);
    let residuals = y - x * &coefficients;
    let sse = residuals.norm_squared();

    Ok(OlsFit {
        coefficients,
        residuals,
        sse,
        xtx_inverse: cholesky.inverse(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_linear_relationship() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let x = DMatrix::from_fn(20, 2, |r, c| if c == 0 { 1.0 } else { xs[r] });
        let y = DVector::from_iterator(20, xs.iter().map(|v| 3.0 + 0.5 * v));

        let fit = least_squares(&x, &y).unwrap();
        assert!((fit.coefficients[0] - 3.0).abs() < 1e-9);
        assert!((fit.coefficients[1] - 0.5).abs() < 1e-9);
        assert!(fit.sse < 1e-18);
    }

    #[test]
    fn test_collinear_columns_are_singular() {
        let x = DMatrix::from_fn(10, 2, |_, _| 1.0);
        let y = DVector::from_element(10, 2.0);
        assert_eq!(least_squares(&x, &y).unwrap_err(), FitFailure::Singular);
    }

    #[test]
    fn test_standard_error_of_noisy_slope() {
        let noise = [0.3, -0.2, 0.1, -0.4, 0.2, 0.0, -0.1, 0.3, -0.3, 0.1];
        let x = DMatrix::from_fn(10, 2, |r, c| if c == 0 { 1.0 } else { r as f64 });
        let y = DVector::from_iterator(10, (0..10).map(|i| 1.0 + 2.0 * i as f64 + noise[i]));

        let fit = least_squares(&x, &y).unwrap();
        let se = fit.standard_error(1).unwrap();
        assert!(se > 0.0 && se < 0.1);
        assert_eq!(fit.standard_error(5), None);
    }
}
