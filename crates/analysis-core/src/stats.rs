//! Small descriptive-statistics helpers shared by the analysis crates.
//!
//! Each helper returns `None` when the statistic is undefined for the input
//! rather than inventing a neutral value.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Sample variance (n - 1 denominator); needs two observations.
pub fn sample_variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data)?;
    Some(data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64)
}

/// Sample standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    sample_variance(data).map(f64::sqrt)
}

/// Percentile with linear interpolation between closest ranks, `q` in [0, 1].
///
/// `sorted` must already be in ascending order.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Percentile of unsorted data.
pub fn percentile(data: &[f64], q: f64) -> Option<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

/// Deviation sums at or below this fraction of the raw sum of squares are
/// rounding noise around a constant, not variance.
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-12;

/// Pearson correlation of two equally long slices.
///
/// `None` when the lengths differ, fewer than two pairs exist or either side
/// is constant (up to rounding).
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut raw_xx = 0.0;
    let mut raw_yy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
        raw_xx += a * a;
        raw_yy += b * b;
    }

    if sxx <= RELATIVE_VARIANCE_FLOOR * raw_xx || syy <= RELATIVE_VARIANCE_FLOOR * raw_yy {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&data), Some(5.0));
        let sd = std_dev(&data).unwrap();
        assert!((sd - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&data, 0.5), Some(3.0));
        assert_eq!(percentile(&data, 0.0), Some(1.0));
        assert_eq!(percentile(&data, 1.0), Some(5.0));
        assert!((percentile(&data, 0.1).unwrap() - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&data, 1.5), None);
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);

        let inverse: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson(&x, &inverse).unwrap() + 1.0).abs() < 1e-12);

        assert_eq!(pearson(&x, &[1.0; 5]), None);
        assert_eq!(pearson(&x, &y[..4]), None);
    }

    #[test]
    fn test_pearson_constant_with_rounding_noise() {
        // mean of [0.2; 6] is not exactly 0.2, so deviations are tiny but nonzero
        let returns = [0.01, -0.02, 0.03, 0.0, 0.01, 0.02];
        assert_eq!(pearson(&[0.2; 6], &returns), None);
        assert_eq!(pearson(&returns, &[0.1; 6]), None);
        assert_eq!(pearson(&[0.0; 6], &returns), None);

        // Small but real variation is still measured
        let small = [0.2, 0.2001, 0.2, 0.2002, 0.2, 0.2001];
        assert!(pearson(&small, &returns).is_some());
    }
}
