use analysis_core::{next_trading_days, AnalysisError, TradingCalendar};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::arima::FittedArima;

/// Point forecasts never fall below this fraction of the last price
const POINT_FLOOR: f64 = 0.05;
/// Lower bounds never fall below this fraction of the last price
const LOWER_BOUND_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Trailing returns averaged into the observed drift
    pub trend_window: usize,
    pub trend_weight_cap: f64,
    /// Horizon (in steps) at which the drift weight would reach 1 before capping
    pub trend_horizon_days: f64,
    pub default_confidence: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            trend_window: 20,
            trend_weight_cap: 0.7,
            trend_horizon_days: 1825.0,
            default_confidence: 0.95,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.trend_window == 0 {
            return Err(AnalysisError::InvalidParameter(
                "trend_window must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trend_weight_cap) {
            return Err(AnalysisError::InvalidParameter(format!(
                "trend_weight_cap must be within [0, 1], got {}",
                self.trend_weight_cap
            )));
        }
        if !(self.trend_horizon_days > 0.0) {
            return Err(AnalysisError::InvalidParameter(
                "trend_horizon_days must be positive".to_string(),
            ));
        }
        validate_confidence(self.default_confidence)
    }
}

fn validate_confidence(confidence: f64) -> Result<(), AnalysisError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "Confidence level must be within (0, 1), got {}",
            confidence
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastTrend {
    StrongUp,
    Up,
    Sideways,
    Down,
    StrongDown,
}

impl ForecastTrend {
    pub fn from_change_pct(change_pct: f64) -> Self {
        if change_pct > 5.0 {
            ForecastTrend::StrongUp
        } else if change_pct > 2.0 {
            ForecastTrend::Up
        } else if change_pct < -5.0 {
            ForecastTrend::StrongDown
        } else if change_pct < -2.0 {
            ForecastTrend::Down
        } else {
            ForecastTrend::Sideways
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastTrend::StrongUp => "Strong Upward",
            ForecastTrend::Up => "Upward",
            ForecastTrend::Sideways => "Sideways",
            ForecastTrend::Down => "Downward",
            ForecastTrend::StrongDown => "Strong Downward",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceForecast {
    pub points: Vec<ForecastPoint>,
    pub confidence_level: f64,
    /// Weight given to the observed drift over the model's return forecast
    pub trend_weight: f64,
    pub observed_drift: f64,
    pub current_price: f64,
    pub final_price: f64,
    pub change_pct: f64,
    pub trend: ForecastTrend,
}

/// Turns a fitted return model into dated price forecasts with intervals.
pub struct ForecastGenerator {
    config: ForecastConfig,
}

impl ForecastGenerator {
    pub fn new(config: ForecastConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Drift weight for a horizon: min(cap, horizon / trend_horizon_days).
    pub fn trend_weight(&self, horizon: usize) -> f64 {
        (horizon as f64 / self.config.trend_horizon_days).min(self.config.trend_weight_cap)
    }

    pub fn generate(
        &self,
        model: &FittedArima,
        last_price: f64,
        last_date: NaiveDate,
        horizon: usize,
        confidence: f64,
        calendar: &dyn TradingCalendar,
    ) -> Result<PriceForecast, AnalysisError> {
        if horizon == 0 {
            return Err(AnalysisError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }
        validate_confidence(confidence)?;
        if !(last_price.is_finite() && last_price > 0.0) {
            return Err(AnalysisError::InvalidData(format!(
                "Last price must be positive, got {}",
                last_price
            )));
        }

        let history = model.history();
        let window = &history[history.len().saturating_sub(self.config.trend_window)..];
        let observed_drift = analysis_core::stats::mean(window).ok_or_else(|| {
            AnalysisError::InsufficientData("No returns to estimate drift from".to_string())
        })?;
        let trend_weight = self.trend_weight(horizon);

        let series = model.forecast(horizon);
        let dates = next_trading_days(calendar, last_date, horizon)?;

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AnalysisError::CalculationError(format!("Normal distribution: {}", e)))?;
        let z = normal.inverse_cdf((1.0 + confidence) / 2.0);

        let mut points = Vec::with_capacity(horizon);
        let mut cumulative_return = 0.0;
        let mut cumulative_psi = 0.0;
        let mut variance = 0.0;
        for (step, date) in dates.into_iter().enumerate() {
            let corrected = (1.0 - trend_weight) * series.mean[step] + trend_weight * observed_drift;
            cumulative_return += corrected;

            cumulative_psi += series.psi[step];
            variance += model.sigma2 * cumulative_psi * cumulative_psi;
            let std_err = variance.sqrt();

            let point = (last_price * cumulative_return.exp()).max(POINT_FLOOR * last_price);
            let margin = z * std_err * point;
            if !(point.is_finite() && margin.is_finite()) {
                return Err(AnalysisError::CalculationError(format!(
                    "Non-finite forecast at step {}",
                    step + 1
                )));
            }

            points.push(ForecastPoint {
                date,
                point,
                lower: (point - margin).max(LOWER_BOUND_FLOOR * last_price),
                upper: point + margin,
            });
        }

        let final_price = points
            .last()
            .map(|p| p.point)
            .ok_or_else(|| AnalysisError::CalculationError("Forecast produced no points".to_string()))?;
        let change_pct = (final_price - last_price) / last_price * 100.0;

        Ok(PriceForecast {
            points,
            confidence_level: confidence,
            trend_weight,
            observed_drift,
            current_price: last_price,
            final_price,
            change_pct,
            trend: ForecastTrend::from_change_pct(change_pct),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::WeekdayCalendar;
    use chrono::{Datelike, Weekday};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    use crate::arima::ArimaOrder;

    fn generator() -> ForecastGenerator {
        ForecastGenerator::new(ForecastConfig::default()).unwrap()
    }

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn noisy_model(order: ArimaOrder) -> FittedArima {
        let mut rng = StdRng::seed_from_u64(77);
        let returns: Vec<f64> = (0..200)
            .map(|_| 0.0008 + 0.02 * rng.sample::<f64, _>(StandardNormal))
            .collect();
        FittedArima::fit(&returns, order).unwrap()
    }

    #[test]
    fn test_constant_growth_forecast_increases() {
        let model = FittedArima::fit(&[0.01; 59], ArimaOrder { p: 0, d: 0, q: 0 }).unwrap();
        let forecast = generator()
            .generate(&model, 100.0, friday(), 5, 0.95, &WeekdayCalendar)
            .unwrap();

        assert_eq!(forecast.points.len(), 5);
        for pair in forecast.points.windows(2) {
            assert!(pair[1].point > pair[0].point);
            assert!(pair[1].date > pair[0].date);
        }
        assert!((forecast.points[0].point - 100.0 * 0.01f64.exp()).abs() < 1e-9);
        assert_eq!(forecast.trend, ForecastTrend::StrongUp);
    }

    #[test]
    fn test_bounds_contain_point_and_widen() {
        let model = noisy_model(ArimaOrder { p: 1, d: 0, q: 0 });
        let forecast = generator()
            .generate(&model, 50.0, friday(), 30, 0.95, &WeekdayCalendar)
            .unwrap();

        assert_eq!(forecast.points.len(), 30);
        for p in &forecast.points {
            assert!(p.lower <= p.point && p.point <= p.upper);
            assert!(p.lower >= 0.5);
            assert!(!matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun));
        }
        let first = &forecast.points[0];
        let last = &forecast.points[29];
        assert!((last.upper - last.point) / last.point > (first.upper - first.point) / first.point);
    }

    #[test]
    fn test_higher_confidence_gives_wider_interval() {
        let model = noisy_model(ArimaOrder { p: 0, d: 0, q: 1 });
        let narrow = generator()
            .generate(&model, 50.0, friday(), 10, 0.8, &WeekdayCalendar)
            .unwrap();
        let wide = generator()
            .generate(&model, 50.0, friday(), 10, 0.99, &WeekdayCalendar)
            .unwrap();
        assert!(wide.points[9].upper > narrow.points[9].upper);
        assert_eq!(wide.points[9].point, narrow.points[9].point);
    }

    #[test]
    fn test_trend_weight_is_capped() {
        let generator = generator();
        assert!((generator.trend_weight(365) - 0.2).abs() < 1e-12);
        assert_eq!(generator.trend_weight(1825 * 2), 0.7);
    }

    #[test]
    fn test_invalid_requests() {
        let model = noisy_model(ArimaOrder { p: 0, d: 0, q: 0 });
        let g = generator();
        let zero = g.generate(&model, 50.0, friday(), 0, 0.95, &WeekdayCalendar);
        assert!(matches!(zero, Err(AnalysisError::InvalidParameter(_))));
        let bad_confidence = g.generate(&model, 50.0, friday(), 5, 1.0, &WeekdayCalendar);
        assert!(matches!(bad_confidence, Err(AnalysisError::InvalidParameter(_))));
        let bad_price = g.generate(&model, 0.0, friday(), 5, 0.95, &WeekdayCalendar);
        assert!(matches!(bad_price, Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_final_price_is_last_point() {
        let model = noisy_model(ArimaOrder { p: 1, d: 0, q: 0 });
        let forecast = generator()
            .generate(&model, 50.0, friday(), 7, 0.95, &WeekdayCalendar)
            .unwrap();
        assert_eq!(forecast.final_price, forecast.points[6].point);
        assert!((forecast.change_pct - (forecast.final_price - 50.0) / 50.0 * 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_trend_labels() {
        assert_eq!(ForecastTrend::from_change_pct(6.0), ForecastTrend::StrongUp);
        assert_eq!(ForecastTrend::from_change_pct(-3.0), ForecastTrend::Down);
        assert_eq!(ForecastTrend::from_change_pct(1.0), ForecastTrend::Sideways);
    }
}
