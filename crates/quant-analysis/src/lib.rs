//! Quantitative analytics over return series: sentiment/return alignment and
//! correlation, ADF stationarity, ARIMA selection and forecasting, and Monte
//! Carlo price simulation.

pub mod alignment;
pub mod arima;
pub mod correlation;
pub mod forecast;
pub mod monte_carlo;
mod regression;
pub mod selection;
pub mod stationarity;

pub use alignment::{AlignmentConfig, TimeSeriesAligner, MAX_FORWARD_FILL_DAYS};
pub use arima::{ArimaOrder, FitFailure, FittedArima, MAX_ORDER};
pub use correlation::{
    CorrelationAnalyzer, CorrelationConfig, CorrelationResult, CorrelationStrength, LagCorrelation,
};
pub use forecast::{ForecastConfig, ForecastGenerator, ForecastPoint, ForecastTrend, PriceForecast};
pub use monte_carlo::{
    GbmParameters, MonteCarloConfig, MonteCarloOutlook, MonteCarloSimulator, PercentileBand,
    Percentiles, SimulationOutcome, TerminalSummary, MIN_SIMULATIONS, TRADING_DAYS_PER_YEAR,
};
pub use selection::{ArimaCandidate, ArimaModelSelector, CandidateOutcome, ModelSelection, SelectorConfig};
pub use stationarity::{CriticalValues, StationarityReport, StationarityTester};
