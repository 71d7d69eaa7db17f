use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Not enough price/news history to run the analysis at all.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Below the minimum sample size of a statistic (correlation, aggregation).
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Every ARIMA candidate failed to fit.
    #[error("Model fit error: {0}")]
    ModelFit(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Inputs violate an ordering or positivity invariant.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The statistic is mathematically undefined for the given inputs.
    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, AnalysisError>;
