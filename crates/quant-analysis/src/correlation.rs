use analysis_core::{stats, AlignedPair, AnalysisError};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Minimum overlapping pairs for a lag to be evaluated
    pub min_samples: usize,
    /// Largest positional lag tried when the caller gives none
    pub max_lag: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            max_lag: 5,
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.min_samples < 3 {
            return Err(AnalysisError::InvalidParameter(format!(
                "min_samples must be at least 3, got {}",
                self.min_samples
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationStrength {
    StrongPositive,
    Positive,
    Weak,
    Negative,
    StrongNegative,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        if r > 0.5 {
            CorrelationStrength::StrongPositive
        } else if r > 0.3 {
            CorrelationStrength::Positive
        } else if r < -0.5 {
            CorrelationStrength::StrongNegative
        } else if r < -0.3 {
            CorrelationStrength::Negative
        } else {
            CorrelationStrength::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrength::StrongPositive => "Strong Positive",
            CorrelationStrength::Positive => "Positive",
            CorrelationStrength::Weak => "Weak",
            CorrelationStrength::Negative => "Negative",
            CorrelationStrength::StrongNegative => "Strong Negative",
        }
    }
}

/// Correlation of sentiment[t] with return[t + lag]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelation {
    pub lag: usize,
    pub coefficient: f64,
    pub sample_size: usize,
    /// Two-sided p-value of the coefficient (Student t, n - 2 df)
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub coefficient: f64,
    /// Positional lag in aligned observations (trading days)
    pub lag_days: usize,
    pub sample_size: usize,
    pub p_value: f64,
    pub strength: CorrelationStrength,
    /// Every lag that could be evaluated, ascending
    pub profile: Vec<LagCorrelation>,
}

/// Lagged Pearson correlation over an aligned sentiment/return sequence.
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn analyze(&self, pairs: &[AlignedPair]) -> Result<CorrelationResult, AnalysisError> {
        self.analyze_with_max_lag(pairs, self.config.max_lag)
    }

    /// Try every lag in `0..=max_lag` and keep the one with the largest |r|.
    ///
    /// Ties keep the smaller lag. Lags with too little overlap or a constant
    /// side are left out of the profile.
    pub fn analyze_with_max_lag(
        &self,
        pairs: &[AlignedPair],
        max_lag: usize,
    ) -> Result<CorrelationResult, AnalysisError> {
        if pairs.len() < self.config.min_samples {
            return Err(AnalysisError::InsufficientData(format!(
                "Need at least {} aligned sentiment/return pairs, got {}",
                self.config.min_samples,
                pairs.len()
            )));
        }

        let sentiment: Vec<f64> = pairs.iter().map(|p| p.sentiment_value).collect();
        let returns: Vec<f64> = pairs.iter().map(|p| p.return_value).collect();

        let mut profile = Vec::new();
        for lag in 0..=max_lag {
            let n = pairs.len().saturating_sub(lag);
            if n < self.config.min_samples {
                break;
            }
            let x = &sentiment[..n];
            let y = &returns[lag..];
            let Some(r) = stats::pearson(x, y) else {
                tracing::debug!("Correlation undefined at lag {} (constant series)", lag);
                continue;
            };
            profile.push(LagCorrelation {
                lag,
                coefficient: r,
                sample_size: n,
                p_value: two_sided_p_value(r, n)?,
            });
        }

        let mut best: Option<&LagCorrelation> = None;
        for candidate in &profile {
            if best.map_or(true, |b| candidate.coefficient.abs() > b.coefficient.abs()) {
                best = Some(candidate);
            }
        }

        let best = *best.ok_or_else(|| {
            AnalysisError::CalculationError(
                "Correlation is undefined at every lag (zero variance)".to_string(),
            )
        })?;

        Ok(CorrelationResult {
            coefficient: best.coefficient,
            lag_days: best.lag,
            sample_size: best.sample_size,
            p_value: best.p_value,
            strength: CorrelationStrength::from_coefficient(best.coefficient),
            profile,
        })
    }
}

fn two_sided_p_value(r: f64, n: usize) -> Result<f64, AnalysisError> {
    if r.abs() >= 1.0 {
        return Ok(0.0);
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AnalysisError::CalculationError(format!("Student t distribution: {}", e)))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}
