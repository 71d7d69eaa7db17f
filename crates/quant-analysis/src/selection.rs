use analysis_core::{AnalysisError, CancellationToken};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::arima::{ArimaOrder, FitFailure, FittedArima, MAX_ORDER};
use crate::stationarity::StationarityReport;

/// Bounds of the order grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    /// Returns required before any candidate is tried
    pub min_history: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_p: 3,
            max_d: 1,
            max_q: 2,
            min_history: 30,
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_p > MAX_ORDER || self.max_d > MAX_ORDER || self.max_q > MAX_ORDER {
            return Err(AnalysisError::InvalidParameter(format!(
                "ARIMA search bounds ({},{},{}) exceed the limit of {}",
                self.max_p, self.max_d, self.max_q, MAX_ORDER
            )));
        }
        if self.min_history == 0 {
            return Err(AnalysisError::InvalidParameter(
                "min_history must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateOutcome {
    Fitted { aic: f64 },
    Failed(FitFailure),
}

/// One grid point and how its fit went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaCandidate {
    pub order: ArimaOrder,
    pub outcome: CandidateOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model: FittedArima,
    /// Every candidate in enumeration order
    pub candidates: Vec<ArimaCandidate>,
}

/// Bounded grid search over (p, d, q) minimising AIC.
pub struct ArimaModelSelector {
    config: SelectorConfig,
}

impl ArimaModelSelector {
    pub fn new(config: SelectorConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Candidate orders, ascending by p, then d, then q.
    ///
    /// A non-stationary test result widens the differencing range to include
    /// d = 1; d = 0 is always tried.
    pub fn candidate_orders(&self, stationarity: Option<&StationarityReport>) -> Vec<ArimaOrder> {
        let needs_difference = stationarity.is_some_and(|r| !r.is_stationary);
        let max_d = if needs_difference {
            self.config.max_d.max(1)
        } else {
            self.config.max_d
        };

        let mut orders = Vec::new();
        for p in 0..=self.config.max_p {
            for d in 0..=max_d {
                for q in 0..=self.config.max_q {
                    orders.push(ArimaOrder { p, d, q });
                }
            }
        }
        orders
    }

    pub fn select(
        &self,
        returns: &[f64],
        stationarity: Option<&StationarityReport>,
        cancel: &CancellationToken,
    ) -> Result<ModelSelection, AnalysisError> {
        if returns.len() < self.config.min_history {
            return Err(AnalysisError::DataUnavailable(format!(
                "Need at least {} returns for model selection, got {}",
                self.config.min_history,
                returns.len()
            )));
        }

        let orders = self.candidate_orders(stationarity);

        // Fit candidates in parallel; collect keeps enumeration order
        let fits: Vec<(ArimaOrder, Option<Result<FittedArima, FitFailure>>)> = orders
            .par_iter()
            .map(|&order| {
                if cancel.is_cancelled() {
                    return (order, None);
                }
                (order, Some(FittedArima::fit(returns, order)))
            })
            .collect();

        cancel.check()?;

        let mut best: Option<FittedArima> = None;
        let mut candidates = Vec::with_capacity(fits.len());
        for (order, fit) in fits {
            let Some(fit) = fit else {
                return Err(AnalysisError::Cancelled);
            };
            match fit {
                Ok(model) => {
                    candidates.push(ArimaCandidate {
                        order,
                        outcome: CandidateOutcome::Fitted { aic: model.aic },
                    });
                    if best.as_ref().map_or(true, |b| model.aic < b.aic) {
                        best = Some(model);
                    }
                }
                Err(failure) => {
                    tracing::debug!("Skipping ARIMA{}: {}", order, failure);
                    candidates.push(ArimaCandidate {
                        order,
                        outcome: CandidateOutcome::Failed(failure),
                    });
                }
            }
        }

        let model = best.ok_or_else(|| {
            AnalysisError::ModelFit(format!(
                "All {} ARIMA candidates failed to fit",
                candidates.len()
            ))
        })?;

        tracing::info!(
            "Selected ARIMA{} with AIC {:.3} from {} candidates",
            model.order,
            model.aic,
            candidates.len()
        );

        Ok(ModelSelection { model, candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    use crate::stationarity::StationarityTester;

    fn selector() -> ArimaModelSelector {
        ArimaModelSelector::new(SelectorConfig::default()).unwrap()
    }

    fn white_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| 0.0005 + 0.015 * rng.sample::<f64, _>(StandardNormal)).collect()
    }

    #[test]
    fn test_enumeration_order() {
        let orders = selector().candidate_orders(None);
        assert_eq!(orders.len(), 4 * 2 * 3);
        assert_eq!(orders[0], ArimaOrder { p: 0, d: 0, q: 0 });
        assert_eq!(orders[1], ArimaOrder { p: 0, d: 0, q: 1 });
        assert_eq!(orders[3], ArimaOrder { p: 0, d: 1, q: 0 });
        assert_eq!(orders[6], ArimaOrder { p: 1, d: 0, q: 0 });
    }

    #[test]
    fn test_non_stationary_report_adds_differencing() {
        let selector = ArimaModelSelector::new(SelectorConfig {
            max_d: 0,
            ..SelectorConfig::default()
        })
        .unwrap();
        let report = StationarityReport {
            statistic: -1.0,
            p_value: 0.7,
            used_lag: 0,
            n_obs: 100,
            critical_values: crate::stationarity::critical_values(100),
            is_stationary: false,
        };
        assert!(selector.candidate_orders(None).iter().all(|o| o.d == 0));
        assert!(selector.candidate_orders(Some(&report)).iter().any(|o| o.d == 1));
        assert!(selector.candidate_orders(Some(&report)).iter().any(|o| o.d == 0));
    }

    #[test]
    fn test_white_noise_selects_small_model() {
        let returns = white_noise(250, 2024);
        let report = StationarityTester::new().test(&returns).ok();
        let selection = selector()
            .select(&returns, report.as_ref(), &CancellationToken::new())
            .unwrap();

        assert_eq!(selection.model.order.d, 0);
        assert!(selection.model.order.p + selection.model.order.q <= 2);
        assert_eq!(selection.candidates.len(), 24);

        let best_aic = selection
            .candidates
            .iter()
            .filter_map(|c| match c.outcome {
                CandidateOutcome::Fitted { aic } => Some(aic),
                CandidateOutcome::Failed(_) => None,
            })
            .fold(f64::INFINITY, f64::min);
        assert_eq!(selection.model.aic, best_aic);
    }

    #[test]
    fn test_degenerate_series_skips_candidates() {
        let returns = vec![0.01; 59];
        let selection = selector()
            .select(&returns, None, &CancellationToken::new())
            .unwrap();

        assert_eq!(selection.model.order, ArimaOrder { p: 0, d: 0, q: 0 });
        assert!(selection
            .candidates
            .iter()
            .any(|c| matches!(c.outcome, CandidateOutcome::Failed(FitFailure::DegenerateSeries))));
    }

    #[test]
    fn test_short_history_is_unavailable() {
        let err = selector()
            .select(&white_noise(29, 1), None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));
    }

    #[test]
    fn test_cancelled_search() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = selector().select(&white_noise(100, 3), None, &cancel).unwrap_err();
        assert_eq!(err, AnalysisError::Cancelled);
    }

    #[test]
    fn test_cancelled_from_another_thread() {
        let returns = white_noise(2000, 17);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(1));
            trigger.cancel();
        });

        let result = selector().select(&returns, None, &cancel);
        canceller.join().unwrap();

        // Either the search beat the cancellation and is complete, or nothing is returned
        match result {
            Ok(selection) => assert_eq!(selection.candidates.len(), 24),
            Err(err) => assert_eq!(err, AnalysisError::Cancelled),
        }
        assert!(cancel.is_cancelled());

        // Once cancelled, a further search never starts fitting
        let again = selector().select(&returns, None, &cancel).unwrap_err();
        assert_eq!(again, AnalysisError::Cancelled);
    }

    #[test]
    fn test_out_of_range_bounds_rejected() {
        let config = SelectorConfig {
            max_p: 6,
            ..SelectorConfig::default()
        };
        assert!(ArimaModelSelector::new(config).is_err());
    }
}
