use analysis_core::{next_trading_days, stats, AnalysisError, CancellationToken, TradingCalendar};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Terminal dispersion needs at least two paths
pub const MIN_SIMULATIONS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Paths per parallel batch; cancellation is checked between batches
    pub batch_size: usize,
    /// Returns required to estimate drift and volatility
    pub min_history: usize,
    pub max_simulations: usize,
    /// Longest simulated horizon in trading days
    pub max_horizon: usize,
    /// Upper bound on paths x steps held in memory at once
    pub max_path_points: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            min_history: 30,
            max_simulations: 100_000,
            max_horizon: 1260,
            max_path_points: 25_000_000,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.batch_size == 0
            || self.min_history < 2
            || self.max_simulations < MIN_SIMULATIONS
            || self.max_horizon == 0
            || self.max_path_points == 0
        {
            return Err(AnalysisError::InvalidParameter(format!(
                "Invalid Monte Carlo config: batch_size={}, min_history={}, max_simulations={}, max_horizon={}, max_path_points={}",
                self.batch_size, self.min_history, self.max_simulations, self.max_horizon, self.max_path_points
            )));
        }
        Ok(())
    }
}

/// Daily log-return drift and volatility of the GBM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmParameters {
    pub drift: f64,
    pub volatility: f64,
}

impl GbmParameters {
    /// Sample mean and sample standard deviation of log returns.
    pub fn estimate(returns: &[f64]) -> Result<Self, AnalysisError> {
        if returns.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "Need at least 2 returns to estimate volatility, got {}",
                returns.len()
            )));
        }
        let drift = returns.mean();
        let volatility = returns.std_dev();
        if !(drift.is_finite() && volatility.is_finite()) {
            return Err(AnalysisError::CalculationError(
                "Non-finite drift or volatility".to_string(),
            ));
        }
        Ok(Self { drift, volatility })
    }

    pub fn annualized_drift(&self) -> f64 {
        self.drift * TRADING_DAYS_PER_YEAR
    }

    pub fn annualized_volatility(&self) -> f64 {
        self.volatility * TRADING_DAYS_PER_YEAR.sqrt()
    }

    fn step_drift(&self) -> f64 {
        self.drift - self.volatility * self.volatility / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl Percentiles {
    /// `sorted` must be ascending and non-empty.
    fn from_sorted(sorted: &[f64]) -> Result<Self, AnalysisError> {
        let at = |q: f64| {
            stats::percentile_sorted(sorted, q).ok_or_else(|| {
                AnalysisError::CalculationError("Percentile of an empty sample".to_string())
            })
        };
        Ok(Self {
            p5: at(0.05)?,
            p10: at(0.10)?,
            p25: at(0.25)?,
            p50: at(0.50)?,
            p75: at(0.75)?,
            p90: at(0.90)?,
            p95: at(0.95)?,
        })
    }
}

/// Price distribution across paths at one forecast step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub step: usize,
    pub date: NaiveDate,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonteCarloOutlook {
    VeryBullish,
    Bullish,
    Neutral,
    Bearish,
    VeryBearish,
}

impl MonteCarloOutlook {
    pub fn from_probability(probability_of_profit: f64) -> Self {
        let pct = probability_of_profit * 100.0;
        if pct > 70.0 {
            MonteCarloOutlook::VeryBullish
        } else if pct > 55.0 {
            MonteCarloOutlook::Bullish
        } else if pct < 30.0 {
            MonteCarloOutlook::VeryBearish
        } else if pct < 45.0 {
            MonteCarloOutlook::Bearish
        } else {
            MonteCarloOutlook::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonteCarloOutlook::VeryBullish => "Very Bullish",
            MonteCarloOutlook::Bullish => "Bullish",
            MonteCarloOutlook::Neutral => "Neutral",
            MonteCarloOutlook::Bearish => "Bearish",
            MonteCarloOutlook::VeryBearish => "Very Bearish",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub num_simulations: usize,
    pub horizon_days: usize,
    pub initial_price: f64,
    pub parameters: GbmParameters,
    pub bands: Vec<PercentileBand>,
    pub terminal: TerminalSummary,
    /// Share of terminal prices strictly above the initial price
    pub probability_of_profit: f64,
    pub probability_up_10: f64,
    pub probability_down_10: f64,
    pub expected_change_pct: f64,
    pub outlook: MonteCarloOutlook,
}

/// Geometric Brownian motion path simulator.
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Simulate `num_simulations` paths of `horizon` steps from `initial_price`.
    ///
    /// One seed per path is drawn from `rng` up front, so results depend only
    /// on the rng state and not on how rayon schedules the batches.
    #[allow(clippy::too_many_arguments)]
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        returns: &[f64],
        initial_price: f64,
        start_date: NaiveDate,
        horizon: usize,
        num_simulations: usize,
        calendar: &dyn TradingCalendar,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutcome, AnalysisError> {
        if !(MIN_SIMULATIONS..=self.config.max_simulations).contains(&num_simulations) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Number of simulations must be within {}..={}, got {}",
                MIN_SIMULATIONS, self.config.max_simulations, num_simulations
            )));
        }
        if horizon == 0 || horizon > self.config.max_horizon {
            return Err(AnalysisError::InvalidParameter(format!(
                "Forecast horizon must be within 1..={} days, got {}",
                self.config.max_horizon, horizon
            )));
        }
        if num_simulations.saturating_mul(horizon) > self.config.max_path_points {
            return Err(AnalysisError::InvalidParameter(format!(
                "{} paths x {} steps exceeds the limit of {} simulated prices",
                num_simulations, horizon, self.config.max_path_points
            )));
        }
        if returns.len() < self.config.min_history {
            return Err(AnalysisError::DataUnavailable(format!(
                "Need at least {} returns for simulation, got {}",
                self.config.min_history,
                returns.len()
            )));
        }
        if !(initial_price.is_finite() && initial_price > 0.0) {
            return Err(AnalysisError::InvalidData(format!(
                "Initial price must be positive, got {}",
                initial_price
            )));
        }

        let parameters = GbmParameters::estimate(returns)?;
        let dates = next_trading_days(calendar, start_date, horizon)?;
        tracing::debug!(
            "Monte Carlo: {} paths x {} steps, mu={:.6}, sigma={:.6}",
            num_simulations,
            horizon,
            parameters.drift,
            parameters.volatility
        );

        let seeds: Vec<u64> = (0..num_simulations).map(|_| rng.next_u64()).collect();
        let batches: Vec<Option<Vec<Vec<f64>>>> = seeds
            .par_chunks(self.config.batch_size)
            .map(|batch| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(
                    batch
                        .iter()
                        .map(|&seed| simulate_path(&parameters, initial_price, horizon, seed))
                        .collect(),
                )
            })
            .collect();
        cancel.check()?;

        let mut paths = Vec::with_capacity(num_simulations);
        for batch in batches {
            paths.extend(batch.ok_or(AnalysisError::Cancelled)?);
        }

        let mut bands = Vec::with_capacity(horizon);
        for (step, date) in dates.into_iter().enumerate() {
            let mut column: Vec<f64> = paths.iter().map(|path| path[step]).collect();
            column.sort_by(|a, b| a.total_cmp(b));
            bands.push(PercentileBand {
                step: step + 1,
                date,
                percentiles: Percentiles::from_sorted(&column)?,
            });
        }

        let mut terminal: Vec<f64> = paths.iter().map(|path| path[horizon - 1]).collect();
        terminal.sort_by(|a, b| a.total_cmp(b));
        let n = terminal.len() as f64;
        let share = |predicate: &dyn Fn(f64) -> bool| terminal.iter().filter(|&&p| predicate(p)).count() as f64 / n;

        let probability_of_profit = share(&|p| p > initial_price);
        let probability_up_10 = share(&|p| p > initial_price * 1.10);
        let probability_down_10 = share(&|p| p < initial_price * 0.90);

        let mean = stats::mean(&terminal)
            .ok_or_else(|| AnalysisError::CalculationError("No terminal prices".to_string()))?;
        let std_dev = stats::std_dev(&terminal).ok_or_else(|| {
            AnalysisError::CalculationError(format!(
                "Terminal dispersion needs at least {} paths, got {}",
                MIN_SIMULATIONS,
                terminal.len()
            ))
        })?;
        let summary = TerminalSummary {
            mean,
            std_dev,
            min: terminal[0],
            max: terminal[terminal.len() - 1],
            percentiles: Percentiles::from_sorted(&terminal)?,
        };

        Ok(SimulationOutcome {
            num_simulations,
            horizon_days: horizon,
            initial_price,
            parameters,
            bands,
            terminal: summary,
            probability_of_profit,
            probability_up_10,
            probability_down_10,
            expected_change_pct: (mean - initial_price) / initial_price * 100.0,
            outlook: MonteCarloOutlook::from_probability(probability_of_profit),
        })
    }
}

fn simulate_path(parameters: &GbmParameters, initial_price: f64, horizon: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let drift = parameters.step_drift();
    let mut price = initial_price;
    let mut path = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let shock: f64 = rng.sample(StandardNormal);
        price *= (drift + parameters.volatility * shock).exp();
        path.push(price);
    }
    path
}
