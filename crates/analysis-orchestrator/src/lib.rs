//! Request/response entry points over injected price, news and calendar providers.
//!
//! Each call fetches what it needs, runs the engines from `sentiment-analysis`
//! and `quant-analysis`, and returns a fully populated result or an
//! [`AnalysisError`]. Nothing is cached between calls.

use std::sync::Arc;

use analysis_core::{
    normalize_symbol, AlignedPair, AnalysisError, AnalysisPeriod, CancellationToken, NewsProvider,
    PolarityScorer, PriceBar, PriceHistoryProvider, ReturnSeries, SentimentPoint, Timeframe,
    TradingCalendar, MIN_PRICE_BARS,
};
use chrono::NaiveDate;
use quant_analysis::{
    ArimaCandidate, ArimaModelSelector, ArimaOrder, CorrelationAnalyzer, CorrelationResult,
    ForecastGenerator, GbmParameters, MonteCarloSimulator, PriceForecast, SimulationOutcome,
    MIN_SIMULATIONS,
    StationarityReport, StationarityTester, TimeSeriesAligner,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sentiment_analysis::{NewsFilter, PriceChange, ScoredNews, SentimentScorer, SentimentSummary};
use serde::{Deserialize, Serialize};

pub mod config;
pub use config::EngineConfig;


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub symbol: String,
    pub period: AnalysisPeriod,
    /// Daily mean polarity, ascending by date
    pub series: Vec<SentimentPoint>,
    /// Scored items, newest first
    pub items: Vec<ScoredNews>,
    pub summary: SentimentSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub symbol: String,
    pub period: AnalysisPeriod,
    pub result: CorrelationResult,
    pub aligned: Vec<AlignedPair>,
    pub news_count: usize,
    pub sentiment_days: usize,
    pub return_days: usize,
    /// Aligned pairs whose sentiment was carried forward from an earlier day
    pub filled_pairs: usize,
    /// Close-to-close move over the fetched history
    pub price_change: Option<PriceChange>,
    /// Mean sentiment over the aligned pairs
    pub average_sentiment: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastAnalysis {
    pub symbol: String,
    pub history_period: AnalysisPeriod,
    pub order: ArimaOrder,
    pub constant: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    pub aic: f64,
    pub candidates: Vec<ArimaCandidate>,
    /// Absent when the series could not be tested
    pub stationarity: Option<StationarityReport>,
    pub forecast: PriceForecast,
    pub history_len: usize,
    pub annualized_drift: f64,
    pub annualized_volatility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloAnalysis {
    pub symbol: String,
    pub history_period: AnalysisPeriod,
    pub seed: u64,
    pub history_len: usize,
    pub outcome: SimulationOutcome,
}

pub struct AnalysisOrchestrator {
    prices: Arc<dyn PriceHistoryProvider>,
    news: Arc<dyn NewsProvider>,
    calendar: Arc<dyn TradingCalendar>,
    config: EngineConfig,
    scorer: SentimentScorer,
    sentiment_filter: NewsFilter,
    correlation_filter: NewsFilter,
    aligner: TimeSeriesAligner,
    correlation_analyzer: CorrelationAnalyzer,
    stationarity_tester: StationarityTester,
    selector: ArimaModelSelector,
    forecaster: ForecastGenerator,
    simulator: MonteCarloSimulator,
}

impl AnalysisOrchestrator {
    pub fn new(
        prices: Arc<dyn PriceHistoryProvider>,
        news: Arc<dyn NewsProvider>,
        calendar: Arc<dyn TradingCalendar>,
        config: EngineConfig,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            prices,
            news,
            calendar,
            scorer: SentimentScorer::new(),
            sentiment_filter: NewsFilter::new(config.sentiment_news.clone())?,
            correlation_filter: NewsFilter::new(config.correlation_news.clone())?,
            aligner: TimeSeriesAligner::new(config.correlation_alignment.clone())?,
            correlation_analyzer: CorrelationAnalyzer::new(config.correlation.clone())?,
            stationarity_tester: StationarityTester::new(),
            selector: ArimaModelSelector::new(config.selector.clone())?,
            forecaster: ForecastGenerator::new(config.forecast.clone())?,
            simulator: MonteCarloSimulator::new(config.monte_carlo.clone())?,
            config,
        })
    }

    /// Replace the default lexicon scorer
    pub fn with_scorer(mut self, scorer: Arc<dyn PolarityScorer>) -> Self {
        self.scorer = SentimentScorer::with_scorer(scorer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Daily sentiment series and summary statistics for `symbol`'s news.
    ///
    /// The price change over the period is attached when the provider has
    /// enough history; its absence is not an error.
    pub async fn analyze_sentiment(
        &self,
        symbol: &str,
        period: AnalysisPeriod,
    ) -> Result<SentimentAnalysis, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        tracing::info!("Analyzing sentiment for {} over {}", symbol, period);

        let raw = self.news.news(&symbol, period).await?;
        let prepared = self
            .sentiment_filter
            .prepare(&raw, &symbol, self.config.company_term(&symbol));
        let items = self.scorer.score_items(&prepared.items);
        let series = self.scorer.daily_series(&items);

        let price_change = match self.fetch_bars(&symbol, period).await {
            Ok(bars) => PriceChange::from_bars(&bars),
            Err(AnalysisError::DataUnavailable(reason)) => {
                tracing::debug!("No price context for {}: {}", symbol, reason);
                None
            }
            Err(e) => return Err(e),
        };

        let summary = self
            .scorer
            .summarize(&items, &series, prepared.sources, price_change);

        Ok(SentimentAnalysis {
            symbol,
            period,
            series,
            items,
            summary,
        })
    }

    /// Lagged correlation between daily news sentiment and daily returns.
    ///
    /// `max_lag` defaults to the configured search range.
    pub async fn analyze_correlation(
        &self,
        symbol: &str,
        period: AnalysisPeriod,
        max_lag: Option<usize>,
    ) -> Result<CorrelationAnalysis, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        tracing::info!("Analyzing sentiment/return correlation for {} over {}", symbol, period);

        let (raw, bars) = tokio::try_join!(self.news.news(&symbol, period), self.fetch_bars(&symbol, period))?;

        let prepared = self
            .correlation_filter
            .prepare(&raw, &symbol, self.config.company_term(&symbol));
        let sentiment = self.scorer.score_daily(&prepared.items);
        let returns = ReturnSeries::from_bars(&bars)?;
        let aligned = self.aligner.align(&sentiment, &returns)?;

        let max_lag = max_lag.unwrap_or(self.config.correlation.max_lag);
        let result = self.correlation_analyzer.analyze_with_max_lag(&aligned, max_lag)?;

        let aligned_sentiment: Vec<f64> = aligned.iter().map(|p| p.sentiment_value).collect();
        let average_sentiment = analysis_core::stats::mean(&aligned_sentiment);

        Ok(CorrelationAnalysis {
            symbol,
            period,
            news_count: prepared.items.len(),
            sentiment_days: sentiment.len(),
            return_days: returns.len(),
            filled_pairs: aligned.iter().filter(|p| p.is_filled()).count(),
            price_change: PriceChange::from_bars(&bars),
            average_sentiment,
            result,
            aligned,
        })
    }

    /// ARIMA price forecast; `confidence` defaults to the configured level.
    pub async fn analyze_forecast(
        &self,
        symbol: &str,
        history_period: AnalysisPeriod,
        forecast_days: usize,
        confidence: Option<f64>,
    ) -> Result<ForecastAnalysis, AnalysisError> {
        self.analyze_forecast_with_cancel(
            symbol,
            history_period,
            forecast_days,
            confidence,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn analyze_forecast_with_cancel(
        &self,
        symbol: &str,
        history_period: AnalysisPeriod,
        forecast_days: usize,
        confidence: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<ForecastAnalysis, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        if forecast_days == 0 {
            return Err(AnalysisError::InvalidParameter(
                "Forecast days must be positive".to_string(),
            ));
        }
        let confidence = confidence.unwrap_or(self.config.forecast.default_confidence);
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Confidence level must be within (0, 1), got {}",
                confidence
            )));
        }
        tracing::info!(
            "Forecasting {} for {} days from {} of history",
            symbol,
            forecast_days,
            history_period
        );

        let bars = self.fetch_bars(&symbol, history_period).await?;
        let (last_price, last_date) = last_close(&bars)?;
        let returns = ReturnSeries::from_bars(&bars)?.values();

        let stationarity = match self.stationarity_tester.test(&returns) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::debug!("Skipping stationarity test for {}: {}", symbol, e);
                None
            }
        };

        let selection = self.selector.select(&returns, stationarity.as_ref(), cancel)?;
        let model = selection.model;
        let forecast = self.forecaster.generate(
            &model,
            last_price,
            last_date,
            forecast_days,
            confidence,
            self.calendar.as_ref(),
        )?;
        let parameters = GbmParameters::estimate(&returns)?;

        Ok(ForecastAnalysis {
            symbol,
            history_period,
            order: model.order,
            constant: model.constant,
            ar: model.ar,
            ma: model.ma,
            sigma2: model.sigma2,
            aic: model.aic,
            candidates: selection.candidates,
            stationarity,
            forecast,
            history_len: returns.len(),
            annualized_drift: parameters.annualized_drift(),
            annualized_volatility: parameters.annualized_volatility(),
        })
    }

    /// GBM simulation from the last close, reproducible for a given `seed`.
    pub async fn analyze_monte_carlo(
        &self,
        symbol: &str,
        history_period: AnalysisPeriod,
        forecast_days: usize,
        num_simulations: usize,
        seed: u64,
    ) -> Result<MonteCarloAnalysis, AnalysisError> {
        self.analyze_monte_carlo_with_cancel(
            symbol,
            history_period,
            forecast_days,
            num_simulations,
            seed,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn analyze_monte_carlo_with_cancel(
        &self,
        symbol: &str,
        history_period: AnalysisPeriod,
        forecast_days: usize,
        num_simulations: usize,
        seed: u64,
        cancel: &CancellationToken,
    ) -> Result<MonteCarloAnalysis, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        if forecast_days == 0 {
            return Err(AnalysisError::InvalidParameter(
                "Forecast days must be positive".to_string(),
            ));
        }
        let max_simulations = self.config.monte_carlo.max_simulations;
        if !(MIN_SIMULATIONS..=max_simulations).contains(&num_simulations) {
            return Err(AnalysisError::InvalidParameter(format!(
                "Number of simulations must be within {}..={}, got {}",
                MIN_SIMULATIONS, max_simulations, num_simulations
            )));
        }
        tracing::info!(
            "Running {} Monte Carlo paths for {} over {} days (seed {})",
            num_simulations,
            symbol,
            forecast_days,
            seed
        );

        let bars = self.fetch_bars(&symbol, history_period).await?;
        let (last_price, last_date) = last_close(&bars)?;
        let returns = ReturnSeries::from_bars(&bars)?.values();

        let mut rng = StdRng::seed_from_u64(seed);
        let outcome = self.simulator.simulate(
            &returns,
            last_price,
            last_date,
            forecast_days,
            num_simulations,
            self.calendar.as_ref(),
            &mut rng,
            cancel,
        )?;

        Ok(MonteCarloAnalysis {
            symbol,
            history_period,
            seed,
            history_len: returns.len(),
            outcome,
        })
    }

    /// Daily bars, holding the provider to its minimum-history contract.
    async fn fetch_bars(&self, symbol: &str, period: AnalysisPeriod) -> Result<Vec<PriceBar>, AnalysisError> {
        let bars = self.prices.price_history(symbol, period, Timeframe::Day1).await?;
        if bars.len() < MIN_PRICE_BARS {
            return Err(AnalysisError::DataUnavailable(format!(
                "{} has {} bars over {}, need at least {}",
                symbol,
                bars.len(),
                period,
                MIN_PRICE_BARS
            )));
        }
        Ok(bars)
    }
}

fn last_close(bars: &[PriceBar]) -> Result<(f64, NaiveDate), AnalysisError> {
    bars.last()
        .map(|bar| (bar.close, bar.date))
        .ok_or_else(|| AnalysisError::DataUnavailable("No price bars".to_string()))
}
