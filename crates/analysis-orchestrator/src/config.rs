use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use quant_analysis::{AlignmentConfig, CorrelationConfig, ForecastConfig, MonteCarloConfig, SelectorConfig};
use sentiment_analysis::NewsFilterConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub selector: SelectorConfig,
    pub forecast: ForecastConfig,
    pub correlation: CorrelationConfig,
    pub monte_carlo: MonteCarloConfig,

    /// News preparation for the sentiment entry point
    pub sentiment_news: NewsFilterConfig,
    /// News preparation for the correlation entry point (larger sample)
    pub correlation_news: NewsFilterConfig,
    /// Sentiment/return join used by the correlation entry point
    pub correlation_alignment: AlignmentConfig,

    /// Extra headline search term per symbol, e.g. TSLA -> Tesla
    pub company_terms: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            selector: SelectorConfig::default(),
            forecast: ForecastConfig::default(),
            correlation: CorrelationConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            sentiment_news: NewsFilterConfig::default(),
            correlation_news: NewsFilterConfig {
                news_limit: 500,
                ..NewsFilterConfig::default()
            },
            // Bridges Friday news to Monday's return
            correlation_alignment: AlignmentConfig { max_fill_days: 3 },
            company_terms: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load from `ENGINE_*` environment variables (after `.env`), falling back to defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = Self {
            selector: SelectorConfig {
                max_p: parse(&get, "ENGINE_ARIMA_MAX_P", defaults.selector.max_p)?,
                max_d: parse(&get, "ENGINE_ARIMA_MAX_D", defaults.selector.max_d)?,
                max_q: parse(&get, "ENGINE_ARIMA_MAX_Q", defaults.selector.max_q)?,
                min_history: parse(&get, "ENGINE_MIN_HISTORY", defaults.selector.min_history)?,
            },
            forecast: ForecastConfig {
                trend_window: parse(&get, "ENGINE_TREND_WINDOW", defaults.forecast.trend_window)?,
                trend_weight_cap: parse(&get, "ENGINE_TREND_WEIGHT_CAP", defaults.forecast.trend_weight_cap)?,
                trend_horizon_days: parse(
                    &get,
                    "ENGINE_TREND_HORIZON_DAYS",
                    defaults.forecast.trend_horizon_days,
                )?,
                default_confidence: parse(&get, "ENGINE_CONFIDENCE_LEVEL", defaults.forecast.default_confidence)?,
            },
            correlation: CorrelationConfig {
                min_samples: parse(&get, "ENGINE_CORRELATION_MIN_SAMPLES", defaults.correlation.min_samples)?,
                max_lag: parse(&get, "ENGINE_CORRELATION_MAX_LAG", defaults.correlation.max_lag)?,
            },
            monte_carlo: MonteCarloConfig {
                batch_size: parse(&get, "ENGINE_MC_BATCH_SIZE", defaults.monte_carlo.batch_size)?,
                min_history: parse(&get, "ENGINE_MIN_HISTORY", defaults.monte_carlo.min_history)?,
                max_simulations: parse(&get, "ENGINE_MC_MAX_SIMULATIONS", defaults.monte_carlo.max_simulations)?,
                max_horizon: parse(&get, "ENGINE_MC_MAX_HORIZON", defaults.monte_carlo.max_horizon)?,
                max_path_points: parse(&get, "ENGINE_MC_MAX_PATH_POINTS", defaults.monte_carlo.max_path_points)?,
            },
            sentiment_news: NewsFilterConfig {
                news_limit: parse(&get, "ENGINE_SENTIMENT_NEWS_LIMIT", defaults.sentiment_news.news_limit)?,
                ..defaults.sentiment_news.clone()
            },
            correlation_news: NewsFilterConfig {
                news_limit: parse(&get, "ENGINE_CORRELATION_NEWS_LIMIT", defaults.correlation_news.news_limit)?,
                ..defaults.correlation_news.clone()
            },
            correlation_alignment: AlignmentConfig {
                max_fill_days: parse(
                    &get,
                    "ENGINE_SENTIMENT_FILL_DAYS",
                    defaults.correlation_alignment.max_fill_days,
                )?,
            },
            company_terms: match lookup("ENGINE_COMPANY_TERMS") {
                Some(raw) => parse_company_terms(&raw)?,
                None => defaults.company_terms,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.selector.validate().context("Invalid ARIMA selector config")?;
        self.forecast.validate().context("Invalid forecast config")?;
        self.correlation.validate().context("Invalid correlation config")?;
        self.monte_carlo.validate().context("Invalid Monte Carlo config")?;
        self.sentiment_news.validate().context("Invalid sentiment news config")?;
        self.correlation_news.validate().context("Invalid correlation news config")?;
        self.correlation_alignment.validate().context("Invalid alignment config")?;
        Ok(())
    }

    pub fn company_term(&self, symbol: &str) -> Option<&str> {
        self.company_terms.get(symbol).map(String::as_str)
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str, String) -> String,
{
    get(key, default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("{} is not a valid value", key))
}

/// `TSLA=Tesla,AAPL=Apple` -> {TSLA: Tesla, AAPL: Apple}
fn parse_company_terms(raw: &str) -> Result<HashMap<String, String>> {
    let mut terms = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (symbol, term) = entry
            .split_once('=')
            .with_context(|| format!("ENGINE_COMPANY_TERMS entry '{}' is not SYMBOL=term", entry))?;
        terms.insert(symbol.trim().to_uppercase(), term.trim().to_string());
    }
    Ok(terms)
}
