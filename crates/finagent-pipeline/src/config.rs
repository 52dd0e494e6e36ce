//! Configuration for pipeline runs

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on identifiers per batch request
pub const MAX_BATCH_SIZE: usize = 10;

/// How the six producer stages are driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One producer after another, in stage order
    #[default]
    Sequential,
    /// All producers at once, results applied in stage order
    Concurrent,
}

/// Configuration for the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How producers are scheduled
    pub execution_mode: ExecutionMode,

    /// Upper bound on a single producer call
    pub producer_timeout: Duration,

    /// Upper bound on an evaluator or insight call
    pub collaborator_timeout: Duration,

    /// Days projected by the forecast producer
    pub forecast_periods: usize,

    /// Identifiers accepted per batch request
    pub max_batch_size: usize,

    /// Lifetime of cached price histories
    pub history_cache_ttl: Duration,

    /// Alpha Vantage API key (optional)
    #[serde(skip_serializing)]
    pub alpha_vantage_api_key: Option<String>,

    /// Alpha Vantage requests per minute
    pub alpha_vantage_rate_limit: u32,

    /// OpenAI-compatible API key used by the evaluator
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible base URL override
    pub openai_api_base: Option<String>,

    /// Anthropic API key used by the insight generator
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,

    /// Model name for the quality evaluator
    pub evaluator_model: String,

    /// Model name for the insight generator
    pub insight_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Sequential,
            producer_timeout: Duration::from_secs(60),
            collaborator_timeout: Duration::from_secs(60),
            forecast_periods: 30,
            max_batch_size: MAX_BATCH_SIZE,
            history_cache_ttl: Duration::from_secs(300), // 5 minutes
            alpha_vantage_api_key: None,
            alpha_vantage_rate_limit: 5,
            openai_api_key: None,
            openai_api_base: None,
            anthropic_api_key: None,
            evaluator_model: "gpt-4o-mini".to_string(),
            insight_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }
}

/// Which external services are configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigStatus {
    pub alpha_vantage: bool,
    pub openai: bool,
    pub anthropic: bool,
    pub execution_mode: ExecutionMode,
    pub evaluator_model: String,
    pub insight_model: String,
}

impl ConfigStatus {
    /// Whether the quality gate can reach an evaluator
    pub fn evaluator_available(&self) -> bool {
        self.openai
    }

    /// Whether insight text can be generated
    pub fn insights_available(&self) -> bool {
        self.anthropic || self.openai
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.producer_timeout.is_zero() {
            return Err(PipelineError::Config(
                "producer_timeout must be greater than 0".to_string(),
            ));
        }

        if self.collaborator_timeout.is_zero() {
            return Err(PipelineError::Config(
                "collaborator_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(PipelineError::Config(format!(
                "max_batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }

        if self.forecast_periods == 0 {
            return Err(PipelineError::Config(
                "forecast_periods must be greater than 0".to_string(),
            ));
        }

        if self.alpha_vantage_rate_limit == 0 {
            return Err(PipelineError::Config(
                "alpha_vantage_rate_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Report which keys are configured, without exposing them
    pub fn config_status(&self) -> ConfigStatus {
        ConfigStatus {
            alpha_vantage: has_key(self.alpha_vantage_api_key.as_deref()),
            openai: has_key(self.openai_api_key.as_deref()),
            anthropic: has_key(self.anthropic_api_key.as_deref()),
            execution_mode: self.execution_mode,
            evaluator_model: self.evaluator_model.clone(),
            insight_model: self.insight_model.clone(),
        }
    }
}

fn has_key(key: Option<&str>) -> bool {
    key.is_some_and(|k| !k.trim().is_empty())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    execution_mode: Option<ExecutionMode>,
    producer_timeout: Option<Duration>,
    collaborator_timeout: Option<Duration>,
    forecast_periods: Option<usize>,
    max_batch_size: Option<usize>,
    history_cache_ttl: Option<Duration>,
    alpha_vantage_api_key: Option<String>,
    alpha_vantage_rate_limit: Option<u32>,
    openai_api_key: Option<String>,
    openai_api_base: Option<String>,
    anthropic_api_key: Option<String>,
    evaluator_model: Option<String>,
    insight_model: Option<String>,
}

impl PipelineConfigBuilder {
    /// Set the execution mode
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    /// Set the producer timeout
    pub fn producer_timeout(mut self, duration: Duration) -> Self {
        self.producer_timeout = Some(duration);
        self
    }

    /// Set the evaluator/insight timeout
    pub fn collaborator_timeout(mut self, duration: Duration) -> Self {
        self.collaborator_timeout = Some(duration);
        self
    }

    /// Set the forecast horizon in days
    pub fn forecast_periods(mut self, periods: usize) -> Self {
        self.forecast_periods = Some(periods);
        self
    }

    /// Set the batch size limit
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    /// Set the price history cache TTL
    pub fn history_cache_ttl(mut self, duration: Duration) -> Self {
        self.history_cache_ttl = Some(duration);
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set Alpha Vantage requests per minute
    pub fn alpha_vantage_rate_limit(mut self, per_minute: u32) -> Self {
        self.alpha_vantage_rate_limit = Some(per_minute);
        self
    }

    /// Set OpenAI-compatible API key
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Set OpenAI-compatible base URL
    pub fn openai_api_base(mut self, base: impl Into<String>) -> Self {
        self.openai_api_base = Some(base.into());
        self
    }

    /// Set Anthropic API key
    pub fn anthropic_api_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(key.into());
        self
    }

    /// Set the evaluator model
    pub fn evaluator_model(mut self, model: impl Into<String>) -> Self {
        self.evaluator_model = Some(model.into());
        self
    }

    /// Set the insight model
    pub fn insight_model(mut self, model: impl Into<String>) -> Self {
        self.insight_model = Some(model.into());
        self
    }

    /// Load API keys and model overrides from the environment
    ///
    /// Reads `ALPHA_VANTAGE_API_KEY` (or `ALPHA_VANTAGE_KEY`), `OPENAI_API_KEY`,
    /// `OPENAI_API_BASE`, `ANTHROPIC_API_KEY`, `FINAGENT_EVALUATOR_MODEL` and
    /// `FINAGENT_INSIGHT_MODEL`.
    pub fn with_env_keys(mut self) -> Self {
        if let Some(key) =
            env_non_empty("ALPHA_VANTAGE_API_KEY").or_else(|| env_non_empty("ALPHA_VANTAGE_KEY"))
        {
            self.alpha_vantage_api_key = Some(key);
        }
        if let Some(key) = env_non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(base) = env_non_empty("OPENAI_API_BASE") {
            self.openai_api_base = Some(base);
        }
        if let Some(key) = env_non_empty("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(key);
        }
        if let Some(model) = env_non_empty("FINAGENT_EVALUATOR_MODEL") {
            self.evaluator_model = Some(model);
        }
        if let Some(model) = env_non_empty("FINAGENT_INSIGHT_MODEL") {
            self.insight_model = Some(model);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let config = PipelineConfig {
            execution_mode: self.execution_mode.unwrap_or(defaults.execution_mode),
            producer_timeout: self.producer_timeout.unwrap_or(defaults.producer_timeout),
            collaborator_timeout: self
                .collaborator_timeout
                .unwrap_or(defaults.collaborator_timeout),
            forecast_periods: self.forecast_periods.unwrap_or(defaults.forecast_periods),
            max_batch_size: self.max_batch_size.unwrap_or(defaults.max_batch_size),
            history_cache_ttl: self.history_cache_ttl.unwrap_or(defaults.history_cache_ttl),
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            alpha_vantage_rate_limit: self
                .alpha_vantage_rate_limit
                .unwrap_or(defaults.alpha_vantage_rate_limit),
            openai_api_key: self.openai_api_key,
            openai_api_base: self.openai_api_base,
            anthropic_api_key: self.anthropic_api_key,
            evaluator_model: self.evaluator_model.unwrap_or(defaults.evaluator_model),
            insight_model: self.insight_model.unwrap_or(defaults.insight_model),
        };

        config.validate()?;
        Ok(config)
    }
}
