//! Error types for the analysis pipeline

use crate::record::Stage;
use thiserror::Error;

/// Faults that abort a run or reject a request before it starts
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Identifier was empty after trimming
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Stage machine was asked to move along an edge it does not have
    #[error("Illegal stage transition: {from} -> {to}")]
    IllegalTransition { from: Stage, to: Stage },

    /// A slot was written while the record was in another stage
    #[error("Slot '{slot}' written during stage {stage}")]
    OutOfStage { slot: &'static str, stage: Stage },

    /// Write-once slot written a second time
    #[error("Slot '{0}' already written")]
    SlotAlreadyWritten(&'static str),

    /// A stage needed a slot that an earlier stage should have filled
    #[error("Slot '{0}' missing")]
    MissingSlot(&'static str),

    /// Batch request had no identifiers
    #[error("Identifier list cannot be empty")]
    EmptyBatch,

    /// Batch request exceeded the configured size
    #[error("Maximum {max} identifiers allowed per batch, got {actual}")]
    BatchTooLarge { max: usize, actual: usize },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator panicked or its task was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// LLM client construction failed
    #[error("LLM error: {0}")]
    Llm(#[from] finagent_llm::LLMError),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures inside the data adapters
///
/// These never cross a producer boundary: producers turn them into
/// [`DomainResult::Failure`](crate::DomainResult::Failure) markers.
#[derive(Debug, Error)]
pub enum DataError {
    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    Yahoo(String),

    /// Alpha Vantage API error
    #[error("Alpha Vantage error: {0}")]
    AlphaVantage(String),

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Required API key is absent
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),

    /// Not enough observations for the computation
    #[error("{0}")]
    InsufficientData(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    Indicator(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
