//! Instrument analysis pipeline
//!
//! One identifier fans out to six producers (market data, technical,
//! quantitative, sentiment, sector, forecast). Their results land in a
//! [`RunRecord`], which is then scored by the synthesis engine, turned into
//! a [`Recommendation`], and checked by a quality gate that may route the
//! record through an annotation-only improvement stage.
//!
//! ```no_run
//! use finagent_pipeline::{AnalysisOutcome, Pipeline, PipelineConfig};
//!
//! # async fn run() -> Result<(), finagent_pipeline::PipelineError> {
//! let config = PipelineConfig::builder().with_env_keys().build()?;
//! let pipeline = Pipeline::from_config(config)?;
//!
//! match pipeline.analyze("AAPL", None).await {
//!     AnalysisOutcome::Report(record) => println!("{:?}", record.recommendation()),
//!     AnalysisOutcome::Failed(report) => eprintln!("{}", report.error),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod insights;
pub mod pipeline;
pub mod producers;
pub mod prompts;
pub mod quality;
pub mod recommendation;
pub mod record;
pub mod synthesis;
pub mod validation;

pub use config::{ConfigStatus, ExecutionMode, PipelineConfig, PipelineConfigBuilder};
pub use error::{DataError, PipelineError, Result};
pub use evaluator::LlmEvaluator;
pub use insights::{InsightGenerator, LlmInsightGenerator};
pub use pipeline::{AnalysisOutcome, BatchReport, ErrorReport, Pipeline, PipelineBuilder};
pub use producers::{Producer, ProducerRequest, Producers};
pub use quality::{CallOutcome, Evaluator, EvaluatorVerdict, QualityGate, Transition};
pub use recommendation::RecommendationEngine;
pub use record::{
    ComponentScores, Domain, DomainResult, EvaluationResult, ForecastData, InvestmentHorizon,
    MarketData, QuantitativeData, Recommendation, RecommendationClass, RiskLevel, RunRecord,
    Scorecard, SectorData, SentimentData, SentimentLabel, Stage, TechnicalData, Trend,
    VolatilityRisk,
};
pub use validation::{SymbolValidation, SymbolValidator};
