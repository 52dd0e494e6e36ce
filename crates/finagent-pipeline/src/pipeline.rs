//! Pipeline orchestrator
//!
//! Drives one [`RunRecord`] through the stage machine:
//!
//! ```text
//! Initialized → MarketData → Technical → Quantitative → Sentiment → Sector
//!   → Forecast → Synthesis → Recommendation → Evaluation → [Improvement] → Done
//! ```
//!
//! Producer failures are recorded on the record and the run continues.
//! Anything else that goes wrong (an illegal transition, a slot written twice,
//! a panicking collaborator) aborts the run and surfaces as an [`ErrorReport`].

use crate::config::{ConfigStatus, ExecutionMode, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::evaluator::LlmEvaluator;
use crate::insights::{InsightGenerator, LlmInsightGenerator};
use crate::producers::{Producer, ProducerRequest, Producers};
use crate::quality::{Evaluator, QualityGate, Transition, improve};
use crate::recommendation::RecommendationEngine;
use crate::record::{Domain, DomainResult, RunRecord, Stage};
use crate::synthesis::synthesize;
use chrono::{DateTime, Utc};
use finagent_llm::LLMProvider;
use finagent_llm::providers::{AnthropicProvider, OpenAIConfig, OpenAIProvider};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{info, instrument, warn};

/// Returned instead of a record when a run aborts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub identifier: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(identifier: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of analyzing one identifier
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Report(Box<RunRecord>),
    Failed(ErrorReport),
}

impl AnalysisOutcome {
    pub fn record(&self) -> Option<&RunRecord> {
        match self {
            AnalysisOutcome::Report(record) => Some(record),
            AnalysisOutcome::Failed(_) => None,
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, AnalysisOutcome::Report(_))
    }
}

/// Outcomes of a batch request, keyed by normalized identifier
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total_analyzed: usize,
    pub results: BTreeMap<String, AnalysisOutcome>,
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    producers: Option<Producers>,
    evaluator: Option<Arc<dyn Evaluator>>,
    insights: Option<Arc<dyn InsightGenerator>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            producers: None,
            evaluator: None,
            insights: None,
        }
    }

    /// Replace the live producers
    pub fn producers(mut self, producers: Producers) -> Self {
        self.producers = Some(producers);
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn insight_generator(mut self, insights: Arc<dyn InsightGenerator>) -> Self {
        self.insights = Some(insights);
        self
    }

    /// Build the pipeline, falling back to live producers when none were given
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let timeout = self.config.collaborator_timeout;
        let producers = self
            .producers
            .unwrap_or_else(|| Producers::live(&self.config));

        let gate = QualityGate::new(self.evaluator, timeout);
        if !gate.is_enabled() {
            warn!("No evaluator configured, quality gate will use default results");
        }

        Ok(Pipeline {
            producers,
            engine: RecommendationEngine::new(self.insights, timeout),
            gate,
            config: Arc::new(self.config),
        })
    }
}

/// Instrument analysis pipeline
///
/// Cheap to clone; clones share producers, collaborators and configuration.
#[derive(Clone)]
pub struct Pipeline {
    producers: Producers,
    engine: RecommendationEngine,
    gate: QualityGate,
    config: Arc<PipelineConfig>,
}

fn configured(key: Option<&String>) -> Option<&str> {
    key.map(|k| k.trim()).filter(|k| !k.is_empty())
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Live pipeline with LLM collaborators wired from the configured keys
    ///
    /// The evaluator needs an OpenAI-compatible key. Insights prefer
    /// Anthropic and fall back to the OpenAI-compatible provider.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let timeout = config.collaborator_timeout;

        let openai: Option<Arc<dyn LLMProvider>> =
            match configured(config.openai_api_key.as_ref()) {
                Some(key) => {
                    let mut openai_config =
                        OpenAIConfig::new(key).with_timeout(timeout.as_secs().max(1));
                    if let Some(base) = &config.openai_api_base {
                        openai_config = openai_config.with_api_base(base.as_str());
                    }
                    let provider = OpenAIProvider::with_config(openai_config)?;
                    Some(Arc::new(provider) as Arc<dyn LLMProvider>)
                }
                None => None,
            };

        let insights: Option<Arc<dyn InsightGenerator>> =
            match configured(config.anthropic_api_key.as_ref()) {
                Some(key) => {
                    let provider = AnthropicProvider::with_timeout(key, timeout)?;
                    Some(Arc::new(LlmInsightGenerator::new(
                        Arc::new(provider),
                        config.insight_model.as_str(),
                    )) as Arc<dyn InsightGenerator>)
                }
                None => openai.as_ref().map(|provider| {
                    Arc::new(LlmInsightGenerator::new(
                        Arc::clone(provider),
                        config.evaluator_model.as_str(),
                    )) as Arc<dyn InsightGenerator>
                }),
            };

        let evaluator = openai.map(|provider| {
            Arc::new(LlmEvaluator::new(provider, config.evaluator_model.as_str()))
                as Arc<dyn Evaluator>
        });

        let mut builder = PipelineBuilder::new(config);
        if let Some(evaluator) = evaluator {
            builder = builder.evaluator(evaluator);
        }
        if let Some(insights) = insights {
            builder = builder.insight_generator(insights);
        }
        builder.build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn config_status(&self) -> ConfigStatus {
        self.config.config_status()
    }

    /// Run the full stage machine for one identifier
    #[instrument(skip_all, fields(identifier = %identifier.trim(), run_id = tracing::field::Empty))]
    pub async fn run(&self, identifier: &str, display_name: Option<&str>) -> Result<RunRecord> {
        let record = RunRecord::new(identifier, display_name)?;
        tracing::Span::current().record("run_id", tracing::field::display(record.run_id()));
        info!(mode = ?self.config.execution_mode, "Starting analysis");

        let request = ProducerRequest::new(
            record.identifier(),
            Some(record.display_name().to_string()),
        );

        let record = match self.config.execution_mode {
            ExecutionMode::Sequential => self.produce_sequential(record, &request).await?,
            ExecutionMode::Concurrent => self.produce_concurrent(record, &request).await?,
        };
        let record = self.synthesis_stage(record)?;
        let record = self.recommendation_stage(record).await?;
        let (record, transition) = self.evaluation_stage(record).await?;
        let mut record = self.improvement_stage(record, transition)?;
        record.finish()?;

        info!(
            errors = record.errors().len(),
            duration_seconds = record.duration_seconds().unwrap_or_default(),
            "Analysis complete"
        );
        Ok(record)
    }

    /// Run one identifier on its own task; any fault becomes an error report
    pub async fn analyze(&self, identifier: &str, display_name: Option<&str>) -> AnalysisOutcome {
        let pipeline = self.clone();
        let owned_identifier = identifier.trim().to_string();
        let owned_name = display_name.map(str::to_string);

        let joined = tokio::spawn(async move {
            pipeline
                .run(&owned_identifier, owned_name.as_deref())
                .await
        })
        .await;

        to_outcome(identifier.trim(), joined)
    }

    /// Analyze several identifiers, each on its own task
    ///
    /// The size limit applies to the list as given. Identifiers are then
    /// trimmed and upper-cased; blanks are dropped and duplicates share one
    /// entry. A fault in one run never aborts the rest.
    pub async fn analyze_batch(&self, identifiers: &[String]) -> Result<BatchReport> {
        if identifiers.len() > self.config.max_batch_size {
            return Err(PipelineError::BatchTooLarge {
                max: self.config.max_batch_size,
                actual: identifiers.len(),
            });
        }
        let normalized = normalize_batch(identifiers);
        if normalized.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }

        info!(count = normalized.len(), "Starting batch analysis");

        let handles: Vec<_> = normalized
            .iter()
            .map(|identifier| {
                let pipeline = self.clone();
                let identifier = identifier.clone();
                tokio::spawn(async move { pipeline.run(&identifier, None).await })
            })
            .collect();
        let joined = futures::future::join_all(handles).await;

        let results: BTreeMap<String, AnalysisOutcome> = normalized
            .into_iter()
            .zip(joined)
            .map(|(identifier, joined)| {
                let outcome = to_outcome(&identifier, joined);
                (identifier, outcome)
            })
            .collect();

        Ok(BatchReport {
            total_analyzed: results.len(),
            results,
        })
    }

    async fn bounded<T: Send>(
        &self,
        domain: Domain,
        producer: &dyn Producer<T>,
        request: &ProducerRequest,
    ) -> DomainResult<T> {
        let timeout = self.config.producer_timeout;
        let result = match tokio::time::timeout(timeout, producer.analyze(request)).await {
            Ok(result) => result,
            Err(_) => DomainResult::failure(format!("timed out after {timeout:?}")),
        };

        match result.error() {
            Some(error) => warn!(stage = %domain.stage(), %error, "{} failed", domain),
            None => info!(stage = %domain.stage(), "{} complete", domain),
        }
        result
    }

    async fn produce_sequential(
        &self,
        mut record: RunRecord,
        request: &ProducerRequest,
    ) -> Result<RunRecord> {
        let producers = &self.producers;

        record.advance(Stage::MarketData)?;
        let result = self
            .bounded(Domain::MarketData, producers.market_data.as_ref(), request)
            .await;
        record.set_market_data(result)?;

        record.advance(Stage::Technical)?;
        let result = self
            .bounded(Domain::Technical, producers.technical.as_ref(), request)
            .await;
        record.set_technical(result)?;

        record.advance(Stage::Quantitative)?;
        let result = self
            .bounded(Domain::Quantitative, producers.quantitative.as_ref(), request)
            .await;
        record.set_quantitative(result)?;

        record.advance(Stage::Sentiment)?;
        let result = self
            .bounded(Domain::Sentiment, producers.sentiment.as_ref(), request)
            .await;
        record.set_sentiment(result)?;

        record.advance(Stage::Sector)?;
        let result = self
            .bounded(Domain::Sector, producers.sector.as_ref(), request)
            .await;
        record.set_sector(result)?;

        record.advance(Stage::Forecast)?;
        let result = self
            .bounded(Domain::Forecast, producers.forecast.as_ref(), request)
            .await;
        record.set_forecast(result)?;

        Ok(record)
    }

    /// All producers at once; results are applied in stage order
    async fn produce_concurrent(
        &self,
        mut record: RunRecord,
        request: &ProducerRequest,
    ) -> Result<RunRecord> {
        let producers = &self.producers;

        let (market_data, technical, quantitative, sentiment, sector, forecast) = tokio::join!(
            self.bounded(Domain::MarketData, producers.market_data.as_ref(), request),
            self.bounded(Domain::Technical, producers.technical.as_ref(), request),
            self.bounded(Domain::Quantitative, producers.quantitative.as_ref(), request),
            self.bounded(Domain::Sentiment, producers.sentiment.as_ref(), request),
            self.bounded(Domain::Sector, producers.sector.as_ref(), request),
            self.bounded(Domain::Forecast, producers.forecast.as_ref(), request),
        );

        record.advance(Stage::MarketData)?;
        record.set_market_data(market_data)?;
        record.advance(Stage::Technical)?;
        record.set_technical(technical)?;
        record.advance(Stage::Quantitative)?;
        record.set_quantitative(quantitative)?;
        record.advance(Stage::Sentiment)?;
        record.set_sentiment(sentiment)?;
        record.advance(Stage::Sector)?;
        record.set_sector(sector)?;
        record.advance(Stage::Forecast)?;
        record.set_forecast(forecast)?;

        Ok(record)
    }

    fn synthesis_stage(&self, mut record: RunRecord) -> Result<RunRecord> {
        record.advance(Stage::Synthesis)?;
        let card = synthesize(&record);
        info!(
            fundamental = card.fundamental,
            technical = card.technical,
            sentiment = card.sentiment,
            forecast = card.forecast,
            "Synthesis complete"
        );
        record.set_synthesis(card)?;
        Ok(record)
    }

    async fn recommendation_stage(&self, mut record: RunRecord) -> Result<RunRecord> {
        record.advance(Stage::Recommendation)?;
        let recommendation = self.engine.recommend(&record).await?;
        info!(
            class = %recommendation.class,
            score = recommendation.overall_score,
            risk = %recommendation.risk_level,
            "Recommendation ready"
        );
        record.set_recommendation(recommendation)?;
        Ok(record)
    }

    async fn evaluation_stage(&self, mut record: RunRecord) -> Result<(RunRecord, Transition)> {
        record.advance(Stage::Evaluation)?;
        let evaluation = self.gate.evaluate(&record).await;
        let transition = QualityGate::transition(&evaluation);
        info!(
            quality_score = evaluation.quality_score,
            needs_improvement = evaluation.needs_improvement,
            available = evaluation.available,
            "Quality gate evaluated"
        );
        record.set_evaluation(evaluation)?;
        Ok((record, transition))
    }

    fn improvement_stage(
        &self,
        mut record: RunRecord,
        transition: Transition,
    ) -> Result<RunRecord> {
        record.advance(transition.next_stage())?;
        match transition {
            Transition::Complete => Ok(record),
            Transition::NeedsImprovement(areas) => {
                let mut record = improve(record, areas)?;
                record.advance(Stage::Done)?;
                Ok(record)
            }
        }
    }
}

fn normalize_batch(identifiers: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let identifier = identifier.trim().to_uppercase();
        if !identifier.is_empty() && !normalized.contains(&identifier) {
            normalized.push(identifier);
        }
    }
    normalized
}

fn to_outcome(
    identifier: &str,
    joined: std::result::Result<Result<RunRecord>, JoinError>,
) -> AnalysisOutcome {
    match joined {
        Ok(Ok(record)) => AnalysisOutcome::Report(Box::new(record)),
        Ok(Err(e)) => {
            warn!(identifier, error = %e, "Analysis aborted");
            AnalysisOutcome::Failed(ErrorReport::new(identifier, e.to_string()))
        }
        Err(e) => {
            let error = PipelineError::TaskFailed(e.to_string());
            warn!(identifier, error = %error, "Analysis task failed");
            AnalysisOutcome::Failed(ErrorReport::new(identifier, error.to_string()))
        }
    }
}
