//! Quality gate and improvement stage

use crate::error::Result;
use crate::record::{EvaluationResult, RunRecord, Stage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of calling an optional external collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// The collaborator answered
    Ok(T),
    /// No collaborator is configured
    Unavailable,
    /// The call was attempted and failed
    Failed(String),
}

impl<T> CallOutcome<T> {
    /// Map an error-returning call onto an outcome
    pub fn from_result<E: std::fmt::Display>(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// What an evaluator says about a run
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorVerdict {
    pub quality_score: f64,
    pub needs_improvement: bool,
    pub improvement_areas: Vec<String>,
    pub strengths: Vec<String>,
    pub explanation: String,
    /// Name reported back in `EvaluationResult::evaluator`
    pub evaluator: String,
}

/// External judge of analysis quality
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, record: &RunRecord) -> CallOutcome<EvaluatorVerdict>;
}

/// Branch taken after evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Complete,
    NeedsImprovement(Vec<String>),
}

impl Transition {
    pub fn next_stage(&self) -> Stage {
        match self {
            Transition::Complete => Stage::Done,
            Transition::NeedsImprovement(_) => Stage::Improvement,
        }
    }
}

/// Wraps an optional evaluator with a timeout and default fallback
#[derive(Clone)]
pub struct QualityGate {
    evaluator: Option<Arc<dyn Evaluator>>,
    timeout: Duration,
}

impl QualityGate {
    pub fn new(evaluator: Option<Arc<dyn Evaluator>>, timeout: Duration) -> Self {
        Self { evaluator, timeout }
    }

    pub fn is_enabled(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Ask the evaluator about `record`, falling back to defaults
    pub async fn evaluate(&self, record: &RunRecord) -> EvaluationResult {
        let outcome = match &self.evaluator {
            None => CallOutcome::Unavailable,
            Some(evaluator) => {
                match tokio::time::timeout(self.timeout, evaluator.evaluate(record)).await {
                    Ok(outcome) => outcome,
                    Err(_) => CallOutcome::Failed(format!(
                        "Evaluator timed out after {:?}",
                        self.timeout
                    )),
                }
            }
        };

        to_evaluation(outcome)
    }

    /// Branch selected by an evaluation result
    pub fn transition(evaluation: &EvaluationResult) -> Transition {
        if evaluation.needs_improvement {
            Transition::NeedsImprovement(evaluation.improvement_areas.clone())
        } else {
            Transition::Complete
        }
    }
}

fn to_evaluation(outcome: CallOutcome<EvaluatorVerdict>) -> EvaluationResult {
    match outcome {
        CallOutcome::Ok(verdict) => EvaluationResult {
            quality_score: clamp_score(verdict.quality_score),
            needs_improvement: verdict.needs_improvement,
            improvement_areas: verdict.improvement_areas,
            strengths: verdict.strengths,
            explanation: verdict.explanation,
            available: true,
            evaluator: Some(verdict.evaluator),
            error: None,
        },
        CallOutcome::Unavailable => EvaluationResult {
            explanation: "Evaluator not configured".to_string(),
            ..EvaluationResult::default()
        },
        CallOutcome::Failed(reason) => {
            warn!(error = %reason, "Evaluation failed, using default result");
            EvaluationResult {
                error: Some(reason),
                ..EvaluationResult::default()
            }
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Annotate the recommendation with the areas flagged by the gate
///
/// Recomputes nothing and calls no producer.
pub fn improve(mut record: RunRecord, areas: Vec<String>) -> Result<RunRecord> {
    info!(
        identifier = %record.identifier(),
        areas = areas.len(),
        "Applying improvements"
    );
    for area in &areas {
        info!("  - {}", area);
    }
    record.mark_improved(areas)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(score: f64, needs_improvement: bool, areas: &[&str]) -> EvaluatorVerdict {
        EvaluatorVerdict {
            quality_score: score,
            needs_improvement,
            improvement_areas: areas.iter().map(ToString::to_string).collect(),
            strengths: vec!["comprehensive data".to_string()],
            explanation: "ok".to_string(),
            evaluator: "mock".to_string(),
        }
    }

    fn record() -> RunRecord {
        RunRecord::new("AAPL", None).unwrap()
    }

    #[tokio::test]
    async fn test_no_evaluator_gives_default() {
        let gate = QualityGate::new(None, Duration::from_secs(60));
        let result = gate.evaluate(&record()).await;

        assert!((result.quality_score - 0.5).abs() < f64::EPSILON);
        assert!(!result.needs_improvement);
        assert!(result.improvement_areas.is_empty());
        assert!(!result.available);
        assert_eq!(QualityGate::transition(&result), Transition::Complete);
    }

    #[tokio::test]
    async fn test_evaluator_verdict_is_used() {
        let mut evaluator = MockEvaluator::new();
        evaluator
            .expect_evaluate()
            .times(1)
            .returning(|_| CallOutcome::Ok(verdict(0.4, true, &["depth", "sources"])));

        let gate = QualityGate::new(Some(Arc::new(evaluator)), Duration::from_secs(5));
        let result = gate.evaluate(&record()).await;

        assert!(result.available);
        assert_eq!(result.evaluator.as_deref(), Some("mock"));
        assert_eq!(
            QualityGate::transition(&result),
            Transition::NeedsImprovement(vec!["depth".to_string(), "sources".to_string()])
        );
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_clamped() {
        let mut evaluator = MockEvaluator::new();
        evaluator
            .expect_evaluate()
            .returning(|_| CallOutcome::Ok(verdict(8.5, false, &[])));

        let gate = QualityGate::new(Some(Arc::new(evaluator)), Duration::from_secs(5));
        let result = gate.evaluate(&record()).await;
        assert!((result.quality_score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failed_evaluator_falls_back() {
        let mut evaluator = MockEvaluator::new();
        evaluator
            .expect_evaluate()
            .returning(|_| CallOutcome::Failed("bad json".to_string()));

        let gate = QualityGate::new(Some(Arc::new(evaluator)), Duration::from_secs(5));
        let result = gate.evaluate(&record()).await;

        assert!((result.quality_score - 0.5).abs() < f64::EPSILON);
        assert!(!result.needs_improvement);
        assert_eq!(result.error.as_deref(), Some("bad json"));
    }

    struct SlowEvaluator;

    #[async_trait]
    impl Evaluator for SlowEvaluator {
        async fn evaluate(&self, _record: &RunRecord) -> CallOutcome<EvaluatorVerdict> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            CallOutcome::Unavailable
        }
    }

    #[tokio::test]
    async fn test_evaluator_timeout_falls_back() {
        let gate = QualityGate::new(Some(Arc::new(SlowEvaluator)), Duration::from_millis(50));
        let result = gate.evaluate(&record()).await;

        assert!(!result.needs_improvement);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[test]
    fn test_transition_stages() {
        assert_eq!(Transition::Complete.next_stage(), Stage::Done);
        assert_eq!(
            Transition::NeedsImprovement(Vec::new()).next_stage(),
            Stage::Improvement
        );
    }
}
