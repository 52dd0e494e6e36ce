//! LLM-backed quality evaluator

use crate::prompts::{EVALUATOR_SYSTEM_PROMPT, evaluation_prompt};
use crate::quality::{CallOutcome, Evaluator, EvaluatorVerdict};
use crate::record::RunRecord;
use async_trait::async_trait;
use finagent_llm::{CompletionRequest, LLMProvider, Message};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Evaluator that asks an LLM to grade the run and parses its JSON answer
pub struct LlmEvaluator {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl LlmEvaluator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn label(&self) -> String {
        format!("{} ({})", self.provider.name(), self.model)
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    #[instrument(
        skip(self, record),
        fields(identifier = %record.identifier(), model = %self.model)
    )]
    async fn evaluate(&self, record: &RunRecord) -> CallOutcome<EvaluatorVerdict> {
        let prompt = match evaluation_prompt(record) {
            Ok(prompt) => prompt,
            Err(e) => return CallOutcome::Failed(format!("Prompt rendering failed: {e}")),
        };

        let request = CompletionRequest::builder(&self.model)
            .system(EVALUATOR_SYSTEM_PROMPT)
            .add_message(Message::user(prompt))
            .max_tokens(512)
            .temperature(0.0)
            .build();

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => return CallOutcome::Failed(e.to_string()),
        };
        debug!(tokens = response.usage.total(), "Evaluation received");

        let text = response.text();
        match extract_json(&text) {
            Some(value) => CallOutcome::Ok(verdict_from_json(&value, self.label())),
            None => {
                warn!("Evaluator response was not valid JSON");
                CallOutcome::Failed("Failed to parse evaluation response".to_string())
            }
        }
    }
}

/// Pull a JSON object out of model output
///
/// Tries the raw text, then a fenced code block, then the widest `{...}` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    if let Ok(fenced) = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```") {
        if let Some(body) = fenced.captures(text).and_then(|c| c.get(1)) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(body.as_str()) {
                return Some(value);
            }
        }
    }

    if let Ok(braces) = Regex::new(r"(?s)\{.*\}") {
        if let Some(span) = braces.find(text) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(span.as_str()) {
                return Some(value);
            }
        }
    }

    None
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

/// Missing fields take the gate's defaults
fn verdict_from_json(value: &Value, evaluator: String) -> EvaluatorVerdict {
    EvaluatorVerdict {
        quality_score: value
            .get("quality_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.5),
        needs_improvement: value
            .get("needs_improvement")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        improvement_areas: string_list(value, "improvement_areas"),
        strengths: string_list(value, "strengths"),
        explanation: value
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        evaluator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finagent_llm::{CompletionResponse, StopReason, TokenUsage};

    struct CannedProvider(String);

    #[async_trait]
    impl LLMProvider for CannedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> finagent_llm::Result<CompletionResponse> {
            assert!(request.system.is_some());
            Ok(CompletionResponse {
                message: Message::assistant(self.0.clone()),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"quality_score": 0.9}"#).unwrap();
        assert_eq!(value["quality_score"], 0.9);
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here you go:\n```json\n{\"needs_improvement\": true}\n```\nThanks";
        let value = extract_json(text).unwrap();
        assert_eq!(value["needs_improvement"], true);
    }

    #[test]
    fn test_extract_embedded_json() {
        let text = "Result -> {\"quality_score\": 0.3, \"improvement_areas\": [\"depth\"]} end";
        let value = extract_json(text).unwrap();
        assert_eq!(value["improvement_areas"][0], "depth");
    }

    #[test]
    fn test_extract_rejects_garbage() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("[1, 2, 3]").is_none());
        assert!(extract_json("{not: valid}").is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let verdict = verdict_from_json(&serde_json::json!({}), "x".to_string());
        assert!((verdict.quality_score - 0.5).abs() < f64::EPSILON);
        assert!(!verdict.needs_improvement);
        assert!(verdict.improvement_areas.is_empty());
        assert!(verdict.explanation.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_parses_fenced_response() {
        let reply = "```json\n{\"quality_score\": 0.62, \"needs_improvement\": true, \
                     \"improvement_areas\": [\"sector context\", \"peer comparison\"], \
                     \"strengths\": [\"clear metrics\"], \"explanation\": \"thin sector data\"}\n```";
        let evaluator = LlmEvaluator::new(Arc::new(CannedProvider(reply.to_string())), "gpt-test");
        let record = RunRecord::new("AAPL", None).unwrap();

        let CallOutcome::Ok(verdict) = evaluator.evaluate(&record).await else {
            panic!("expected a verdict");
        };
        assert!((verdict.quality_score - 0.62).abs() < 1e-9);
        assert!(verdict.needs_improvement);
        assert_eq!(verdict.improvement_areas, ["sector context", "peer comparison"]);
        assert_eq!(verdict.evaluator, "canned (gpt-test)");
    }

    #[tokio::test]
    async fn test_evaluate_unparseable_is_failure() {
        let evaluator = LlmEvaluator::new(Arc::new(CannedProvider("looks good!".to_string())), "m");
        let record = RunRecord::new("AAPL", None).unwrap();

        assert_eq!(
            evaluator.evaluate(&record).await,
            CallOutcome::Failed("Failed to parse evaluation response".to_string())
        );
    }
}
