//! Free-text insight generation

use crate::prompts::{INSIGHT_SYSTEM_PROMPT, insight_prompt};
use crate::quality::CallOutcome;
use crate::record::RunRecord;
use async_trait::async_trait;
use finagent_llm::{CompletionRequest, LLMProvider, Message};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Produces narrative text (thesis, risks, catalysts) for a run
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, record: &RunRecord) -> CallOutcome<String>;
}

/// Insight generator backed by any [`LLMProvider`]
pub struct LlmInsightGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
}

impl LlmInsightGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
        }
    }
}

#[async_trait]
impl InsightGenerator for LlmInsightGenerator {
    #[instrument(
        skip(self, record),
        fields(identifier = %record.identifier(), provider = %self.provider.name())
    )]
    async fn generate(&self, record: &RunRecord) -> CallOutcome<String> {
        let prompt = match insight_prompt(record) {
            Ok(prompt) => prompt,
            Err(e) => return CallOutcome::Failed(format!("Prompt rendering failed: {e}")),
        };

        let request = CompletionRequest::builder(&self.model)
            .system(INSIGHT_SYSTEM_PROMPT)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .temperature(0.4)
            .build();

        match self.provider.complete(request).await {
            Ok(response) => {
                debug!(tokens = response.usage.total(), "Insights generated");
                let text = response.text();
                if text.trim().is_empty() {
                    CallOutcome::Failed("Empty insight text".to_string())
                } else {
                    CallOutcome::Ok(text.trim().to_string())
                }
            }
            Err(e) => CallOutcome::Failed(e.to_string()),
        }
    }
}
