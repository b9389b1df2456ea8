//! Prompted model call that turns assembled context into a cited answer.

use std::sync::Arc;

use super::types::{GenerationOutcome, ResearchAnswer, DEGRADED_ANSWER};
use crate::core::config::LlmSettings;
use crate::core::errors::GenerationError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, RetryPolicy};
use crate::rag::AssembledContext;

const SYSTEM_PROMPT: &str = "You are a senior legal research assistant. \
Provide accurate, well-cited and academically rigorous legal research based on the context provided. \
Always cite your sources clearly by title and source. Use a professional and formal tone. \
If the context does not contain the answer, you may draw on general legal knowledge, \
but state explicitly which parts come from outside the provided context. \
WARNING: This research is for academic purposes only and does not constitute legal advice.";

pub fn build_user_prompt(query: &str, context: &str) -> String {
    format!("CONTEXT:\n{}\n\nRESEARCH QUESTION: {}", context, query)
}

#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
    retry: RetryPolicy,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        let retry = RetryPolicy::from(&settings.retry);
        Self {
            provider,
            settings,
            retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Never fails: provider errors become a `Degraded` outcome that still
    /// carries the query and the sources.
    pub async fn answer(&self, query: &str, context: AssembledContext) -> ResearchAnswer {
        let outcome = match self.generate(query, context.as_str()).await {
            Ok(text) => GenerationOutcome::Generated { text },
            Err(error) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    model = %self.settings.model,
                    error = %error,
                    "Generation degraded"
                );
                GenerationOutcome::Degraded {
                    message: DEGRADED_ANSWER.to_string(),
                    error,
                }
            }
        };

        ResearchAnswer {
            query: query.to_string(),
            sources: context.sources,
            outcome,
        }
    }

    async fn generate(&self, query: &str, context: &str) -> Result<String, GenerationError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(query, context)),
        ])
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let timeout = self.settings.request_timeout();
        let model = self.settings.model.as_str();

        self.retry
            .execute(|| {
                let request = request.clone();
                async move {
                    match tokio::time::timeout(timeout, self.provider.chat(request, model)).await {
                        Ok(result) => result,
                        Err(_) => Err(GenerationError::Timeout(timeout.as_millis() as u64)),
                    }
                }
            })
            .await
    }
}
