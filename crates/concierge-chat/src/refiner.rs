//! Query refinement ahead of retrieval.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use concierge_core::capability::TextGenerator;
use concierge_core::config::ConciergeConfig;
use concierge_core::error::CapabilityError;
use concierge_core::types::{CompletionRequest, PromptMessage, ResponseFormat, Role, Turn};

use crate::deadline::with_deadline;
use crate::prompts;

/// Rewrites a customer message into a standalone, retrieval-friendly query.
///
/// Refinement is best-effort: any failure returns the original query.
pub struct QueryRefiner {
    generator: Arc<dyn TextGenerator>,
    model: String,
    language: String,
    timeout: Duration,
}

impl QueryRefiner {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &ConciergeConfig) -> Self {
        Self {
            generator,
            model: config.models.chat.clone(),
            language: config.retrieval.refine_language.clone(),
            timeout: config.timeouts.refine(),
        }
    }

    pub async fn refine(&self, query: &str, history: &[Turn]) -> String {
        match self.try_refine(query, history).await {
            Ok(refined) => {
                debug!(original = %query, refined = %refined, "Query refined");
                refined
            }
            Err(e) => {
                warn!(error = %e, "Query refinement failed, using original query");
                query.to_string()
            }
        }
    }

    async fn try_refine(&self, query: &str, history: &[Turn]) -> Result<String, CapabilityError> {
        let mut messages: Vec<PromptMessage> = history.iter().map(PromptMessage::from).collect();
        messages.push(PromptMessage {
            role: Role::User,
            content: query.to_string(),
        });
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: prompts::refinement_prompt(&self.language),
            messages,
            temperature: 0.0,
            response_format: ResponseFormat::Text,
        };

        let raw = with_deadline("refiner", self.timeout, self.generator.complete(&request)).await?;
        let refined = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if refined.is_empty() {
            return Err(CapabilityError::Malformed("empty refined query".into()));
        }
        Ok(refined.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::mock::MockTextGenerator;

    fn refiner(generator: MockTextGenerator) -> QueryRefiner {
        QueryRefiner::new(Arc::new(generator), &ConciergeConfig::default())
    }

    #[tokio::test]
    async fn test_refine_strips_quotes() {
        let generator = MockTextGenerator::with_reply("  \"precio del scooter X2\"\n");
        let refined = refiner(generator).refine("how much is the X2?", &[]).await;
        assert_eq!(refined, "precio del scooter X2");
    }

    #[tokio::test]
    async fn test_refine_falls_back_to_original() {
        let failing = MockTextGenerator::failing(CapabilityError::RateLimited);
        assert_eq!(refiner(failing).refine("¿horario?", &[]).await, "¿horario?");

        let blank = MockTextGenerator::with_reply("  \"\" ");
        assert_eq!(refiner(blank).refine("¿horario?", &[]).await, "¿horario?");
    }

    #[tokio::test]
    async fn test_refine_sends_history_and_language() {
        let generator = MockTextGenerator::with_reply("autonomía del X2");
        let refiner = refiner(generator.clone());
        let history = vec![Turn::user("me interesa el X2"), Turn::assistant("¡Buena elección!")];
        refiner.refine("¿y cuánto dura la batería?", &history).await;

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 3);
        assert!(requests[0].system_prompt.contains("Spanish"));
        assert_eq!(requests[0].last_user_message(), Some("¿y cuánto dura la batería?"));
    }
}
