//! Grounded answers for information requests.
//!
//! Refine the query, retrieve passages, then generate an answer restricted to
//! the retrieved context. When retrieval finds nothing the prompt switches to
//! a no-information variant that forbids inventing facts.

use async_trait::async_trait;
use tracing::debug;

use concierge_core::config::PersonaConfig;

use crate::error::ChatError;
use crate::prompts;
use crate::refiner::QueryRefiner;
use crate::retriever::ContextRetriever;
use crate::strategy::{PromptRunner, ResponseStrategy, TurnContext};

pub struct InformationStrategy {
    runner: PromptRunner,
    refiner: Option<QueryRefiner>,
    retriever: ContextRetriever,
    persona: PersonaConfig,
    top_k: usize,
}

impl InformationStrategy {
    pub fn new(
        runner: PromptRunner,
        refiner: Option<QueryRefiner>,
        retriever: ContextRetriever,
        persona: PersonaConfig,
        top_k: usize,
    ) -> Self {
        Self {
            runner,
            refiner,
            retriever,
            persona,
            top_k,
        }
    }
}

#[async_trait]
impl ResponseStrategy for InformationStrategy {
    fn name(&self) -> &'static str {
        "information"
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<String, ChatError> {
        let search_query = match self.refiner {
            Some(ref refiner) => refiner.refine(ctx.query, ctx.history).await,
            None => ctx.query.to_string(),
        };

        let context = self.retriever.retrieve(&search_query, self.top_k).await;
        let blob = context.blob();
        let grounding = (!context.is_empty()).then_some(blob.as_str());
        debug!(
            conversation_id = %ctx.conversation_id,
            passages = context.passages.len(),
            grounded = grounding.is_some(),
            "Generating grounded answer"
        );

        let prompt = prompts::grounded_prompt(&self.persona, ctx.query, grounding);
        self.runner.run(prompt, ctx.prompt_messages()).await
    }
}
