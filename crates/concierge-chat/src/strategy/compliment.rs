use async_trait::async_trait;

use concierge_core::config::PersonaConfig;

use crate::error::ChatError;
use crate::prompts;
use crate::strategy::{PromptRunner, ResponseStrategy, TurnContext};

/// Thanks the customer for positive feedback.
pub struct ComplimentStrategy {
    runner: PromptRunner,
    persona: PersonaConfig,
}

impl ComplimentStrategy {
    pub fn new(runner: PromptRunner, persona: PersonaConfig) -> Self {
        Self { runner, persona }
    }
}

#[async_trait]
impl ResponseStrategy for ComplimentStrategy {
    fn name(&self) -> &'static str {
        "compliment"
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<String, ChatError> {
        self.runner
            .run(prompts::compliment_prompt(&self.persona), ctx.prompt_messages())
            .await
    }
}
