use async_trait::async_trait;

use concierge_core::config::PersonaConfig;

use crate::error::ChatError;
use crate::prompts;
use crate::strategy::{PromptRunner, ResponseStrategy, TurnContext};

/// Politely steers out-of-scope messages back to what the business offers.
pub struct RedirectStrategy {
    runner: PromptRunner,
    persona: PersonaConfig,
}

impl RedirectStrategy {
    pub fn new(runner: PromptRunner, persona: PersonaConfig) -> Self {
        Self { runner, persona }
    }
}

#[async_trait]
impl ResponseStrategy for RedirectStrategy {
    fn name(&self) -> &'static str {
        "redirect"
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<String, ChatError> {
        self.runner
            .run(prompts::redirect_prompt(&self.persona), ctx.prompt_messages())
            .await
    }
}
