//! Greeting replies.

use async_trait::async_trait;

use concierge_core::config::PersonaConfig;
use concierge_core::types::Role;

use crate::error::ChatError;
use crate::prompts;
use crate::strategy::{PromptRunner, ResponseStrategy, TurnContext};

/// Returns the greeting, introducing the assistant only on first contact.
pub struct GreetingStrategy {
    runner: PromptRunner,
    persona: PersonaConfig,
}

impl GreetingStrategy {
    pub fn new(runner: PromptRunner, persona: PersonaConfig) -> Self {
        Self { runner, persona }
    }
}

#[async_trait]
impl ResponseStrategy for GreetingStrategy {
    fn name(&self) -> &'static str {
        "greeting"
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<String, ChatError> {
        let introduced = ctx.history.iter().any(|t| t.role == Role::Assistant);
        let prompt = prompts::greeting_prompt(&self.persona, ctx.customer_name(), introduced);
        self.runner.run(prompt, ctx.prompt_messages()).await
    }
}
