//! Response strategies and the registry dispatching labels to them.
//!
//! Each intent label maps to one [`ResponseStrategy`]. The registry always
//! resolves: a label without a registered strategy falls back to the
//! strategy registered for [`IntentLabel::Other`].

pub mod compliment;
pub mod greeting;
pub mod handoff;
pub mod information;
pub mod redirect;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use concierge_core::capability::{HandoffNotifier, TextGenerator};
use concierge_core::config::ConciergeConfig;
use concierge_core::error::CapabilityError;
use concierge_core::types::{
    CompletionRequest, IntentLabel, PromptMessage, ResponseFormat, Role, Turn, UserProfile,
};

use crate::deadline::with_deadline;
use crate::error::ChatError;
use crate::refiner::QueryRefiner;
use crate::retriever::ContextRetriever;

pub use compliment::ComplimentStrategy;
pub use greeting::GreetingStrategy;
pub use handoff::HandoffStrategy;
pub use information::InformationStrategy;
pub use redirect::RedirectStrategy;

/// Everything a strategy knows about the turn being answered.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub conversation_id: &'a str,
    pub caller: &'a str,
    pub query: &'a str,
    pub intent: IntentLabel,
    /// Prior turns only; the current query is not included.
    pub history: &'a [Turn],
    pub profile: Option<&'a UserProfile>,
}

impl TurnContext<'_> {
    /// Prior turns followed by the current query, as prompt messages.
    pub fn prompt_messages(&self) -> Vec<PromptMessage> {
        let mut messages: Vec<PromptMessage> = self.history.iter().map(PromptMessage::from).collect();
        messages.push(PromptMessage {
            role: Role::User,
            content: self.query.to_string(),
        });
        messages
    }

    /// Non-blank customer name from the directory profile.
    pub fn customer_name(&self) -> Option<&str> {
        self.profile
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty())
    }
}

/// Produces the answer for one intent label.
#[async_trait]
pub trait ResponseStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Generate the answer text for the turn.
    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<String, ChatError>;
}

/// Thin wrapper running one system prompt against the text generator.
#[derive(Clone)]
pub struct PromptRunner {
    generator: Arc<dyn TextGenerator>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl PromptRunner {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            model: model.into(),
            temperature,
            timeout,
        }
    }

    /// Complete `messages` under `system_prompt`. Blank output is malformed.
    pub async fn run(
        &self,
        system_prompt: String,
        messages: Vec<PromptMessage>,
    ) -> Result<String, ChatError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt,
            messages,
            temperature: self.temperature,
            response_format: ResponseFormat::Text,
        };
        let raw = with_deadline("text generator", self.timeout, self.generator.complete(&request)).await?;
        let answer = raw.trim();
        if answer.is_empty() {
            return Err(CapabilityError::Malformed("empty generated answer".into()).into());
        }
        Ok(answer.to_string())
    }
}

/// Intent label → strategy dispatch table.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<IntentLabel, Arc<dyn ResponseStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default wiring: greetings, grounded information answers, human
    /// handoff for service requests and complaints, compliments, and a
    /// redirect for everything else.
    pub fn standard(
        config: &ConciergeConfig,
        generator: Arc<dyn TextGenerator>,
        retriever: ContextRetriever,
        notifier: Option<Arc<dyn HandoffNotifier>>,
    ) -> Self {
        let chat = PromptRunner::new(
            generator.clone(),
            config.models.chat.clone(),
            config.models.temperature,
            config.timeouts.generate(),
        );
        let grounded = PromptRunner::new(
            generator.clone(),
            config.models.grounded.clone(),
            config.models.temperature,
            config.timeouts.generate(),
        );
        let refiner = config
            .retrieval
            .refine_query
            .then(|| QueryRefiner::new(generator, config));

        let handoff: Arc<dyn ResponseStrategy> = Arc::new(HandoffStrategy::new(
            chat.clone(),
            config.persona.clone(),
            config.fallbacks.handoff.clone(),
            notifier,
            config.timeouts.notify(),
        ));

        let mut registry = Self::new();
        registry.register(
            IntentLabel::Greeting,
            Arc::new(GreetingStrategy::new(chat.clone(), config.persona.clone())),
        );
        registry.register(
            IntentLabel::Information,
            Arc::new(InformationStrategy::new(
                grounded,
                refiner,
                retriever,
                config.persona.clone(),
                config.retrieval.top_k,
            )),
        );
        for label in IntentLabel::ALL.into_iter().filter(IntentLabel::requires_handoff) {
            registry.register(label, handoff.clone());
        }
        registry.register(
            IntentLabel::Compliment,
            Arc::new(ComplimentStrategy::new(chat.clone(), config.persona.clone())),
        );
        registry.register(
            IntentLabel::Other,
            Arc::new(RedirectStrategy::new(chat, config.persona.clone())),
        );
        registry
    }

    /// Register (or replace) the strategy for `label`.
    pub fn register(&mut self, label: IntentLabel, strategy: Arc<dyn ResponseStrategy>) {
        self.strategies.insert(label, strategy);
    }

    pub fn get(&self, label: IntentLabel) -> Option<Arc<dyn ResponseStrategy>> {
        self.strategies.get(&label).cloned()
    }

    /// Strategy for `label`, else the one for `other`.
    pub fn resolve(&self, label: IntentLabel) -> Option<Arc<dyn ResponseStrategy>> {
        self.get(label).or_else(|| self.get(IntentLabel::Other))
    }

    /// Labels with a registered strategy, in label order.
    pub fn labels(&self) -> Vec<IntentLabel> {
        IntentLabel::ALL
            .iter()
            .copied()
            .filter(|l| self.strategies.contains_key(l))
            .collect()
    }
}
