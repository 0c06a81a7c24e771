//! Human handoff for service requests and complaints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use concierge_core::capability::HandoffNotifier;
use concierge_core::config::PersonaConfig;
use concierge_core::types::HandoffEvent;

use crate::deadline::with_deadline;
use crate::error::ChatError;
use crate::prompts;
use crate::strategy::{PromptRunner, ResponseStrategy, TurnContext};

/// Acknowledges the customer and flags the conversation for a human agent.
///
/// The notification is fire-and-forget: it runs on its own task and its
/// outcome never affects the answer. When the acknowledgement cannot be
/// generated, a canned one is sent instead so the customer still gets the
/// handoff phone.
pub struct HandoffStrategy {
    runner: PromptRunner,
    persona: PersonaConfig,
    fallback: String,
    notifier: Option<Arc<dyn HandoffNotifier>>,
    notify_timeout: Duration,
}

impl HandoffStrategy {
    pub fn new(
        runner: PromptRunner,
        persona: PersonaConfig,
        fallback: impl Into<String>,
        notifier: Option<Arc<dyn HandoffNotifier>>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            persona,
            fallback: fallback.into(),
            notifier,
            notify_timeout,
        }
    }

    fn dispatch(&self, ctx: &TurnContext<'_>) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let event = HandoffEvent {
            conversation_id: ctx.conversation_id.to_string(),
            caller: ctx.caller.to_string(),
            intent: ctx.intent,
            query: ctx.query.to_string(),
            created_at: Utc::now(),
        };
        let timeout = self.notify_timeout;

        tokio::spawn(async move {
            match with_deadline("handoff notifier", timeout, notifier.notify(&event)).await {
                Ok(()) => info!(
                    conversation_id = %event.conversation_id,
                    intent = %event.intent,
                    "Conversation handed off to a human agent"
                ),
                Err(e) => warn!(
                    conversation_id = %event.conversation_id,
                    error = %e,
                    "Handoff notification failed"
                ),
            }
        });
    }
}

/// Append the handoff phone when the generated answer left it out.
fn with_contact(answer: String, phone: &str) -> String {
    let phone = phone.trim();
    if phone.is_empty() || answer.contains(phone) {
        return answer;
    }
    format!("{}\n\n📞 {}", answer, phone)
}

#[async_trait]
impl ResponseStrategy for HandoffStrategy {
    fn name(&self) -> &'static str {
        "handoff"
    }

    async fn respond(&self, ctx: &TurnContext<'_>) -> Result<String, ChatError> {
        self.dispatch(ctx);
        let answer = match self
            .runner
            .run(prompts::handoff_prompt(&self.persona, ctx.intent), ctx.prompt_messages())
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(
                    conversation_id = %ctx.conversation_id,
                    error = %e,
                    "Handoff reply generation failed, sending canned acknowledgement"
                );
                self.fallback.clone()
            }
        };
        Ok(with_contact(answer, &self.persona.handoff_phone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use concierge_core::config::FallbackConfig;
    use concierge_core::error::CapabilityError;
    use concierge_core::mock::{MockTextGenerator, RecordingNotifier};
    use concierge_core::types::IntentLabel;

    use crate::strategy::test_support::ctx;

    fn strategy(generator: &MockTextGenerator, notifier: &RecordingNotifier) -> HandoffStrategy {
        let runner = PromptRunner::new(Arc::new(generator.clone()), "chat", 0.7, Duration::from_secs(1));
        HandoffStrategy::new(
            runner,
            PersonaConfig::default(),
            FallbackConfig::default().handoff,
            Some(Arc::new(notifier.clone())),
            Duration::from_secs(1),
        )
    }

    async fn wait_for_events(notifier: &RecordingNotifier) -> Vec<HandoffEvent> {
        for _ in 0..100 {
            let events = notifier.events();
            if !events.is_empty() {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        notifier.events()
    }

    #[tokio::test]
    async fn test_complaint_notifies_and_acknowledges() {
        let generator = MockTextGenerator::with_reply("Lamento lo ocurrido, te contactará un agente.");
        let notifier = RecordingNotifier::new();
        let answer = strategy(&generator, &notifier)
            .respond(&ctx("mi scooter llegó roto", IntentLabel::Complaint, &[]))
            .await
            .unwrap();
        assert!(answer.contains("agente"));
        assert!(answer.ends_with("+56 9 5008 0442"));

        let events = wait_for_events(&notifier).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].intent, IntentLabel::Complaint);
        assert_eq!(events[0].conversation_id, "conv-1");
        assert_eq!(events[0].query, "mi scooter llegó roto");

        let prompt = &generator.requests()[0].system_prompt;
        assert!(prompt.contains("+56 9 5008 0442"));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_affect_answer() {
        let generator = MockTextGenerator::with_reply("Te derivo con un agente.");
        let notifier = RecordingNotifier::failing(CapabilityError::Unavailable("crm down".into()));
        let answer = strategy(&generator, &notifier)
            .respond(&ctx("quiero comprar", IntentLabel::ServiceRequest, &[]))
            .await
            .unwrap();
        assert!(answer.starts_with("Te derivo con un agente."));
        assert_eq!(wait_for_events(&notifier).await.len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_sends_canned_acknowledgement() {
        let generator = MockTextGenerator::failing(CapabilityError::Timeout {
            capability: "text generator",
            elapsed: Duration::from_secs(1),
        });
        let notifier = RecordingNotifier::new();
        let answer = strategy(&generator, &notifier)
            .respond(&ctx("mi scooter llegó roto", IntentLabel::Complaint, &[]))
            .await
            .unwrap();
        assert!(answer.starts_with(&FallbackConfig::default().handoff));
        assert!(answer.ends_with("📞 +56 9 5008 0442"));
        assert_eq!(wait_for_events(&notifier).await.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_notifier_is_cut_off() {
        let generator = MockTextGenerator::with_reply("Te derivo con un agente.");
        let notifier = RecordingNotifier::new().with_delay(Duration::from_secs(5));
        let runner = PromptRunner::new(Arc::new(generator), "chat", 0.7, Duration::from_secs(1));
        let strategy = HandoffStrategy::new(
            runner,
            PersonaConfig::default(),
            FallbackConfig::default().handoff,
            Some(Arc::new(notifier.clone())),
            Duration::from_millis(20),
        );

        let answer = strategy
            .respond(&ctx("quiero comprar", IntentLabel::ServiceRequest, &[]))
            .await
            .unwrap();
        assert!(answer.starts_with("Te derivo con un agente."));

        // The delivery never completes once its deadline has passed.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(notifier.events().is_empty());
    }

    #[test]
    fn test_with_contact_keeps_existing_phone() {
        let answer = with_contact("Llámanos al +56 9 5008 0442".into(), "+56 9 5008 0442");
        assert_eq!(answer, "Llámanos al +56 9 5008 0442");
        assert_eq!(with_contact("Hola".into(), "  "), "Hola");
    }

    #[tokio::test]
    async fn test_without_notifier() {
        let generator = MockTextGenerator::with_reply("Te derivo con un agente.");
        let runner = PromptRunner::new(Arc::new(generator), "chat", 0.7, Duration::from_secs(1));
        let strategy = HandoffStrategy::new(
            runner,
            PersonaConfig::default(),
            "Te conecto con un asesor.",
            None,
            Duration::from_secs(1),
        );
        assert!(strategy
            .respond(&ctx("quiero hablar con alguien", IntentLabel::ServiceRequest, &[]))
            .await
            .is_ok());
    }
}
