//! End-to-end tests for the routing engine.
//!
//! Every test wires a fresh orchestrator from the in-process capabilities in
//! `concierge_core::mock`, so no network or model is involved.

use std::sync::Arc;
use std::time::Duration;

use concierge_chat::{ChatError, ChatOrchestrator};
use concierge_core::config::ConciergeConfig;
use concierge_core::error::CapabilityError;
use concierge_core::mock::{MockCorpus, MockTextGenerator, RecordingNotifier};
use concierge_core::types::{
    CompletionRequest, HandoffEvent, IncomingMessage, IntentLabel, ResponseFormat, Role,
};
use concierge_storage::{Database, SqliteHistory};

// =============================================================================
// Helpers
// =============================================================================

const CALLER: &str = "+56911111111";

fn is_classification(req: &CompletionRequest) -> bool {
    matches!(req.response_format, ResponseFormat::JsonSchema { .. })
}

/// Keyword classifier plus a generator that answers from the grounding context.
fn storefront_generator() -> MockTextGenerator {
    MockTextGenerator::from_fn(|req| {
        let query = req.last_user_message().unwrap_or_default().to_lowercase();
        if is_classification(req) {
            let intent = if query.starts_with("hola") {
                "greeting"
            } else if query.contains("cuesta") || query.contains("horario") {
                "information"
            } else if query.contains("roto") {
                "complaint"
            } else if query.contains("comprar") {
                "service_request"
            } else {
                "other"
            };
            return Ok(format!(r#"{{"intent":"{}","confidence":0.95}}"#, intent));
        }
        if req.system_prompt.contains("knowledge base") {
            // Refinement: pass the query through unchanged.
            return Ok(req.last_user_message().unwrap_or_default().to_string());
        }
        if let Some(start) = req.system_prompt.find("[context]\n") {
            let rest = &req.system_prompt[start + "[context]\n".len()..];
            let context = rest.split("\n[/context]").next().unwrap_or_default();
            return Ok(format!("Según nuestro catálogo: {}", context));
        }
        Ok("¡Hola! Soy Rodrigo de EcoDrive 😊".to_string())
    })
}

fn orchestrator_with(corpus: MockCorpus) -> ChatOrchestrator {
    ChatOrchestrator::builder(
        ConciergeConfig::default(),
        Arc::new(storefront_generator()),
        Arc::new(corpus),
    )
    .build()
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

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_greeting_without_history() {
    let orch = orchestrator_with(MockCorpus::empty());
    let result = orch.process_message(IncomingMessage::new("Hola!", CALLER)).await.unwrap();

    assert_eq!(result.intent, IntentLabel::Greeting);
    assert!(!result.answer.trim().is_empty());
    assert!(!result.conversation_id.is_empty());
}

#[tokio::test]
async fn test_information_answer_is_grounded() {
    let orch = orchestrator_with(MockCorpus::with_passages(&["El modelo X2 cuesta $299.990 CLP"]));
    let result = orch
        .process_message(IncomingMessage::new("¿Cuánto cuesta el modelo X2?", CALLER))
        .await
        .unwrap();

    assert_eq!(result.intent, IntentLabel::Information);
    assert!(result.answer.contains("299.990"));
}

#[tokio::test]
async fn test_empty_context_does_not_assert_facts() {
    // Echo stub: reports whether the grounded prompt had any context.
    let generator = MockTextGenerator::from_fn(|req| {
        if is_classification(req) {
            return Ok(r#"{"intent":"information"}"#.to_string());
        }
        if req.system_prompt.contains("[no information available]") {
            Ok("CONTEXT_EMPTY".to_string())
        } else {
            Ok("CONTEXT_PRESENT".to_string())
        }
    });
    let mut config = ConciergeConfig::default();
    config.retrieval.refine_query = false;
    let orch = ChatOrchestrator::builder(config, Arc::new(generator), Arc::new(MockCorpus::empty()))
        .build();

    let result = orch
        .process_message(IncomingMessage::new("¿Cuánto cuesta el modelo X9?", CALLER))
        .await
        .unwrap();
    assert_eq!(result.intent, IntentLabel::Information);
    assert_eq!(result.answer, "CONTEXT_EMPTY");
}

#[tokio::test]
async fn test_generator_failure_still_answers() {
    let generator = MockTextGenerator::failing(CapabilityError::Timeout {
        capability: "text generator",
        elapsed: Duration::from_secs(60),
    });
    let orch = ChatOrchestrator::builder(
        ConciergeConfig::default(),
        Arc::new(generator),
        Arc::new(MockCorpus::with_passages(&["X2 $299.990"])),
    )
    .build();

    for query in ["Hola!", "¿Cuánto cuesta el X2?", "quiero comprar"] {
        let result = orch.process_message(IncomingMessage::new(query, CALLER)).await.unwrap();
        assert_eq!(result.intent, IntentLabel::Other);
        assert!(!result.answer.is_empty());
    }
}

#[tokio::test]
async fn test_intent_is_always_in_label_set() {
    let generator = MockTextGenerator::from_fn(|req| {
        if is_classification(req) {
            Ok(r#"{"intent":"consulta_tecnica","confidence":0.99}"#.to_string())
        } else {
            Ok("ok".to_string())
        }
    });
    let orch = ChatOrchestrator::builder(
        ConciergeConfig::default(),
        Arc::new(generator),
        Arc::new(MockCorpus::empty()),
    )
    .build();

    let result = orch
        .process_message(IncomingMessage::new("¿tienen soporte técnico?", CALLER))
        .await
        .unwrap();
    assert!(IntentLabel::ALL.contains(&result.intent));
    assert_eq!(result.intent, IntentLabel::Other);
}

#[tokio::test]
async fn test_empty_query_is_client_error() {
    let orch = orchestrator_with(MockCorpus::empty());
    let err = orch.process_message(IncomingMessage::new("", CALLER)).await.unwrap_err();
    assert!(matches!(err, ChatError::EmptyQuery));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_delete_twice_is_noop() {
    let orch = orchestrator_with(MockCorpus::empty());
    let result = orch.process_message(IncomingMessage::new("Hola!", CALLER)).await.unwrap();

    assert!(orch.delete_conversation(&result.conversation_id));
    assert!(!orch.delete_conversation(&result.conversation_id));
    assert!(!orch.delete_conversation("never-existed"));
}

#[tokio::test]
async fn test_sequential_calls_accumulate_paired_turns() {
    let orch = orchestrator_with(MockCorpus::with_passages(&["Horario: 10:00 a 19:00"]));
    let queries = ["Hola!", "¿Cuál es el horario?", "gracias", "quiero comprar"];

    for query in queries {
        orch.process_message(IncomingMessage::new(query, CALLER).in_conversation("seq"))
            .await
            .unwrap();
    }

    let history = orch.history("seq").unwrap();
    assert_eq!(history.len(), 2 * queries.len());
    for (i, turn) in history.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(turn.role, expected);
    }
    let user_turns: Vec<&str> = history
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .collect();
    assert_eq!(user_turns, queries.to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_keep_pairs_per_conversation() {
    let generator = storefront_generator().with_delay(Duration::from_millis(2));
    let orch = ChatOrchestrator::builder(
        ConciergeConfig::default(),
        Arc::new(generator),
        Arc::new(MockCorpus::empty()),
    )
    .build();

    let mut tasks = Vec::new();
    for i in 0..100 {
        let orch = orch.clone();
        tasks.push(tokio::spawn(async move {
            let id = format!("conv-{}", i % 10);
            let query = format!("mensaje {}", i);
            orch.process_message(IncomingMessage::new(query, CALLER).in_conversation(id))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for c in 0..10 {
        let history = orch.history(&format!("conv-{}", c)).unwrap();
        assert_eq!(history.len(), 20, "conversation {}", c);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }
}

#[tokio::test]
async fn test_handoff_notifies_and_survives_notifier_failure() {
    let notifier = RecordingNotifier::failing(CapabilityError::Unavailable("crm down".into()));
    let orch = ChatOrchestrator::builder(
        ConciergeConfig::default(),
        Arc::new(storefront_generator()),
        Arc::new(MockCorpus::empty()),
    )
    .notifier(Arc::new(notifier.clone()))
    .build();

    let result = orch
        .process_message(IncomingMessage::new("Mi scooter llegó roto", CALLER).in_conversation("h1"))
        .await
        .unwrap();
    assert_eq!(result.intent, IntentLabel::Complaint);
    assert!(result.answer.contains("+56 9 5008 0442"));

    let events = wait_for_events(&notifier).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].conversation_id, "h1");
    assert_eq!(events[0].caller, CALLER);
    assert_eq!(events[0].intent, IntentLabel::Complaint);
}

#[tokio::test]
async fn test_durable_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("conversations.db");

    {
        let history = SqliteHistory::new(Arc::new(Database::new(&db_path).unwrap()));
        let orch = ChatOrchestrator::builder(
            ConciergeConfig::default(),
            Arc::new(storefront_generator()),
            Arc::new(MockCorpus::empty()),
        )
        .history_backend(Arc::new(history))
        .build();
        orch.process_message(IncomingMessage::new("Hola!", CALLER).in_conversation("durable"))
            .await
            .unwrap();
    }

    let history = SqliteHistory::new(Arc::new(Database::new(&db_path).unwrap()));
    let orch = ChatOrchestrator::builder(
        ConciergeConfig::default(),
        Arc::new(storefront_generator()),
        Arc::new(MockCorpus::empty()),
    )
    .history_backend(Arc::new(history))
    .build();

    orch.process_message(IncomingMessage::new("gracias", CALLER).in_conversation("durable"))
        .await
        .unwrap();
    let turns = orch.history("durable").unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0].content, "Hola!");
    assert_eq!(turns[2].content, "gracias");
}
