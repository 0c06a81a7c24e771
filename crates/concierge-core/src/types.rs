use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Classified purpose of a customer message.
///
/// The set is closed: every processed message resolves to exactly one label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    /// Opening salutation with no other purpose.
    Greeting,
    /// Questions about products, prices, policies, opening hours.
    Information,
    /// Explicit request for a human agent or clear purchase intent.
    ServiceRequest,
    /// Dissatisfaction with a product or the service.
    Complaint,
    /// Positive feedback.
    Compliment,
    /// Anything outside the categories above.
    Other,
}

impl IntentLabel {
    /// Every label, in prompt order.
    pub const ALL: [IntentLabel; 6] = [
        IntentLabel::Greeting,
        IntentLabel::Information,
        IntentLabel::ServiceRequest,
        IntentLabel::Complaint,
        IntentLabel::Compliment,
        IntentLabel::Other,
    ];

    /// Wire name of the label.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Greeting => "greeting",
            IntentLabel::Information => "information",
            IntentLabel::ServiceRequest => "service_request",
            IntentLabel::Complaint => "complaint",
            IntentLabel::Compliment => "compliment",
            IntentLabel::Other => "other",
        }
    }

    /// Whether messages with this label are handed off to a human agent.
    pub fn requires_handoff(&self) -> bool {
        matches!(self, IntentLabel::ServiceRequest | IntentLabel::Complaint)
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a member of the label set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown intent label: {0:?}")]
pub struct UnknownIntent(pub String);

impl FromStr for IntentLabel {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        IntentLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| UnknownIntent(s.to_string()))
    }
}

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

// =============================================================================
// Conversation data
// =============================================================================

/// One message within a conversation. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// A user turn stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A conversation as held by a durable history backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredConversation {
    pub id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// A customer message entering the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// The customer's text.
    pub query: String,
    /// Caller identifier, usually a phone number.
    pub caller: String,
    /// Conversation to continue; a new one is minted when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl IncomingMessage {
    pub fn new(query: impl Into<String>, caller: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            caller: caller.into(),
            conversation_id: None,
        }
    }

    /// Continue an existing conversation.
    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Validated output of the intent classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: IntentLabel,
    pub confidence: Option<f32>,
    pub rationale: Option<String>,
    /// True when the label is the deterministic fallback rather than a model answer.
    pub fallback: bool,
}

impl ClassificationResult {
    /// The deterministic fallback used when classification fails.
    pub fn fallback() -> Self {
        Self {
            intent: IntentLabel::Other,
            confidence: None,
            rationale: None,
            fallback: true,
        }
    }
}

/// A knowledge-base passage returned by the corpus lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub source: Option<String>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            score: None,
            source: None,
        }
    }
}

/// Ordered passages supporting a grounded answer. May be empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub passages: Vec<Passage>,
}

impl RetrievedContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.iter().all(|p| p.text.trim().is_empty())
    }

    /// Concatenate the passages into a single context blob.
    pub fn blob(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Answer returned to the caller for one processed message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub answer: String,
    pub intent: IntentLabel,
    pub conversation_id: String,
}

// =============================================================================
// Side channels
// =============================================================================

/// Customer record returned by the user directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
}

/// Notification raised when a conversation is handed to a human agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandoffEvent {
    pub conversation_id: String,
    pub caller: String,
    pub intent: IntentLabel,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Text generation requests
// =============================================================================

/// A single chat message sent to the text-generation capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for PromptMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Requested output shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    /// A JSON object constrained by the given JSON schema.
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// Prompt handed to the text-generation capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    /// The last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_label_round_trip_names() {
        for label in IntentLabel::ALL {
            assert_eq!(label.as_str().parse::<IntentLabel>().unwrap(), label);
        }
    }

    #[test]
    fn test_intent_label_parse_is_lenient_on_case_and_separators() {
        assert_eq!(
            "Service-Request".parse::<IntentLabel>().unwrap(),
            IntentLabel::ServiceRequest
        );
        assert_eq!(
            "  GREETING ".parse::<IntentLabel>().unwrap(),
            IntentLabel::Greeting
        );
    }

    #[test]
    fn test_intent_label_rejects_unknown() {
        let err = "refund".parse::<IntentLabel>().unwrap_err();
        assert_eq!(err, UnknownIntent("refund".to_string()));
        assert!("".parse::<IntentLabel>().is_err());
    }

    #[test]
    fn test_intent_label_serde_snake_case() {
        let json = serde_json::to_string(&IntentLabel::ServiceRequest).unwrap();
        assert_eq!(json, "\"service_request\"");
    }

    #[test]
    fn test_requires_handoff() {
        assert!(IntentLabel::ServiceRequest.requires_handoff());
        assert!(IntentLabel::Complaint.requires_handoff());
        assert!(!IntentLabel::Information.requires_handoff());
        assert!(!IntentLabel::Other.requires_handoff());
    }

    #[test]
    fn test_turn_constructors() {
        let user = Turn::user("hola");
        assert_eq!(user.role, Role::User);
        let assistant = Turn::assistant("hola!");
        assert_eq!(assistant.role, Role::Assistant);
        assert!(assistant.timestamp >= user.timestamp);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("system".parse::<Role>().is_err());
    }

    #[test]
    fn test_retrieved_context_blob_skips_blank_passages() {
        let ctx = RetrievedContext {
            passages: vec![Passage::new(" first "), Passage::new("  "), Passage::new("second")],
        };
        assert!(!ctx.is_empty());
        assert_eq!(ctx.blob(), "first\n\nsecond");
    }

    #[test]
    fn test_retrieved_context_only_blank_is_empty() {
        let ctx = RetrievedContext {
            passages: vec![Passage::new(""), Passage::new("\n")],
        };
        assert!(ctx.is_empty());
        assert!(RetrievedContext::empty().is_empty());
    }

    #[test]
    fn test_classification_fallback_is_other() {
        let fallback = ClassificationResult::fallback();
        assert_eq!(fallback.intent, IntentLabel::Other);
        assert!(fallback.fallback);
    }

    #[test]
    fn test_incoming_message_builder() {
        let msg = IncomingMessage::new("hola", "+56900000000").in_conversation("abc");
        assert_eq!(msg.conversation_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_incoming_message_deserialize_without_conversation() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"query": "hola", "caller": "+56911111111"}"#).unwrap();
        assert!(msg.conversation_id.is_none());
    }

    #[test]
    fn test_last_user_message() {
        let request = CompletionRequest {
            model: "m".into(),
            system_prompt: "s".into(),
            messages: vec![
                PromptMessage::from(&Turn::user("first")),
                PromptMessage::from(&Turn::assistant("reply")),
                PromptMessage::from(&Turn::user("second")),
            ],
            temperature: 0.7,
            response_format: ResponseFormat::Text,
        };
        assert_eq!(request.last_user_message(), Some("second"));
    }
}
