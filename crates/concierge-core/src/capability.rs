//! Contracts for the external collaborators the routing engine depends on.
//!
//! Every network-facing capability is an async trait object so concrete
//! backends (LLM providers, vector stores, CRMs) can be swapped without
//! touching the pipeline. Implementations report failures as
//! [`CapabilityError`]; the pipeline decides how to degrade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{CapabilityError, Result};
use crate::types::{
    CompletionRequest, HandoffEvent, Passage, StoredConversation, Turn, UserProfile,
};

/// Text-completion capability (an LLM backend).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete the request, returning raw text.
    ///
    /// When `request.response_format` asks for JSON, the returned text is
    /// expected (but not trusted) to be a JSON document.
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, CapabilityError>;
}

/// Knowledge-base lookup capability.
#[async_trait]
pub trait CorpusLookup: Send + Sync {
    /// Return up to `top_k` passages ordered by relevance. May be empty.
    async fn search(&self, query: &str, top_k: usize) -> std::result::Result<Vec<Passage>, CapabilityError>;
}

/// Optional relevance-reranking capability.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `passages` by relevance to `query`.
    async fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
    ) -> std::result::Result<Vec<Passage>, CapabilityError>;
}

/// Customer directory keyed by phone number.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a customer. `Ok(None)` means not found.
    async fn lookup_by_phone(&self, phone: &str) -> std::result::Result<Option<UserProfile>, CapabilityError>;
}

/// Human-handoff channel (CRM label, agent inbox, ...).
#[async_trait]
pub trait HandoffNotifier: Send + Sync {
    async fn notify(&self, event: &HandoffEvent) -> std::result::Result<(), CapabilityError>;
}

/// Durable store behind the in-memory conversation store.
///
/// Calls are synchronous and expected to be short (local database).
pub trait HistoryBackend: Send + Sync {
    /// Load a conversation, `Ok(None)` if unknown.
    fn load(&self, conversation_id: &str) -> Result<Option<StoredConversation>>;

    /// Append turns to a conversation atomically, creating it if needed.
    fn append(&self, conversation_id: &str, turns: &[Turn]) -> Result<()>;

    /// Remove a conversation. Returns whether it existed.
    fn delete(&self, conversation_id: &str) -> Result<bool>;

    /// Remove conversations whose last activity is older than `cutoff`.
    /// Returns the number removed.
    fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
