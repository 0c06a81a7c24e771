//! Error types for the routing engine.

use concierge_core::error::{CapabilityError, ConciergeError};

/// Errors from the chat engine.
///
/// Only the client errors ([`ChatError::is_client_error`]) ever escape
/// [`ChatOrchestrator::process_message`](crate::ChatOrchestrator::process_message);
/// everything else is absorbed into a degraded answer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("caller identifier cannot be empty")]
    MissingCaller,
    #[error("query exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Whether the error describes a malformed incoming message.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyQuery | ChatError::MissingCaller | ChatError::MessageTooLong(_)
        )
    }
}

impl From<ConciergeError> for ChatError {
    fn from(err: ConciergeError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}
