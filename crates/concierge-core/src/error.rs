use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the Concierge system.
///
/// Covers configuration, persistence and serialization failures. Failures of
/// the external capabilities (text generation, corpus lookup, ...) use
/// [`CapabilityError`] instead so callers can apply per-component fallbacks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConciergeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ConciergeError {
    fn from(err: toml::de::Error) -> Self {
        ConciergeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConciergeError {
    fn from(err: toml::ser::Error) -> Self {
        ConciergeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ConciergeError {
    fn from(err: serde_json::Error) -> Self {
        ConciergeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Concierge operations.
pub type Result<T> = std::result::Result<T, ConciergeError>;

/// Failure reported by (or on behalf of) an external capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("{capability} timed out after {}ms", .elapsed.as_millis())]
    Timeout {
        capability: &'static str,
        elapsed: Duration,
    },

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited")]
    RateLimited,

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Backend(String),
}
