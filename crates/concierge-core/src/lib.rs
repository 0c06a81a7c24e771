pub mod capability;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod types;

pub use capability::{
    CorpusLookup, HandoffNotifier, HistoryBackend, Reranker, TextGenerator, UserDirectory,
};
pub use config::ConciergeConfig;
pub use error::{CapabilityError, ConciergeError, Result};
pub use types::*;
