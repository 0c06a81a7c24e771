//! Concierge chat crate - intent routing engine with conversation state.
//!
//! Classifies each incoming customer message into a closed set of intents,
//! dispatches it to the response strategy bound to that intent (optionally
//! grounded in retrieved knowledge-base passages), and keeps a per-conversation
//! turn history with idle expiry.

pub mod classifier;
mod deadline;
pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod refiner;
pub mod retriever;
pub mod store;
pub mod strategy;

pub use classifier::{parse_classification, IntentClassifier};
pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, ChatOrchestratorBuilder};
pub use refiner::QueryRefiner;
pub use retriever::ContextRetriever;
pub use store::ConversationStore;
pub use strategy::{PromptRunner, ResponseStrategy, StrategyRegistry, TurnContext};
