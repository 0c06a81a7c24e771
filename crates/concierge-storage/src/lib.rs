//! Concierge storage crate - durable conversation history on SQLite.
//!
//! Provides a WAL-mode SQLite database with migrations and a
//! [`HistoryBackend`](concierge_core::HistoryBackend) implementation the
//! in-memory conversation store writes through to.

pub mod db;
pub mod history;
pub mod migrations;

pub use db::Database;
pub use history::{ConversationSummary, SqliteHistory};
