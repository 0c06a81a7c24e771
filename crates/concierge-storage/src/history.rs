//! SQLite-backed conversation history.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;

use concierge_core::capability::HistoryBackend;
use concierge_core::error::ConciergeError;
use concierge_core::types::{Role, StoredConversation, Turn};

use crate::db::Database;

/// Row summary used by maintenance tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub turn_count: i64,
    pub last_activity: DateTime<Utc>,
}

/// Durable history store over [`Database`].
pub struct SqliteHistory {
    db: Arc<Database>,
}

impl SqliteHistory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Most recently active conversations first.
    pub fn list_recent(&self, limit: u64) -> Result<Vec<ConversationSummary>, ConciergeError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.id, c.last_activity, COUNT(t.seq)
                     FROM conversations c
                     LEFT JOIN turns t ON t.conversation_id = c.id
                     GROUP BY c.id
                     ORDER BY c.last_activity DESC
                     LIMIT ?1",
                )
                .map_err(storage_err)?;

            let rows = stmt
                .query_map(rusqlite::params![limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(storage_err)?;

            let mut summaries = Vec::new();
            for row in rows {
                let (id, last_activity, turn_count) = row.map_err(storage_err)?;
                summaries.push(ConversationSummary {
                    id,
                    turn_count,
                    last_activity: from_millis(last_activity)?,
                });
            }
            Ok(summaries)
        })
    }
}

impl HistoryBackend for SqliteHistory {
    fn load(&self, conversation_id: &str) -> Result<Option<StoredConversation>, ConciergeError> {
        self.db.with_conn(|conn| {
            let header = conn
                .query_row(
                    "SELECT created_at, last_activity FROM conversations WHERE id = ?1",
                    rusqlite::params![conversation_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()
                .map_err(storage_err)?;

            let Some((created_at, last_activity)) = header else {
                return Ok(None);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT role, content, timestamp FROM turns
                     WHERE conversation_id = ?1
                     ORDER BY seq ASC",
                )
                .map_err(storage_err)?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(storage_err)?;

            let mut turns = Vec::new();
            for row in rows {
                let (role, content, timestamp) = row.map_err(storage_err)?;
                let role: Role = role.parse().map_err(ConciergeError::Storage)?;
                turns.push(Turn {
                    role,
                    content,
                    timestamp: from_millis(timestamp)?,
                });
            }

            Ok(Some(StoredConversation {
                id: conversation_id.to_string(),
                turns,
                created_at: from_millis(created_at)?,
                last_activity: from_millis(last_activity)?,
            }))
        })
    }

    fn append(&self, conversation_id: &str, turns: &[Turn]) -> Result<(), ConciergeError> {
        if turns.is_empty() {
            return Ok(());
        }
        let last_activity = turns
            .iter()
            .map(|t| t.timestamp)
            .max()
            .unwrap_or_else(Utc::now)
            .timestamp_millis();

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction().map_err(storage_err)?;

            tx.execute(
                "INSERT INTO conversations (id, created_at, last_activity)
                 VALUES (?1, ?2, ?2)
                 ON CONFLICT(id) DO UPDATE SET last_activity = excluded.last_activity",
                rusqlite::params![conversation_id, last_activity],
            )
            .map_err(storage_err)?;

            let next_seq: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq) + 1, 0) FROM turns WHERE conversation_id = ?1",
                    rusqlite::params![conversation_id],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;

            for (offset, turn) in turns.iter().enumerate() {
                tx.execute(
                    "INSERT INTO turns (conversation_id, seq, role, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        conversation_id,
                        next_seq + offset as i64,
                        turn.role.as_str(),
                        turn.content,
                        turn.timestamp.timestamp_millis(),
                    ],
                )
                .map_err(storage_err)?;
            }

            tx.commit().map_err(storage_err)
        })
    }

    fn delete(&self, conversation_id: &str) -> Result<bool, ConciergeError> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM conversations WHERE id = ?1",
                    rusqlite::params![conversation_id],
                )
                .map_err(storage_err)?;
            Ok(removed > 0)
        })
    }

    fn prune_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, ConciergeError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM conversations WHERE last_activity < ?1",
                rusqlite::params![cutoff.timestamp_millis()],
            )
            .map_err(storage_err)
        })
    }
}

fn storage_err(e: rusqlite::Error) -> ConciergeError {
    ConciergeError::Storage(e.to_string())
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, ConciergeError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ConciergeError::Storage(format!("invalid timestamp: {}", millis)))
}
