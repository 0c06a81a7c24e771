//! Database schema migrations.
//!
//! Applies the initial schema: the conversations and turns tables plus the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use concierge_core::error::ConciergeError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ConciergeError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ConciergeError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            ConciergeError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: conversation_history");
    }

    Ok(())
}

/// Version 1: conversations and their ordered turns.
fn apply_v1(conn: &Connection) -> Result<(), ConciergeError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY NOT NULL,
            created_at      INTEGER NOT NULL,
            last_activity   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_last_activity
            ON conversations (last_activity ASC);

        -- seq is the position of the turn within its conversation.
        CREATE TABLE IF NOT EXISTS turns (
            conversation_id TEXT NOT NULL,
            seq             INTEGER NOT NULL,
            role            TEXT NOT NULL
                            CHECK (role IN ('user', 'assistant')),
            content         TEXT NOT NULL,
            timestamp       INTEGER NOT NULL,
            PRIMARY KEY (conversation_id, seq),
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'conversation_history');
        ",
    )
    .map_err(|e| ConciergeError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_tables_exist() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        for table in ["conversations", "turns"] {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_turn_role_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO conversations (id, created_at, last_activity) VALUES ('c', 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO turns (conversation_id, seq, role, content, timestamp)
             VALUES ('c', 0, 'system', 'x', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_turns_cascade_on_conversation_delete() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO conversations (id, created_at, last_activity) VALUES ('c', 0, 0);
             INSERT INTO turns (conversation_id, seq, role, content, timestamp)
             VALUES ('c', 0, 'user', 'hola', 0);
             DELETE FROM conversations WHERE id = 'c';",
        )
        .unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
