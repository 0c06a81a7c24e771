//! Command implementations over the durable conversation history.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use concierge_core::capability::HistoryBackend;
use concierge_core::config::ConciergeConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_storage::{Database, SqliteHistory};

/// Write a default configuration file. Refuses to overwrite unless `force`.
pub fn init_config(path: &Path, force: bool, out: &mut impl Write) -> Result<()> {
    if path.exists() && !force {
        return Err(ConciergeError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    ConciergeConfig::default().save(path)?;
    writeln!(out, "Wrote default configuration to {}", path.display())?;
    Ok(())
}

/// Open the durable history under `data_dir`.
pub fn open_history(data_dir: &Path, config: &ConciergeConfig) -> Result<SqliteHistory> {
    let db_path = data_dir.join(&config.storage.db_file);
    let db = Database::new(&db_path)?;
    info!(path = %db_path.display(), "Conversation database opened");
    Ok(SqliteHistory::new(Arc::new(db)))
}

pub fn list(history: &SqliteHistory, limit: u64, out: &mut impl Write) -> Result<()> {
    let summaries = history.list_recent(limit)?;
    if summaries.is_empty() {
        writeln!(out, "No conversations stored.")?;
        return Ok(());
    }
    for s in summaries {
        writeln!(
            out,
            "{}  {:>4} turns  last active {}",
            s.id,
            s.turn_count,
            s.last_activity.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
    }
    Ok(())
}

pub fn show_history(
    history: &SqliteHistory,
    id: &str,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let Some(convo) = history.load(id)? else {
        return Err(ConciergeError::Storage(format!("conversation {} not found", id)));
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&convo)?)?;
        return Ok(());
    }

    for turn in &convo.turns {
        writeln!(
            out,
            "[{}] {}: {}",
            turn.timestamp.format("%H:%M:%S"),
            turn.role.as_str(),
            turn.content
        )?;
    }
    Ok(())
}

pub fn delete(history: &SqliteHistory, id: &str, out: &mut impl Write) -> Result<()> {
    if history.delete(id)? {
        writeln!(out, "Deleted conversation {}", id)?;
    } else {
        writeln!(out, "Conversation {} not found; nothing to delete", id)?;
    }
    Ok(())
}

pub fn prune(history: &SqliteHistory, ttl_minutes: u32, out: &mut impl Write) -> Result<()> {
    let cutoff = Utc::now() - Duration::minutes(i64::from(ttl_minutes));
    let removed = history.prune_idle(cutoff)?;
    writeln!(out, "Pruned {} idle conversation(s)", removed)?;
    Ok(())
}
