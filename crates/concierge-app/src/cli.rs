//! CLI argument definitions for the `concierge` admin tool.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use concierge_core::config::{expand_home, home_dir};

/// Concierge: maintenance commands for the intent routing engine.
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the conversation database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Write a configuration file with every default filled in.
    InitConfig {
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// List the most recently active durable conversations.
    List {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    /// Print the turns of a durable conversation.
    History {
        id: String,
        /// Print as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Delete a durable conversation.
    Delete { id: String },
    /// Remove durable conversations idle for longer than the TTL.
    Prune {
        /// Override `conversation.ttl_minutes`.
        #[arg(long)]
        ttl_minutes: Option<u32>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CONCIERGE_CONFIG env var > ~/.concierge/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CONCIERGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory.
    ///
    /// Priority: --data-dir flag > config file value.
    pub fn resolve_data_dir(&self, config_data_dir: &str) -> PathBuf {
        match self.data_dir {
            Some(ref p) => p.clone(),
            None => expand_home(config_data_dir),
        }
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".concierge").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let args = CliArgs::try_parse_from(["concierge", "history", "abc", "--json"]).unwrap();
        assert_eq!(
            args.command,
            Command::History {
                id: "abc".into(),
                json: true
            }
        );

        let args = CliArgs::try_parse_from(["concierge", "prune", "--ttl-minutes", "5"]).unwrap();
        assert_eq!(args.command, Command::Prune { ttl_minutes: Some(5) });

        let args = CliArgs::try_parse_from(["concierge", "list"]).unwrap();
        assert_eq!(args.command, Command::List { limit: 20 });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "concierge",
            "delete",
            "abc",
            "--config",
            "/tmp/c.toml",
            "-d",
            "/srv/data",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/c.toml"));
        assert_eq!(args.resolve_data_dir("~/.concierge/data"), PathBuf::from("/srv/data"));
        assert_eq!(args.resolve_log_level("info"), "info");
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(CliArgs::try_parse_from(["concierge"]).is_err());
    }

    #[test]
    fn test_data_dir_falls_back_to_config() {
        let args = CliArgs::try_parse_from(["concierge", "list"]).unwrap();
        assert_eq!(args.resolve_data_dir("/srv/data"), PathBuf::from("/srv/data"));
        if let Some(home) = home_dir() {
            assert_eq!(args.resolve_data_dir("~/data"), home.join("data"));
        }
    }
}
