use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConciergeError, Result};

/// Top-level configuration for the Concierge engine.
///
/// Loaded from `~/.concierge/config.toml` by default. Every section falls back
/// to its defaults, so a partial (or empty) file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConciergeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub fallbacks: FallbackConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ConciergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConciergeConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConciergeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Location of the conversation database: `general.data_dir` joined with
    /// `storage.db_file`, with a leading `~` expanded.
    pub fn db_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.storage.db_file)
    }
}

/// The current user's home directory, if one is set.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the conversation database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.concierge/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Minutes of inactivity after which a conversation is pruned.
    pub ttl_minutes: u32,
    /// Most recent turns passed to the response generators.
    pub history_window: usize,
    /// Most recent turns excerpted into the classification prompt.
    pub classifier_window: usize,
    /// Maximum accepted query length in characters.
    pub max_query_chars: usize,
    /// Seconds between background prune cycles.
    pub prune_interval_secs: u64,
}

impl ConversationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_minutes) * 60)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            history_window: 10,
            classifier_window: 6,
            max_query_chars: 2000,
            prune_interval_secs: 300,
        }
    }
}

/// Model names forwarded to the text-generation capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model used for intent classification.
    pub classifier: String,
    /// Model used for chit-chat replies and query refinement.
    pub chat: String,
    /// Model used for grounded (retrieval-backed) answers.
    pub grounded: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            classifier: "gpt-3.5-turbo-0125".to_string(),
            chat: "gpt-3.5-turbo".to_string(),
            grounded: "o3-mini".to_string(),
            temperature: 0.7,
        }
    }
}

/// Knowledge-base retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages kept for grounded generation.
    pub top_k: usize,
    /// Passages requested from the corpus when a reranker is installed.
    pub rerank_candidates: usize,
    /// Rewrite the query into a retrieval-friendly form before searching.
    pub refine_query: bool,
    /// Language the refined query is translated into. Empty keeps the original language.
    pub refine_language: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            rerank_candidates: 20,
            refine_query: true,
            refine_language: "Spanish".to_string(),
        }
    }
}

/// Per-capability call timeouts, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub classify_ms: u64,
    pub generate_ms: u64,
    pub refine_ms: u64,
    pub retrieve_ms: u64,
    pub rerank_ms: u64,
    pub lookup_ms: u64,
    pub notify_ms: u64,
}

impl TimeoutConfig {
    pub fn classify(&self) -> Duration {
        Duration::from_millis(self.classify_ms)
    }

    pub fn generate(&self) -> Duration {
        Duration::from_millis(self.generate_ms)
    }

    pub fn refine(&self) -> Duration {
        Duration::from_millis(self.refine_ms)
    }

    pub fn retrieve(&self) -> Duration {
        Duration::from_millis(self.retrieve_ms)
    }

    pub fn rerank(&self) -> Duration {
        Duration::from_millis(self.rerank_ms)
    }

    pub fn lookup(&self) -> Duration {
        Duration::from_millis(self.lookup_ms)
    }

    pub fn notify(&self) -> Duration {
        Duration::from_millis(self.notify_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classify_ms: 15_000,
            generate_ms: 60_000,
            refine_ms: 15_000,
            retrieve_ms: 10_000,
            rerank_ms: 5_000,
            lookup_ms: 5_000,
            notify_ms: 5_000,
        }
    }
}

/// Assistant persona used by the prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub assistant_name: String,
    pub company: String,
    /// One-line description of what the company sells.
    pub business: String,
    /// Messaging channel the replies are formatted for.
    pub channel: String,
    /// Reply language when the customer's language cannot be detected.
    pub fallback_language: String,
    /// Phone number customers are given when handed to a human agent.
    pub handoff_phone: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Rodrigo".to_string(),
            company: "EcoDrive".to_string(),
            business: "electric scooters, skateboards and urban mobility gear".to_string(),
            channel: "WhatsApp".to_string(),
            fallback_language: "Chilean Spanish".to_string(),
            handoff_phone: "+56 9 5008 0442".to_string(),
        }
    }
}

/// Canned answers used when generation cannot run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Generic apology returned (with intent `other`) after an unrecoverable failure.
    pub apology: String,
    /// Acknowledgement sent when a handoff reply cannot be generated. The
    /// handoff phone is appended.
    pub handoff: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            apology: "Disculpa, tuve un problema al procesar tu consulta. ¿Podrías intentarlo nuevamente? 😊"
                .to_string(),
            handoff: "¡Gracias por escribirnos! Te estoy conectando con un asesor que te atenderá personalmente. También puedes contactarlo directamente:"
                .to_string(),
        }
    }
}

/// Durable history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Write conversation history through to SQLite.
    pub durable: bool,
    /// Database file name under `general.data_dir`.
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable: false,
            db_file: "conversations.db".to_string(),
        }
    }
}
