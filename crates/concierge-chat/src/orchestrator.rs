//! Chat orchestrator: validates a message, classifies it, dispatches it to
//! the strategy bound to its label and records the turn pair.
//!
//! `process_message` only fails for malformed input. Every capability or
//! storage failure past validation is absorbed into a degraded answer.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use concierge_core::capability::{
    CorpusLookup, HandoffNotifier, HistoryBackend, Reranker, TextGenerator, UserDirectory,
};
use concierge_core::config::ConciergeConfig;
use concierge_core::types::{IncomingMessage, IntentLabel, PipelineResult, Turn, UserProfile};
use concierge_storage::{Database, SqliteHistory};

use crate::classifier::IntentClassifier;
use crate::deadline::with_deadline;
use crate::error::ChatError;
use crate::retriever::ContextRetriever;
use crate::store::ConversationStore;
use crate::strategy::{ResponseStrategy, StrategyRegistry, TurnContext};

struct Inner {
    config: ConciergeConfig,
    store: Arc<ConversationStore>,
    classifier: IntentClassifier,
    registry: StrategyRegistry,
    directory: Option<Arc<dyn UserDirectory>>,
}

/// Entry point of the routing engine. Cheap to clone.
#[derive(Clone)]
pub struct ChatOrchestrator {
    inner: Arc<Inner>,
}

impl ChatOrchestrator {
    /// Start wiring an orchestrator around the two required capabilities.
    pub fn builder(
        config: ConciergeConfig,
        generator: Arc<dyn TextGenerator>,
        corpus: Arc<dyn CorpusLookup>,
    ) -> ChatOrchestratorBuilder {
        ChatOrchestratorBuilder {
            config,
            generator,
            corpus,
            reranker: None,
            directory: None,
            notifier: None,
            backend: None,
            overrides: Vec::new(),
        }
    }

    /// Process one incoming message end to end.
    ///
    /// The run executes on its own task, so a caller that stops awaiting
    /// still leaves the conversation with a complete turn pair.
    pub async fn process_message(
        &self,
        message: IncomingMessage,
    ) -> Result<PipelineResult, ChatError> {
        let query = message.query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let caller = message.caller.trim();
        if caller.is_empty() {
            return Err(ChatError::MissingCaller);
        }
        let max_chars = self.inner.config.conversation.max_query_chars;
        if query.chars().count() > max_chars {
            return Err(ChatError::MessageTooLong(max_chars));
        }

        let conversation_id = message
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let inner = self.inner.clone();
        let (id, query, caller) = (conversation_id.clone(), query.to_string(), caller.to_string());
        match tokio::spawn(async move { inner.run(id, query, caller).await }).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let err = ChatError::Internal(e.to_string());
                error!(conversation_id = %conversation_id, error = %err, "Pipeline task failed");
                Ok(PipelineResult {
                    answer: self.inner.config.fallbacks.apology.clone(),
                    intent: IntentLabel::Other,
                    conversation_id,
                })
            }
        }
    }

    /// Forget a conversation. Unknown ids are a no-op.
    pub fn delete_conversation(&self, conversation_id: &str) -> bool {
        match self.inner.store.delete(conversation_id) {
            Ok(existed) => existed,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Failed to delete conversation");
                false
            }
        }
    }

    /// Ordered turns of a conversation.
    pub fn history(&self, conversation_id: &str) -> Result<Vec<Turn>, ChatError> {
        self.inner.store.get_history(conversation_id)
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.inner.store
    }

    /// Labels with a registered strategy.
    pub fn labels(&self) -> Vec<IntentLabel> {
        self.inner.registry.labels()
    }

    /// Prune idle conversations now. Returns the number removed from memory.
    pub fn prune_idle(&self) -> usize {
        match self.inner.store.prune() {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Conversation prune failed");
                0
            }
        }
    }

    /// Prune idle conversations every `conversation.prune_interval_secs`.
    ///
    /// The first cycle runs immediately. Abort the handle to stop.
    pub fn spawn_pruner(&self) -> JoinHandle<()> {
        let store = self.inner.store.clone();
        let period = self.inner.config.conversation.prune_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = store.prune() {
                    warn!(error = %e, "Background prune failed");
                }
            }
        })
    }
}

impl Inner {
    async fn run(&self, conversation_id: String, query: String, caller: String) -> PipelineResult {
        let user_turn = Turn::user(query.clone());

        let prior = self.load_history(&conversation_id).await.unwrap_or_else(|e| {
            warn!(conversation_id = %conversation_id, error = %e, "History unavailable, continuing without it");
            Vec::new()
        });

        let (classification, profile) = tokio::join!(
            self.classifier.classify(&query, &prior),
            self.lookup_profile(&caller)
        );
        let label = classification.intent;

        let window = self.config.conversation.history_window;
        let recent = &prior[prior.len().saturating_sub(window)..];
        let ctx = TurnContext {
            conversation_id: &conversation_id,
            caller: &caller,
            query: &query,
            intent: label,
            history: recent,
            profile: profile.as_ref(),
        };

        let (answer, intent, strategy) = match self.registry.resolve(label) {
            Some(strategy) => match strategy.respond(&ctx).await {
                Ok(answer) => (answer, label, strategy.name()),
                Err(e) => {
                    warn!(
                        conversation_id = %conversation_id,
                        intent = %label,
                        strategy = strategy.name(),
                        error = %e,
                        "Response generation failed, answering with apology"
                    );
                    (self.apology(), IntentLabel::Other, "apology")
                }
            },
            None => {
                warn!(intent = %label, "No strategy registered, answering with apology");
                (self.apology(), IntentLabel::Other, "apology")
            }
        };

        if let Err(e) = self
            .record_pair(&conversation_id, user_turn, Turn::assistant(answer.clone()))
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to record turn pair");
        }

        info!(
            conversation_id = %conversation_id,
            intent = %intent,
            strategy,
            fallback = classification.fallback,
            "Message processed"
        );

        PipelineResult {
            answer,
            intent,
            conversation_id,
        }
    }

    /// Read history, off the runtime threads when a durable backend may
    /// have to be queried.
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>, ChatError> {
        if !self.store.is_durable() {
            return self.store.get_history(conversation_id);
        }
        let store = Arc::clone(&self.store);
        let id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || store.get_history(&id))
            .await
            .unwrap_or_else(|e| Err(ChatError::Internal(e.to_string())))
    }

    /// Append the turn pair, off the runtime threads when it writes through
    /// to a durable backend.
    async fn record_pair(
        &self,
        conversation_id: &str,
        user: Turn,
        assistant: Turn,
    ) -> Result<(), ChatError> {
        if !self.store.is_durable() {
            return self.store.append_pair(conversation_id, user, assistant);
        }
        let store = Arc::clone(&self.store);
        let id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || store.append_pair(&id, user, assistant))
            .await
            .unwrap_or_else(|e| Err(ChatError::Internal(e.to_string())))
    }

    async fn lookup_profile(&self, caller: &str) -> Option<UserProfile> {
        let directory = self.directory.as_ref()?;
        match with_deadline(
            "user directory",
            self.config.timeouts.lookup(),
            directory.lookup_by_phone(caller),
        )
        .await
        {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                debug!("Caller not found in user directory");
                None
            }
            Err(e) => {
                warn!(error = %e, "User lookup failed");
                None
            }
        }
    }

    fn apology(&self) -> String {
        self.config.fallbacks.apology.clone()
    }
}

/// Builder for [`ChatOrchestrator`].
pub struct ChatOrchestratorBuilder {
    config: ConciergeConfig,
    generator: Arc<dyn TextGenerator>,
    corpus: Arc<dyn CorpusLookup>,
    reranker: Option<Arc<dyn Reranker>>,
    directory: Option<Arc<dyn UserDirectory>>,
    notifier: Option<Arc<dyn HandoffNotifier>>,
    backend: Option<Arc<dyn HistoryBackend>>,
    overrides: Vec<(IntentLabel, Arc<dyn ResponseStrategy>)>,
}

impl ChatOrchestratorBuilder {
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn HandoffNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Write conversation history through to a durable backend. Takes
    /// precedence over `storage.durable`.
    pub fn history_backend(mut self, backend: Arc<dyn HistoryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace (or add) the strategy bound to `label`.
    pub fn strategy(mut self, label: IntentLabel, strategy: Arc<dyn ResponseStrategy>) -> Self {
        self.overrides.push((label, strategy));
        self
    }

    pub fn build(self) -> ChatOrchestrator {
        let config = self.config;

        let mut store = ConversationStore::new(config.conversation.ttl());
        if let Some(backend) = self.backend.or_else(|| open_durable_history(&config)) {
            store = store.with_backend(backend);
        }

        let retriever = ContextRetriever::new(self.corpus, self.reranker, &config);
        let mut registry =
            StrategyRegistry::standard(&config, self.generator.clone(), retriever, self.notifier);
        for (label, strategy) in self.overrides {
            registry.register(label, strategy);
        }

        let classifier = IntentClassifier::new(self.generator, &config);

        ChatOrchestrator {
            inner: Arc::new(Inner {
                config,
                store: Arc::new(store),
                classifier,
                registry,
                directory: self.directory,
            }),
        }
    }
}

/// Open the SQLite history at `data_dir/db_file` when `storage.durable` is
/// set. A database that cannot be opened leaves the store memory-only.
fn open_durable_history(config: &ConciergeConfig) -> Option<Arc<dyn HistoryBackend>> {
    if !config.storage.durable {
        return None;
    }
    let path = config.db_path();
    match Database::new(&path) {
        Ok(db) => {
            info!(path = %path.display(), "Durable conversation history enabled");
            Some(Arc::new(SqliteHistory::new(Arc::new(db))))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Durable history unavailable, keeping conversations in memory only");
            None
        }
    }
}
