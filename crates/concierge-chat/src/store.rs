//! Conversation store: keyed, append-only turn history with idle expiry.
//!
//! The map lock is only held to look up, insert or remove a conversation
//! handle; each conversation has its own mutex, so unrelated conversations never
//! contend on mutation. A durable [`HistoryBackend`] can sit behind the
//! in-memory map: writes go through to it and unknown conversations are
//! hydrated from it. Backend failures are logged and never fail the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard, TryLockError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use concierge_core::capability::HistoryBackend;
use concierge_core::types::{StoredConversation, Turn};

use crate::error::ChatError;

struct Conversation {
    turns: Vec<Turn>,
    last_activity: DateTime<Utc>,
    /// Set when the handle has been removed from the map; writers holding a
    /// stale handle must look the conversation up again.
    evicted: bool,
}

impl Conversation {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            last_activity: Utc::now(),
            evicted: false,
        }
    }

    fn from_stored(stored: StoredConversation) -> Self {
        Self {
            turns: stored.turns,
            last_activity: stored.last_activity,
            evicted: false,
        }
    }
}

type Handle = Arc<Mutex<Conversation>>;

/// Thread-safe conversation history store.
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Handle>>,
    ttl: Duration,
    backend: Option<Arc<dyn HistoryBackend>>,
}

impl ConversationStore {
    /// Volatile store whose conversations expire after `ttl` of inactivity.
    pub fn new(ttl: Duration) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            ttl,
            backend: None,
        }
    }

    /// Write through to (and hydrate from) a durable backend.
    pub fn with_backend(mut self, backend: Arc<dyn HistoryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Ordered history of a conversation; empty if unknown.
    pub fn get_history(&self, id: &str) -> Result<Vec<Turn>, ChatError> {
        match self.lookup(id)? {
            Some(handle) => {
                let convo = lock(&handle)?;
                Ok(convo.turns.clone())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Whether writes go through to a durable backend.
    pub fn is_durable(&self) -> bool {
        self.backend.is_some()
    }

    /// Append one turn, creating the conversation if absent.
    pub fn append(&self, id: &str, turn: Turn) -> Result<(), ChatError> {
        self.append_all(id, &[turn])
    }

    /// Append a user turn and its assistant reply as one atomic mutation.
    pub fn append_pair(&self, id: &str, user: Turn, assistant: Turn) -> Result<(), ChatError> {
        self.append_all(id, &[user, assistant])
    }

    fn append_all(&self, id: &str, turns: &[Turn]) -> Result<(), ChatError> {
        loop {
            let handle = self.get_or_create(id)?;
            let mut convo = lock(&handle)?;
            if convo.evicted {
                // Pruned or deleted between lookup and lock; retry on a fresh handle.
                continue;
            }

            convo.turns.extend_from_slice(turns);
            convo.last_activity = Utc::now();

            if let Some(ref backend) = self.backend {
                if let Err(e) = backend.append(id, turns) {
                    warn!(conversation_id = %id, error = %e, "Durable history write failed");
                }
            }
            return Ok(());
        }
    }

    /// Remove a conversation. Returns whether anything was removed; deleting
    /// an unknown id is not an error.
    ///
    /// The map write lock is held until the backend row is gone, so a
    /// concurrent lookup cannot hydrate the conversation back into memory.
    pub fn delete(&self, id: &str) -> Result<bool, ChatError> {
        let mut map = self.write_map()?;

        let mut existed = false;
        if let Some(handle) = map.remove(id) {
            mark_evicted(&handle);
            existed = true;
        }

        if let Some(ref backend) = self.backend {
            match backend.delete(id) {
                Ok(found) => existed |= found,
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Durable history delete failed")
                }
            }
        }
        drop(map);

        debug!(conversation_id = %id, existed, "Conversation deleted");
        Ok(existed)
    }

    /// Remove conversations idle for longer than the configured TTL.
    pub fn prune(&self) -> Result<usize, ChatError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        self.prune_idle_before(Utc::now() - ttl)
    }

    /// Remove conversations whose last activity is older than `cutoff`.
    ///
    /// Conversations currently being written are skipped; they are active by
    /// definition.
    pub fn prune_idle_before(&self, cutoff: DateTime<Utc>) -> Result<usize, ChatError> {
        let mut removed = 0;
        {
            let mut map = self.write_map()?;

            map.retain(|id, handle| match handle.try_lock() {
                Ok(mut convo) => {
                    if convo.last_activity < cutoff {
                        convo.evicted = true;
                        removed += 1;
                        debug!(conversation_id = %id, "Conversation expired");
                        false
                    } else {
                        true
                    }
                }
                Err(TryLockError::WouldBlock) => true,
                Err(TryLockError::Poisoned(poisoned)) => {
                    poisoned.into_inner().evicted = true;
                    removed += 1;
                    false
                }
            });
        }

        if let Some(ref backend) = self.backend {
            match backend.prune_idle(cutoff) {
                Ok(count) if count > 0 => info!(count, "Pruned idle conversations from durable history"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Durable history prune failed"),
            }
        }

        if removed > 0 {
            info!(removed, "Pruned idle conversations");
        }
        Ok(removed)
    }

    /// Number of conversations held in memory.
    pub fn len(&self) -> usize {
        self.conversations.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Private helpers --

    /// Find a conversation in memory, falling back to the durable backend.
    fn lookup(&self, id: &str) -> Result<Option<Handle>, ChatError> {
        if let Some(handle) = self.cached(id)? {
            return Ok(Some(handle));
        }
        if self.backend.is_none() {
            return Ok(None);
        }
        self.hydrate(id, false)
    }

    fn get_or_create(&self, id: &str) -> Result<Handle, ChatError> {
        if let Some(handle) = self.cached(id)? {
            return Ok(handle);
        }
        match self.hydrate(id, true)? {
            Some(handle) => Ok(handle),
            None => Err(ChatError::StorageError(format!(
                "conversation {} could not be created",
                id
            ))),
        }
    }

    /// Insert a conversation loaded from the backend (or a fresh one when
    /// `create` is set). Runs under the map write lock so it cannot
    /// interleave with `delete`.
    fn hydrate(&self, id: &str, create: bool) -> Result<Option<Handle>, ChatError> {
        let mut map = self.write_map()?;
        if let Some(handle) = map.get(id) {
            return Ok(Some(Arc::clone(handle)));
        }
        let convo = match self.load_from_backend(id) {
            Some(stored) => Conversation::from_stored(stored),
            None if create => Conversation::new(),
            None => return Ok(None),
        };
        let handle = Arc::new(Mutex::new(convo));
        map.insert(id.to_string(), Arc::clone(&handle));
        Ok(Some(handle))
    }

    fn cached(&self, id: &str) -> Result<Option<Handle>, ChatError> {
        let map = self
            .conversations
            .read()
            .map_err(|e| ChatError::StorageError(format!("store lock poisoned: {}", e)))?;
        Ok(map.get(id).cloned())
    }

    fn write_map(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Handle>>, ChatError> {
        self.conversations
            .write()
            .map_err(|e| ChatError::StorageError(format!("store lock poisoned: {}", e)))
    }

    fn load_from_backend(&self, id: &str) -> Option<StoredConversation> {
        let backend = self.backend.as_ref()?;
        match backend.load(id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Durable history unavailable; continuing without it");
                None
            }
        }
    }
}

fn lock(handle: &Handle) -> Result<std::sync::MutexGuard<'_, Conversation>, ChatError> {
    handle
        .lock()
        .map_err(|e| ChatError::StorageError(format!("conversation lock poisoned: {}", e)))
}

fn mark_evicted(handle: &Handle) {
    match handle.lock() {
        Ok(mut convo) => convo.evicted = true,
        Err(poisoned) => poisoned.into_inner().evicted = true,
    }
}
