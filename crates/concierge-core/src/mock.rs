//! In-process capability implementations for tests and local wiring.
//!
//! Each mock is deterministic and records what it was asked, so pipeline
//! tests can assert on prompts, queries and notifications without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{CorpusLookup, HandoffNotifier, Reranker, TextGenerator, UserDirectory};
use crate::error::CapabilityError;
use crate::types::{CompletionRequest, HandoffEvent, Passage, UserProfile};

type Responder =
    dyn Fn(&CompletionRequest) -> Result<String, CapabilityError> + Send + Sync + 'static;

fn lock_vec<T: Clone>(items: &Mutex<Vec<T>>) -> Vec<T> {
    match items.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn push<T>(items: &Mutex<Vec<T>>, item: T) {
    match items.lock() {
        Ok(mut guard) => guard.push(item),
        Err(poisoned) => poisoned.into_inner().push(item),
    }
}

// =============================================================================
// MockTextGenerator
// =============================================================================

/// Text generator driven by a closure.
#[derive(Clone)]
pub struct MockTextGenerator {
    responder: Arc<Responder>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockTextGenerator {
    /// Answer every request with the closure's result.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(f),
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every request with the same text.
    pub fn with_reply(text: &str) -> Self {
        let text = text.to_string();
        Self::from_fn(move |_| Ok(text.clone()))
    }

    /// Fail every request with the given error.
    pub fn failing(err: CapabilityError) -> Self {
        Self::from_fn(move |_| Err(err.clone()))
    }

    /// Sleep before answering (to exercise timeouts and interleaving).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock_vec(&self.requests)
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CapabilityError> {
        push(&self.requests, request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(request)
    }
}

// =============================================================================
// MockCorpus
// =============================================================================

/// Corpus returning a fixed passage list.
#[derive(Clone, Default)]
pub struct MockCorpus {
    passages: Vec<Passage>,
    failure: Option<CapabilityError>,
    delay: Option<Duration>,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockCorpus {
    pub fn with_passages(passages: &[&str]) -> Self {
        Self {
            passages: passages.iter().map(|p| Passage::new(*p)).collect(),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(err: CapabilityError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(query, top_k)` pairs received so far.
    pub fn queries(&self) -> Vec<(String, usize)> {
        lock_vec(&self.queries)
    }
}

#[async_trait]
impl CorpusLookup for MockCorpus {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, CapabilityError> {
        push(&self.queries, (query.to_string(), top_k));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref err) = self.failure {
            return Err(err.clone());
        }
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }
}

// =============================================================================
// MockReranker
// =============================================================================

/// Reranker that reverses the incoming order, or fails.
#[derive(Clone, Default)]
pub struct MockReranker {
    failure: Option<CapabilityError>,
    delay: Option<Duration>,
}

impl MockReranker {
    pub fn reversing() -> Self {
        Self::default()
    }

    pub fn failing(err: CapabilityError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut passages: Vec<Passage>,
    ) -> Result<Vec<Passage>, CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref err) = self.failure {
            return Err(err.clone());
        }
        passages.reverse();
        Ok(passages)
    }
}

// =============================================================================
// MockUserDirectory
// =============================================================================

/// Directory backed by a phone → profile map.
#[derive(Clone, Default)]
pub struct MockUserDirectory {
    profiles: HashMap<String, UserProfile>,
    failure: Option<CapabilityError>,
    delay: Option<Duration>,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, phone: &str, name: &str) -> Self {
        self.profiles.insert(
            phone.to_string(),
            UserProfile {
                id: self.profiles.len() as i64 + 1,
                phone: phone.to_string(),
                name: name.to_string(),
                company: String::new(),
            },
        );
        self
    }

    pub fn failing(err: CapabilityError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn lookup_by_phone(&self, phone: &str) -> Result<Option<UserProfile>, CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref err) = self.failure {
            return Err(err.clone());
        }
        Ok(self.profiles.get(phone).cloned())
    }
}

// =============================================================================
// RecordingNotifier
// =============================================================================

/// Notifier that records events (and optionally fails after recording).
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<HandoffEvent>>>,
    failure: Option<CapabilityError>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: CapabilityError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Events delivered so far.
    pub fn events(&self) -> Vec<HandoffEvent> {
        lock_vec(&self.events)
    }
}

#[async_trait]
impl HandoffNotifier for RecordingNotifier {
    async fn notify(&self, event: &HandoffEvent) -> Result<(), CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        push(&self.events, event.clone());
        match self.failure {
            Some(ref err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
