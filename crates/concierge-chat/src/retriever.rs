//! Knowledge-base retrieval with optional reranking.

use std::sync::Arc;

use tracing::{debug, warn};

use concierge_core::capability::{CorpusLookup, Reranker};
use concierge_core::config::{ConciergeConfig, TimeoutConfig};
use concierge_core::types::RetrievedContext;

use crate::deadline::with_deadline;

/// Fetches passages for a query. Never fails; errors produce an empty context.
pub struct ContextRetriever {
    corpus: Arc<dyn CorpusLookup>,
    reranker: Option<Arc<dyn Reranker>>,
    rerank_candidates: usize,
    timeouts: TimeoutConfig,
}

impl ContextRetriever {
    pub fn new(
        corpus: Arc<dyn CorpusLookup>,
        reranker: Option<Arc<dyn Reranker>>,
        config: &ConciergeConfig,
    ) -> Self {
        Self {
            corpus,
            reranker,
            rerank_candidates: config.retrieval.rerank_candidates,
            timeouts: config.timeouts.clone(),
        }
    }

    /// Return at most `top_k` passages ordered by relevance.
    ///
    /// With a reranker installed, a wider candidate set is fetched and
    /// reordered before truncation. A failed rerank keeps the corpus order.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> RetrievedContext {
        if top_k == 0 {
            return RetrievedContext::empty();
        }

        let fetch = match self.reranker {
            Some(_) => self.rerank_candidates.max(top_k),
            None => top_k,
        };

        let mut passages = match with_deadline(
            "corpus lookup",
            self.timeouts.retrieve(),
            self.corpus.search(query, fetch),
        )
        .await
        {
            Ok(passages) => passages,
            Err(e) => {
                warn!(error = %e, "Corpus lookup failed, continuing without context");
                return RetrievedContext::empty();
            }
        };

        if let Some(ref reranker) = self.reranker {
            if passages.len() > 1 {
                match with_deadline(
                    "reranker",
                    self.timeouts.rerank(),
                    reranker.rerank(query, passages.clone()),
                )
                .await
                {
                    Ok(reranked) if !reranked.is_empty() => passages = reranked,
                    Ok(_) => warn!("Reranker returned no passages, keeping corpus order"),
                    Err(e) => warn!(error = %e, "Rerank failed, keeping corpus order"),
                }
            }
        }

        passages.truncate(top_k);
        debug!(count = passages.len(), "Context retrieved");
        RetrievedContext { passages }
    }
}
