use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::index::{ScoredChunk, VectorIndex};
use crate::services::embedding_service::EmbeddingProvider;
use crate::services::stats::{CallKind, StatsTracker};
use crate::utils::error::RetrievalError;

/// Ranked hits for one query, best first.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

/// Embeds a question and searches the installed index.
///
/// The index slot stays empty until a fully built index is installed, so a
/// query never sees a partially populated index.
pub struct RagService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: RwLock<Option<Arc<VectorIndex>>>,
    stats: StatsTracker,
    call_timeout: Duration,
}

impl RagService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, stats: StatsTracker, call_timeout: Duration) -> Self {
        Self {
            embedder,
            index: RwLock::new(None),
            stats,
            call_timeout,
        }
    }

    pub fn install(&self, index: VectorIndex) {
        info!("Installing vector index with {} entries", index.len());
        *self.index.write() = Some(Arc::new(index));
    }

    pub fn is_ready(&self) -> bool {
        self.index.read().is_some()
    }

    /// Embed `query` once and return the top `k` chunks.
    pub async fn query(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        // clone the Arc so no lock is held across the embedding call
        let index = self.index.read().clone().ok_or(RetrievalError::NotReady)?;

        debug!("Embedding query ({} chars) for top-{} search", query.len(), k);
        let outcome = tokio::time::timeout(self.call_timeout, self.embedder.embed(query)).await;
        self.stats.record(CallKind::Embedding, matches!(outcome, Ok(Ok(_))));

        let vector = match outcome {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                warn!("Query embedding failed: {}", e);
                return Err(RetrievalError::Embedding(e));
            }
            Err(_) => {
                warn!("Query embedding timed out after {:?}", self.call_timeout);
                return Err(RetrievalError::Timeout(self.call_timeout));
            }
        };

        let hits = index.search(&vector, k)?;
        Ok(RetrievalResult { hits })
    }
}
