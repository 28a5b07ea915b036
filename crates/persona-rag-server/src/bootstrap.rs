//! Startup wiring: corpus, index, services and the conversation manager.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Settings;
use crate::document::{DocumentLoader, SourceDocument, TextChunker};
use crate::index::{IndexManifest, IndexStore, VectorIndex};
use crate::services::conversation::{
    ConversationDeps, ConversationManager, HeuristicClassifier, SessionStore,
};
use crate::services::{build_generator, EmbeddingProvider, EmbeddingService, Generator, RagService, StatsTracker};
use crate::state::AppState;
use crate::utils::error::IndexError;

/// Reuse the persisted index when it matches the current corpus and
/// parameters; otherwise rebuild it from scratch and persist it.
pub async fn load_or_build_index(
    store: &IndexStore,
    chunker: &TextChunker,
    documents: &[SourceDocument],
    embedder: &dyn EmbeddingProvider,
    stats: &StatsTracker,
    call_timeout: Duration,
) -> Result<VectorIndex, IndexError> {
    let expected = IndexManifest::expected(chunker, embedder, documents);

    match store.load(&expected) {
        Ok(index) => return Ok(index),
        Err(IndexError::Missing(path)) => info!("No persisted index at {:?}, building", path),
        Err(e) => warn!("Persisted index unusable ({}), rebuilding", e),
    }

    let chunks = chunker.chunk_corpus(documents);
    let index = VectorIndex::build(chunks, embedder, stats, expected, call_timeout).await?;
    store.save(&index)?;
    Ok(index)
}

/// Build application state with the configured HTTP back ends.
pub async fn build_state(settings: Settings) -> Result<AppState> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        EmbeddingService::new(&settings.embedding).context("Failed to build embedding HTTP client")?,
    );
    let generator =
        build_generator(&settings.generator).context("Failed to build generator HTTP client")?;
    build_state_with(settings, embedder, generator).await
}

/// Build application state around the given capability back ends.
pub async fn build_state_with(
    settings: Settings,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
) -> Result<AppState> {
    let documents = DocumentLoader::load_corpus(&settings.corpus.sources)
        .context("Failed to load knowledge-base documents")?;

    let chunker = TextChunker::new(settings.chunking.size, settings.chunking.overlap)?;
    let stats = StatsTracker::new();
    let embedding_timeout = Duration::from_secs(settings.embedding.timeout_seconds.max(1));

    let index = load_or_build_index(
        &IndexStore::new(&settings.index.dir),
        &chunker,
        &documents,
        embedder.as_ref(),
        &stats,
        embedding_timeout,
    )
    .await
    .context("Failed to prepare vector index")?;

    let retriever = Arc::new(RagService::new(embedder, stats.clone(), embedding_timeout));
    retriever.install(index);

    let manager = ConversationManager::new(
        ConversationDeps {
            sessions: Arc::new(SessionStore::new()),
            retriever,
            generator,
            classifier: Arc::new(HeuristicClassifier::new()?),
            stats,
        },
        &settings.conversation,
        &settings.retrieval,
        &settings.extraction,
        Duration::from_secs(settings.generator.timeout_seconds.max(1)),
    )?;

    info!("Conversation engine ready");
    Ok(AppState {
        conversation_manager: Arc::new(manager),
        settings: Arc::new(settings),
    })
}
