//! Brute-force cosine index over the chunk corpus.
//!
//! The index is immutable once built: `build` embeds every chunk up front and
//! fails as a whole if any embedding fails, so a value of this type is always
//! complete and safe to share behind an `Arc`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::document::{Chunk, SourceDocument, TextChunker};
use crate::services::embedding_service::EmbeddingProvider;
use crate::services::stats::{CallKind, StatsTracker};
use crate::utils::error::{IndexError, RetrievalError};
use crate::utils::similarity::cosine_similarity;

/// Bumped whenever the persisted layout changes.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
}

/// Everything a persisted index must agree on to be reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub schema_version: u32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: SimilarityMetric,
    pub corpus_fingerprint: String,
}

impl IndexManifest {
    /// Manifest the current configuration and corpus would produce.
    pub fn expected(
        chunker: &TextChunker,
        embedder: &dyn EmbeddingProvider,
        documents: &[SourceDocument],
    ) -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            chunk_size: chunker.chunk_size(),
            chunk_overlap: chunker.overlap(),
            embedding_model: embedder.model_id(),
            dimension: embedder.dimension(),
            metric: SimilarityMetric::Cosine,
            corpus_fingerprint: corpus_fingerprint(documents),
        }
    }

    /// First field that differs from `expected`, if any.
    pub fn incompatibility(&self, expected: &IndexManifest) -> Option<String> {
        if self.schema_version != expected.schema_version {
            return Some(format!(
                "schema version {} != {}",
                self.schema_version, expected.schema_version
            ));
        }
        if self.chunk_size != expected.chunk_size || self.chunk_overlap != expected.chunk_overlap {
            return Some(format!(
                "chunking {}/{} != {}/{}",
                self.chunk_size, self.chunk_overlap, expected.chunk_size, expected.chunk_overlap
            ));
        }
        if self.embedding_model != expected.embedding_model {
            return Some(format!(
                "embedding model '{}' != '{}'",
                self.embedding_model, expected.embedding_model
            ));
        }
        if self.dimension != expected.dimension {
            return Some(format!("dimension {} != {}", self.dimension, expected.dimension));
        }
        if self.metric != expected.metric {
            return Some("similarity metric changed".to_string());
        }
        if self.corpus_fingerprint != expected.corpus_fingerprint {
            return Some("source documents changed".to_string());
        }
        None
    }
}

/// SHA-256 over source ids and texts, in corpus order.
pub fn corpus_fingerprint(documents: &[SourceDocument]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk and assemble the index. Any failed or timed-out
    /// embedding aborts the build; no partial index is ever returned.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        stats: &StatsTracker,
        manifest: IndexManifest,
        call_timeout: Duration,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        info!("Building vector index for {} chunks", chunks.len());
        let mut entries = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let outcome = tokio::time::timeout(call_timeout, embedder.embed(&chunk.text)).await;
            stats.record(CallKind::Embedding, matches!(outcome, Ok(Ok(_))));

            let vector = match outcome {
                Ok(Ok(vector)) => vector,
                Ok(Err(e)) => {
                    warn!("Embedding failed for chunk {}: {}", chunk.id, e);
                    return Err(IndexError::Embedding {
                        chunk: chunk.id.to_string(),
                        source: e,
                    });
                }
                Err(_) => return Err(IndexError::Timeout(chunk.id.to_string())),
            };

            if vector.len() != manifest.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: vector.len(),
                });
            }

            entries.push(IndexEntry { chunk, vector });
        }

        info!("Vector index built with {} entries", entries.len());
        Ok(Self { manifest, entries })
    }

    /// Reassemble a persisted index, checking every vector against the manifest.
    pub fn from_parts(manifest: IndexManifest, entries: Vec<IndexEntry>) -> Result<Self, IndexError> {
        if entries.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        for entry in &entries {
            if entry.vector.len() != manifest.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: entry.vector.len(),
                });
            }
        }

        Ok(Self { manifest, entries })
    }

    /// Top-`k` chunks by descending similarity; ties keep corpus order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let mut scored = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let score = cosine_similarity(query, &entry.vector)
                .map_err(|e| RetrievalError::Search(e.to_string()))?;
            scored.push((score, entry));
        }

        scored.sort_by(|(sa, ea), (sb, eb)| {
            sb.total_cmp(sa)
                .then_with(|| ea.chunk.ordinal.cmp(&eb.chunk.ordinal))
        });
        scored.truncate(k);

        debug!(
            "Search returned {} hits (best score {:?})",
            scored.len(),
            scored.first().map(|(s, _)| *s)
        );

        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ChunkId;
    use crate::services::embedding_service::MockEmbeddingProvider;
    use crate::utils::error::EmbeddingError;

    fn chunk(ordinal: usize, text: &str) -> Chunk {
        Chunk {
            id: ChunkId {
                source_id: "resume".to_string(),
                offset: ordinal * 10,
            },
            ordinal,
            text: text.to_string(),
        }
    }

    fn manifest(dimension: usize) -> IndexManifest {
        IndexManifest {
            schema_version: INDEX_SCHEMA_VERSION,
            chunk_size: 10,
            chunk_overlap: 2,
            embedding_model: "mock".to_string(),
            dimension,
            metric: SimilarityMetric::Cosine,
            corpus_fingerprint: "abc".to_string(),
        }
    }

    fn index_with(vectors: &[(&str, Vec<f32>)]) -> VectorIndex {
        let entries = vectors
            .iter()
            .enumerate()
            .map(|(i, (text, v))| IndexEntry {
                chunk: chunk(i, text),
                vector: v.clone(),
            })
            .collect();
        VectorIndex::from_parts(manifest(2), entries).unwrap()
    }

    #[test]
    fn test_search_orders_by_descending_score() {
        let index = index_with(&[
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.1]),
            ("middle", vec![1.0, 1.0]),
        ]);

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "near");
        assert_eq!(hits[1].chunk.text, "middle");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = index_with(&[
            ("first", vec![0.6, 0.8]),
            ("second", vec![0.6, 0.8]),
            ("third", vec![0.6, 0.8]),
        ]);

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<_> = hits.iter().map(|h| h.chunk.ordinal).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = index_with(&[("only", vec![1.0, 0.0])]);
        assert_eq!(index.search(&[1.0, 0.0], 4).unwrap().len(), 1);
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = index_with(&[("only", vec![1.0, 0.0])]);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 4),
            Err(RetrievalError::Search(_))
        ));
    }

    #[tokio::test]
    async fn test_build_embeds_every_chunk() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .times(3)
            .returning(|text| Ok(vec![text.len() as f32, 1.0]));

        let stats = StatsTracker::new();
        let chunks = vec![chunk(0, "a"), chunk(1, "bb"), chunk(2, "ccc")];
        let index = VectorIndex::build(chunks, &embedder, &stats, manifest(2), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.entries()[2].vector, vec![3.0, 1.0]);
        assert_eq!(stats.snapshot().embedding.successes, 3);
    }

    #[tokio::test]
    async fn test_build_fails_fast_without_partial_index() {
        let mut embedder = MockEmbeddingProvider::new();
        let mut calls = 0;
        embedder.expect_embed().times(2).returning(move |_| {
            calls += 1;
            if calls == 2 {
                Err(EmbeddingError::Http("connection refused".to_string()))
            } else {
                Ok(vec![1.0, 0.0])
            }
        });

        let stats = StatsTracker::new();
        let chunks = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")];
        let result =
            VectorIndex::build(chunks, &embedder, &stats, manifest(2), Duration::from_secs(1)).await;

        assert!(matches!(result, Err(IndexError::Embedding { .. })));
        let snap = stats.snapshot().embedding;
        assert_eq!((snap.successes, snap.failures), (1, 1));
    }

    #[tokio::test]
    async fn test_build_rejects_empty_corpus() {
        let embedder = MockEmbeddingProvider::new();
        let result = VectorIndex::build(
            Vec::new(),
            &embedder,
            &StatsTracker::new(),
            manifest(2),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(IndexError::EmptyCorpus)));
    }

    #[test]
    fn test_manifest_incompatibility() {
        let base = manifest(2);
        assert!(base.incompatibility(&base).is_none());

        let mut other = base.clone();
        other.chunk_overlap = 3;
        assert!(other.incompatibility(&base).unwrap().contains("chunking"));

        let mut other = base.clone();
        other.embedding_model = "another".to_string();
        assert!(other.incompatibility(&base).unwrap().contains("embedding model"));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = vec![SourceDocument::new("resume", "Skilled in Go")];
        let b = vec![SourceDocument::new("resume", "Skilled in Rust")];
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&a));
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
    }
}
