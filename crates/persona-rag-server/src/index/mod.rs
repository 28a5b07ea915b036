//! Vector index over the chunk corpus and its on-disk persistence.

pub mod store;
pub mod vector_index;

pub use store::IndexStore;
pub use vector_index::{
    corpus_fingerprint, IndexEntry, IndexManifest, ScoredChunk, SimilarityMetric, VectorIndex,
    INDEX_SCHEMA_VERSION,
};
