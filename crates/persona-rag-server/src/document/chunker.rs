use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::loader::SourceDocument;
use crate::utils::error::ChunkError;

/// Stable chunk identity: source document plus character offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub source_id: String,
    pub offset: usize,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source_id, self.offset)
    }
}

/// Immutable window of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    /// Position in the whole corpus; breaks similarity ties.
    pub ordinal: usize,
    pub text: String,
}

/// Fixed-size sliding window chunker, measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroSize);
        }

        if overlap >= chunk_size {
            return Err(ChunkError::InvalidOverlap {
                size: chunk_size,
                overlap,
            });
        }

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split one document into windows of `chunk_size` advancing by
    /// `chunk_size - overlap`. The last window may be shorter.
    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total_len = chars.len();
        let step = self.chunk_size - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_len {
            let end = std::cmp::min(start + self.chunk_size, total_len);

            chunks.push(Chunk {
                id: ChunkId {
                    source_id: source_id.to_string(),
                    offset: start,
                },
                ordinal: chunks.len(),
                text: chars[start..end].iter().collect(),
            });

            if end >= total_len {
                break;
            }

            start += step;
        }

        chunks
    }

    /// Chunk every document in order, numbering chunks across the whole corpus.
    pub fn chunk_corpus(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut all = Vec::new();

        for doc in documents {
            for mut chunk in self.chunk(&doc.id, &doc.text) {
                chunk.ordinal = all.len();
                all.push(chunk);
            }
        }

        tracing::debug!(
            "Chunked {} documents into {} chunks (size={}, overlap={})",
            documents.len(),
            all.len(),
            self.chunk_size,
            self.overlap
        );

        all
    }
}
