pub mod chunker;
pub mod loader;

pub use chunker::{Chunk, ChunkId, TextChunker};
pub use loader::{DocumentLoader, SourceDocument};
