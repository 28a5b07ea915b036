pub mod conversation;
pub mod embedding_service;
pub mod llm_service;
pub mod query_analyzer;
pub mod rag_service;
pub mod stats;

pub use embedding_service::{EmbeddingProvider, EmbeddingService};
pub use llm_service::{build_generator, GeminiGenerator, Generator, LlmService, Prompt};
pub use query_analyzer::QueryAnalyzer;
pub use rag_service::{RagService, RetrievalResult};
pub use stats::{CallKind, StatsSnapshot, StatsTracker};
