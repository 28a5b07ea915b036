use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid chunking parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Chunk size must be greater than zero")]
    ZeroSize,

    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidOverlap { size: usize, overlap: usize },
}

/// Source documents could not be loaded. Always fatal at startup.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("No corpus sources configured")]
    NoSources,

    #[error("Source document not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to read source document {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source document '{0}' is empty")]
    Empty(String),
}

#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    #[error("Embedding server unreachable: {0}")]
    Http(String),

    #[error("Embedding API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Unrecognized embedding response: {0}")]
    Malformed(String),

    #[error("Generated embedding is empty")]
    Empty,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("No persisted index at {0:?}")]
    Missing(PathBuf),

    #[error("Persisted index is incompatible: {0}")]
    Incompatible(String),

    #[error("Persisted index is corrupt: {0}")]
    Corrupt(String),

    #[error("Index IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to embed chunk {chunk}: {source}")]
    Embedding {
        chunk: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Embedding of chunk {0} timed out")]
    Timeout(String),

    #[error("Cannot build an index from an empty corpus")]
    EmptyCorpus,

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    #[error("Index is not ready")]
    NotReady,

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Query embedding timed out after {0:?}")]
    Timeout(Duration),

    #[error("Similarity search failed: {0}")]
    Search(String),
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    #[error("Network error calling generator: {0}")]
    Http(String),

    #[error("Generator API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response format from generator: {0}")]
    Malformed(String),

    #[error("Generator returned an empty response")]
    Empty,

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Turn-level failure. Recovered by the conversation engine, never fatal to the session.
#[derive(Error, Debug, Clone)]
pub enum TurnError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl TurnError {
    /// Human-readable apology shown to the caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            TurnError::Retrieval(_) => {
                "Sorry, I couldn't look that up right now. Could you please try again?"
            }
            TurnError::Generation(GenerationError::Http(_) | GenerationError::Timeout(_)) => {
                "Sorry, I encountered a network error. Could you please repeat that?"
            }
            TurnError::Generation(_) => {
                "Sorry, I received an unexpected response. Could you please try again?"
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Retrieval(_) => "retrieval_error",
            TurnError::Generation(_) => "generation_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),


    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
