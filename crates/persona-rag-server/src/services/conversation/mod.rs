//! Session-scoped conversation engine
//!
//! - Session store with per-session locking (DashMap + tokio Mutex)
//! - Guided script with a pluggable answer classifier
//! - Prompt assembly with a bounded history window
//! - Keyword extraction from generated replies

mod context_builder;
pub mod extraction;
pub mod manager;
pub mod script;
pub mod session_store;
pub mod types;

pub use context_builder::ContextBuilder;
pub use extraction::FieldExtractor;
pub use manager::{ConversationDeps, ConversationManager, TurnOutcome};
pub use script::{AnswerClassifier, AnswerVerdict, GuidedScript, HeuristicClassifier};
pub use session_store::{SessionHandle, SessionStore};
pub use types::{
    ConversationTurn, ExtractionRecord, Session, SessionId, SessionStage, Speaker, TurnKind,
    TurnStatus,
};
