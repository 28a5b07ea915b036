use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::index::ScoredChunk;
use crate::services::StatsSnapshot;

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub userid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub userid: String,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatusLabel {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source_id: String,
    pub offset: usize,
    pub score: f32,
}

impl From<&ScoredChunk> for SourceInfo {
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            source_id: hit.chunk.id.source_id.clone(),
            offset: hit.chunk.id.offset,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub userid: String,
    pub next_question: Option<String>,
    pub status: TurnStatusLabel,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceInfo>,
}

pub type ExtractionResponse = BTreeMap<String, String>;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub userid: String,
    pub status: TurnStatusLabel,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub api_stats: StatsSnapshot,
    pub vectorstore_ready: bool,
    pub active_sessions: usize,
}
