use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub type SessionId = String;

/// Where a session sits in the conversation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStage {
    New,
    GreetingSent,
    InProgress,
    /// Advisory only; open questions are still answered.
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Ok,
    Failed,
}

/// How the engine handled one inbound turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Opening,
    Guided,
    Open,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub status: TurnStatus,
}

/// Field name to values, built additively over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionRecord(BTreeMap<String, Vec<String>>);

impl ExtractionRecord {
    /// Record `value` under `field` unless an equal value (ignoring ASCII
    /// case) is already there. Returns true if anything changed.
    pub fn merge(&mut self, field: &str, value: &str) -> bool {
        let value = value.trim();
        if field.is_empty() || value.is_empty() {
            return false;
        }

        let values = self.0.entry(field.to_string()).or_default();
        if values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            return false;
        }
        values.push(value.to_string());
        true
    }

    /// Values of `field` joined with ", ".
    pub fn get(&self, field: &str) -> Option<String> {
        self.0.get(field).map(|values| values.join(", "))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flat key to value view served over HTTP.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(field, values)| (field.clone(), values.join(", ")))
            .collect()
    }
}

impl Serialize for ExtractionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(field, values)| (field, values.join(", "))))
    }
}

/// Server-side state of one conversation.
///
/// Turns are append-only and the guided stage only moves forward, one
/// step at a time; the mutators below are the only way to change either.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: SessionId,
    stage: SessionStage,
    guided_stage: usize,
    turns: Vec<ConversationTurn>,
    extraction: ExtractionRecord,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            stage: SessionStage::New,
            guided_stage: 0,
            turns: Vec::new(),
            extraction: ExtractionRecord::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn guided_stage(&self) -> usize {
        self.guided_stage
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn extraction(&self) -> &ExtractionRecord {
        &self.extraction
    }

    pub(crate) fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>, status: TurnStatus) {
        self.turns.push(ConversationTurn {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
            status,
        });
    }

    pub(crate) fn set_stage(&mut self, stage: SessionStage) {
        self.stage = stage;
    }

    pub(crate) fn advance_guided_stage(&mut self) {
        self.guided_stage += 1;
    }

    pub(crate) fn extraction_mut(&mut self) -> &mut ExtractionRecord {
        &mut self.extraction
    }
}
