use tracing::debug;

use super::types::{Session, Speaker, TurnStatus};
use crate::index::ScoredChunk;
use crate::services::llm_service::{Prompt, PromptMessage, PromptRole};

const NO_CONTEXT: &str = "No relevant context found.";

pub struct ContextBuilder {
    system_prompt: String,
    history_window: usize,
}

impl ContextBuilder {
    pub fn new(system_prompt: String, history_window: usize) -> Self {
        Self {
            system_prompt,
            history_window,
        }
    }

    /// Prompt for an open question: system instruction, recent history and
    /// the question wrapped with the retrieved context.
    pub fn build_prompt(&self, session: &Session, question: &str, hits: &[ScoredChunk]) -> Prompt {
        let history = self.history(session);
        debug!(
            "Assembling prompt with {} history messages and {} context chunks",
            history.len(),
            hits.len()
        );

        Prompt {
            system: self.system_prompt.clone(),
            history,
            user: Self::format_user_message(question, hits),
        }
    }

    /// Most recent successful turns, oldest first, starting on a user turn.
    pub fn history(&self, session: &Session) -> Vec<PromptMessage> {
        let successful: Vec<_> = session
            .turns()
            .iter()
            .filter(|t| t.status == TurnStatus::Ok)
            .collect();

        let start = successful.len().saturating_sub(self.history_window);
        successful[start..]
            .iter()
            .skip_while(|t| t.speaker != Speaker::User)
            .map(|t| PromptMessage {
                role: match t.speaker {
                    Speaker::User => PromptRole::User,
                    Speaker::System => PromptRole::Model,
                },
                text: t.text.clone(),
            })
            .collect()
    }

    pub fn format_user_message(question: &str, hits: &[ScoredChunk]) -> String {
        let context = if hits.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            hits.iter()
                .map(|hit| format!("[source: {}]\n{}", hit.chunk.id, hit.chunk.text))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        format!(
            "IMPORTANT: You must ONLY use information from the context below. \
             Do not add any details not explicitly mentioned in the context.\n\n\
             CONTEXT INFORMATION:\n{}\n\n\
             USER'S QUESTION:\n{}\n\n\
             INSTRUCTIONS: Answer the user's question using ONLY the information provided \
             in the context above. Do not invent, assume, or add any details not present in the context.",
            context, question
        )
    }
}
