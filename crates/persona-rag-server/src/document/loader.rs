use std::fs;
use tracing::{debug, info};

use crate::config::CorpusSource;
use crate::utils::error::CorpusError;

/// Raw text of one knowledge-base document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

pub struct DocumentLoader;

impl DocumentLoader {
    /// Read every configured source, in order. Any missing, unreadable or
    /// blank document fails the whole load.
    pub fn load_corpus(sources: &[CorpusSource]) -> Result<Vec<SourceDocument>, CorpusError> {
        if sources.is_empty() {
            return Err(CorpusError::NoSources);
        }

        let mut documents = Vec::with_capacity(sources.len());

        for source in sources {
            if !source.path.is_file() {
                return Err(CorpusError::NotFound(source.path.clone()));
            }

            let text = fs::read_to_string(&source.path).map_err(|e| CorpusError::Unreadable {
                path: source.path.clone(),
                source: e,
            })?;

            if text.trim().is_empty() {
                return Err(CorpusError::Empty(source.id.clone()));
            }

            debug!("Loaded source '{}' from {:?} ({} chars)", source.id, source.path, text.chars().count());
            documents.push(SourceDocument::new(source.id.clone(), text));
        }

        info!("Loaded {} source documents", documents.len());
        Ok(documents)
    }
}
