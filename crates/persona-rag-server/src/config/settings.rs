use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// One source document of the knowledge base.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CorpusSource {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub sources: Vec<CorpusSource>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                CorpusSource {
                    id: "resume".to_string(),
                    path: PathBuf::from("data/resume.txt"),
                },
                CorpusSource {
                    id: "behavioral_qa".to_string(),
                    path: PathBuf::from("data/behavioral_qa.txt"),
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("vector_index"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    /// Model identity; part of the persisted index version.
    pub model: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorProvider {
    Gemini,
    OpenaiCompatible,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    pub provider: GeneratorProvider,
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::Gemini,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            timeout_seconds: 30,
            temperature: 0.0,
            top_p: 0.5,
            top_k: 30,
            max_tokens: 1024,
        }
    }
}

/// Focused query used instead of the raw question when a keyword matches.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QueryExpansion {
    pub keywords: Vec<String>,
    pub query: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub timeline_top_k: usize,
    #[serde(default)]
    pub query_expansions: Vec<QueryExpansion>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            timeline_top_k: 6,
            query_expansions: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GuidedPrompt {
    /// Extraction field filled by the answer.
    pub field: String,
    pub question: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    pub greeting: String,
    pub completion_message: String,
    /// Number of most recent turns carried into a prompt.
    pub history_window: usize,
    pub guided_prompts: Vec<GuidedPrompt>,
    pub system_prompt: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello! I represent the candidate behind this résumé and can answer questions \
                       about their professional experience, achievements and career stories."
                .to_string(),
            completion_message: "Thanks, that helps me tailor my answers. \
                                 What would you like to know about my background?"
                .to_string(),
            history_window: 10,
            guided_prompts: vec![
                GuidedPrompt {
                    field: "company".to_string(),
                    question: "Before we start, which company are you reaching out from?".to_string(),
                },
                GuidedPrompt {
                    field: "role".to_string(),
                    question: "What role are you hiring for?".to_string(),
                },
                GuidedPrompt {
                    field: "focus_area".to_string(),
                    question: "Which part of my background matters most for that role?".to_string(),
                },
            ],
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    r#"You are the virtual representation of the candidate described in the provided context. Always speak in first person as the candidate.

Guidelines:
- Answer ONLY from the provided context; never invent companies, dates, metrics or technologies
- Be warm, conversational and specific about achievements, technologies, companies and metrics
- Build parallels between your experience and the opportunity being discussed
- Do not use markdown formatting, bullets or numbering
- When asked about timelines, use the exact dates and company order from the context"#
        .to_string()
}

/// Keywords that, when found in a generated reply, are recorded under `field`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FieldMatcher {
    pub field: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub matchers: Vec<FieldMatcher>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML document (no environment overlay).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            anyhow::bail!("chunking.size must be greater than zero");
        }

        if self.chunking.overlap >= self.chunking.size {
            anyhow::bail!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap,
                self.chunking.size
            );
        }

        if self.retrieval.top_k == 0 || self.retrieval.timeline_top_k == 0 {
            anyhow::bail!("retrieval top_k values must be greater than zero");
        }

        if self.corpus.sources.is_empty() {
            anyhow::bail!("corpus.sources must list at least one document");
        }

        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be greater than zero");
        }

        Ok(())
    }
}
