#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use persona_rag_server::bootstrap::build_state_with;
use persona_rag_server::config::{
    CorpusSource, FieldMatcher, GuidedPrompt, Settings,
};
use persona_rag_server::services::conversation::ConversationManager;
use persona_rag_server::services::{EmbeddingProvider, Generator, Prompt};
use persona_rag_server::state::AppState;
use persona_rag_server::utils::error::{EmbeddingError, GenerationError};

pub const SKILLS_LINE: &str = "Skilled in Python, Go, and distributed systems.";

/// Deterministic embedder: one dimension per keyword group plus a bias term.
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    available: AtomicBool,
}

const GROUPS: &[&[&str]] = &[
    &["technolog", "skill", "python", "distributed", "language"],
    &["conflict", "disagree", "team"],
    &["company", "northwind", "contoso", "employer"],
    &["fail", "learn", "mistake"],
];

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_id(&self) -> String {
        "keyword-test-embedder".to_string()
    }

    fn dimension(&self) -> usize {
        GROUPS.len() + 1
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Http("embedding server down".to_string()));
        }

        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = GROUPS
            .iter()
            .map(|group| group.iter().map(|k| lower.matches(k).count()).sum::<usize>() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

/// Generator that echoes a fixed reply and records every prompt.
pub struct ScriptedGenerator {
    reply: String,
    failing: AtomicBool,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            failing: AtomicBool::new(false),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        self.prompts.lock().push(prompt.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::Http("upstream reset".to_string()));
        }
        Ok(self.reply.clone())
    }
}

pub fn write_corpus(dir: &Path) -> Vec<CorpusSource> {
    let resume = dir.join("resume.txt");
    let qa = dir.join("behavioral_qa.txt");
    std::fs::write(
        &resume,
        format!("{}\nStaff Engineer at Northwind Labs since 2022.", SKILLS_LINE),
    )
    .unwrap();
    std::fs::write(
        &qa,
        "Q: Tell me about a conflict on your team.\nA: Two engineers disagreed; I ran a design review.",
    )
    .unwrap();

    vec![
        CorpusSource {
            id: "resume".to_string(),
            path: resume,
        },
        CorpusSource {
            id: "behavioral_qa".to_string(),
            path: qa,
        },
    ]
}

pub fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.corpus.sources = write_corpus(dir);
    settings.index.dir = dir.join("vector_index");
    settings.embedding.dimension = GROUPS.len() + 1;
    settings.embedding.timeout_seconds = 2;
    settings.generator.timeout_seconds = 2;
    settings.conversation.greeting = "Hello!".to_string();
    settings.conversation.completion_message = "Thanks, ask me anything.".to_string();
    settings.conversation.guided_prompts = vec![
        GuidedPrompt {
            field: "company".to_string(),
            question: "Which company are you from?".to_string(),
        },
        GuidedPrompt {
            field: "role".to_string(),
            question: "Which role are you hiring for?".to_string(),
        },
    ];
    settings.extraction.matchers = vec![FieldMatcher {
        field: "skills".to_string(),
        keywords: vec!["Python".to_string(), "Go".to_string(), "distributed systems".to_string()],
    }];
    settings
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub embedder: Arc<KeywordEmbedder>,
    pub generator: Arc<ScriptedGenerator>,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::start_with_reply("I am skilled in Python and Go.").await
    }

    pub async fn start_with_reply(reply: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(KeywordEmbedder::new());
        let generator = Arc::new(ScriptedGenerator::new(reply));

        let state = build_state_with(test_settings(dir.path()), embedder.clone(), generator.clone())
            .await
            .unwrap();

        Self {
            dir,
            state,
            embedder,
            generator,
        }
    }

    pub fn manager(&self) -> Arc<ConversationManager> {
        self.state.conversation_manager.clone()
    }
}
