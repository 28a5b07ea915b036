use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ConversationConfig, ExtractionConfig, RetrievalConfig};
use crate::index::ScoredChunk;
use crate::services::llm_service::Generator;
use crate::services::query_analyzer::QueryAnalyzer;
use crate::services::rag_service::RagService;
use crate::services::stats::{CallKind, StatsSnapshot, StatsTracker};
use crate::utils::error::{GenerationError, TurnError};

use super::context_builder::ContextBuilder;
use super::extraction::FieldExtractor;
use super::script::{AnswerClassifier, AnswerVerdict, GuidedScript};
use super::session_store::SessionStore;
use super::types::{Session, SessionId, SessionStage, Speaker, TurnKind, TurnStatus};

/// Result of one inbound turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub kind: TurnKind,
    pub stage: SessionStage,
    pub reply: Result<String, TurnError>,
    /// Retrieved chunks behind an open-turn reply.
    pub sources: Vec<ScoredChunk>,
}

/// Collaborators the manager is built from.
pub struct ConversationDeps {
    pub sessions: Arc<SessionStore>,
    pub retriever: Arc<RagService>,
    pub generator: Arc<dyn Generator>,
    pub classifier: Arc<dyn AnswerClassifier>,
    pub stats: StatsTracker,
}

/// Per-session state machine: opening move, guided questions, open
/// retrieval-backed questions, and turn-local error recovery.
pub struct ConversationManager {
    sessions: Arc<SessionStore>,
    retriever: Arc<RagService>,
    generator: Arc<dyn Generator>,
    classifier: Arc<dyn AnswerClassifier>,
    stats: StatsTracker,
    analyzer: QueryAnalyzer,
    script: GuidedScript,
    extractor: FieldExtractor,
    context_builder: ContextBuilder,
    greeting: String,
    completion_message: String,
    generation_timeout: Duration,
}

impl ConversationManager {
    pub fn new(
        deps: ConversationDeps,
        conversation: &ConversationConfig,
        retrieval: &RetrievalConfig,
        extraction: &ExtractionConfig,
        generation_timeout: Duration,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            sessions: deps.sessions,
            retriever: deps.retriever,
            generator: deps.generator,
            classifier: deps.classifier,
            stats: deps.stats,
            analyzer: QueryAnalyzer::new(retrieval)?,
            script: GuidedScript::new(conversation.guided_prompts.clone()),
            extractor: FieldExtractor::new(&extraction.matchers)?,
            context_builder: ContextBuilder::new(
                conversation.system_prompt.clone(),
                conversation.history_window,
            ),
            greeting: conversation.greeting.clone(),
            completion_message: conversation.completion_message.clone(),
            generation_timeout,
        })
    }

    /// Process one turn to completion. Turns for the same session are
    /// applied one at a time, in the order they acquire the session lock.
    pub async fn handle_turn(&self, user_input: &str, userid: Option<&str>) -> TurnOutcome {
        let (session_id, handle) = self.sessions.get_or_create(userid);
        let mut session = handle.lock().await;

        let (kind, reply, sources) = if session.stage() == SessionStage::New {
            (TurnKind::Opening, Ok(self.opening(&mut session, user_input)), Vec::new())
        } else {
            let verdict = match self.script.prompt(session.guided_stage()) {
                Some(prompt) => self.classifier.classify(prompt, user_input),
                None => AnswerVerdict::Open,
            };

            match verdict {
                AnswerVerdict::Answer(value) => (
                    TurnKind::Guided,
                    Ok(self.guided(&mut session, user_input, value)),
                    Vec::new(),
                ),
                AnswerVerdict::Open => match self.open(&mut session, user_input).await {
                    Ok((reply, hits)) => (TurnKind::Open, Ok(reply), hits),
                    Err(e) => (TurnKind::Open, Err(e), Vec::new()),
                },
            }
        };

        match &reply {
            Ok(_) => info!(
                "Session {} {:?} turn ok (stage {:?}, guided {})",
                session_id,
                kind,
                session.stage(),
                session.guided_stage()
            ),
            Err(e) => warn!("Session {} {:?} turn failed: {}", session_id, kind, e),
        }

        TurnOutcome {
            session_id,
            kind,
            stage: session.stage(),
            reply,
            sources,
        }
    }

    /// Run a turn on its own task. The turn, its session writes and its
    /// call stats complete even if the caller stops waiting for the outcome.
    pub async fn spawn_turn(
        self: &Arc<Self>,
        user_input: String,
        userid: Option<String>,
    ) -> Result<TurnOutcome, tokio::task::JoinError> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.handle_turn(&user_input, userid.as_deref()).await }).await
    }

    fn opening(&self, session: &mut Session, user_input: &str) -> String {
        let reply = match self.script.prompt(0) {
            Some(prompt) => format!("{}\n\n{}", self.greeting, prompt.question),
            None => self.greeting.clone(),
        };

        session.push_turn(Speaker::User, user_input, TurnStatus::Ok);
        session.push_turn(Speaker::System, reply.clone(), TurnStatus::Ok);
        session.set_stage(SessionStage::GreetingSent);
        reply
    }

    fn guided(&self, session: &mut Session, user_input: &str, value: Option<String>) -> String {
        if let (Some(prompt), Some(value)) = (self.script.prompt(session.guided_stage()), value) {
            debug!("Guided answer for '{}': {}", prompt.field, value);
            session.extraction_mut().merge(&prompt.field, &value);
        }
        session.advance_guided_stage();

        let (reply, stage) = match self.script.prompt(session.guided_stage()) {
            Some(next) => (next.question.clone(), SessionStage::InProgress),
            None => (self.completion_message.clone(), SessionStage::Completed),
        };

        session.push_turn(Speaker::User, user_input, TurnStatus::Ok);
        session.push_turn(Speaker::System, reply.clone(), TurnStatus::Ok);
        session.set_stage(stage);
        reply
    }

    async fn open(
        &self,
        session: &mut Session,
        question: &str,
    ) -> Result<(String, Vec<ScoredChunk>), TurnError> {
        match self.answer(session, question).await {
            Ok((answer, hits)) => {
                for (field, value) in self.extractor.extract(&answer) {
                    session.extraction_mut().merge(&field, &value);
                }

                // keep the pending guided question in front of the visitor
                let reply = match self.script.prompt(session.guided_stage()) {
                    Some(pending) => format!("{}\n\n{}", answer, pending.question),
                    None => answer,
                };

                session.push_turn(Speaker::User, question, TurnStatus::Ok);
                session.push_turn(Speaker::System, reply.clone(), TurnStatus::Ok);
                if self.script.is_exhausted(session.guided_stage()) {
                    session.set_stage(SessionStage::Completed);
                } else {
                    session.set_stage(SessionStage::InProgress);
                }
                Ok((reply, hits))
            }
            Err(e) => {
                session.push_turn(Speaker::User, question, TurnStatus::Failed);
                session.set_stage(SessionStage::Error);
                Err(e)
            }
        }
    }

    /// Retrieval then generation. Reads the session, never mutates it.
    async fn answer(
        &self,
        session: &Session,
        question: &str,
    ) -> Result<(String, Vec<ScoredChunk>), TurnError> {
        let plan = self.analyzer.plan(question);
        debug!("Retrieval plan {:?} with k={}", plan.intent, plan.k);

        let retrieval = self.retriever.query(&plan.query, plan.k).await?;
        let prompt = self
            .context_builder
            .build_prompt(session, question, &retrieval.hits);

        let outcome = tokio::time::timeout(self.generation_timeout, self.generator.generate(&prompt)).await;
        self.stats.record(CallKind::Generation, matches!(outcome, Ok(Ok(_))));

        let answer = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(GenerationError::Timeout(self.generation_timeout).into()),
        };

        Ok((answer, retrieval.hits))
    }

    /// Flat extraction map for `id`; empty for unknown sessions.
    pub async fn extraction(&self, id: &str) -> BTreeMap<String, String> {
        match self.sessions.get(id) {
            Some(handle) => handle.lock().await.extraction().to_map(),
            None => BTreeMap::new(),
        }
    }

    /// Point-in-time copy of a session.
    pub async fn session(&self, id: &str) -> Option<Session> {
        let handle = self.sessions.get(id)?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    pub fn reset(&self, id: &str) {
        self.sessions.reset(id);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.retriever.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldMatcher, GuidedPrompt};
    use crate::document::{Chunk, ChunkId};
    use crate::index::{IndexEntry, IndexManifest, SimilarityMetric, VectorIndex, INDEX_SCHEMA_VERSION};
    use crate::services::conversation::script::HeuristicClassifier;
    use crate::services::embedding_service::MockEmbeddingProvider;
    use crate::services::llm_service::{MockGenerator, Prompt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowGenerator {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowGenerator {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok("I mostly write Python.".to_string())
        }
    }

    fn index() -> VectorIndex {
        let manifest = IndexManifest {
            schema_version: INDEX_SCHEMA_VERSION,
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_model: "mock".to_string(),
            dimension: 2,
            metric: SimilarityMetric::Cosine,
            corpus_fingerprint: "abc".to_string(),
        };
        let entry = IndexEntry {
            chunk: Chunk {
                id: ChunkId {
                    source_id: "resume".to_string(),
                    offset: 0,
                },
                ordinal: 0,
                text: "Skilled in Python, Go, and distributed systems.".to_string(),
            },
            vector: vec![1.0, 0.0],
        };
        VectorIndex::from_parts(manifest, vec![entry]).unwrap()
    }

    fn conversation_config() -> ConversationConfig {
        ConversationConfig {
            greeting: "Hello!".to_string(),
            completion_message: "All set.".to_string(),
            history_window: 10,
            guided_prompts: vec![
                GuidedPrompt {
                    field: "company".to_string(),
                    question: "Which company?".to_string(),
                },
                GuidedPrompt {
                    field: "role".to_string(),
                    question: "Which role?".to_string(),
                },
            ],
            system_prompt: "Speak as the candidate.".to_string(),
        }
    }

    fn manager(generator: MockGenerator) -> ConversationManager {
        manager_with(Arc::new(generator))
    }

    fn manager_with(generator: Arc<dyn Generator>) -> ConversationManager {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(vec![1.0, 0.0]));

        let stats = StatsTracker::new();
        let retriever = Arc::new(RagService::new(Arc::new(embedder), stats.clone(), Duration::from_secs(1)));
        retriever.install(index());

        ConversationManager::new(
            ConversationDeps {
                sessions: Arc::new(SessionStore::new()),
                retriever,
                generator,
                classifier: Arc::new(HeuristicClassifier::new().unwrap()),
                stats,
            },
            &conversation_config(),
            &RetrievalConfig::default(),
            &ExtractionConfig {
                matchers: vec![FieldMatcher {
                    field: "skills".to_string(),
                    keywords: vec!["Python".to_string(), "Go".to_string()],
                }],
            },
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_opening_turn_skips_generation() {
        let mut generator = MockGenerator::new();
        generator.expect_generate().times(0);
        let manager = manager(generator);

        let outcome = manager.handle_turn("hi", None).await;
        assert_eq!(outcome.kind, TurnKind::Opening);
        assert_eq!(outcome.stage, SessionStage::GreetingSent);
        assert_eq!(outcome.reply.unwrap(), "Hello!\n\nWhich company?");
        assert_eq!(manager.stats().embedding.attempts, 0);
    }

    #[tokio::test]
    async fn test_guided_answers_walk_the_script() {
        let mut generator = MockGenerator::new();
        generator.expect_generate().times(0);
        let manager = manager(generator);

        let id = manager.handle_turn("hi", None).await.session_id;
        let first = manager.handle_turn("I work at Acme Corp.", Some(&id)).await;
        assert_eq!(first.kind, TurnKind::Guided);
        assert_eq!(first.reply.unwrap(), "Which role?");
        assert_eq!(first.stage, SessionStage::InProgress);

        let second = manager.handle_turn("Staff engineer", Some(&id)).await;
        assert_eq!(second.reply.unwrap(), "All set.");
        assert_eq!(second.stage, SessionStage::Completed);

        let extraction = manager.extraction(&id).await;
        assert_eq!(extraction.get("company").map(String::as_str), Some("Acme Corp"));
        assert_eq!(extraction.get("role").map(String::as_str), Some("Staff engineer"));
    }

    #[tokio::test]
    async fn test_open_turn_retrieves_and_extracts() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .withf(|prompt| prompt.user.contains("[source: resume#0]"))
            .returning(|_| Ok("I work mostly in Python and Go.".to_string()));
        let manager = manager(generator);

        let id = manager.handle_turn("hello", None).await.session_id;
        let outcome = manager
            .handle_turn("What technologies do you know?", Some(&id))
            .await;

        assert_eq!(outcome.kind, TurnKind::Open);
        assert_eq!(outcome.sources[0].chunk.id.source_id, "resume");
        assert_eq!(
            outcome.reply.unwrap(),
            "I work mostly in Python and Go.\n\nWhich company?"
        );
        assert_eq!(
            manager.extraction(&id).await.get("skills").map(String::as_str),
            Some("Python, Go")
        );

        let session = manager.session(&id).await.unwrap();
        assert_eq!(session.guided_stage(), 0);
        assert_eq!(session.stage(), SessionStage::InProgress);
    }

    #[tokio::test]
    async fn test_generation_failure_is_turn_local() {
        let mut generator = MockGenerator::new();
        let mut calls = 0;
        generator.expect_generate().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(GenerationError::Http("connection reset".to_string()))
            } else {
                Ok("Recovered.".to_string())
            }
        });
        let manager = manager(generator);

        let id = manager.handle_turn("hi", None).await.session_id;
        let failed = manager.handle_turn("What did you build?", Some(&id)).await;
        assert!(failed.reply.is_err());
        assert_eq!(failed.stage, SessionStage::Error);

        let session = manager.session(&id).await.unwrap();
        let last = session.turns().last().unwrap();
        assert_eq!(last.speaker, Speaker::User);
        assert_eq!(last.status, TurnStatus::Failed);
        assert_eq!(session.turns().len(), 3);

        let recovered = manager.handle_turn("What did you build?", Some(&id)).await;
        assert!(recovered.reply.is_ok());
        assert_eq!(recovered.stage, SessionStage::InProgress);

        let generation = manager.stats().generation;
        assert_eq!((generation.successes, generation.failures), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout_is_a_failure() {
        let manager = manager_with(Arc::new(SlowGenerator::new(Duration::from_secs(5))));

        let id = manager.handle_turn("hi", None).await.session_id;
        let outcome = manager.handle_turn("What did you build?", Some(&id)).await;

        assert!(matches!(
            outcome.reply,
            Err(TurnError::Generation(GenerationError::Timeout(_)))
        ));
        assert_eq!(manager.stats().generation.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_turn_still_completes_and_counts_calls() {
        let generator = Arc::new(SlowGenerator::new(Duration::from_millis(500)));
        let manager = Arc::new(manager_with(generator.clone()));

        let id = manager.handle_turn("hi", None).await.session_id;
        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            manager.spawn_turn("What technologies do you know?".to_string(), Some(id.clone())),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        let stats = manager.stats();
        assert_eq!(stats.generation.attempts, 1);
        assert_eq!(stats.generation.successes, 1);
        assert_eq!(stats.embedding.attempts, 1);

        let session = manager.session(&id).await.unwrap();
        assert_eq!(session.turns().len(), 4);
        assert_eq!(session.turns()[2].text, "What technologies do you know?");
    }
}
