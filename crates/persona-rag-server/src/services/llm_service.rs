use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{GeneratorConfig, GeneratorProvider};
use crate::utils::error::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
}

/// A fully assembled generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<PromptMessage>,
    pub user: String,
}

/// Capability interface over the language model.
///
/// Implementations make exactly one attempt per call. Timeouts and stats
/// belong to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

pub fn build_generator(config: &GeneratorConfig) -> Result<Arc<dyn Generator>, reqwest::Error> {
    Ok(match config.provider {
        GeneratorProvider::Gemini => Arc::new(GeminiGenerator::new(config)?),
        GeneratorProvider::OpenaiCompatible => Arc::new(LlmService::new(config)?),
    })
}

fn http_client(timeout_seconds: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .build()
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::Status { status, body })
}

// ---------------------------------------------------------------------------
// Gemini generateContent
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: usize,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Clone)]
pub struct GeminiGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl GeminiGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body<'a>(&self, prompt: &'a Prompt) -> GeminiRequest<'a> {
        let mut contents: Vec<GeminiContent<'a>> = prompt
            .history
            .iter()
            .map(|message| GeminiContent {
                role: Some(match message.role {
                    PromptRole::User => "user",
                    PromptRole::Model => "model",
                }),
                parts: vec![GeminiPart { text: &message.text }],
            })
            .collect();

        contents.push(GeminiContent {
            role: Some("user"),
            parts: vec![GeminiPart { text: &prompt.user }],
        });

        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: &prompt.system }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_tokens,
            },
        }
    }

    fn parse_response(body: &Value) -> Result<String, GenerationError> {
        let candidates = body
            .get("candidates")
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GenerationError::Malformed("No candidates in response".to_string()))?;

        let text = candidates[0]
            .pointer("/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| GenerationError::Malformed("Candidate has no text part".to_string()))?;

        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::Unavailable("API key is not configured".to_string()))?;

        debug!(
            "Calling Gemini {} with {} history messages",
            self.config.model,
            prompt.history.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("X-goog-api-key", api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let body: Value = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        Self::parse_response(&body)
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions (llama.cpp server, vLLM, ...)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: GeneratorConfig,
}

impl LlmService {
    pub fn new(config: &GeneratorConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            config: config.clone(),
        })
    }

    fn messages(prompt: &Prompt) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(prompt.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: prompt.system.clone(),
        });
        for message in &prompt.history {
            messages.push(ChatMessage {
                role: match message.role {
                    PromptRole::User => "user",
                    PromptRole::Model => "assistant",
                },
                content: message.text.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.user.clone(),
        });
        messages
    }
}

#[async_trait]
impl Generator for LlmService {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let messages = Self::messages(prompt);
        debug!("Starting chat generation with {} messages", messages.len());

        let request = ChatCompletionRequest {
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/')))
            .json(&request);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let chat_response: ChatCompletionResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("No choices returned from LLM".to_string()))?;

        if content.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(content)
    }
}
