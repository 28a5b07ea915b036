use crate::config::EmbeddingConfig;
use crate::utils::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Capability interface: text in, fixed-length vector out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identity recorded in the persisted index manifest.
    fn model_id(&self) -> String;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    content: &'a str,
    input: &'a str,
}

/// Client for a llama.cpp / OpenAI-compatible `/embedding` endpoint.
#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    fn parse_embedding(json_value: &Value) -> Result<Vec<f32>, EmbeddingError> {
        // llama.cpp {"embedding": [...]}, OpenAI {"data": [{"embedding": [...]}]},
        // or an array of either
        let raw = match json_value {
            Value::Object(map) => match (map.get("embedding"), map.get("data")) {
                (Some(Value::Array(values)), _) => values,
                (_, Some(Value::Array(data))) => data
                    .first()
                    .and_then(|d| d.get("embedding"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| EmbeddingError::Malformed(json_value.to_string()))?,
                _ => return Err(EmbeddingError::Malformed(json_value.to_string())),
            },
            Value::Array(arr) => match arr.first() {
                None => return Err(EmbeddingError::Empty),
                Some(first) if first.is_object() => first
                    .get("embedding")
                    .and_then(Value::as_array)
                    .ok_or_else(|| EmbeddingError::Malformed(json_value.to_string()))?,
                Some(_) => arr,
            },
            _ => return Err(EmbeddingError::Malformed(json_value.to_string())),
        };

        // Some servers nest one level deeper ([[...]]) for pooled outputs
        let flat: Vec<f32> = match raw.first() {
            Some(Value::Array(inner)) => inner.iter().filter_map(Value::as_f64).map(|f| f as f32).collect(),
            _ => raw.iter().filter_map(Value::as_f64).map(|f| f as f32).collect(),
        };

        Ok(flat)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingService {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!("Generating embedding for {} chars", text.len());

        let response = self
            .client
            .post(format!("{}/embedding", self.base_url))
            .json(&EmbeddingRequest {
                content: text,
                input: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let json_value: Value = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        let embedding = Self::parse_embedding(&json_value)?;

        if embedding.is_empty() {
            return Err(EmbeddingError::Empty);
        }

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}
