//! Ollama embedding provider.
//!
//! Semantic embeddings via Ollama's local API using models like
//! nomic-embed-text. Transient transport failures are retried with
//! exponential backoff; a request that keeps failing surfaces as an
//! `AppError::Embedding` for the caller to handle.

use crate::embeddings::provider::EmbeddingProvider;
use medrag_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Ollama embeddings endpoint path.
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Maximum attempts per text.
const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration in milliseconds.
const INITIAL_BACKOFF_MS: u64 = 100;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Request payload for the Ollama embeddings API.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Response from the Ollama embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider backed by a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder for `model` at `base_url`.
    ///
    /// Fails if the HTTP client cannot be built; falling back to a
    /// client without the request timeout would let a stuck request
    /// hang indefinitely.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Embed one text without retries.
    async fn embed_once(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to reach Ollama at {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Embedding(format!(
                "Ollama embeddings API error ({}): {}",
                status, body
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(AppError::Embedding(format!(
                "Ollama returned an empty embedding for model '{}'",
                self.model
            )));
        }

        debug!("Received {}-dimensional embedding", body.embedding.len());
        Ok(body.embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.embed_once(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                        warn!(
                            "Embedding request failed (attempt {}/{}), retrying in {}ms: {}",
                            attempt, MAX_ATTEMPTS, backoff_ms, e
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Embedding("Unknown embedding error".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_identity() {
        let embedder = OllamaEmbedder::new("http://localhost:11434", "nomic-embed-text").unwrap();
        assert_eq!(embedder.provider_name(), "ollama");
        assert_eq!(embedder.model_name(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn test_embed_unreachable_endpoint_fails() {
        // Port 9 (discard) is not an Ollama server; the call must
        // surface an error, not panic or hang past the timeout.
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "nomic-embed-text").unwrap();
        let result = embedder.embed_once("test").await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }
}
