//! Embedding provider trait and factory.

use medrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// One synchronous call per text; the caller decides how to react to
/// failures (skip-and-continue during bulk indexing, fail-fast at
/// query time). The vector dimension is a property of the model and
/// is inferred downstream from the vectors themselves, so the trait
/// does not declare it.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "hash")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Convert a text into its fixed-dimension embedding vector.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Create an embedding provider based on configuration.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama" or "hash")
/// * `model` - Embedding model identifier
/// * `endpoint` - Service endpoint (ignored by the hash provider)
pub fn create_provider(
    provider: &str,
    model: &str,
    endpoint: &str,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let provider = super::providers::ollama::OllamaEmbedder::new(endpoint, model)?;
            Ok(Arc::new(provider))
        }

        "hash" => {
            let provider = super::providers::hash::HashEmbedder::default();
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Embedding(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, hash",
            provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let provider =
            create_provider("ollama", "nomic-embed-text", "http://localhost:11434").unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_create_hash_provider() {
        let provider = create_provider("hash", "", "").unwrap();
        assert_eq!(provider.provider_name(), "hash");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider("unknown", "m", "http://localhost");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }
}
