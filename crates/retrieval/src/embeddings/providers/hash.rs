//! Hash-based embedding provider for tests and offline development.

use crate::embeddings::provider::EmbeddingProvider;
use medrag_core::AppResult;

/// Default vector dimension for hash embeddings.
const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic, content-dependent embeddings without a model.
///
/// Each word and each adjacent word pair is hashed into a dimension
/// and accumulated, then the vector is scaled to unit length. Not
/// semantically meaningful, but stable across runs and distinct for
/// distinct texts, which is all the tests need.
#[derive(Debug)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create a hash embedder with the given vector dimension.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, token: &str, seed: u64) -> usize {
        let hash = token
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u64));
        (hash as usize) % self.dimensions
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn provider_name(&self) -> &str {
        "hash"
    }

    fn model_name(&self) -> &str {
        "word-hash-v1"
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        for word in &words {
            vector[self.bucket(word, 1469)] += 1.0;
        }

        // Word pairs give neighboring words some influence on the
        // vector, so reordered texts embed differently.
        for pair in words.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            vector[self.bucket(&joined, 8191)] += 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dimensions_and_identity() {
        let embedder = HashEmbedder::default();
        let vector = embedder.embed("high blood sugar").await.unwrap();

        assert_eq!(vector.len(), DEFAULT_DIMENSIONS);
        assert_eq!(embedder.provider_name(), "hash");
        assert_eq!(embedder.model_name(), "word-hash-v1");
    }

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("chronic fatigue syndrome").await.unwrap();
        let b = embedder.embed("chronic fatigue syndrome").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_distinct_texts_differ() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("viral infection").await.unwrap();
        let b = embedder.embed("bacterial infection").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unit_norm() {
        let embedder = HashEmbedder::new(64);
        let vector = embedder.embed("rest and fluids").await.unwrap();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(64);
        let vector = embedder.embed("").await.unwrap();
        assert!(vector.iter().all(|&x| x == 0.0));
    }
}
