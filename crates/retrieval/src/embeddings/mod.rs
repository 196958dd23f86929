//! Embedding provider boundary.
//!
//! Converts texts into fixed-dimension vectors via an external
//! embedding service. Stateless, may fail per call.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{HashEmbedder, OllamaEmbedder};
