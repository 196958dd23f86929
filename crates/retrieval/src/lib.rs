//! Retrieval core for medrag.
//!
//! Loads a medical corpus from tabular and plain-text sources, embeds
//! it via a pluggable provider, and serves nearest-neighbor retrieval
//! over a flat in-memory index with a persisted on-disk artifact.
//!
//! # Lifecycle
//! 1. Construct a [`RetrievalEngine`] with a [`RetrievalConfig`], an
//!    [`EmbeddingProvider`], and a [`corpus::TextExtractor`].
//! 2. Run [`RetrievalEngine::warm_up`] (usually via
//!    [`RetrievalEngine::spawn_warm_up`]) exactly once.
//! 3. Call [`RetrievalEngine::retrieve`] from any task; before
//!    readiness it answers with a placeholder instead of failing.

pub mod answer;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod engine;
pub mod index;

pub use config::RetrievalConfig;
pub use corpus::{Corpus, CorpusFingerprint, Document, PlainTextExtractor};
pub use embeddings::{create_provider, EmbeddingProvider, HashEmbedder, OllamaEmbedder};
pub use engine::{EngineStatus, RetrievalEngine, RETRIEVAL_TROUBLE, STILL_INITIALIZING};
pub use index::FlatIndex;
