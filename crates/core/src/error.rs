//! Error types for medrag.
//!
//! This module defines a unified error enum that covers all error
//! categories in the application: configuration, I/O, corpus loading,
//! embedding, vector index, and LLM errors.

use thiserror::Error;

/// Unified error type for medrag.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corpus loading errors (missing sources, malformed records)
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index errors (dimension mismatch, corrupt artifact)
    #[error("Index error: {0}")]
    Index(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
