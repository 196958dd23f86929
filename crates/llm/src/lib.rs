//! LLM integration crate for medrag.
//!
//! Provider-agnostic abstraction for the language model that turns
//! retrieved medical snippets into prose answers.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
