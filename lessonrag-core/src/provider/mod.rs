//! LLM provider abstraction layer.
//!
//! This module defines a common interface for the completion and embedding
//! backends (OpenAI-compatible APIs, Ollama).

mod types;
pub mod ollama;
pub mod openai;

// Re-export common types
pub use types::{ChatRequest, ChatResponse, Message, Provider, ProviderError, Result, Role};

// Re-export provider implementations
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::{Config, ProviderKind};
use std::sync::Arc;

/// Builds the provider selected by `llm.provider`.
pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(&config.llm.base_url))),
        ProviderKind::OpenAi => {
            let api_key = config.llm.resolve_api_key().ok_or_else(|| {
                ProviderError::Other("Missing OPENAI_API_KEY environment variable".to_string())
            })?;
            Ok(Arc::new(OpenAiProvider::new(&config.llm.base_url, api_key)?))
        }
    }
}
