//! Embedding generation using LLM providers.
//!
//! This module converts text into fixed-length vector embeddings using the
//! configured provider's embedding model.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The API response contained no embedding values.
    #[error("No embeddings returned")]
    NoEmbeddings,

    /// The model answered with a vector of the wrong length.
    ///
    /// Vectors of differing lengths cannot be compared, so this is treated as
    /// malformed output rather than silently stored.
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbedderError {
    /// Whether backing off and retrying the same call may succeed.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EmbedderError::Provider(e) if e.is_rate_limited())
    }
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using a provider embedding model.
///
/// One call to [`embed`](Self::embed) is one remote request. The embedder
/// never retries; callers decide the retry policy.
///
/// # Supported Models
///
/// Common embedding models:
/// - `text-embedding-3-small` - 1536-dimensional, multilingual
/// - `nomic-embed-text` - 768-dimensional, served by Ollama
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }

    /// The dimensionality every vector from this embedder has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The provider is unreachable, times out or answers with an error
    /// - The response holds an empty vector
    /// - The vector length differs from the configured dimension
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .provider
            .embed(text, &self.model)
            .await
            .map_err(EmbedderError::Provider)?;

        if embedding.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        if embedding.len() != self.dimension {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse};
    use async_trait::async_trait;

    struct FixedProvider {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        async fn chat<'a>(
            &'a self,
            _request: ChatRequest,
            _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> crate::provider::Result<Vec<f32>> {
            Ok(self.vector.clone())
        }
    }

    fn embedder_returning(vector: Vec<f32>, dimension: usize) -> Embedder {
        Embedder::new(Arc::new(FixedProvider { vector }), "test-model", dimension)
    }

    #[tokio::test]
    async fn test_embed_accepts_matching_dimension() {
        let embedder = embedder_returning(vec![0.1, 0.2, 0.3], 3);
        assert_eq!(embedder.embed("نص").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimension() {
        let embedder = embedder_returning(vec![0.1, 0.2], 3);
        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(
            err,
            EmbedderError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_vector() {
        let embedder = embedder_returning(vec![], 3);
        assert!(matches!(
            embedder.embed("text").await,
            Err(EmbedderError::NoEmbeddings)
        ));
    }

    #[test]
    fn test_rate_limit_detection() {
        let err = EmbedderError::Provider(ProviderError::RateLimited("slow down".into()));
        assert!(err.is_rate_limited());
        assert!(!EmbedderError::NoEmbeddings.is_rate_limited());
    }
}
