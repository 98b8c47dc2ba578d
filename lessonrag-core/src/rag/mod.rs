//! Retrieval Augmented Generation (RAG) system.
//!
//! This module implements the storage and retrieval half of the pipeline:
//! turning lesson text into embedded chunks and finding the chunks most
//! relevant to a teacher's question.
//!
//! # Architecture
//!
//! - [`chunker`]: splits text into overlapping character windows
//! - [`Embedder`]: converts text to vectors through a [`Provider`]
//! - [`VectorStore`]: in-memory or Qdrant-backed vector storage
//! - [`EmbeddingWriter`]: sub-batched, failure-tolerant persistence
//! - [`Retriever`]: query embedding plus nearest-neighbour search
//!
//! # How It Works
//!
//! 1. **Indexing Phase** (driven by [`crate::ingest`]):
//!    - Documents are split into chunks (default: 1000 characters with 200 overlap)
//!    - Each chunk is converted to a vector embedding
//!    - Embeddings are stored in sub-batches
//!
//! 2. **Retrieval Phase**:
//!    - User query is converted to a vector embedding
//!    - The store returns the chunks above the similarity threshold
//!    - Chunks are handed to [`crate::chat`] as context

pub mod chunker;
mod embedder;
mod memory_store;
mod qdrant_store;
mod retriever;
mod store;
mod types;
mod writer;

pub use embedder::{Embedder, EmbedderError};
pub use memory_store::InMemoryVectorStore;
pub use qdrant_store::QdrantStore;
pub use retriever::{RetrievalError, Retriever};
pub use store::{create_vector_store, Result as StoreResult, StoreError, VectorStore};
pub use types::{
    ChunkMetadata, ChunkRecord, Document, DocumentId, DocumentMetadata, MatchQuery, Metric,
    SimilarityResult,
};
pub use writer::{EmbeddingWriter, StoreWriteError, WriteReport};

use crate::config::Config;
use crate::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Bundles the embedder, vector store, writer and retriever built from one
/// configuration.
///
/// # Thread Safety
///
/// The engine is `Clone` and can be shared across tasks. The store sits
/// behind an `Arc` and handles its own synchronisation.
///
/// # Configuration
///
/// - `embedding.model` / `embedding.dimension`: the embedding contract
/// - `ingestion.batch_size` / `ingestion.batch_delay_ms`: writer pacing
/// - `retrieval.limit` / `retrieval.threshold`: search defaults
/// - `retrieval.metric`: how stored vectors are ranked
#[derive(Clone)]
pub struct RagEngine {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    writer: EmbeddingWriter,
    retriever: Retriever,
    limit: usize,
    threshold: f32,
}

impl RagEngine {
    /// Builds an engine over an injected provider and store.
    pub fn new(config: &Config, provider: Arc<dyn Provider>, store: Arc<dyn VectorStore>) -> Self {
        let embedder = Embedder::new(
            provider,
            config.embedding.model.clone(),
            config.embedding.dimension,
        );
        let writer = EmbeddingWriter::new(
            store.clone(),
            config.ingestion.batch_size,
            Duration::from_millis(config.ingestion.batch_delay_ms),
        );
        let retriever =
            Retriever::new(embedder.clone(), store.clone()).with_metric(config.retrieval.metric);

        Self {
            embedder,
            store,
            writer,
            retriever,
            limit: config.retrieval.limit,
            threshold: config.retrieval.threshold,
        }
    }

    /// Builds an engine whose store is created from `config.storage`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use lessonrag_core::{Config, rag::RagEngine, provider::OllamaProvider};
    /// # use std::sync::Arc;
    /// # async fn example() {
    /// let config = Config::default();
    /// let provider = Arc::new(OllamaProvider::new(&config.llm.base_url));
    /// let engine = RagEngine::from_config(&config, provider).await.unwrap();
    /// # }
    /// ```
    pub async fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let store = create_vector_store(&config.storage, config.embedding.dimension).await?;
        Ok(Self::new(config, provider, store))
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn writer(&self) -> &EmbeddingWriter {
        &self.writer
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Searches with the configured limit and threshold.
    pub async fn search(
        &self,
        query: &str,
        scope: Option<DocumentId>,
    ) -> std::result::Result<Vec<SimilarityResult>, RetrievalError> {
        self.retriever.search(query, scope, self.limit, self.threshold).await
    }

    /// Returns the total number of chunks in the knowledge base.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    /// Removes every chunk of a document.
    ///
    /// # Returns
    ///
    /// The number of chunks removed.
    pub async fn remove_document(&self, document_id: &DocumentId) -> Result<usize> {
        Ok(self.store.delete_document(document_id).await?)
    }
}
