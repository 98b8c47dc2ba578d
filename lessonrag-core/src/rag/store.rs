//! Vector store abstraction and factory.
//!
//! This module provides a unified interface over the vector database backends.

use super::memory_store::InMemoryVectorStore;
use super::qdrant_store::QdrantStore;
use super::types::{ChunkRecord, DocumentId, MatchQuery, SimilarityResult};
use crate::config::{StorageConfig, StorageMode};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record's vector does not have the collection's dimensionality.
    #[error("Record {key} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// The backend rejected the call or could not be reached.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified interface for vector database operations.
///
/// Implementations store chunk records next to their vectors and rank them
/// server-side. A reader never observes part of an `insert` batch.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persists a batch of records.
    ///
    /// All-or-nothing: on error none of the records are visible.
    async fn insert(&self, records: Vec<ChunkRecord>) -> Result<()>;

    /// Returns up to `query.limit` chunks whose score is at least
    /// `query.threshold`, most similar first.
    ///
    /// The document filter, when present, is part of the same ranking and
    /// not applied afterwards.
    async fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<SimilarityResult>>;

    /// Removes every chunk owned by `document_id`.
    ///
    /// # Returns
    ///
    /// The number of chunks removed.
    async fn delete_document(&self, document_id: &DocumentId) -> Result<usize>;

    /// Returns the total number of chunks in the store.
    async fn count(&self) -> Result<usize>;

    /// Returns the number of chunks owned by one document.
    async fn count_for_document(&self, document_id: &DocumentId) -> Result<usize>;
}

/// Creates a vector store instance based on the storage mode.
///
/// - `Memory` mode keeps everything in-process
/// - `Grpc` mode uses Qdrant for remote server connectivity
///
/// # Arguments
///
/// * `storage_config` - Storage configuration including storage mode and collection
/// * `dimension` - Dimension of the embedding vectors
pub async fn create_vector_store(
    storage_config: &StorageConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    match &storage_config.storage_mode {
        StorageMode::Memory => Ok(Arc::new(InMemoryVectorStore::new(dimension))),
        StorageMode::Grpc { url } => {
            let store = QdrantStore::new(
                url,
                &storage_config.vector_db.collection_name,
                dimension as u64,
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
