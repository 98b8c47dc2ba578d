//! Batched persistence of embedded chunks.

use super::store::{StoreError, VectorStore};
use super::types::ChunkRecord;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// A sub-batch the store refused. None of its records were persisted.
#[derive(Debug, Error)]
#[error("Failed to write chunks {chunk_indices:?}: {source}")]
pub struct StoreWriteError {
    pub chunk_indices: Vec<usize>,
    #[source]
    pub source: StoreError,
}

/// Outcome of a [`EmbeddingWriter::write`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written_count: usize,
    /// Chunk indices of every record in a rejected sub-batch
    pub failed_indices: Vec<usize>,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.written_count += other.written_count;
        self.failed_indices.extend(other.failed_indices);
    }
}

/// Writes chunk records to a vector store in fixed-size sub-batches.
///
/// Each sub-batch is all-or-nothing. A rejected sub-batch is reported and
/// skipped; the remaining sub-batches are still written.
#[derive(Clone)]
pub struct EmbeddingWriter {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    batch_delay: Duration,
}

impl EmbeddingWriter {
    pub fn new(store: Arc<dyn VectorStore>, batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_delay(&self) -> Duration {
        self.batch_delay
    }

    /// Persists one sub-batch as a single store call.
    pub async fn write_batch(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreWriteError> {
        let chunk_indices: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        let count = records.len();

        self.store
            .insert(records)
            .await
            .map_err(|source| StoreWriteError {
                chunk_indices,
                source,
            })?;

        Ok(count)
    }

    /// Persists `records`, splitting them into sub-batches.
    ///
    /// Sleeps `batch_delay` between sub-batches, never after the last one.
    pub async fn write(&self, records: Vec<ChunkRecord>) -> WriteReport {
        let mut report = WriteReport::default();
        let mut remaining = records.into_iter().peekable();

        while remaining.peek().is_some() {
            let batch: Vec<ChunkRecord> = remaining.by_ref().take(self.batch_size).collect();

            match self.write_batch(batch).await {
                Ok(written) => {
                    debug!(written, "sub-batch persisted");
                    report.written_count += written;
                }
                Err(e) => {
                    error!(chunks = ?e.chunk_indices, error = %e.source, "sub-batch write failed");
                    report.failed_indices.extend(e.chunk_indices);
                }
            }

            if remaining.peek().is_some() && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::memory_store::InMemoryVectorStore;
    use crate::rag::store::Result as StoreResult;
    use crate::rag::types::{ChunkMetadata, DocumentId, MatchQuery, SimilarityResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects the n-th insert call (0-based) and forwards the rest.
    struct FlakyStore {
        inner: InMemoryVectorStore,
        calls: AtomicUsize,
        fail_call: usize,
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        async fn insert(&self, records: Vec<ChunkRecord>) -> StoreResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_call {
                return Err(StoreError::Backend(anyhow::anyhow!("connection reset")));
            }
            self.inner.insert(records).await
        }

        async fn match_chunks(&self, query: &MatchQuery) -> StoreResult<Vec<SimilarityResult>> {
            self.inner.match_chunks(query).await
        }

        async fn delete_document(&self, document_id: &DocumentId) -> StoreResult<usize> {
            self.inner.delete_document(document_id).await
        }

        async fn count(&self) -> StoreResult<usize> {
            self.inner.count().await
        }

        async fn count_for_document(&self, document_id: &DocumentId) -> StoreResult<usize> {
            self.inner.count_for_document(document_id).await
        }
    }

    fn records(document_id: DocumentId, n: usize) -> Vec<ChunkRecord> {
        (0..n)
            .map(|chunk_index| ChunkRecord {
                document_id,
                chunk_index,
                content: format!("chunk {}", chunk_index),
                embedding: vec![1.0, 0.0],
                metadata: ChunkMetadata {
                    chunk_index,
                    ..ChunkMetadata::default()
                },
            })
            .collect()
    }

    #[tokio::test]
    async fn test_write_splits_into_sub_batches() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryVectorStore::new(2),
            calls: AtomicUsize::new(0),
            fail_call: usize::MAX,
        });
        let writer = EmbeddingWriter::new(store.clone(), 3, Duration::ZERO);

        let report = writer.write(records(DocumentId::new(), 7)).await;

        assert_eq!(report.written_count, 7);
        assert!(report.failed_indices.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_sub_batch_is_skipped_not_fatal() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryVectorStore::new(2),
            calls: AtomicUsize::new(0),
            fail_call: 1,
        });
        let writer = EmbeddingWriter::new(store.clone(), 3, Duration::ZERO);
        let doc = DocumentId::new();

        let report = writer.write(records(doc, 7)).await;

        assert_eq!(report.written_count, 4);
        assert_eq!(report.failed_indices, vec![3, 4, 5]);
        assert_eq!(store.count_for_document(&doc).await.unwrap(), 4);
    }
}
