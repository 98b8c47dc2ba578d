//! In-memory vector store using cosine similarity.
//!
//! Records live in a map keyed by chunk key behind a `tokio::sync::RwLock`.
//! Batches are inserted under a single write lock, so readers see either
//! the whole batch or none of it.

use super::store::{Result, StoreError, VectorStore};
use super::types::{ChunkRecord, DocumentId, MatchQuery, Metric, SimilarityResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    records: RwLock<HashMap<String, ChunkRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }
}

/// Cosine similarity of two vectors; 0.0 if either has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, records: Vec<ChunkRecord>) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != self.dimension) {
            return Err(StoreError::DimensionMismatch {
                key: bad.key(),
                expected: self.dimension,
                actual: bad.embedding.len(),
            });
        }

        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.key(), record);
        }
        Ok(())
    }

    async fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<SimilarityResult>> {
        if query.vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                key: "query".to_string(),
                expected: self.dimension,
                actual: query.vector.len(),
            });
        }

        let store = self.records.read().await;

        let mut scored: Vec<SimilarityResult> = store
            .values()
            .filter(|record| {
                query
                    .document_id
                    .map_or(true, |id| record.document_id == id)
            })
            .map(|record| {
                let score = match query.metric {
                    Metric::Cosine => cosine_similarity(&record.embedding, &query.vector),
                    Metric::InnerProduct => inner_product(&record.embedding, &query.vector),
                };
                SimilarityResult {
                    content: record.content.clone(),
                    document_id: record.document_id,
                    chunk_index: record.chunk_index,
                    score,
                }
            })
            .filter(|result| result.score >= query.threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(query.limit);
        Ok(scored)
    }

    async fn delete_document(&self, document_id: &DocumentId) -> Result<usize> {
        let mut store = self.records.write().await;
        let before = store.len();
        store.retain(|_, record| record.document_id != *document_id);
        Ok(before - store.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    async fn count_for_document(&self, document_id: &DocumentId) -> Result<usize> {
        let store = self.records.read().await;
        Ok(store
            .values()
            .filter(|record| record.document_id == *document_id)
            .count())
    }
}
