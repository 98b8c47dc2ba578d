//! Similarity search over stored chunk embeddings.

use super::embedder::{Embedder, EmbedderError};
use super::store::{StoreError, VectorStore};
use super::types::{DocumentId, MatchQuery, Metric, SimilarityResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Search failed before any ranking could happen.
///
/// "Nothing relevant" is never an error; it is an empty result.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("Vector store query failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Embeds a query and asks the store for its nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    metric: Metric,
}

impl Retriever {
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            metric: Metric::Cosine,
        }
    }

    /// Ranks with `metric` instead of cosine similarity.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Returns at most `limit` chunks scoring at least `threshold`, most
    /// similar first.
    ///
    /// With `scope` set, only chunks of that document are ranked. An empty
    /// result means nothing cleared the threshold; callers fall back to an
    /// ungrounded answer.
    ///
    /// # Errors
    ///
    /// Returns an error only if the query cannot be embedded or the store
    /// cannot be reached.
    pub async fn search(
        &self,
        query: &str,
        scope: Option<DocumentId>,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SimilarityResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!(query_len = query.chars().count(), ?scope, limit, threshold, "embedding query");
        let vector = self.embedder.embed(query).await?;

        let match_query = MatchQuery {
            vector,
            metric: self.metric,
            threshold,
            limit,
            document_id: scope,
        };
        let mut results = self.store.match_chunks(&match_query).await?;

        // Enforced here too, whatever the backend returned
        results.retain(|r| r.score >= threshold && scope.map_or(true, |id| r.document_id == id));
        results.truncate(limit);

        info!(results = results.len(), ?scope, "similarity search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, Provider, Result as ProviderResult};
    use crate::rag::memory_store::InMemoryVectorStore;
    use crate::rag::types::{ChunkMetadata, ChunkRecord};
    use async_trait::async_trait;

    /// Every query embeds to the same unnormalized vector.
    struct ScaledProvider;

    #[async_trait]
    impl Provider for ScaledProvider {
        async fn chat<'a>(
            &'a self,
            _request: ChatRequest,
            _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> ProviderResult<()> {
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> ProviderResult<Vec<f32>> {
            Ok(vec![2.0, 0.0])
        }
    }

    async fn store_with_one_chunk() -> (Arc<dyn VectorStore>, DocumentId) {
        let store = Arc::new(InMemoryVectorStore::new(2));
        let document_id = DocumentId::new();
        store
            .insert(vec![ChunkRecord {
                document_id,
                chunk_index: 0,
                content: "الأنشطة".into(),
                embedding: vec![3.0, 0.0],
                metadata: ChunkMetadata::default(),
            }])
            .await
            .unwrap();
        (store, document_id)
    }

    #[tokio::test]
    async fn test_cosine_by_default() {
        let (store, document_id) = store_with_one_chunk().await;
        let embedder = Embedder::new(Arc::new(ScaledProvider), "m", 2);
        let retriever = Retriever::new(embedder, store);

        let results = retriever.search("q", Some(document_id), 5, 0.7).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_inner_product_when_configured() {
        let (store, document_id) = store_with_one_chunk().await;
        let embedder = Embedder::new(Arc::new(ScaledProvider), "m", 2);
        let retriever = Retriever::new(embedder, store).with_metric(Metric::InnerProduct);

        let results = retriever.search("q", Some(document_id), 5, 0.7).await.unwrap();
        assert!((results[0].score - 6.0).abs() < 1e-6);
    }
}
