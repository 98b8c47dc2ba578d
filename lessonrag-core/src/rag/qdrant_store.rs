//! Qdrant vector database storage implementation.
//!
//! Chunks are stored as points in a cosine collection. The owning document id
//! is a keyword payload field so that scoped searches and cascade deletes can
//! filter on it server-side.

use super::store::{Result, VectorStore};
use super::types::{ChunkRecord, DocumentId, MatchQuery, Metric, SimilarityResult};
use anyhow::Context;
use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        vectors_config::Config, Condition, CountPointsBuilder, CreateCollectionBuilder,
        DeletePointsBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, VectorParamsBuilder, VectorsConfig,
    },
    Payload, Qdrant,
};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Qdrant-based vector store for chunk embeddings.
///
/// Re-inserting a chunk with the same document id and chunk index replaces
/// the previous point, so re-running ingestion does not duplicate chunks.
#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
    collection_name: String,
    vector_size: u64,
}

fn document_filter(document_id: &DocumentId) -> Filter {
    Filter::must([Condition::matches("document_id", document_id.to_string())])
}

fn point_id(record: &ChunkRecord) -> u64 {
    let mut hasher = DefaultHasher::new();
    record.key().hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn insert(&self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .into_iter()
            .map(|record| {
                let id = point_id(&record);
                let payload: Payload = json!({
                    "document_id": record.document_id.to_string(),
                    "chunk_index": record.chunk_index,
                    "content": record.content,
                    "metadata": record.metadata,
                })
                .try_into()
                .context("Failed to build point payload")?;
                Ok(PointStruct::new(id, record.embedding, payload))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .context("Failed to upsert points")?;

        Ok(())
    }

    async fn match_chunks(&self, query: &MatchQuery) -> Result<Vec<SimilarityResult>> {
        if query.metric != Metric::Cosine {
            debug!(metric = ?query.metric, "collection is cosine, ranking by cosine");
        }

        let mut builder = SearchPointsBuilder::new(
            &self.collection_name,
            query.vector.clone(),
            query.limit as u64,
        )
        .with_payload(true)
        .score_threshold(query.threshold);

        if let Some(document_id) = &query.document_id {
            builder = builder.filter(document_filter(document_id));
        }

        let search_result = self
            .client
            .search_points(builder)
            .await
            .context("Failed to search points")?;

        let results = search_result
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload;
                let content = payload
                    .get("content")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let chunk_index = payload
                    .get("chunk_index")
                    .and_then(|v| v.as_integer())
                    .unwrap_or_default() as usize;

                // Points without a parseable owner are not ours
                let document_id = payload
                    .get("document_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<DocumentId>().ok())?;

                Some(SimilarityResult {
                    content,
                    document_id,
                    chunk_index,
                    score: point.score,
                })
            })
            .collect();

        Ok(results)
    }

    async fn delete_document(&self, document_id: &DocumentId) -> Result<usize> {
        let count = self.count_for_document(document_id).await?;

        if count > 0 {
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection_name)
                        .points(document_filter(document_id))
                        .wait(true),
                )
                .await
                .context("Failed to delete points")?;
        }

        Ok(count)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await
            .context("Failed to count points")?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn count_for_document(&self, document_id: &DocumentId) -> Result<usize> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection_name)
                    .filter(document_filter(document_id))
                    .exact(true),
            )
            .await
            .context("Failed to count points")?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

impl QdrantStore {
    /// Connects to a Qdrant server and ensures the collection exists.
    ///
    /// # Arguments
    ///
    /// * `url` - gRPC endpoint, e.g. `http://localhost:6334`
    /// * `collection_name` - Collection holding the chunk points
    /// * `vector_size` - Dimension of the embedding vectors
    pub async fn new(url: &str, collection_name: &str, vector_size: u64) -> anyhow::Result<Self> {
        let client = Arc::new(
            Qdrant::from_url(url)
                .build()
                .context("Failed to connect to Qdrant server")?,
        );

        let store = Self {
            client,
            collection_name: collection_name.to_string(),
            vector_size,
        };

        store.ensure_collection().await?;

        Ok(store)
    }

    async fn ensure_collection(&self) -> anyhow::Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .context("Failed to check collection")?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name).vectors_config(
                        VectorsConfig {
                            config: Some(Config::Params(
                                VectorParamsBuilder::new(self.vector_size, Distance::Cosine)
                                    .build(),
                            )),
                        },
                    ),
                )
                .await
                .context("Failed to create collection")?;
        }

        Ok(())
    }
}
