use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Descriptive fields of a document, copied in part onto each of its chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// An uploaded source artifact.
///
/// `text` is whatever the extractor produced and may be absent when
/// extraction failed outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub text: Option<String>,
    /// Language tag such as `ar` or `en`
    pub language: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            text: Some(text.into()),
            language: "ar".to_string(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Metadata stored alongside every chunk.
///
/// A fixed set of named fields keeps the store schema and filters checkable;
/// `extra` passes through anything newer callers attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ChunkMetadata {
    pub fn for_chunk(document: &DocumentMetadata, chunk_index: usize) -> Self {
        Self {
            subject: document.subject.clone(),
            age_group: document.age_group.clone(),
            chunk_index,
            tags: document.tags.clone(),
            extra: None,
        }
    }
}

/// An embedded chunk ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    /// Stable key of the chunk within the store.
    pub fn key(&self) -> String {
        chunk_key(&self.document_id, self.chunk_index)
    }
}

pub(crate) fn chunk_key(document_id: &DocumentId, chunk_index: usize) -> String {
    format!("{}_chunk_{}", document_id, chunk_index)
}

/// A chunk matched by a similarity query, most similar first.
///
/// Scores are cosine similarities in `[-1.0, 1.0]`; text embeddings
/// mostly land between `0.0` and `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub content: String,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub score: f32,
}

/// Similarity metric used to rank stored vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Cosine,
    InnerProduct,
}

/// The store-side `match` call: nearest chunks above a threshold,
/// optionally restricted to one document.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub vector: Vec<f32>,
    pub metric: Metric,
    pub threshold: f32,
    pub limit: usize,
    pub document_id: Option<DocumentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_round_trips_through_string() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_chunk_metadata_copies_document_fields() {
        let doc_meta = DocumentMetadata {
            subject: Some("Arabic".into()),
            age_group: Some("5-7".into()),
            tags: vec!["trees".into()],
        };
        let meta = ChunkMetadata::for_chunk(&doc_meta, 4);
        assert_eq!(meta.chunk_index, 4);
        assert_eq!(meta.subject.as_deref(), Some("Arabic"));
        assert_eq!(meta.tags, vec!["trees".to_string()]);
        assert!(meta.extra.is_none());
    }
}
