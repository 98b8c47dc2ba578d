//! Document records, kept apart from their chunks.

use crate::rag::{Document, DocumentId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Document {0} not found")]
    NotFound(DocumentId),

    #[error("Document {0} already exists")]
    Duplicate(DocumentId),

    #[error("Catalog backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Follow-up marker left on a document by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionFlag {
    /// No chunk was persisted; retry or manual review needed
    NeedsReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub document: Document,
    pub flag: Option<IngestionFlag>,
}

#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn insert(&self, document: Document) -> Result<()>;

    /// Replaces a stored document, keeping its flag.
    async fn update(&self, document: Document) -> Result<()>;

    async fn get(&self, id: &DocumentId) -> Result<Option<CatalogEntry>>;

    /// Removes the record; returns whether it existed.
    async fn remove(&self, id: &DocumentId) -> Result<bool>;

    /// Sets or clears (`None`) the ingestion flag.
    async fn flag(&self, id: &DocumentId, flag: Option<IngestionFlag>) -> Result<()>;

    async fn list(&self) -> Result<Vec<CatalogEntry>>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<DocumentId, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentCatalog for InMemoryCatalog {
    async fn insert(&self, document: Document) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&document.id) {
            return Err(CatalogError::Duplicate(document.id));
        }
        entries.insert(document.id, CatalogEntry { document, flag: None });
        Ok(())
    }

    async fn update(&self, document: Document) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&document.id)
            .ok_or(CatalogError::NotFound(document.id))?;
        entry.document = document;
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<CatalogEntry>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &DocumentId) -> Result<bool> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn flag(&self, id: &DocumentId, flag: Option<IngestionFlag>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(id).ok_or(CatalogError::NotFound(*id))?;
        entry.flag = flag;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.document.title.cmp(&b.document.title));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_flag_remove() {
        let catalog = InMemoryCatalog::new();
        let doc = Document::new("الألوان", "درس عن الألوان");
        let id = doc.id;

        catalog.insert(doc.clone()).await.unwrap();
        assert!(matches!(catalog.insert(doc).await, Err(CatalogError::Duplicate(_))));

        catalog.flag(&id, Some(IngestionFlag::NeedsReview)).await.unwrap();
        let entry = catalog.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.flag, Some(IngestionFlag::NeedsReview));

        catalog.flag(&id, None).await.unwrap();
        assert_eq!(catalog.get(&id).await.unwrap().unwrap().flag, None);

        let mut revised = catalog.get(&id).await.unwrap().unwrap().document;
        revised.text = Some("درس عن الألوان والأشكال".into());
        catalog.flag(&id, Some(IngestionFlag::NeedsReview)).await.unwrap();
        catalog.update(revised).await.unwrap();
        let entry = catalog.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.document.text.as_deref(), Some("درس عن الألوان والأشكال"));
        assert_eq!(entry.flag, Some(IngestionFlag::NeedsReview));

        assert!(catalog.remove(&id).await.unwrap());
        assert!(!catalog.remove(&id).await.unwrap());
        assert!(matches!(
            catalog.update(entry.document).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.flag(&id, None).await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
