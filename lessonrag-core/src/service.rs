//! One entry point over catalog, ingestion, retrieval and chat.

use crate::catalog::{CatalogEntry, CatalogError, DocumentCatalog, InMemoryCatalog};
use crate::chat::{Answer, AskRequest, ChatManager, TurnRecorder};
use crate::config::Config;
use crate::extraction::{validate_upload, ExtractionError, PlainTextExtractor, TextExtractor};
use crate::ingest::{IngestError, IngestionHandle, IngestionOrchestrator, IngestionState};
use crate::provider::{create_provider, Provider, ProviderError};
use crate::rag::{
    create_vector_store, Document, DocumentId, DocumentMetadata, RagEngine, RagError,
    RetrievalError, SimilarityResult, VectorStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// What a cascade delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub document_found: bool,
    pub chunks_removed: usize,
    /// State the running ingestion was stopped in, if there was one
    pub ingestion_state: Option<IngestionState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub documents: usize,
    pub chunks: usize,
    pub active_ingestions: usize,
}

/// Upload fields that travel with the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Upload {
    pub title: String,
    pub file_name: String,
    #[serde(default)]
    pub declared_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Bundles the catalog, vector store, ingestion and chat built from one
/// configuration.
///
/// # Examples
///
/// ```no_run
/// use lessonrag_core::chat::AskRequest;
/// use lessonrag_core::rag::Document;
/// use lessonrag_core::{Config, RagService};
///
/// # async fn example() -> anyhow::Result<()> {
/// let service = RagService::from_config(Config::load_or_default()).await?;
///
/// let handle = service.add_document(Document::new("الأشجار", "...")).await?;
/// let id = handle.document_id();
/// handle.wait().await?;
///
/// let answer = service.ask(AskRequest::new("ما هي الأنشطة؟").scoped_to(id)).await;
/// println!("{}", answer.text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RagService {
    config: Config,
    rag: RagEngine,
    catalog: Arc<dyn DocumentCatalog>,
    orchestrator: IngestionOrchestrator,
    chat: ChatManager,
    extractor: Arc<dyn TextExtractor>,
}

impl RagService {
    /// Builds the service over injected provider and store handles, with an
    /// in-memory catalog.
    pub fn new(config: Config, provider: Arc<dyn Provider>, store: Arc<dyn VectorStore>) -> Self {
        Self::with_catalog(config, provider, store, Arc::new(InMemoryCatalog::new()))
    }

    pub fn with_catalog(
        config: Config,
        provider: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
        catalog: Arc<dyn DocumentCatalog>,
    ) -> Self {
        let rag = RagEngine::new(&config, provider.clone(), store);
        let orchestrator = IngestionOrchestrator::new(&config, &rag).with_catalog(catalog.clone());
        let chat = ChatManager::new(&config, &rag, provider);

        Self {
            config,
            rag,
            catalog,
            orchestrator,
            chat,
            extractor: Arc::new(PlainTextExtractor),
        }
    }

    /// Builds the provider and store described by `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let provider = create_provider(&config)?;
        let store = create_vector_store(&config.storage, config.embedding.dimension)
            .await
            .map_err(RagError::from)?;
        Ok(Self::new(config, provider, store))
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TurnRecorder>) -> Self {
        self.chat = self.chat.with_recorder(recorder);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rag(&self) -> &RagEngine {
        &self.rag
    }

    pub fn orchestrator(&self) -> &IngestionOrchestrator {
        &self.orchestrator
    }

    /// Records a document and starts ingesting it in the background.
    ///
    /// Once the record exists the call succeeds. Text that is too short or
    /// a placeholder is not embedded: the run ends `Skipped` and the record
    /// is flagged for review. Later ingestion problems only show up in the
    /// handle, the status and the catalog flag.
    ///
    /// The tracker slot is claimed before the record is written, so a
    /// delete racing this call always finds the run and stops it.
    pub async fn add_document(&self, document: Document) -> Result<IngestionHandle> {
        let reservation = self.orchestrator.reserve(document.id).await?;
        if let Err(e) = self.catalog.insert(document.clone()).await {
            self.orchestrator.release(reservation).await;
            return Err(e.into());
        }
        Ok(self.orchestrator.start(reservation, document).await)
    }

    /// Replaces a recorded document's text and ingests it again.
    ///
    /// The previous chunks are removed first, so no chunk of the old text
    /// survives, even where the new text produces fewer windows.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`] when no record exists for the id
    /// - [`IngestError::AlreadyRunning`] when a run is still in progress
    pub async fn reingest(
        &self,
        document_id: &DocumentId,
        text: impl Into<String>,
    ) -> Result<IngestionHandle> {
        let reservation = self.orchestrator.reserve(*document_id).await?;
        match self.replace_text(document_id, text.into()).await {
            Ok(document) => Ok(self.orchestrator.start(reservation, document).await),
            Err(e) => {
                self.orchestrator.release(reservation).await;
                Err(e)
            }
        }
    }

    async fn replace_text(&self, document_id: &DocumentId, text: String) -> Result<Document> {
        let mut document = self
            .catalog
            .get(document_id)
            .await?
            .ok_or(CatalogError::NotFound(*document_id))?
            .document;
        document.text = Some(text);

        self.catalog.update(document.clone()).await?;
        let removed = self.rag.remove_document(document_id).await?;
        info!(document_id = %document_id, removed, "previous chunks removed for re-ingestion");
        Ok(document)
    }

    /// Validates and extracts an uploaded file, then hands it to
    /// [`add_document`](Self::add_document).
    pub async fn add_upload(&self, upload: Upload, bytes: &[u8]) -> Result<IngestionHandle> {
        let declared_type = upload
            .declared_type
            .clone()
            .unwrap_or_else(|| crate::extraction::declared_type_for(&upload.file_name).to_string());
        validate_upload(&upload.file_name, &declared_type, bytes.len() as u64)?;

        let extracted = self
            .extractor
            .extract(&upload.file_name, bytes, &declared_type)?;
        if let Some(warning) = &extracted.warning {
            warn!(file = %upload.file_name, %warning, "extraction degraded");
        }

        let language = upload.language.unwrap_or(extracted.language);
        let document = Document::new(upload.title, extracted.text)
            .with_language(language)
            .with_metadata(upload.metadata);

        self.add_document(document).await
    }

    pub async fn status(&self, document_id: &DocumentId) -> Option<IngestionState> {
        self.orchestrator.status(document_id).await
    }

    pub async fn document(&self, document_id: &DocumentId) -> Result<Option<CatalogEntry>> {
        Ok(self.catalog.get(document_id).await?)
    }

    pub async fn documents(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.catalog.list().await?)
    }

    /// Searches with the configured limit and threshold.
    pub async fn search(
        &self,
        query: &str,
        scope: Option<DocumentId>,
    ) -> Result<Vec<SimilarityResult>> {
        Ok(self.rag.search(query, scope).await?)
    }

    pub async fn ask(&self, request: AskRequest) -> Answer {
        self.chat.ask(request).await
    }

    pub async fn ask_stream<F>(&self, request: AskRequest, on_chunk: F) -> Answer
    where
        F: FnMut(&str) + Send,
    {
        self.chat.ask_stream(request, on_chunk).await
    }

    /// Deletes a document and everything derived from it.
    ///
    /// Order: stop any running ingestion, remove the chunks, then remove the
    /// catalog record. Waiting for the ingestion to stop first means no
    /// sub-batch can land after the chunks are removed.
    pub async fn delete_document(&self, document_id: &DocumentId) -> Result<DeleteReport> {
        let ingestion_state = self.orchestrator.cancel(document_id).await;
        let chunks_removed = self.rag.remove_document(document_id).await?;
        let document_found = self.catalog.remove(document_id).await?;
        self.orchestrator.forget(document_id).await;

        info!(
            document_id = %document_id,
            chunks_removed,
            document_found,
            ingestion = ?ingestion_state,
            "document deleted"
        );

        Ok(DeleteReport {
            document_found,
            chunks_removed,
            ingestion_state,
        })
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            documents: self.catalog.list().await?.len(),
            chunks: self.rag.count().await?,
            active_ingestions: self.orchestrator.active().await,
        })
    }
}
