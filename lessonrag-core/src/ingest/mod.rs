//! Background ingestion of documents into the vector store.
//!
//! ```text
//! Received → Chunking → EmbeddingInFlight → Persisted
//!                                         → PartiallyPersisted
//!                                         → Failed
//!                                         → Cancelled
//! Received → Skipped
//! ```
//!
//! Validation happens before the job is spawned. [`IngestionOrchestrator::submit`]
//! returns the refusal to the caller; [`IngestionOrchestrator::start`] records
//! it as a `Skipped` run instead. Everything after that runs detached and is
//! reported through [`IngestionHandle`], the tracker and the logs.

mod orchestrator;

pub use orchestrator::{IngestionHandle, IngestionOrchestrator, Reservation};

use crate::rag::DocumentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    Received,
    Chunking,
    EmbeddingInFlight,
    /// Every chunk embedded and written
    Persisted,
    /// Some chunks written, some skipped
    PartiallyPersisted,
    /// Nothing written
    Failed,
    /// Stopped at a sub-batch boundary after the document was deleted
    Cancelled,
    /// Text refused as too short or a placeholder; nothing embedded
    Skipped,
}

impl IngestionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionState::Persisted
                | IngestionState::PartiallyPersisted
                | IngestionState::Failed
                | IngestionState::Cancelled
                | IngestionState::Skipped
        )
    }

    /// Whether the document can be searched afterwards.
    pub fn is_usable(&self) -> bool {
        matches!(self, IngestionState::Persisted | IngestionState::PartiallyPersisted)
    }
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestionState::Received => "received",
            IngestionState::Chunking => "chunking",
            IngestionState::EmbeddingInFlight => "embedding_in_flight",
            IngestionState::Persisted => "persisted",
            IngestionState::PartiallyPersisted => "partially_persisted",
            IngestionState::Failed => "failed",
            IngestionState::Cancelled => "cancelled",
            IngestionState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Reasons a document is refused before ingestion starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Content too short: {length} characters, at least {minimum} required")]
    ContentTooShort { length: usize, minimum: usize },

    #[error("Extracted text is a placeholder, not document content")]
    PlaceholderContent,

    #[error("Ingestion already running for document {0}")]
    AlreadyRunning(DocumentId),

    #[error("Ingestion task for document {0} panicked or was aborted")]
    TaskAborted(DocumentId),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub document_id: DocumentId,
    pub state: IngestionState,
    /// Chunks left after noise filtering
    pub total_chunks: usize,
    pub written: usize,
    /// Chunk indices that were not persisted, ascending
    pub failed_indices: Vec<usize>,
    /// Windows dropped as too short to embed
    pub dropped_noise: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IngestionReport {
    pub(crate) fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            state: IngestionState::Received,
            total_chunks: 0,
            written: 0,
            failed_indices: Vec::new(),
            dropped_noise: 0,
            reason: None,
        }
    }
}
