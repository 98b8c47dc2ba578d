//! lessonrag-core - Retrieval-augmented teaching assistant engine
//!
//! Provides the components behind a lesson-plan assistant:
//! - LLM provider abstraction (OpenAI-compatible, Ollama)
//! - Chunking, embedding and vector storage (in-memory, Qdrant)
//! - Background ingestion with partial-failure reporting
//! - Similarity retrieval and grounded, localized responses
//! - Configuration management
//! - Server API over a Unix socket
//!
//! ## Primary API
//!
//! Most callers go through [`RagService`], or the [`Server`] wrapping it.

// Public modules
pub mod catalog;
pub mod chat;
pub mod config;
pub mod extraction;
pub mod ingest;
pub mod provider;
pub mod rag;
pub mod server;
pub mod service;

// Public exports
pub use catalog::{DocumentCatalog, InMemoryCatalog, IngestionFlag};
pub use chat::{Answer, AskRequest, ChatManager, Locale, ResponseGenerator};
pub use config::Config;
pub use ingest::{IngestError, IngestionHandle, IngestionOrchestrator, IngestionReport, IngestionState};
pub use rag::{Document, DocumentId, DocumentMetadata, RagEngine, SimilarityResult};
pub use server::Server;
pub use service::{RagService, ServiceError};

// Provider exports
pub use provider::{ChatRequest, ChatResponse, Message, Provider, ProviderError, Role};
