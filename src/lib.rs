//! lessonrag - Retrieval-augmented teaching assistant for lesson plans
//!
//! Convenience wrapper re-exporting [`lessonrag_core`].
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! lessonrag = "0.1"
//! ```

// Re-export core
pub use lessonrag_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use lessonrag_core::chat::{AskRequest, Session};
    pub use lessonrag_core::rag::{Document, DocumentId, DocumentMetadata};
    pub use lessonrag_core::{Config, IngestionState, Locale, RagService};
}
