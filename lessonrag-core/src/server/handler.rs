use super::types::{Request, StreamChunk};
use crate::chat::AskRequest;
use crate::rag::{Document, DocumentId, DocumentMetadata};
use crate::service::RagService;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

pub type ChunkSender = mpsc::UnboundedSender<StreamChunk>;

/// Handles different request types and sends responses via channel.
pub struct RequestHandler {
    service: RagService,
}

impl RequestHandler {
    pub fn new(service: RagService) -> Self {
        Self { service }
    }

    /// Routes request to appropriate handler based on type.
    pub async fn handle(&self, request: Request, sender: ChunkSender) {
        match request {
            Request::Ingest {
                title,
                text,
                language,
                metadata,
            } => self.handle_ingest(title, text, language, metadata, sender).await,
            Request::Ask {
                query,
                document_id,
                history,
                locale,
            } => {
                let mut ask = AskRequest::new(query).with_history(history);
                ask.document_id = document_id;
                ask.locale = locale;
                self.handle_ask(ask, sender).await
            }
            Request::Reingest { document_id, text } => {
                self.handle_reingest(document_id, text, sender).await
            }
            Request::Status { document_id } => self.handle_status(document_id, sender).await,
            Request::Delete { document_id } => self.handle_delete(document_id, sender).await,
            Request::Stats => self.handle_stats(sender).await,
        }
    }

    /// Acknowledges once the document is recorded; ingestion carries on
    /// after the response is closed.
    async fn handle_ingest(
        &self,
        title: String,
        text: String,
        language: Option<String>,
        metadata: DocumentMetadata,
        sender: ChunkSender,
    ) {
        let language =
            language.unwrap_or_else(|| crate::extraction::detect_language(&text).to_string());
        let document = Document::new(title, text)
            .with_language(language)
            .with_metadata(metadata);

        match self.service.add_document(document).await {
            Ok(handle) => {
                let document_id = handle.document_id();
                let _ = sender.send(
                    StreamChunk::done(document_id.to_string())
                        .with_data(json!({ "document_id": document_id, "state": handle.state() })),
                );
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("Failed to ingest: {}", e)));
            }
        }
    }

    async fn handle_reingest(&self, document_id: DocumentId, text: String, sender: ChunkSender) {
        match self.service.reingest(&document_id, text).await {
            Ok(handle) => {
                let _ = sender.send(
                    StreamChunk::done(document_id.to_string())
                        .with_data(json!({ "document_id": document_id, "state": handle.state() })),
                );
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("Failed to re-ingest: {}", e)));
            }
        }
    }

    async fn handle_ask(&self, request: AskRequest, sender: ChunkSender) {
        let answer = self
            .service
            .ask_stream(request, |content| {
                let _ = sender.send(StreamChunk::chunk(content));
            })
            .await;

        debug!(grounded = answer.grounded, degraded = answer.degraded, "answer streamed");
        let data = json!({
            "sources": answer.sources,
            "grounded": answer.grounded,
            "degraded": answer.degraded,
        });
        let _ = sender.send(StreamChunk::done(answer.text).with_data(data));
    }

    async fn handle_status(&self, document_id: DocumentId, sender: ChunkSender) {
        match self.service.status(&document_id).await {
            Some(state) => {
                let _ = sender.send(StreamChunk::done(state.to_string()));
            }
            None => {
                let _ = sender.send(StreamChunk::error(format!(
                    "No ingestion known for document {}",
                    document_id
                )));
            }
        }
    }

    async fn handle_delete(&self, document_id: DocumentId, sender: ChunkSender) {
        match self.service.delete_document(&document_id).await {
            Ok(report) => {
                let _ = sender.send(
                    StreamChunk::done(format!(
                        "Deleted document {} ({} chunks)",
                        document_id, report.chunks_removed
                    ))
                    .with_data(json!(report)),
                );
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("Failed to delete: {}", e)));
            }
        }
    }

    async fn handle_stats(&self, sender: ChunkSender) {
        match self.service.stats().await {
            Ok(stats) => {
                let _ = sender.send(
                    StreamChunk::done(format!(
                        "Knowledge base contains {} documents in {} chunks",
                        stats.documents, stats.chunks
                    ))
                    .with_data(json!(stats)),
                );
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("Failed to read stats: {}", e)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provider::{ChatRequest, ChatResponse, Provider, Result as ProviderResult};
    use crate::rag::InMemoryVectorStore;
    use crate::server::types::ChunkType;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct WordProvider;

    #[async_trait]
    impl Provider for WordProvider {
        async fn chat<'a>(
            &'a self,
            request: ChatRequest,
            mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> ProviderResult<()> {
            for (word, done) in [("two ", false), ("words", true)] {
                callback(ChatResponse {
                    model: request.model.clone(),
                    content: word.into(),
                    done,
                });
            }
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> ProviderResult<Vec<f32>> {
            Ok(vec![0.0, 1.0])
        }
    }

    fn handler() -> RequestHandler {
        let mut config = Config::default();
        config.embedding.dimension = 2;
        config.ingestion.batch_delay_ms = 0;
        RequestHandler::new(RagService::new(
            config,
            Arc::new(WordProvider),
            Arc::new(InMemoryVectorStore::new(2)),
        ))
    }

    async fn collect(handler: &RequestHandler, request: Request) -> Vec<StreamChunk> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        handler.handle(request, sender).await;
        let mut chunks = Vec::new();
        while let Some(chunk) = receiver.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_ask_streams_then_done() {
        let handler = handler();
        let chunks = collect(
            &handler,
            Request::Ask {
                query: "How do I teach colors?".into(),
                document_id: None,
                history: vec![],
                locale: None,
            },
        )
        .await;

        let types: Vec<ChunkType> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(types, vec![ChunkType::Chunk, ChunkType::Chunk, ChunkType::Done]);
        assert_eq!(chunks[2].content, "two words");
    }

    #[tokio::test]
    async fn test_ingest_acknowledges_with_id() {
        let handler = handler();
        let chunks = collect(
            &handler,
            Request::Ingest {
                title: "الأشجار".into(),
                text: "درس عن زراعة الأشجار مع الأطفال في الحديقة المدرسية.".repeat(3),
                language: None,
                metadata: DocumentMetadata::default(),
            },
        )
        .await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Done);
        let id: DocumentId = chunks[0].content.parse().unwrap();

        let status = collect(&handler, Request::Status { document_id: id }).await;
        assert_eq!(status[0].chunk_type, ChunkType::Done);
    }

    #[tokio::test]
    async fn test_reingest_unknown_document_is_error() {
        let handler = handler();
        let chunks = collect(
            &handler,
            Request::Reingest {
                document_id: DocumentId::new(),
                text: "نص جديد عن الأشجار".into(),
            },
        )
        .await;
        assert_eq!(chunks[0].chunk_type, ChunkType::Error);
    }

    #[tokio::test]
    async fn test_unknown_status_is_error() {
        let handler = handler();
        let chunks = collect(
            &handler,
            Request::Status {
                document_id: DocumentId::new(),
            },
        )
        .await;
        assert_eq!(chunks[0].chunk_type, ChunkType::Error);
    }
}
