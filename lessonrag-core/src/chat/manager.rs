//! Question answering over the lesson-plan knowledge base.
//!
//! # Flow
//!
//! ```text
//! Query → Retriever ──ok──→ context chunks ─┐
//!            │                              ├→ ResponseGenerator ──ok──→ Answer
//!            └─err─→ empty context ─────────┘          │
//!                                                      └─err─→ apology
//! ```
//!
//! Retrieval and generation failures never surface as errors: the caller
//! always gets something to show the user, with [`Answer::degraded`] set when
//! a fallback was taken.

use super::generator::ResponseGenerator;
use super::history::{ChatTurn, Session, TurnRecorder};
use super::prompt::apology;
use super::Locale;
use crate::config::Config;
use crate::provider::{Message, Provider};
use crate::rag::{DocumentId, RagEngine, Retriever, SimilarityResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A question from the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
    /// Restricts retrieval to one lesson plan
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<Message>,
    /// Overrides the configured locale
    #[serde(default)]
    pub locale: Option<Locale>,
    /// Where to record the turns, if anywhere
    #[serde(default)]
    pub session: Option<Session>,
}

impl AskRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn scoped_to(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn in_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Chunks the answer was grounded on, most similar first
    pub sources: Vec<SimilarityResult>,
    /// True when retrieved context went into the prompt
    pub grounded: bool,
    /// True when retrieval or generation failed and a fallback was used
    pub degraded: bool,
}

/// Answers questions with retrieved lesson content as context.
///
/// # Examples
///
/// ```no_run
/// use lessonrag_core::chat::{AskRequest, ChatManager};
/// use lessonrag_core::provider::create_provider;
/// use lessonrag_core::rag::RagEngine;
/// use lessonrag_core::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load_or_default();
/// let provider = create_provider(&config)?;
/// let rag = RagEngine::from_config(&config, provider.clone()).await?;
/// let manager = ChatManager::new(&config, &rag, provider);
///
/// let answer = manager.ask(AskRequest::new("كيف أعلم الألوان؟")).await;
/// println!("{}", answer.text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatManager {
    retriever: Retriever,
    generator: ResponseGenerator,
    recorder: Option<Arc<dyn TurnRecorder>>,
    chat_limit: usize,
    threshold: f32,
    locale: Locale,
}

impl ChatManager {
    pub fn new(config: &Config, rag: &RagEngine, provider: Arc<dyn Provider>) -> Self {
        Self {
            retriever: rag.retriever().clone(),
            generator: ResponseGenerator::new(config, provider),
            recorder: None,
            chat_limit: config.retrieval.chat_limit,
            threshold: config.retrieval.threshold,
            locale: config.chat.locale,
        }
    }

    /// Records every answered turn pair through `recorder`.
    pub fn with_recorder(mut self, recorder: Arc<dyn TurnRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Answers a question. Never fails; see [`Answer::degraded`].
    pub async fn ask(&self, request: AskRequest) -> Answer {
        self.ask_stream(request, |_| {}).await
    }

    /// Like [`ask`](Self::ask) but forwards generated text as it streams.
    ///
    /// On a generation failure the apology is sent through `on_chunk` as a
    /// single fragment.
    pub async fn ask_stream<F>(&self, request: AskRequest, mut on_chunk: F) -> Answer
    where
        F: FnMut(&str) + Send,
    {
        let locale = request.locale.unwrap_or(self.locale);
        let mut degraded = false;

        let sources = match self
            .retriever
            .search(&request.query, request.document_id, self.chat_limit, self.threshold)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "retrieval failed, answering without context");
                degraded = true;
                Vec::new()
            }
        };

        let context: Vec<String> = sources.iter().map(|r| r.content.clone()).collect();
        debug!(chunks = context.len(), scope = ?request.document_id, "context retrieved");

        let (text, grounded) = match self
            .generator
            .respond_stream(&request.query, &context, &request.history, locale, &mut on_chunk)
            .await
        {
            Ok(text) => (text, !context.is_empty()),
            Err(e) => {
                warn!(error = %e, "generation failed, returning apology");
                degraded = true;
                let text = apology(locale).to_string();
                on_chunk(&text);
                (text, false)
            }
        };

        if let (Some(recorder), Some(session)) = (&self.recorder, &request.session) {
            let turns = [ChatTurn::user(&request.query), ChatTurn::assistant(&text)];
            if let Err(e) = recorder.record(session, &turns).await {
                warn!(session = %session.id, error = %e, "failed to record chat turns");
            }
        }

        info!(grounded, degraded, sources = sources.len(), "answer ready");
        Answer {
            text,
            sources: if grounded { sources } else { Vec::new() },
            grounded,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::history::{InMemoryTurnRecorder, RecordError};
    use crate::provider::{ChatRequest, ChatResponse, ProviderError, Result as ProviderResult};
    use crate::rag::{ChunkMetadata, ChunkRecord, InMemoryVectorStore, VectorStore};
    use async_trait::async_trait;

    /// Embeds everything to the same unit vector; chat replies or fails.
    struct StubProvider {
        fail_chat: bool,
        fail_embed: bool,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn chat<'a>(
            &'a self,
            request: ChatRequest,
            mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> ProviderResult<()> {
            if self.fail_chat {
                return Err(ProviderError::Api("boom".into()));
            }
            callback(ChatResponse {
                model: request.model,
                content: "answer".into(),
                done: true,
            });
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> ProviderResult<Vec<f32>> {
            if self.fail_embed {
                return Err(ProviderError::Api("embedding down".into()));
            }
            Ok(vec![1.0, 0.0])
        }
    }

    struct FailingRecorder;

    #[async_trait]
    impl TurnRecorder for FailingRecorder {
        async fn record(&self, _session: &Session, _turns: &[ChatTurn]) -> Result<(), RecordError> {
            Err(RecordError("database offline".into()))
        }
    }

    async fn manager(fail_chat: bool, fail_embed: bool) -> (ChatManager, DocumentId) {
        let mut config = Config::default();
        config.embedding.dimension = 2;
        let provider = Arc::new(StubProvider { fail_chat, fail_embed });
        let store = Arc::new(InMemoryVectorStore::new(2));
        let doc = DocumentId::new();
        store
            .insert(vec![ChunkRecord {
                document_id: doc,
                chunk_index: 0,
                content: "درس الألوان".into(),
                embedding: vec![1.0, 0.0],
                metadata: ChunkMetadata::default(),
            }])
            .await
            .unwrap();
        let rag = RagEngine::new(&config, provider.clone(), store);
        (ChatManager::new(&config, &rag, provider), doc)
    }

    #[tokio::test]
    async fn test_grounded_answer() {
        let (manager, doc) = manager(false, false).await;
        let answer = manager.ask(AskRequest::new("colours").scoped_to(doc)).await;

        assert_eq!(answer.text, "answer");
        assert!(answer.grounded);
        assert!(!answer.degraded);
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieval_failure_falls_back_to_general_answer() {
        let (manager, _) = manager(false, true).await;
        let answer = manager.ask(AskRequest::new("colours")).await;

        assert_eq!(answer.text, "answer");
        assert!(!answer.grounded);
        assert!(answer.degraded);
    }

    #[tokio::test]
    async fn test_generation_failure_returns_apology() {
        let (manager, _) = manager(true, false).await;
        let answer = manager
            .ask(AskRequest::new("colours").with_locale(Locale::English))
            .await;

        assert_eq!(answer.text, apology(Locale::English));
        assert!(answer.degraded);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_turns_recorded_and_recorder_failure_ignored() {
        let (manager, doc) = manager(false, false).await;
        let recorder = Arc::new(InMemoryTurnRecorder::new());
        let session = Session::for_document("teacher", doc, "Colours");

        let answer = manager
            .clone()
            .with_recorder(recorder.clone())
            .ask(AskRequest::new("colours").in_session(session.clone()))
            .await;
        assert_eq!(recorder.turns(&session.id).await.len(), 2);
        assert!(!answer.degraded);

        let answer = manager
            .with_recorder(Arc::new(FailingRecorder))
            .ask(AskRequest::new("colours").in_session(session))
            .await;
        assert_eq!(answer.text, "answer");
    }
}
