//! Chat sessions and turn persistence.

use crate::provider::{Message, Role};
use crate::rag::DocumentId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("Failed to record chat turns: {0}")]
pub struct RecordError(pub String);

/// Groups turns under a user and, optionally, one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub document_id: Option<DocumentId>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            document_id: None,
            title: title.into(),
            created_at: Utc::now(),
        }
    }

    /// A session about one lesson plan, titled after it.
    pub fn for_document(
        user_id: impl Into<String>,
        document_id: DocumentId,
        document_title: &str,
    ) -> Self {
        Self {
            document_id: Some(document_id),
            ..Self::new(user_id, format!("Chat about {}", document_title))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Sink for chat turns. Failures are reported but never fail an answer.
#[async_trait]
pub trait TurnRecorder: Send + Sync {
    async fn record(&self, session: &Session, turns: &[ChatTurn]) -> Result<(), RecordError>;
}

/// Keeps turns in memory, keyed by session.
#[derive(Default)]
pub struct InMemoryTurnRecorder {
    sessions: RwLock<HashMap<Uuid, (Session, Vec<ChatTurn>)>>,
}

impl InMemoryTurnRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns of a session, oldest first.
    pub async fn turns(&self, session_id: &Uuid) -> Vec<ChatTurn> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|(_, turns)| turns.clone())
            .unwrap_or_default()
    }

    /// The most recent turns of a session as provider messages.
    pub async fn history(&self, session_id: &Uuid, limit: usize) -> Vec<Message> {
        let turns = self.turns(session_id).await;
        let skip = turns.len().saturating_sub(limit);
        turns.iter().skip(skip).map(ChatTurn::to_message).collect()
    }

    pub async fn sessions_for_user(&self, user_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|(s, _)| s.user_id == user_id)
            .map(|(s, _)| s.clone())
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }
}

#[async_trait]
impl TurnRecorder for InMemoryTurnRecorder {
    async fn record(&self, session: &Session, turns: &[ChatTurn]) -> Result<(), RecordError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session.id)
            .or_insert_with(|| (session.clone(), Vec::new()));
        entry.1.extend_from_slice(turns);
        Ok(())
    }
}
