use crate::chat::Locale;
use crate::provider::Message;
use crate::rag::{DocumentId, DocumentMetadata};
use serde::{Deserialize, Serialize};

/// Request from client to server, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Store a document and start ingesting it.
    Ingest {
        title: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default)]
        metadata: DocumentMetadata,
    },
    /// Answer a question, optionally scoped to one document.
    Ask {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_id: Option<DocumentId>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        history: Vec<Message>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locale: Option<Locale>,
    },
    /// Replace a recorded document's text and ingest it again.
    Reingest {
        document_id: DocumentId,
        text: String,
    },
    Status {
        document_id: DocumentId,
    },
    Delete {
        document_id: DocumentId,
    },
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Chunk,
    Done,
    Error,
}

/// Response frame sent to the client.
///
/// `chunk` frames carry streamed text, the final `done` frame carries the
/// full result and `error` ends the response early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamChunk {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Chunk,
            content: content.into(),
            data: None,
            error: None,
        }
    }

    pub fn done(content: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Done,
            content: content.into(),
            data: None,
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Error,
            content: String::new(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_str(
            r#"{"type":"ask","query":"ما هي الأنشطة","locale":"ar"}"#,
        )
        .unwrap();
        match request {
            Request::Ask {
                query,
                document_id,
                history,
                locale,
            } => {
                assert_eq!(query, "ما هي الأنشطة");
                assert!(document_id.is_none());
                assert!(history.is_empty());
                assert_eq!(locale, Some(Locale::Arabic));
            }
            other => panic!("unexpected request {:?}", other),
        }

        let stats: Request = serde_json::from_str(r#"{"type":"stats"}"#).unwrap();
        assert!(matches!(stats, Request::Stats));
    }

    #[test]
    fn test_chunk_wire_format() {
        let json = serde_json::to_string(&StreamChunk::chunk("hi")).unwrap();
        assert_eq!(json, r#"{"type":"chunk","content":"hi"}"#);

        let json = serde_json::to_string(&StreamChunk::error("bad")).unwrap();
        assert_eq!(json, r#"{"type":"error","content":"","error":"bad"}"#);
    }
}
