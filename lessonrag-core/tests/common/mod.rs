//! Deterministic provider and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lessonrag_core::config::Config;
use lessonrag_core::provider::{
    ChatRequest, ChatResponse, Provider, ProviderError, Result as ProviderResult,
};
use std::sync::Mutex;
use std::time::Duration;

pub const DIM: usize = 8;

/// Embeds text onto keyword axes and replies with a fixed answer.
///
/// Text containing the i-th topic keyword gets weight on axis i; text with
/// no known keyword lands on the last axis. Embedding fails for any text
/// containing one of `fail_markers`.
pub struct ScriptedProvider {
    topics: Vec<String>,
    fail_markers: Vec<String>,
    embed_delay: Duration,
    reply: String,
    fail_chat: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            topics: Vec::new(),
            fail_markers: Vec::new(),
            embed_delay: Duration::ZERO,
            reply: "جواب".to_string(),
            fail_chat: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn topic(mut self, keyword: &str) -> Self {
        assert!(self.topics.len() < DIM - 1, "too many topics");
        self.topics.push(keyword.to_string());
        self
    }

    pub fn fail_on(mut self, marker: &str) -> Self {
        self.fail_markers.push(marker.to_string());
        self
    }

    pub fn embed_delay(mut self, delay: Duration) -> Self {
        self.embed_delay = delay;
        self
    }

    pub fn reply(mut self, reply: &str) -> Self {
        self.reply = reply.to_string();
        self
    }

    pub fn failing_chat(mut self) -> Self {
        self.fail_chat = true;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        for (axis, keyword) in self.topics.iter().enumerate() {
            if text.contains(keyword.as_str()) {
                vector[axis] = 1.0;
            }
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[DIM - 1] = 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.iter().map(|v| v / norm).collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> ProviderResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_chat {
            return Err(ProviderError::Api("completion service unavailable".into()));
        }
        callback(ChatResponse {
            model: request.model,
            content: self.reply.clone(),
            done: true,
        });
        Ok(())
    }

    async fn embed(&self, text: &str, _model: &str) -> ProviderResult<Vec<f32>> {
        if !self.embed_delay.is_zero() {
            tokio::time::sleep(self.embed_delay).await;
        }
        if self.fail_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(ProviderError::Api("embedding request timed out".into()));
        }
        Ok(self.vector_for(text))
    }
}

/// Defaults with the test dimension and no pacing delays.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.dimension = DIM;
    config.ingestion.batch_delay_ms = 0;
    config.ingestion.retry_base_delay_ms = 1;
    config
}

/// `count` segments of exactly `width` characters, each opening with a
/// `segment-NN` marker.
pub fn segmented_text(count: usize, width: usize) -> String {
    (0..count)
        .map(|i| {
            let marker = format!("segment-{:02} ", i);
            let pad = width - marker.chars().count();
            format!("{}{}", marker, "ب".repeat(pad))
        })
        .collect()
}

/// `len` characters of repeating Arabic lesson text.
pub fn arabic_lesson(len: usize) -> String {
    "الأنشطة الصفية لتعليم الألوان للأطفال باستخدام البطاقات والأغاني. "
        .chars()
        .cycle()
        .take(len)
        .collect()
}
