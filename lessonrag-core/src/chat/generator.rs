//! Completion calls for grounded answers.

use super::prompt::{assemble_context, build_messages, system_prompt};
use super::Locale;
use crate::config::Config;
use crate::provider::{ChatRequest, Message, Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Completion provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Completion provider returned no content")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Turns a query, retrieved context and recent history into one completion
/// request.
///
/// Each call to [`respond`](Self::respond) makes exactly one provider call.
#[derive(Clone)]
pub struct ResponseGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    history_turns: usize,
    max_context_chars: usize,
}

impl ResponseGenerator {
    pub fn new(config: &Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            history_turns: config.chat.history_turns,
            max_context_chars: config.chat.max_context_chars,
        }
    }

    /// Generates an answer and returns it once complete.
    ///
    /// An empty `context_chunks` produces an ungrounded answer from the
    /// general prompt. Only the last `history_turns` entries of `history` are
    /// sent.
    pub async fn respond(
        &self,
        query: &str,
        context_chunks: &[String],
        history: &[Message],
        locale: Locale,
    ) -> Result<String> {
        self.respond_stream(query, context_chunks, history, locale, |_| {})
            .await
    }

    /// Like [`respond`](Self::respond) but forwards each content fragment to
    /// `on_chunk` as it arrives.
    pub async fn respond_stream<F>(
        &self,
        query: &str,
        context_chunks: &[String],
        history: &[Message],
        locale: Locale,
        mut on_chunk: F,
    ) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let context = assemble_context(context_chunks, self.max_context_chars);
        let grounded = !context.is_empty();
        let messages = build_messages(
            system_prompt(&context, locale),
            history,
            self.history_turns,
            query,
        );

        debug!(
            message_count = messages.len(),
            context_chars = context.chars().count(),
            grounded,
            %locale,
            "sending completion request"
        );

        let request = ChatRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let mut accumulated = String::new();
        self.provider
            .chat(
                request,
                Box::new(|response| {
                    if !response.content.is_empty() {
                        on_chunk(&response.content);
                        accumulated.push_str(&response.content);
                    }
                }),
            )
            .await?;

        if accumulated.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        info!(chars = accumulated.chars().count(), grounded, "response generated");
        Ok(accumulated)
    }
}
