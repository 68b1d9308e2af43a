//! Chat model provider trait.
//!
//! A [`ChatModel`] answers a [`ChatRequest`] either in one piece
//! ([`complete`](ChatModel::complete)) or as a stream of text fragments
//! ([`stream`](ChatModel::stream)). Dropping a [`ChatStream`] before it ends
//! cancels the generation; implementations should release their connection
//! when that happens.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A prior message included in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Everything a provider needs to produce one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier passed through to the provider.
    pub model: String,
    /// System instruction placed before the history.
    pub system_prompt: String,
    /// Prior turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// The final human message.
    pub user_turn: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
}

/// A lazily produced sequence of answer fragments.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A provider of chat completions.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// A short provider label used in logs and errors.
    fn name(&self) -> &str;

    /// Produce the whole answer in one call.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Produce the answer incrementally.
    ///
    /// The default implementation issues [`complete`](ChatModel::complete)
    /// and yields its output as a single fragment. Providers with native
    /// streaming should override it.
    async fn stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let text = self.complete(request).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }
}
