//! Deterministic providers for tests and offline demos.
//!
//! [`MockEmbeddingProvider`] hashes words into buckets, so texts sharing
//! vocabulary land near each other and retrieval behaves plausibly without a
//! network. [`MockChatModel`] replays scripted output and records every
//! request it receives.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::chat::{ChatModel, ChatRequest, ChatStream};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Bag-of-words embeddings over hashed word buckets, L2-normalised.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

fn word_hash(word: &str) -> u64 {
    word.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let word = word.to_lowercase();
            let bucket = (word_hash(&word) % self.dimensions as u64) as usize;
            embedding[bucket] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Which [`ChatModel`] method a recorded request went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Complete,
    Stream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub request: ChatRequest,
}

/// A scripted chat model.
///
/// `complete` returns the condensed response; `stream` yields the answer
/// fragments in order. Failures can be injected on either path.
///
/// # Example
///
/// ```rust,ignore
/// let model = MockChatModel::new()
///     .with_condensed("When was Frank Herbert born?")
///     .with_fragments(["He was born ", "in 1920."]);
/// ```
#[derive(Debug, Default)]
pub struct MockChatModel {
    condensed: String,
    fragments: Vec<String>,
    fail_complete: Option<String>,
    fail_stream_after: Option<(usize, String)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text returned by `complete`.
    pub fn with_condensed(mut self, condensed: impl Into<String>) -> Self {
        self.condensed = condensed.into();
        self
    }

    /// The fragments yielded by `stream`.
    pub fn with_fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fragments = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Make `complete` fail with `message`.
    pub fn failing_complete(mut self, message: impl Into<String>) -> Self {
        self.fail_complete = Some(message.into());
        self
    }

    /// Make `stream` yield `after` fragments and then an error.
    pub fn failing_stream_after(mut self, after: usize, message: impl Into<String>) -> Self {
        self.fail_stream_after = Some((after, message.into()));
        self
    }

    /// Every request received so far, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<ChatRequest> {
        self.calls().into_iter().filter(|c| c.kind == kind).map(|c| c.request).collect()
    }

    fn record(&self, kind: CallKind, request: &ChatRequest) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall { kind, request: request.clone() });
        }
    }

    fn error(message: &str) -> RagError {
        RagError::ChatError { provider: "mock".to_string(), message: message.to_string() }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.record(CallKind::Complete, request);
        match &self.fail_complete {
            Some(message) => Err(Self::error(message)),
            None => Ok(self.condensed.clone()),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        self.record(CallKind::Stream, request);

        let mut items: Vec<Result<String>> = Vec::new();
        match &self.fail_stream_after {
            Some((after, message)) => {
                items.extend(self.fragments.iter().take(*after).cloned().map(Ok));
                items.push(Err(Self::error(message)));
            }
            None => items.extend(self.fragments.iter().cloned().map(Ok)),
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
