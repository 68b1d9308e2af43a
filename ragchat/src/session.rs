//! A single user's conversation with the QA pipeline.

use std::sync::Arc;

use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::history::ConversationHistory;
use crate::qa::{AnswerStream, ConversationalQa};

/// Per-user state around a shared [`ConversationalQa`].
///
/// The session owns its history and configuration. While an answer stream from
/// [`ask`](ChatSession::ask) is alive the session is mutably borrowed, so the
/// history cannot be read or changed mid-answer.
pub struct ChatSession {
    qa: Arc<ConversationalQa>,
    config: PipelineConfig,
    history: ConversationHistory,
}

impl ChatSession {
    pub fn new(qa: Arc<ConversationalQa>, config: PipelineConfig) -> Self {
        Self { qa, config, history: ConversationHistory::new() }
    }

    /// Resume a conversation from existing turns.
    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = history;
        self
    }

    /// Ask a question. See [`ConversationalQa::answer`].
    pub fn ask<'a>(&'a mut self, question: &'a str) -> AnswerStream<'a> {
        self.qa.answer(question, &mut self.history, &self.config)
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        info!("conversation history cleared");
    }

    /// Keep only the most recent `max_turns` turns.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InputError`](crate::RagError::InputError) if
    /// `max_turns` is zero.
    pub fn truncate_history(&mut self, max_turns: usize) -> Result<()> {
        let before = self.history.len();
        self.history.truncate(max_turns)?;
        info!(before, after = self.history.len(), max_turns, "conversation history truncated");
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        self.config.set_temperature(temperature)
    }

    pub fn set_top_k(&mut self, top_k: usize) -> Result<()> {
        self.config.set_top_k(top_k)
    }

    pub fn set_model(&mut self, model_name: impl Into<String>) -> Result<()> {
        self.config.set_model_name(model_name)
    }
}
