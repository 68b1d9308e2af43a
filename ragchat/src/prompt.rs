//! Prompt templates and request assembly for the QA pipeline.

use serde::{Deserialize, Serialize};

use crate::chat::ChatRequest;
use crate::config::PipelineConfig;
use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::history::ConversationHistory;

/// Placeholder replaced by the retrieved context in the answer prompt.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Separator placed between retrieved chunks in `{context}`.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const DEFAULT_CONDENSE_PROMPT: &str = "Given the chat history, summarize the user's latest \
question as a standalone question. If there is no relevant chat history, return the user's \
question as is.";

const DEFAULT_ANSWER_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following retrieved context to answer the question. If you don't know the answer, \
say that you don't know. Keep the answer concise.\n\n{context}";

/// System prompts used for condensation and answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    condense: String,
    answer: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self { condense: DEFAULT_CONDENSE_PROMPT.to_string(), answer: DEFAULT_ANSWER_PROMPT.to_string() }
    }
}

impl PromptTemplates {
    /// Build custom templates.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `answer` lacks the `{context}`
    /// placeholder.
    pub fn new(condense: impl Into<String>, answer: impl Into<String>) -> Result<Self> {
        let answer = answer.into();
        if !answer.contains(CONTEXT_PLACEHOLDER) {
            return Err(RagError::ConfigError(format!(
                "answer prompt must contain the {CONTEXT_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self { condense: condense.into(), answer })
    }

    pub fn condense(&self) -> &str {
        &self.condense
    }

    /// The answer system prompt with `context` substituted.
    pub fn answer_with(&self, context: &str) -> String {
        self.answer.replace(CONTEXT_PLACEHOLDER, context)
    }
}

/// Join retrieved chunk texts with a blank line, in rank order.
pub fn render_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// The blocking request that rewrites `question` into a standalone query.
pub fn condense_request(
    templates: &PromptTemplates,
    config: &PipelineConfig,
    history: &ConversationHistory,
    question: &str,
) -> ChatRequest {
    ChatRequest {
        model: config.model_name.clone(),
        system_prompt: templates.condense.clone(),
        history: history.to_messages(),
        user_turn: question.to_string(),
        temperature: config.temperature,
    }
}

/// The streamed request that answers `question` from `context`.
pub fn answer_request(
    templates: &PromptTemplates,
    config: &PipelineConfig,
    history: &ConversationHistory,
    context: &str,
    question: &str,
) -> ChatRequest {
    ChatRequest {
        model: config.model_name.clone(),
        system_prompt: templates.answer_with(context),
        history: history.to_messages(),
        user_turn: question.to_string(),
        temperature: config.temperature,
    }
}
