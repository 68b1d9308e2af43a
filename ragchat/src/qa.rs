//! Conversational question answering over a vector store.
//!
//! [`ConversationalQa::answer`] turns one question into a stream of answer
//! fragments:
//!
//! 1. With prior turns, a blocking chat call condenses the question into a
//!    standalone query. Without prior turns, the question is the query.
//! 2. The query is embedded and the `top_k` nearest chunks are retrieved.
//! 3. The chunks become the `{context}` of the answer prompt, which is sent
//!    together with the history and the raw question in streaming mode.
//! 4. Fragments are yielded as they arrive. Once the provider stream ends,
//!    the turn is appended to the history.
//!
//! Everything runs lazily on the first poll. Dropping the stream early, or a
//! provider failure, leaves the history exactly as it was.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use ragchat::{ConversationHistory, ConversationalQa, PipelineConfig};
//!
//! let qa = ConversationalQa::builder()
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .chat_model(model)
//!     .collection("knowledge_base")
//!     .build()?;
//!
//! let mut history = ConversationHistory::new();
//! let config = PipelineConfig::default();
//! let mut answer = qa.answer("What is the capital of France?", &mut history, &config);
//! while let Some(fragment) = answer.next().await {
//!     print!("{}", fragment?);
//! }
//! ```

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::chat::ChatModel;
use crate::config::PipelineConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::history::{ConversationHistory, Turn};
use crate::prompt::{self, PromptTemplates};
use crate::vectorstore::VectorStore;

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "knowledge_base";

/// Answer fragments in arrival order. Borrows the history it will update.
pub type AnswerStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// The conversational retrieval pipeline.
///
/// Holds the shared collaborators; per-session state (history and
/// [`PipelineConfig`]) is passed into every call. One instance can serve many
/// sessions concurrently.
pub struct ConversationalQa {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chat_model: Arc<dyn ChatModel>,
    collection: String,
    prompts: PromptTemplates,
}

impl ConversationalQa {
    /// Create a new [`ConversationalQaBuilder`].
    pub fn builder() -> ConversationalQaBuilder {
        ConversationalQaBuilder::default()
    }

    /// The collection questions are answered from.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn prompts(&self) -> &PromptTemplates {
        &self.prompts
    }

    /// Answer `question` given the prior turns in `history`.
    ///
    /// A blank question yields an empty stream and issues no calls. The
    /// returned stream must be consumed to completion for the turn to be
    /// recorded; calling `answer` again re-issues every model call.
    ///
    /// # Errors
    ///
    /// The stream yields [`RagError::ConfigError`] and issues no calls if
    /// `config` is out of range. It yields the provider error and ends if
    /// condensation, retrieval or generation fails. A generation failure after
    /// at least one fragment is reported as [`RagError::PartialStream`]. In
    /// every error case the history is left unmodified.
    pub fn answer<'a>(
        &'a self,
        question: &'a str,
        history: &'a mut ConversationHistory,
        config: &'a PipelineConfig,
    ) -> AnswerStream<'a> {
        if question.trim().is_empty() {
            debug!("ignoring blank question");
            return Box::pin(futures::stream::empty());
        }

        let stream = try_stream! {
            config.validate().inspect_err(|e| warn!(error = %e, "rejecting question"))?;
            let query = if history.is_empty() {
                question.to_string()
            } else {
                self.condense(question, history, config).await?
            };

            let results = self.retrieve(&query, config.top_k).await?;
            let context = prompt::render_context(&results);
            let request =
                prompt::answer_request(&self.prompts, config, history, &context, question);

            let mut fragments = self.chat_model.stream(&request).await.inspect_err(|e| {
                error!(provider = self.chat_model.name(), error = %e, "answer generation failed");
            })?;

            let mut answer = String::new();
            let mut delivered = 0usize;
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment.map_err(|e| interrupted(delivered, e))?;
                answer.push_str(&fragment);
                delivered += 1;
                yield fragment;
            }

            info!(fragments = delivered, answer_len = answer.len(), "answer completed");
            history.append(Turn::new(question, answer));
        };

        Box::pin(stream)
    }

    /// Rewrite a follow-up question into a standalone query.
    ///
    /// # Errors
    ///
    /// Propagates the chat model error unchanged.
    pub async fn condense(
        &self,
        question: &str,
        history: &ConversationHistory,
        config: &PipelineConfig,
    ) -> Result<String> {
        let request = prompt::condense_request(&self.prompts, config, history, question);
        let query = self.chat_model.complete(&request).await.inspect_err(|e| {
            error!(provider = self.chat_model.name(), error = %e, "question condensation failed");
        })?;
        debug!(turns = history.len(), query = %query, "condensed question");
        Ok(query)
    }

    /// Embed `query` and fetch at most `top_k` chunks, most similar first.
    ///
    /// # Errors
    ///
    /// Propagates embedding and vector store errors unchanged.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(error = %e, "query embedding failed");
        })?;

        let mut results = self
            .vector_store
            .search(&self.collection, &embedding, top_k)
            .await
            .inspect_err(|e| {
                error!(collection = %self.collection, error = %e, "vector store search failed");
            })?;
        results.truncate(top_k);

        debug!(collection = %self.collection, top_k, result_count = results.len(), "retrieved context");
        Ok(results)
    }
}

/// Classify a provider failure in the middle of an answer.
fn interrupted(delivered: usize, e: RagError) -> RagError {
    if delivered == 0 {
        error!(error = %e, "answer stream failed before the first fragment");
        e
    } else {
        error!(fragments = delivered, error = %e, "answer stream interrupted");
        RagError::PartialStream { fragments: delivered, message: e.to_string() }
    }
}

/// Builder for constructing a [`ConversationalQa`].
///
/// The embedding provider, vector store and chat model are required. The
/// collection defaults to [`DEFAULT_COLLECTION`] and prompts to
/// [`PromptTemplates::default`].
#[derive(Default)]
pub struct ConversationalQaBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chat_model: Option<Arc<dyn ChatModel>>,
    collection: Option<String>,
    prompts: Option<PromptTemplates>,
}

impl ConversationalQaBuilder {
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(model);
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Build the [`ConversationalQa`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<ConversationalQa> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chat_model = self
            .chat_model
            .ok_or_else(|| RagError::ConfigError("chat_model is required".to_string()))?;

        Ok(ConversationalQa {
            embedding_provider,
            vector_store,
            chat_model,
            collection: self.collection.unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            prompts: self.prompts.unwrap_or_default(),
        })
    }
}
