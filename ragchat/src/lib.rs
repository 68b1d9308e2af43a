//! # ragchat
//!
//! Conversational retrieval-augmented question answering over a local
//! document collection.
//!
//! ## Overview
//!
//! Documents are ingested offline into a vector store. Each question is then
//! answered by retrieving the most similar chunks and prompting a chat model
//! with them, keeping a multi-turn conversation history:
//!
//! - [`IngestionPipeline`] - load → normalize → split → embed and store
//! - [`ConversationalQa`] - condense follow-ups, retrieve, stream the answer
//! - [`ChatSession`] - one user's history and settings around a shared pipeline
//! - [`ConversationHistory`] - append, clear and truncate turns
//!
//! External services sit behind three traits: [`EmbeddingProvider`],
//! [`VectorStore`] and [`ChatModel`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use ragchat::mock::{MockChatModel, MockEmbeddingProvider};
//! use ragchat::{ChatSession, ConversationalQa, InMemoryVectorStore, PipelineConfig};
//!
//! let qa = ConversationalQa::builder()
//!     .embedding_provider(Arc::new(MockEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chat_model(Arc::new(MockChatModel::new().with_fragments(["Paris."])))
//!     .build()?;
//!
//! let mut session = ChatSession::new(Arc::new(qa), PipelineConfig::default());
//! let mut answer = session.ask("What is the capital of France?");
//! while let Some(fragment) = answer.next().await {
//!     print!("{}", fragment?);
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI-compatible embedding and chat providers (OpenAI, Zhipu, vLLM, ...) |

pub mod chat;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod file_store;
pub mod history;
pub mod ingest;
pub mod inmemory;
pub mod loader;
pub mod mock;
pub mod normalize;
pub mod prompt;
pub mod qa;
pub mod session;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use chat::{ChatMessage, ChatModel, ChatRequest, ChatStream, Role};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{IngestConfig, PipelineConfig, TEMPERATURE_RANGE, TOP_K_RANGE};
pub use document::{Chunk, Document, SOURCE_KEY, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use file_store::FileVectorStore;
pub use history::{ConversationHistory, Turn};
pub use ingest::{IngestReport, IngestionPipeline};
pub use inmemory::InMemoryVectorStore;
pub use prompt::PromptTemplates;
pub use qa::{AnswerStream, ConversationalQa, DEFAULT_COLLECTION};
pub use session::ChatSession;
pub use vectorstore::VectorStore;
