//! Providers for OpenAI-compatible HTTP APIs.
//!
//! This module is only available when the `openai` feature is enabled. Any
//! service exposing the OpenAI `/embeddings` and `/chat/completions` routes
//! works, including Zhipu's `open.bigmodel.cn` endpoint.

mod chat;
mod config;
mod embedding;

pub use chat::OpenAIChatModel;
pub use config::{OPENAI_BASE_URL, OpenAIConfig, ZHIPU_BASE_URL};
pub use embedding::OpenAIEmbeddingProvider;
