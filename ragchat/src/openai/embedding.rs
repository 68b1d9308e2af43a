//! Embeddings over an OpenAI-compatible `/embeddings` route.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::config::OpenAIConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default embedding model.
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Output size of well-known embedding models.
fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "embedding-3" => Some(2048),
        "embedding-2" => Some(1024),
        _ => None,
    }
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// Uses `reqwest` to call `{base_url}/embeddings` directly and sends whole
/// batches in one request.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat::openai::{OpenAIConfig, OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::new(OpenAIConfig::zhipu(key)?)
///     .with_model("embedding-3");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAIConfig,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider using `text-embedding-3-small`.
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            model: DEFAULT_MODEL.to_string(),
            dimensions: 1536,
            request_dimensions: None,
        }
    }

    /// Set the model name. Known models also set [`dimensions`](EmbeddingProvider::dimensions);
    /// for others call [`with_dimensions`](Self::with_dimensions) as well.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        if let Some(dimensions) = known_dimensions(&self.model) {
            self.dimensions = dimensions;
        }
        self
    }

    /// Request embeddings of this size from the API.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn error(message: String) -> RagError {
        RagError::EmbeddingError { provider: "OpenAI".into(), message }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| Self::error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = "OpenAI", batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(self.config.url("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "OpenAI", error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = "OpenAI", %status, "API error");
            return Err(Self::error(format!("API returned {status}: {detail}")));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            Self::error(format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(Self::error(format!(
                "API returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        // Entries carry their input position; keep input order regardless of
        // the order they were sent back in.
        parsed.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
