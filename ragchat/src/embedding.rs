//! Text embeddings for chunks and queries.
//!
//! Ingestion embeds every chunk once; the QA pipeline embeds each standalone
//! query. Both must go through the same provider and model, or similarity
//! scores between them are meaningless.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Turns text into fixed-length vectors for similarity search.
///
/// A provider is deterministic for identical input within one model version
/// and always returns vectors of [`dimensions`](EmbeddingProvider::dimensions)
/// length. Remote backends with a batch endpoint override
/// [`embed_batch`](EmbeddingProvider::embed_batch); the fallback embeds one
/// text at a time.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat::EmbeddingProvider;
///
/// let query = provider.embed("What is the capital of France?").await?;
/// provider.check_dimensions(&query)?;
/// let results = store.search("knowledge_base", &query, 4).await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Reject a vector whose length differs from [`dimensions`](Self::dimensions).
    ///
    /// A mismatch means the backend serves a different model than configured;
    /// storing such vectors would poison the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] on a length mismatch.
    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions() {
            return Err(RagError::EmbeddingError {
                provider: "embedding".to_string(),
                message: format!(
                    "expected {} dimensions, got {}",
                    self.dimensions(),
                    embedding.len()
                ),
            });
        }
        Ok(())
    }
}
