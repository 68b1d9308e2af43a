//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s. They must be safe
/// for concurrent read-only use: many questions may search the same store at
/// once while ingestion runs separately.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat::{FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::open("data_base/vector_db").await?;
/// store.create_collection("knowledge_base", 2048).await?;
/// store.upsert("knowledge_base", &chunks).await?;
/// store.flush().await?;
/// let results = store.search("knowledge_base", &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Delete every chunk whose [`origin`](Chunk::origin) is one of `origins`.
    ///
    /// Returns the number of chunks removed.
    async fn delete_origins(&self, collection: &str, origins: &[&str]) -> Result<usize>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns at most `top_k` results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Make every accepted write durable.
    ///
    /// Stores without durable backing have nothing to do.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Remove the chunks of `origins` from an ID-ordered collection.
pub(crate) fn remove_origins(
    chunks: &mut std::collections::BTreeMap<String, Chunk>,
    origins: &[&str],
) -> usize {
    let before = chunks.len();
    chunks.retain(|_, chunk| !origins.contains(&chunk.origin()));
    before - chunks.len()
}

/// Score every chunk against `embedding` and keep the best `top_k`.
///
/// The sort is stable, so equal scores keep the iteration order of `chunks`.
pub(crate) fn rank<'a>(
    chunks: impl Iterator<Item = &'a Chunk>,
    embedding: &[f32],
    top_k: usize,
) -> Vec<SearchResult> {
    let mut scored: Vec<SearchResult> = chunks
        .map(|chunk| SearchResult {
            chunk: chunk.clone(),
            score: cosine_similarity(&chunk.embedding, embedding),
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}
