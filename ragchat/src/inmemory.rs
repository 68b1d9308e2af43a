//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps every collection in a map behind a
//! `tokio::sync::RwLock`. Nothing survives the process; use
//! [`FileVectorStore`](crate::FileVectorStore) for a persistent knowledge base.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, rank, remove_origins};

/// An in-memory vector store using cosine similarity for search.
///
/// Collections map collection name → chunk ID → chunk. Chunks are kept in ID
/// order, so equal scores come back in ID order.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Chunk>>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks stored in `collection`, or `None` if it does not exist.
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(BTreeMap::len)
    }

    fn missing(collection: &str) -> RagError {
        RagError::VectorStoreError {
            backend: "InMemory".to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, _dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        for id in ids {
            store.remove(*id);
        }
        Ok(())
    }

    async fn delete_origins(&self, collection: &str, origins: &[&str]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(remove_origins(store, origins))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(rank(store.values(), embedding, top_k))
    }
}
