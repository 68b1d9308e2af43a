//! Persistent vector store backed by JSON snapshots on disk.
//!
//! Each collection lives in `<root>/<collection>.json`. Writes go to memory
//! first and become durable on [`flush`](VectorStore::flush), which replaces
//! each changed snapshot through a temporary file, `fsync` and rename, so a
//! crash mid-flush leaves the previous snapshot intact.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, rank, remove_origins};

const BACKEND: &str = "file";
const SNAPSHOT_EXTENSION: &str = "json";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimensions: usize,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Default)]
struct Collection {
    /// Zero until the first chunk or an explicit `create_collection` fixes it.
    dimensions: usize,
    chunks: BTreeMap<String, Chunk>,
    dirty: bool,
}

impl Collection {
    fn check_dimensions(&self, len: usize, what: &str) -> Result<()> {
        if self.dimensions != 0 && len != self.dimensions {
            return Err(store_error(format!(
                "{what} has {len} dimensions, collection expects {}",
                self.dimensions
            )));
        }
        Ok(())
    }
}

/// A [`VectorStore`] persisted as one JSON snapshot per collection.
///
/// Suitable for knowledge bases of a few tens of thousands of chunks: every
/// search scores all chunks of the collection with cosine similarity.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat::{FileVectorStore, VectorStore};
///
/// let store = FileVectorStore::open("data_base/vector_db").await?;
/// let results = store.search("knowledge_base", &query_embedding, 4).await?;
/// ```
#[derive(Debug)]
pub struct FileVectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl FileVectorStore {
    /// Open the store rooted at `root`, creating the directory if needed and
    /// loading every existing collection snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the directory cannot be read
    /// or a snapshot is corrupt.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(&root, "create store directory", e))?;

        let mut collections = HashMap::new();
        let mut entries =
            tokio::fs::read_dir(&root).await.map_err(|e| io_error(&root, "read directory", e))?;
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| io_error(&root, "read directory", e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != SNAPSHOT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if validate_name(&name).is_err() {
                warn!(path = %path.display(), "ignoring snapshot with unsupported collection name");
                continue;
            }
            let collection = load_snapshot(&path).await?;
            debug!(collection = %name, chunks = collection.chunks.len(), "loaded collection snapshot");
            collections.insert(name, collection);
        }

        info!(root = %root.display(), collections = collections.len(), "opened file vector store");
        Ok(Self { root, collections: RwLock::new(collections) })
    }

    /// Directory holding the snapshots.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of chunks stored in `collection`, or `None` if it does not exist.
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.chunks.len())
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{SNAPSHOT_EXTENSION}"))
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        validate_name(name)?;
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dirty: true, ..Collection::default() });
        if collection.dimensions == 0 {
            collection.dimensions = dimensions;
        } else if dimensions != 0 && collection.dimensions != dimensions {
            warn!(
                collection = name,
                existing = collection.dimensions,
                requested = dimensions,
                "collection already exists with different dimensions"
            );
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        let path = self.snapshot_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&path, "remove snapshot", e)),
        }
        debug!(collection = name, "deleted collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(store_error(format!("chunk '{}' has no embedding", chunk.id)));
            }
            store.check_dimensions(chunk.embedding.len(), &format!("chunk '{}'", chunk.id))?;
            if store.dimensions == 0 {
                store.dimensions = chunk.embedding.len();
            }
        }
        for chunk in chunks {
            store.chunks.insert(chunk.id.clone(), chunk.clone());
        }
        store.dirty |= !chunks.is_empty();
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for id in ids {
            store.dirty |= store.chunks.remove(*id).is_some();
        }
        Ok(())
    }

    async fn delete_origins(&self, collection: &str, origins: &[&str]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        let removed = remove_origins(&mut store.chunks, origins);
        store.dirty |= removed > 0;
        Ok(removed)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        store.check_dimensions(embedding.len(), "query embedding")?;
        Ok(rank(store.chunks.values(), embedding, top_k))
    }

    async fn flush(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        let mut written = 0usize;
        for (name, collection) in collections.iter_mut().filter(|(_, c)| c.dirty) {
            let snapshot = Snapshot {
                version: SNAPSHOT_VERSION,
                dimensions: collection.dimensions,
                chunks: collection.chunks.values().cloned().collect(),
            };
            let bytes = serde_json::to_vec(&snapshot)
                .map_err(|e| store_error(format!("failed to encode '{name}': {e}")))?;
            write_atomically(&self.snapshot_path(name), &bytes).await?;
            collection.dirty = false;
            written += 1;
        }
        info!(root = %self.root.display(), collections = written, "flushed vector store");
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> Result<Collection> {
    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, "read snapshot", e))?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| store_error(format!("corrupt snapshot '{}': {e}", path.display())))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(store_error(format!(
            "snapshot '{}' has unsupported version {}",
            path.display(),
            snapshot.version
        )));
    }
    Ok(Collection {
        dimensions: snapshot.dimensions,
        chunks: snapshot.chunks.into_iter().map(|c| (c.id.clone(), c)).collect(),
        dirty: false,
    })
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("{SNAPSHOT_EXTENSION}.tmp"));
    let mut file =
        tokio::fs::File::create(&tmp).await.map_err(|e| io_error(&tmp, "create snapshot", e))?;
    file.write_all(bytes).await.map_err(|e| io_error(&tmp, "write snapshot", e))?;
    file.sync_all().await.map_err(|e| io_error(&tmp, "sync snapshot", e))?;
    drop(file);
    tokio::fs::rename(&tmp, path).await.map_err(|e| io_error(path, "replace snapshot", e))
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(store_error(format!(
            "invalid collection name '{name}': use ASCII letters, digits, '_' or '-'"
        )));
    }
    Ok(())
}

fn missing(collection: &str) -> RagError {
    store_error(format!("collection '{collection}' does not exist"))
}

fn store_error(message: String) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message }
}

fn io_error(path: &Path, action: &str, e: std::io::Error) -> RagError {
    store_error(format!("failed to {action} '{}': {e}", path.display()))
}
