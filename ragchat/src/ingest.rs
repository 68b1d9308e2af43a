//! Offline ingestion pipeline.
//!
//! The [`IngestionPipeline`] builds the knowledge base the QA pipeline reads:
//! load → normalize → split → embed and store. Each step is public so callers
//! can run them separately; [`run`](IngestionPipeline::run) chains them.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragchat::{FileVectorStore, IngestConfig, IngestionPipeline};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(IngestConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(FileVectorStore::open("data_base/vector_db").await?))
//!     .build()?;
//!
//! let report = pipeline.run("knowledge_base", Path::new("data_base/knowledge_db")).await?;
//! println!("{} documents, {} chunks", report.documents, report.chunks);
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::IngestConfig;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::loader;
use crate::normalize;
use crate::vectorstore::VectorStore;

/// What one ingestion run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
}

/// The ingestion orchestrator. Construct one via [`IngestionPipeline::builder()`].
pub struct IngestionPipeline {
    config: IngestConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Load every supported file under `source_dir`.
    ///
    /// File parsing is blocking work and runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if `source_dir` is not a directory.
    /// Failures of individual files are logged and skipped.
    pub async fn load(&self, source_dir: &Path) -> Result<Vec<Document>> {
        let root: PathBuf = source_dir.to_path_buf();
        tokio::task::spawn_blocking(move || loader::load(&root))
            .await
            .map_err(|e| RagError::PipelineError(format!("loader task failed: {e}")))?
    }

    /// Clean up document text in place.
    pub fn normalize(&self, documents: &mut [Document]) {
        documents.iter_mut().for_each(normalize::normalize);
    }

    /// Split documents into chunks without embeddings.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunker.chunk(document)).collect()
    }

    /// Embed `chunks` in batches, upsert them into `collection` and flush.
    ///
    /// The collection is created with the provider's dimensionality if it does
    /// not exist. Chunks already stored for the same origins (source files, or
    /// document IDs without a source) are removed first, so a file that shrank
    /// leaves none of its old chunks behind. Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Propagates embedding and vector store errors, including
    /// [`RagError::EmbeddingError`] for a vector of the wrong length. Returns
    /// [`RagError::PipelineError`] if the provider returns the wrong number of
    /// embeddings for a batch.
    pub async fn embed_and_store(&self, collection: &str, chunks: Vec<Chunk>) -> Result<usize> {
        let origins: BTreeSet<&str> = chunks.iter().map(Chunk::origin).collect();
        let origins: Vec<&str> = origins.into_iter().collect();
        self.replace(collection, &origins, &chunks).await
    }

    async fn replace(&self, collection: &str, origins: &[&str], chunks: &[Chunk]) -> Result<usize> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(collection, dimensions).await.inspect_err(|e| {
            error!(collection, error = %e, "failed to create collection");
        })?;

        let removed = self.vector_store.delete_origins(collection, origins).await.inspect_err(|e| {
            error!(collection, error = %e, "failed to remove previous chunks");
        })?;
        if removed > 0 {
            info!(collection, removed, origins = origins.len(), "removed previous chunks");
        }

        let total = chunks.len();
        let mut stored = 0usize;
        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings =
                self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
                    error!(collection, stored, error = %e, "embedding failed during ingestion");
                })?;
            if embeddings.len() != batch.len() {
                return Err(RagError::PipelineError(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for embedding in &embeddings {
                self.embedding_provider.check_dimensions(embedding).inspect_err(|e| {
                    error!(collection, stored, error = %e, "embedding has wrong dimensions");
                })?;
            }

            let embedded: Vec<Chunk> = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(mut chunk, embedding)| {
                    chunk.embedding = embedding;
                    chunk
                })
                .collect();

            self.vector_store.upsert(collection, &embedded).await.inspect_err(|e| {
                error!(collection, stored, error = %e, "upsert failed during ingestion");
            })?;
            stored += embedded.len();
            info!(collection, stored, total, "stored batch");
        }

        self.vector_store.flush().await.inspect_err(|e| {
            error!(collection, error = %e, "flush failed");
        })?;
        Ok(stored)
    }

    /// Run the whole pipeline over `source_dir` into `collection`.
    ///
    /// Every loaded file replaces whatever the collection held for it before,
    /// including files whose new revision has no text left.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyCorpus`] if nothing could be loaded or every
    /// document was empty, and propagates the errors of the individual steps.
    pub async fn run(&self, collection: &str, source_dir: &Path) -> Result<IngestReport> {
        let mut documents = self.load(source_dir).await?;
        if documents.is_empty() {
            return Err(RagError::EmptyCorpus(format!(
                "no documents could be loaded from {}",
                source_dir.display()
            )));
        }

        self.normalize(&mut documents);
        let chunks = self.split(&documents);
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus(format!(
                "documents under {} contain no text",
                source_dir.display()
            )));
        }
        info!(documents = documents.len(), chunks = chunks.len(), "split documents");

        let origins: BTreeSet<&str> = documents.iter().map(Document::origin).collect();
        let origins: Vec<&str> = origins.into_iter().collect();
        let stored = self.replace(collection, &origins, &chunks).await?;
        let report = IngestReport { documents: documents.len(), chunks: stored };
        info!(collection, documents = report.documents, chunks = report.chunks, "ingestion complete");
        Ok(report)
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// The embedding provider and vector store are required. Without an explicit
/// chunker a [`RecursiveChunker`] sized from the config is used.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<IngestConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IngestionPipelineBuilder {
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`IngestionPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// batch size is zero.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self.config.unwrap_or_default();
        if config.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(IngestionPipeline { config, embedding_provider, vector_store, chunker })
    }
}
