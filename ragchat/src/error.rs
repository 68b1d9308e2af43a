//! Error types for the `ragchat` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied an invalid argument (e.g. a zero truncation bound).
    #[error("Invalid input: {0}")]
    InputError(String),

    /// A configuration value is out of range or inconsistent.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The chat model provider failed to produce a completion.
    #[error("Chat model error ({provider}): {message}")]
    ChatError {
        /// The chat model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A streamed answer broke off after some fragments were delivered.
    #[error("Answer stream interrupted after {fragments} fragment(s): {message}")]
    PartialStream {
        /// How many fragments reached the caller before the failure.
        fragments: usize,
        /// The underlying provider failure.
        message: String,
    },

    /// A single source file could not be loaded.
    #[error("Failed to load '{path}': {message}")]
    LoaderError {
        /// The file that failed.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// Ingestion produced nothing to embed.
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Returns `true` for failures reported by an external collaborator
    /// (embedding provider, vector store or chat model).
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingError { .. } | Self::VectorStoreError { .. } | Self::ChatError { .. }
        )
    }

    /// Returns `true` for errors caused by caller input or configuration.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InputError(_) | Self::ConfigError(_))
    }
}

/// A convenience result type for `ragchat` operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_provider_errors() {
        let err = RagError::ChatError { provider: "mock".into(), message: "rate limited".into() };
        assert!(err.is_provider_error());
        assert!(!err.is_input_error());

        let err = RagError::PartialStream { fragments: 2, message: "reset".into() };
        assert!(!err.is_provider_error());
        assert_eq!(err.to_string(), "Answer stream interrupted after 2 fragment(s): reset");
    }

    #[test]
    fn classifies_input_errors() {
        assert!(RagError::InputError("max_turns must be at least 1".into()).is_input_error());
        assert!(RagError::ConfigError("top_k".into()).is_input_error());
    }
}
