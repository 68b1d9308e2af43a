//! Configuration for question answering and ingestion.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Accepted sampling temperatures.
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Accepted number of retrieved chunks per question.
pub const TOP_K_RANGE: RangeInclusive<usize> = 1..=10;

/// Session-scoped settings for the conversational QA pipeline.
///
/// The pipeline reads the config by reference on every question, so a change
/// only affects questions asked afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Chat model identifier.
    pub model_name: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Number of chunks retrieved per question, in `[1, 10]`.
    pub top_k: usize,
    /// Directory holding the persisted vector store.
    pub persist_directory: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_name: "glm-4-plus".to_string(),
            temperature: 0.0,
            top_k: 4,
            persist_directory: PathBuf::from("data_base/vector_db"),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for constructing a [`PipelineConfig`].
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(RagError::ConfigError("model_name must not be empty".to_string()));
        }
        check_temperature(self.temperature)?;
        check_top_k(self.top_k)
    }

    /// Replace the temperature, rejecting values outside `[0, 1]`.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        Ok(())
    }

    /// Replace `top_k`, rejecting values outside `[1, 10]`.
    pub fn set_top_k(&mut self, top_k: usize) -> Result<()> {
        check_top_k(top_k)?;
        self.top_k = top_k;
        Ok(())
    }

    /// Replace the model identifier, rejecting blank names.
    pub fn set_model_name(&mut self, model_name: impl Into<String>) -> Result<()> {
        let model_name = model_name.into();
        if model_name.trim().is_empty() {
            return Err(RagError::ConfigError("model_name must not be empty".to_string()));
        }
        self.model_name = model_name;
        Ok(())
    }
}

fn check_temperature(temperature: f32) -> Result<()> {
    if !TEMPERATURE_RANGE.contains(&temperature) {
        return Err(RagError::ConfigError(format!(
            "temperature ({temperature}) must be between {} and {}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end()
        )));
    }
    Ok(())
}

fn check_top_k(top_k: usize) -> Result<()> {
    if !TOP_K_RANGE.contains(&top_k) {
        return Err(RagError::ConfigError(format!(
            "top_k ({top_k}) must be between {} and {}",
            TOP_K_RANGE.start(),
            TOP_K_RANGE.end()
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.config.model_name = model_name.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    pub fn persist_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.persist_directory = path.into();
        self
    }

    /// Build the [`PipelineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any field is out of range.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings for the offline ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunk texts sent to the embedding provider per request.
    pub embed_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50, embed_batch_size: 64 }
    }
}

impl IngestConfig {
    /// Create a new builder for constructing an [`IngestConfig`].
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`IngestConfig`].
#[derive(Debug, Clone, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set how many chunks are embedded per provider request.
    pub fn embed_batch_size(mut self, batch_size: usize) -> Self {
        self.config.embed_batch_size = batch_size;
        self
    }

    /// Build the [`IngestConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `embed_batch_size == 0`
    pub fn build(self) -> Result<IngestConfig> {
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(IngestConfig::builder().build().is_ok());
    }

    #[test]
    fn builder_rejects_out_of_range_values() {
        assert!(PipelineConfig::builder().temperature(1.5).build().is_err());
        assert!(PipelineConfig::builder().temperature(-0.1).build().is_err());
        assert!(PipelineConfig::builder().top_k(0).build().is_err());
        assert!(PipelineConfig::builder().top_k(11).build().is_err());
        assert!(PipelineConfig::builder().model_name("  ").build().is_err());

        let config = PipelineConfig::builder().temperature(1.0).top_k(10).build().unwrap();
        assert_eq!(config.top_k, 10);
    }

    #[test]
    fn setters_leave_config_untouched_on_error() {
        let mut config = PipelineConfig::default();
        assert!(config.set_top_k(20).is_err());
        assert!(config.set_temperature(f32::NAN).is_err());
        assert_eq!(config, PipelineConfig::default());

        config.set_top_k(7).unwrap();
        config.set_temperature(0.3).unwrap();
        assert_eq!(config.top_k, 7);
        assert_eq!(config.temperature, 0.3);
    }

    #[test]
    fn ingest_builder_checks_overlap() {
        let err = IngestConfig::builder().chunk_size(50).chunk_overlap(50).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
        assert!(IngestConfig::builder().embed_batch_size(0).build().is_err());
    }
}
