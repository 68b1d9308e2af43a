//! Connection settings shared by the OpenAI-compatible providers.

use crate::error::{RagError, Result};

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of Zhipu's OpenAI-compatible API.
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// API key and endpoint for an OpenAI-compatible service.
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Base URL without the trailing route, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
}

impl OpenAIConfig {
    /// Settings for an arbitrary OpenAI-compatible endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key or URL is blank.
    pub fn compatible(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("API key must not be empty".to_string()));
        }
        if base_url.trim().is_empty() {
            return Err(RagError::ConfigError("base URL must not be empty".to_string()));
        }
        Ok(Self { api_key, base_url })
    }

    pub fn openai(api_key: impl Into<String>) -> Result<Self> {
        Self::compatible(api_key, OPENAI_BASE_URL)
    }

    pub fn zhipu(api_key: impl Into<String>) -> Result<Self> {
        Self::compatible(api_key, ZHIPU_BASE_URL)
    }

    /// Read the key from the environment variable `var`.
    pub fn from_env(var: &str, base_url: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(var).map_err(|_| {
            RagError::ConfigError(format!("{var} environment variable not set"))
        })?;
        Self::compatible(api_key, base_url)
    }

    /// Full URL of `route` under the base URL.
    pub(crate) fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }
}

// The key is never printed.
impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let config = OpenAIConfig::compatible("sk-secret", "http://localhost:8080/v1/").unwrap();
        assert_eq!(config.url("/embeddings"), "http://localhost:8080/v1/embeddings");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(OpenAIConfig::zhipu("  ").is_err());
    }
}
