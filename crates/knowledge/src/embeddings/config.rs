//! Embedding gateway configuration.

use meeple_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Providers `create_provider` knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["trigram", "ollama", "openai"];

/// Embedding configuration for the rules index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama", "openai"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Custom endpoint for HTTP providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key (openai)
    #[serde(rename = "apiKeyEnv", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            api_key_env: None,
        }
    }
}

impl EmbeddingConfig {
    /// Check that the configuration can produce a provider.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Embedding model cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Resolve the API key: explicit value first, then `apiKeyEnv`, then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Option<String> {
        if let Some(key) = explicit {
            return Some(key.to_string());
        }

        let var = self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        std::env::var(var).ok()
    }
}
