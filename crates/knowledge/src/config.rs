//! Retrieval and ingestion settings.
//!
//! Loaded from `.meeple/rag.yaml`; every field is optional and falls back to
//! the defaults below.

use crate::embeddings::EmbeddingConfig;
use meeple_core::config::STATE_DIR;
use meeple_core::{AppError, AppResult, RetryPolicy};
use meeple_prompt::GROUNDED_ANSWER_PROMPT_ID;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the rules assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagSettings {
    /// Maximum passages handed to the composer
    pub top_k: usize,

    /// Passages scoring below this are dropped
    pub min_relevance: f32,

    /// Below this top score the model is told to answer cautiously
    pub confidence_threshold: f32,

    /// Passage size in characters
    pub chunk_size: usize,

    /// Characters shared between consecutive passages
    pub chunk_overlap: usize,

    /// Deadline for one `ask`, in seconds
    pub ask_timeout_secs: u64,

    /// Sampling temperature for answers
    pub temperature: f32,

    /// Completion length cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Prompt used to phrase answers
    pub prompt_id: String,

    /// Retry policy for embedding and generation calls
    pub retry: RetryPolicy,

    pub embedding: EmbeddingConfig,

    pub index: IndexSettings,
}

/// Where collections are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,

    /// SQLite file, relative to the workspace when not absolute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Sqlite,
    Memory,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_relevance: 0.20,
            confidence_threshold: 0.30,
            chunk_size: 512,
            chunk_overlap: 64,
            ask_timeout_secs: 60,
            temperature: 0.2,
            max_tokens: None,
            prompt_id: GROUNDED_ANSWER_PROMPT_ID.to_string(),
            retry: RetryPolicy::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexSettings::default(),
        }
    }
}

impl RagSettings {
    /// Load settings for a workspace, falling back to defaults when no file exists.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let path = get_settings_path(workspace);

        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("Failed to read settings at {:?}: {}", path, e))
        })?;

        let settings: Self = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse settings at {:?}: {}", path, e))
        })?;

        settings.validate()?;

        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be greater than zero".to_string()));
        }

        if !(0.0..=1.0).contains(&self.min_relevance) {
            return Err(AppError::Config(format!(
                "min_relevance must be within [0, 1], got {}",
                self.min_relevance
            )));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        self.embedding.validate()
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_secs(self.ask_timeout_secs)
    }

    /// Resolved SQLite index path for a workspace.
    pub fn index_path(&self, workspace: &Path) -> PathBuf {
        match &self.index.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => workspace.join(path),
            None => get_index_path(workspace),
        }
    }
}

/// Path to the settings file.
pub fn get_settings_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("rag.yaml")
}

/// Default path of the SQLite index.
pub fn get_index_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("index.sqlite")
}
