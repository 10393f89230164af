//! Error types for Meeple.
//!
//! A single error enum covers every failure the rules assistant can report.
//! The variants map one-to-one onto the categories an API layer needs to pick
//! a response: caller mistakes, downstream gateway failures, and internal
//! invariant violations.

use thiserror::Error;

/// Unified error type for Meeple.
///
/// All fallible functions return `Result<T, AppError>`. Errors keep their kind
/// while propagating so callers can map them to the right response.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad chunking parameters, empty text, malformed names. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A question was asked about a game that has never been ingested.
    #[error("Unknown game: {0}")]
    UnknownGame(String),

    /// The embedding gateway was unreachable or rejected the input.
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// The language model gateway failed or produced an empty completion.
    #[error("Generation error: {0}")]
    Generation(String),

    /// A collection was queried before it was created.
    ///
    /// Seeing this after a successful existence check means an invariant was
    /// broken; it is never retried.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The caller's deadline expired before the operation finished.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Vector index storage errors
    #[error("Index error: {0}")]
    Index(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether a bounded retry at the call site may resolve this error.
    ///
    /// Only downstream gateway failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::EmbeddingService(_) | AppError::Generation(_))
    }

    /// Whether the error was caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidInput(_) | AppError::UnknownGame(_))
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::UnknownGame(_) => "unknown_game",
            AppError::EmbeddingService(_) => "embedding_service_error",
            AppError::Generation(_) => "generation_error",
            AppError::CollectionNotFound(_) => "collection_not_found",
            AppError::Timeout(_) => "timeout",
            AppError::Index(_) => "index_error",
            AppError::Config(_) => "config_error",
            AppError::Prompt(_) => "prompt_error",
            AppError::Io(_) => "io_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AppError::EmbeddingService("down".into()).is_retryable());
        assert!(AppError::Generation("empty".into()).is_retryable());
        assert!(!AppError::InvalidInput("bad".into()).is_retryable());
        assert!(!AppError::UnknownGame("chess".into()).is_retryable());
        assert!(!AppError::CollectionNotFound("game_chess".into()).is_retryable());
    }

    #[test]
    fn test_client_error_kinds() {
        assert!(AppError::UnknownGame("chess".into()).is_client_error());
        assert!(AppError::InvalidInput("bad".into()).is_client_error());
        assert!(!AppError::Generation("boom".into()).is_client_error());
        assert!(!AppError::Timeout("ask".into()).is_client_error());
    }

    #[test]
    fn test_display_keeps_context() {
        let err = AppError::UnknownGame("chess".into());
        assert_eq!(err.to_string(), "Unknown game: chess");
        assert_eq!(err.kind(), "unknown_game");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
