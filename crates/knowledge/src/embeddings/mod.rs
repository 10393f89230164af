//! Embedding gateway for rulebook passages and questions.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use meeple_core::retry::with_retry;
use meeple_core::{AppError, AppResult, RetryPolicy};

/// Embed `texts` under the given retry policy.
///
/// The whole batch is retried on a gateway failure. A provider that returns
/// the wrong number of vectors is reported as an embedding service error.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    policy: &RetryPolicy,
    texts: &[String],
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    tracing::debug!(
        provider = provider.provider_name(),
        model = provider.model_name(),
        count = texts.len(),
        "Embedding texts"
    );

    let vectors = with_retry(policy, "embed", || provider.embed_batch(texts)).await?;

    if vectors.len() != texts.len() {
        return Err(AppError::EmbeddingService(format!(
            "Provider returned {} embeddings for {} texts",
            vectors.len(),
            texts.len()
        )));
    }

    Ok(vectors)
}

/// Embed a single question under the given retry policy.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    policy: &RetryPolicy,
    text: &str,
) -> AppResult<Vec<f32>> {
    with_retry(policy, "embed_query", || provider.embed(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;

    #[tokio::test]
    async fn test_embed_texts_keeps_count() {
        let provider = TrigramProvider::new(32);
        let texts = vec!["draw two".to_string(), "skip turn".to_string()];
        let vectors = embed_texts(&provider, &RetryPolicy::none(), &texts)
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }

    #[tokio::test]
    async fn test_embed_texts_empty() {
        let provider = TrigramProvider::new(32);
        let vectors = embed_texts(&provider, &RetryPolicy::none(), &[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
