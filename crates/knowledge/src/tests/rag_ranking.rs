//! Tests for retrieval ranking correctness.

#[cfg(test)]
mod tests {
    use crate::rag::Retriever;
    use crate::tests::support::{build_agent, passages, test_settings, Reply, StubLlm};
    use crate::types::{GameName, IngestMode};
    use meeple_core::AppError;

    async fn retriever_with(texts: &[&str]) -> (Retriever, GameName) {
        let (_, collections) = build_agent(StubLlm::new(Reply::Fail), test_settings());
        let game = GameName::parse("monopoly").unwrap();
        collections
            .ingest(&game, &passages(&game, texts), IngestMode::Replace)
            .await
            .unwrap();
        (Retriever::new(collections), game)
    }

    #[tokio::test]
    async fn test_relevant_query_returns_high_scores() {
        let (retriever, game) = retriever_with(&[
            "Rent is paid to the owner.",
            "Players go to jail on doubles.",
        ])
        .await;

        let result = retriever.retrieve(&game, "Who gets the rent?", 4, 0.2).await.unwrap();

        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].chunk_id.as_str(), "monopoly#0");
        assert!(
            result.chunks[0].relevance > 0.9,
            "Exact keyword match should score close to 1, got {}",
            result.chunks[0].relevance
        );
    }

    #[tokio::test]
    async fn test_unrelated_query_returns_nothing() {
        let (retriever, game) = retriever_with(&["Rent is paid to the owner."]).await;

        let result = retriever
            .retrieve(&game, "What is the capital of France?", 4, 0.2)
            .await
            .unwrap();

        assert!(result.is_empty(), "Unrelated query should not match");
    }

    #[tokio::test]
    async fn test_scores_are_ordered_descending() {
        let (retriever, game) = retriever_with(&[
            "A hotel on a property.",
            "Rent, rent and more rent for a hotel.",
            "Rent for a house.",
            "Jail.",
        ])
        .await;

        let result = retriever
            .retrieve(&game, "rent for a hotel", 4, 0.0)
            .await
            .unwrap();

        for pair in result.chunks.windows(2) {
            assert!(
                pair[0].relevance >= pair[1].relevance,
                "Scores should be non-increasing: {} then {}",
                pair[0].relevance,
                pair[1].relevance
            );
        }
        assert_eq!(result.chunks[0].chunk_id.as_str(), "monopoly#1");
    }

    #[tokio::test]
    async fn test_min_relevance_is_respected() {
        let (retriever, game) = retriever_with(&[
            "Rent.",
            "Rent for a hotel, a house, a property and a card.",
        ])
        .await;

        let result = retriever.retrieve(&game, "rent", 4, 0.6).await.unwrap();

        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks.iter().all(|c| c.relevance >= 0.6));
    }

    #[tokio::test]
    async fn test_ties_prefer_earlier_passages() {
        let (retriever, game) = retriever_with(&["Jail.", "Pay rent.", "Jail.", "Rent due."]).await;

        let result = retriever.retrieve(&game, "rent", 4, 0.5).await.unwrap();
        let ids: Vec<&str> = result.chunks.iter().map(|c| c.chunk_id.as_str()).collect();

        assert_eq!(ids, vec!["monopoly#1", "monopoly#3"]);
    }

    #[tokio::test]
    async fn test_top_k_limit_respected() {
        let (retriever, game) = retriever_with(&[
            "Rent one.",
            "Rent two.",
            "Rent three.",
            "Rent four.",
            "Rent five.",
        ])
        .await;

        let result = retriever.retrieve(&game, "rent", 3, 0.0).await.unwrap();
        assert_eq!(result.chunks.len(), 3, "Should return exactly top_k results");
    }

    #[tokio::test]
    async fn test_rejects_bad_arguments() {
        let (retriever, game) = retriever_with(&["Rent."]).await;

        assert!(matches!(
            retriever.retrieve(&game, "  ", 4, 0.2).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            retriever.retrieve(&game, "rent", 0, 0.2).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            retriever.retrieve(&game, "rent", 4, 1.5).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
