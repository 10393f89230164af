//! Passage retrieval for one game.

use crate::collections::CollectionManager;
use crate::types::{ChunkId, ChunkMetadata, GameName, RetrievalResult, RetrievedChunk};
use crate::vector_index::{relevance_from_distance, IndexHit};
use meeple_core::{AppError, AppResult};
use std::sync::Arc;

/// Finds the passages of one game that best match a question.
#[derive(Clone)]
pub struct Retriever {
    collections: Arc<CollectionManager>,
}

impl Retriever {
    pub fn new(collections: Arc<CollectionManager>) -> Self {
        Self { collections }
    }

    /// Rank passages of `game` by relevance to `question`.
    ///
    /// Returns at most `top_k` passages scoring at least `min_relevance`,
    /// best first. Nothing relevant enough is an empty result, not an error.
    #[tracing::instrument(skip(self, game, question), fields(game = %game))]
    pub async fn retrieve(
        &self,
        game: &GameName,
        question: &str,
        top_k: usize,
        min_relevance: f32,
    ) -> AppResult<RetrievalResult> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidInput("Question is empty".to_string()));
        }
        if top_k == 0 {
            return Err(AppError::InvalidInput("top_k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&min_relevance) {
            return Err(AppError::InvalidInput(format!(
                "min_relevance must be within [0, 1], got {}",
                min_relevance
            )));
        }

        if !self.collections.collection_exists(game).await? {
            return Err(AppError::UnknownGame(game.to_string()));
        }

        let vector = self.collections.embed_question(question).await?;
        let hits = self.collections.query(game, &vector, top_k).await?;
        let metric = self.collections.metric();

        tracing::debug!("Retrieved {} candidates before filtering", hits.len());

        let mut chunks = Vec::with_capacity(hits.len());
        for hit in hits {
            let relevance = relevance_from_distance(hit.distance, metric);
            if relevance < min_relevance {
                continue;
            }
            chunks.push(to_retrieved(game, hit, relevance)?);
        }

        chunks.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then(a.sequence.cmp(&b.sequence))
        });
        chunks.truncate(top_k);

        if chunks.is_empty() {
            tracing::info!("No passage reached relevance {:.2}", min_relevance);
        } else {
            tracing::info!(
                "Retrieved {} passages (top relevance {:.3})",
                chunks.len(),
                chunks[0].relevance
            );
        }

        Ok(RetrievalResult {
            game: game.clone(),
            question: question.to_string(),
            chunks,
        })
    }
}

/// Convert an index hit, checking that it belongs to the queried game.
fn to_retrieved(game: &GameName, hit: IndexHit, relevance: f32) -> AppResult<RetrievedChunk> {
    let chunk_id = ChunkId::parse(&hit.id);
    let metadata: Option<ChunkMetadata> = serde_json::from_value(hit.metadata).ok();

    match (chunk_id, metadata) {
        (Some(chunk_id), Some(metadata))
            if chunk_id.belongs_to(game) && &metadata.game == game =>
        {
            Ok(RetrievedChunk {
                chunk_id,
                sequence: metadata.sequence,
                text: hit.text,
                section: metadata.section,
                relevance,
            })
        }
        _ => {
            tracing::error!(id = %hit.id, "Collection returned a passage it does not own");
            Err(AppError::CollectionNotFound(format!(
                "{} returned foreign passage {}",
                game.collection_name(),
                hit.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, game: &str, sequence: usize) -> IndexHit {
        IndexHit {
            id: id.to_string(),
            text: "text".to_string(),
            metadata: json!({
                "game": game,
                "sequence": sequence,
                "section": "RENT",
                "start": 0,
                "end": 4,
            }),
            distance: 0.1,
        }
    }

    #[test]
    fn test_owned_hit_converts() {
        let game = GameName::parse("monopoly").unwrap();
        let chunk = to_retrieved(&game, hit("monopoly#2", "monopoly", 2), 0.9).unwrap();
        assert_eq!(chunk.chunk_id.as_str(), "monopoly#2");
        assert_eq!(chunk.sequence, 2);
        assert_eq!(chunk.section.as_deref(), Some("RENT"));
    }

    #[test]
    fn test_foreign_hit_is_invariant_violation() {
        let game = GameName::parse("monopoly").unwrap();
        assert!(matches!(
            to_retrieved(&game, hit("chess#0", "chess", 0), 0.9),
            Err(AppError::CollectionNotFound(_))
        ));
        assert!(matches!(
            to_retrieved(&game, hit("monopoly#0", "chess", 0), 0.9),
            Err(AppError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_hit_without_metadata_is_rejected() {
        let game = GameName::parse("monopoly").unwrap();
        let mut bad = hit("monopoly#0", "monopoly", 0);
        bad.metadata = json!({});
        assert!(to_retrieved(&game, bad, 0.5).is_err());
    }
}
