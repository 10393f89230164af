//! Per-game collections on top of a vector index.
//!
//! The manager is the only component that talks to the index. Every read and
//! write is addressed by [`GameName`], so a collection name is always derived
//! the same way and one game can never reach into another game's passages.

use crate::embeddings::{embed_query, embed_texts, EmbeddingProvider};
use crate::types::{Chunk, ChunkId, GameName, GameSummary, IngestMode, IngestReport};
use crate::vector_index::{DistanceMetric, IndexHit, IndexItem, VectorIndex};
use meeple_core::{AppError, AppResult, RetryPolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;

/// `chunk` moved `offset` places further along the collection.
fn renumbered(chunk: &Chunk, offset: usize) -> Chunk {
    let sequence = chunk.sequence + offset;
    Chunk {
        id: ChunkId::new(&chunk.game, sequence),
        sequence,
        ..chunk.clone()
    }
}

/// Owns the vector index and the embedding gateway used to fill it.
pub struct CollectionManager {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    locks: Mutex<HashMap<GameName, Arc<RwLock<()>>>>,
}

impl CollectionManager {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            index,
            embedder,
            retry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Distance metric of the underlying index.
    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    /// Embedding model identifier, for logs and listings.
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    fn lock_for(&self, game: &GameName) -> AppResult<Arc<RwLock<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::Other("Collection lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(game.clone()).or_default()))
    }

    /// Embed `chunks` and store them in the game's collection.
    ///
    /// Embeddings are computed before the game's write lock is taken. If
    /// embedding fails the stored collection is left exactly as it was.
    ///
    /// With [`IngestMode::Append`] the passages are renumbered to follow the
    /// stored ones, so their ids never collide with existing passages.
    pub async fn ingest(
        &self,
        game: &GameName,
        chunks: &[Chunk],
        mode: IngestMode,
    ) -> AppResult<IngestReport> {
        let started = Instant::now();

        if chunks.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "No passages to ingest for '{}'",
                game
            )));
        }

        if let Some(foreign) = chunks.iter().find(|c| &c.game != game) {
            return Err(AppError::InvalidInput(format!(
                "Passage {} does not belong to '{}'",
                foreign.id, game
            )));
        }

        let chars_processed = chunks.last().map(|c| c.end).unwrap_or(0);
        let skipped = |started: Instant| IngestReport {
            game: game.clone(),
            chunks_count: 0,
            first_sequence: 0,
            chars_processed,
            skipped: true,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        if mode == IngestMode::SkipIfExists && self.collection_exists(game).await? {
            tracing::info!(game = %game, "Collection exists, skipping ingestion");
            return Ok(skipped(started));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_texts(self.embedder.as_ref(), &self.retry, &texts).await?;

        let lock = self.lock_for(game)?;
        let _guard = lock.write().await;
        let collection = game.collection_name();

        // Another ingest may have finished while we were embedding
        if mode == IngestMode::SkipIfExists && self.index.collection_exists(&collection).await? {
            return Ok(skipped(started));
        }

        let first_sequence = match mode {
            IngestMode::Append => self
                .index
                .collection_info(&collection)
                .await?
                .map(|info| info.count)
                .unwrap_or(0),
            IngestMode::Replace | IngestMode::SkipIfExists => 0,
        };

        let items = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let chunk = renumbered(chunk, first_sequence);
                Ok(IndexItem {
                    id: chunk.id.to_string(),
                    metadata: serde_json::to_value(chunk.metadata())?,
                    text: chunk.text,
                    vector,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        match mode {
            IngestMode::Append => self.index.append_to_collection(&collection, items).await?,
            IngestMode::Replace | IngestMode::SkipIfExists => {
                self.index.upsert_collection(&collection, items).await?
            }
        }

        let report = IngestReport {
            game: game.clone(),
            chunks_count: chunks.len(),
            first_sequence,
            chars_processed,
            skipped: false,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        tracing::info!(
            game = %game,
            chunks = report.chunks_count,
            model = self.embedder.model_name(),
            mode = ?mode,
            "Ingested rulebook in {:.2}s",
            report.duration_secs
        );

        Ok(report)
    }

    /// Embed a question with the same gateway used for the passages.
    pub async fn embed_question(&self, question: &str) -> AppResult<Vec<f32>> {
        embed_query(self.embedder.as_ref(), &self.retry, question).await
    }

    /// Nearest passages of one game, closest first.
    pub async fn query(
        &self,
        game: &GameName,
        vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<IndexHit>> {
        let lock = self.lock_for(game)?;
        let _guard = lock.read().await;
        self.index.query(&game.collection_name(), vector, k).await
    }

    pub async fn collection_exists(&self, game: &GameName) -> AppResult<bool> {
        let lock = self.lock_for(game)?;
        let _guard = lock.read().await;
        self.index.collection_exists(&game.collection_name()).await
    }

    /// Every ingested game, sorted by name.
    ///
    /// Collections that do not follow the game naming scheme are ignored.
    pub async fn list_games(&self) -> AppResult<Vec<GameName>> {
        let games = self
            .index
            .list_collections()
            .await?
            .iter()
            .filter_map(|name| GameName::from_collection_name(name))
            .collect();
        Ok(games)
    }

    /// Chunk counts and ingestion times for every game.
    pub async fn summaries(&self) -> AppResult<Vec<GameSummary>> {
        let mut summaries = Vec::new();

        for game in self.list_games().await? {
            let lock = self.lock_for(&game)?;
            let _guard = lock.read().await;
            if let Some(info) = self.index.collection_info(&game.collection_name()).await? {
                summaries.push(GameSummary {
                    game: game.clone(),
                    chunks_count: info.count,
                    ingested_at: info.updated_at,
                });
            }
        }

        Ok(summaries)
    }
}
