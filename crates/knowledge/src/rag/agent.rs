//! Rules assistant orchestration.
//!
//! The agent validates the game, retrieves passages and composes the answer.
//! It holds configuration and shared handles only; every request is
//! independent.

use crate::chunk::chunk;
use crate::collections::CollectionManager;
use crate::config::{IndexBackend, RagSettings};
use crate::embeddings::create_provider;
use crate::memory_index::MemoryIndex;
use crate::parser::{discover_rulebooks, load_rulebook};
use crate::rag::compose::AnswerComposer;
use crate::rag::retrieve::Retriever;
use crate::sqlite_index::SqliteIndex;
use crate::types::{Answer, GameName, GameSummary, IngestMode, IngestReport};
use crate::vector_index::VectorIndex;
use futures::future::try_join_all;
use meeple_core::{AppError, AppResult};
use meeple_llm::LlmClient;
use meeple_prompt::resolve_prompt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Per-question overrides of the configured retrieval settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    pub top_k: Option<usize>,
    pub min_relevance: Option<f32>,
}

/// Answers rules questions for every ingested game.
pub struct RagAgent {
    collections: Arc<CollectionManager>,
    retriever: Retriever,
    composer: AnswerComposer,
    settings: RagSettings,
}

impl RagAgent {
    pub fn new(
        collections: Arc<CollectionManager>,
        composer: AnswerComposer,
        settings: RagSettings,
    ) -> Self {
        Self {
            retriever: Retriever::new(Arc::clone(&collections)),
            collections,
            composer,
            settings,
        }
    }

    /// Build an agent for a workspace from its settings.
    ///
    /// `llm` and `model` phrase the answers; `api_key` is used by remote
    /// embedding providers.
    pub fn from_settings(
        workspace: &Path,
        settings: RagSettings,
        llm: Arc<dyn LlmClient>,
        model: &str,
        api_key: Option<&str>,
    ) -> AppResult<Self> {
        settings.validate()?;

        let index: Arc<dyn VectorIndex> = match settings.index.backend {
            IndexBackend::Sqlite => Arc::new(SqliteIndex::open(&settings.index_path(workspace))?),
            IndexBackend::Memory => Arc::new(MemoryIndex::new()),
        };
        let embedder = create_provider(&settings.embedding, api_key)?;
        let collections = Arc::new(CollectionManager::new(index, embedder, settings.retry));

        let prompt = resolve_prompt(workspace, &settings.prompt_id)?;
        let composer = AnswerComposer::new(llm, model, prompt)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens)
            .with_confidence_threshold(settings.confidence_threshold)
            .with_retry(settings.retry);

        tracing::debug!(
            backend = ?settings.index.backend,
            embedding = %settings.embedding.provider,
            "Rules assistant ready"
        );

        Ok(Self::new(collections, composer, settings))
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Answer a question with the configured retrieval settings.
    pub async fn ask(&self, game: &str, question: &str) -> AppResult<Answer> {
        self.ask_with(game, question, &AskOptions::default()).await
    }

    /// Answer a question about one game.
    ///
    /// `UnknownGame` and `Generation` errors are returned unchanged.
    pub async fn ask_with(&self, game: &str, question: &str, options: &AskOptions) -> AppResult<Answer> {
        let game = GameName::parse(game)?;
        let retrieved = self
            .retriever
            .retrieve(
                &game,
                question,
                options.top_k.unwrap_or(self.settings.top_k),
                options.min_relevance.unwrap_or(self.settings.min_relevance),
            )
            .await?;

        self.composer.compose(question, &retrieved).await
    }

    /// [`RagAgent::ask_with`] under a deadline.
    ///
    /// On expiry the pending gateway calls are dropped and no answer is built.
    pub async fn ask_with_timeout(
        &self,
        game: &str,
        question: &str,
        options: &AskOptions,
        timeout: Duration,
    ) -> AppResult<Answer> {
        tokio::time::timeout(timeout, self.ask_with(game, question, options))
            .await
            .map_err(|_| {
                AppError::Timeout(format!("No answer within {}s", timeout.as_secs_f64()))
            })?
    }

    /// Ask the same question of every game and keep the confident answers.
    ///
    /// Retrieval stays per game. Games without a relevant passage are left
    /// out; the rest are sorted by top relevance, best first.
    pub async fn ask_all(&self, question: &str, options: &AskOptions) -> AppResult<Vec<Answer>> {
        let games = self.collections.list_games().await?;
        let top_k = options.top_k.unwrap_or(self.settings.top_k);
        let min_relevance = options.min_relevance.unwrap_or(self.settings.min_relevance);

        tracing::info!(games = games.len(), "Asking every game");

        let retrievals = try_join_all(
            games
                .iter()
                .map(|game| self.retriever.retrieve(game, question, top_k, min_relevance)),
        )
        .await?;

        let answers = try_join_all(
            retrievals
                .iter()
                .filter(|r| !r.is_empty())
                .map(|r| self.composer.compose(question, r)),
        )
        .await?;

        let mut answers: Vec<Answer> = answers.into_iter().filter(|a| !a.is_insufficient()).collect();
        answers.sort_by(|a, b| {
            b.top_relevance
                .unwrap_or(0.0)
                .total_cmp(&a.top_relevance.unwrap_or(0.0))
                .then_with(|| a.game.cmp(&b.game))
        });

        Ok(answers)
    }

    /// Chunk and store a rulebook's text as `game`.
    pub async fn ingest(&self, game: &str, raw_text: &str, mode: IngestMode) -> AppResult<IngestReport> {
        let game = GameName::parse(game)?;
        let chunks = chunk(
            &game,
            raw_text,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )?;

        tracing::debug!(game = %game, chunks = chunks.len(), "Chunked rulebook");
        self.collections.ingest(&game, &chunks, mode).await
    }

    /// Load and ingest one rulebook file.
    pub async fn ingest_rulebook(
        &self,
        path: &Path,
        game: Option<&str>,
        mode: IngestMode,
    ) -> AppResult<IngestReport> {
        let rulebook = load_rulebook(path, game)?;
        self.ingest(rulebook.game.as_str(), &rulebook.text, mode).await
    }

    /// Ingest every rulebook under `dir`, each as its own game.
    pub async fn ingest_dir(&self, dir: &Path, mode: IngestMode) -> AppResult<Vec<IngestReport>> {
        let mut reports = Vec::new();
        for path in discover_rulebooks(dir)? {
            reports.push(self.ingest_rulebook(&path, None, mode).await?);
        }
        Ok(reports)
    }

    pub async fn list_games(&self) -> AppResult<Vec<GameName>> {
        self.collections.list_games().await
    }

    pub async fn summaries(&self) -> AppResult<Vec<GameSummary>> {
        self.collections.summaries().await
    }
}
