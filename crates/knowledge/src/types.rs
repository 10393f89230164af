//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use meeple_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix every per-game collection name starts with.
pub const COLLECTION_PREFIX: &str = "game_";

/// Answer text used when no passage is relevant enough.
pub const INSUFFICIENT_INFORMATION: &str =
    "I couldn't find enough information in the rulebook to answer that question.";

/// Normalized name of a board game.
///
/// Normalization trims, lowercases, turns whitespace, dots and dashes into a
/// single `-`, and drops other punctuation. `"Ticket to Ride"` becomes
/// `ticket-to-ride`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameName(String);

impl GameName {
    /// Normalize and validate a raw game name.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let mut normalized = String::with_capacity(raw.len());
        let mut pending_dash = false;

        for ch in raw.trim().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                if pending_dash && !normalized.is_empty() {
                    normalized.push('-');
                }
                pending_dash = false;
                normalized.extend(ch.to_lowercase());
            } else if ch.is_whitespace() || ch == '-' || ch == '.' {
                pending_dash = true;
            }
        }

        if normalized.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Game name '{}' has no usable characters",
                raw
            )));
        }

        Ok(Self(normalized))
    }

    /// The normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the vector collection holding this game's passages.
    pub fn collection_name(&self) -> String {
        format!("{}{}", COLLECTION_PREFIX, self.0)
    }

    /// Inverse of [`GameName::collection_name`]. Foreign collections yield `None`.
    pub fn from_collection_name(collection: &str) -> Option<Self> {
        let name = collection.strip_prefix(COLLECTION_PREFIX)?;
        let game = Self::parse(name).ok()?;
        (game.0 == name).then_some(game)
    }
}

impl fmt::Display for GameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for GameName {
    type Error = AppError;

    fn try_from(value: String) -> AppResult<Self> {
        Self::parse(&value)
    }
}

impl From<GameName> for String {
    fn from(value: GameName) -> Self {
        value.0
    }
}

/// Stable identifier of a passage: `<game>#<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(game: &GameName, sequence: usize) -> Self {
        Self(format!("{}#{}", game.as_str(), sequence))
    }

    /// Parse an id as written in a model response. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (game, sequence) = raw.rsplit_once('#')?;
        if game.is_empty() || sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Game part of the id.
    pub fn game_part(&self) -> &str {
        self.0.rsplit_once('#').map(|(game, _)| game).unwrap_or("")
    }

    /// Whether this id names a passage of `game`.
    pub fn belongs_to(&self, game: &GameName) -> bool {
        self.game_part() == game.as_str()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contiguous passage of a rulebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,

    pub game: GameName,

    /// Position within the rulebook (0-indexed)
    pub sequence: usize,

    /// Passage text, including the overlap shared with the previous passage
    pub text: String,

    /// Character range `[start, end)` in the source text
    pub start: usize,
    pub end: usize,

    /// Number of leading characters shared with the previous passage
    pub overlap_len: usize,

    /// Nearest section heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// SHA-256 of `text`
    pub content_hash: String,
}

impl Chunk {
    /// Metadata stored alongside the passage in the vector index.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            game: self.game.clone(),
            sequence: self.sequence,
            section: self.section.clone(),
            start: self.start,
            end: self.end,
            overlap_len: self.overlap_len,
            content_hash: self.content_hash.clone(),
        }
    }

    /// Text contributed by this passage alone, without the shared prefix.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_len) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// Passage metadata persisted in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub game: GameName,
    pub sequence: usize,
    #[serde(default)]
    pub section: Option<String>,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub overlap_len: usize,
    #[serde(default)]
    pub content_hash: String,
}

/// What to do when a game is ingested a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Replace the existing collection atomically.
    #[default]
    Replace,
    /// Leave an existing collection untouched.
    SkipIfExists,
    /// Add the passages after the stored ones, numbering them onwards.
    Append,
}

/// Outcome of ingesting one rulebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub game: GameName,

    /// Number of passages written (0 when skipped)
    pub chunks_count: usize,

    /// Sequence number of the first passage written
    #[serde(default)]
    pub first_sequence: usize,

    /// Characters in the source text
    pub chars_processed: usize,

    /// True when an existing collection was kept
    pub skipped: bool,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Per-game listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub game: GameName,
    pub chunks_count: usize,
    pub ingested_at: DateTime<Utc>,
}

/// A passage returned by the retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: ChunkId,
    pub sequence: usize,
    pub text: String,
    #[serde(default)]
    pub section: Option<String>,

    /// Relevance in `[0, 1]`, higher is better
    pub relevance: f32,
}

/// Ranked passages for one question against one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub game: GameName,
    pub question: String,

    /// Strictly ordered by descending relevance
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn top_relevance(&self) -> Option<f32> {
        self.chunks.first().map(|c| c.relevance)
    }

    pub fn get(&self, id: &ChunkId) -> Option<&RetrievedChunk> {
        self.chunks.iter().find(|c| &c.chunk_id == id)
    }
}

/// A passage the answer relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: ChunkId,
    #[serde(default)]
    pub section: Option<String>,
    pub relevance: f32,

    /// Start of the passage text for display
    pub snippet: String,
}

/// Whether the answer came from the model or from the empty-retrieval path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Answered,
    InsufficientInformation,
}

/// A grounded answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub game: GameName,
    pub question: String,
    pub text: String,

    /// Ordered by first mention in `text`
    pub citations: Vec<Citation>,
    pub kind: AnswerKind,

    /// Relevance of the best retrieved passage
    #[serde(default)]
    pub top_relevance: Option<f32>,
}

impl Answer {
    /// The fixed answer for an empty retrieval.
    pub fn insufficient(game: GameName, question: impl Into<String>) -> Self {
        Self {
            game,
            question: question.into(),
            text: INSUFFICIENT_INFORMATION.to_string(),
            citations: Vec::new(),
            kind: AnswerKind::InsufficientInformation,
            top_relevance: None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.kind == AnswerKind::InsufficientInformation
    }
}
