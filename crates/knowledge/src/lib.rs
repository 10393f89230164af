//! Rulebook knowledge base and grounded answering.
//!
//! Rulebooks are chunked into overlapping passages, embedded, and stored in
//! one collection per game. Questions are answered from a single game's
//! passages, with citations that always point at passages the model was shown.
//!
//! # Example
//! ```no_run
//! use meeple_knowledge::{IngestMode, RagAgent, RagSettings};
//! use meeple_llm::create_client;
//! use std::path::Path;
//!
//! # async fn example() -> meeple_core::AppResult<()> {
//! let workspace = Path::new(".");
//! let llm = create_client("ollama", None, None)?;
//! let agent = RagAgent::from_settings(workspace, RagSettings::load(workspace)?, llm, "llama3.2", None)?;
//!
//! agent.ingest_rulebook(Path::new("monopoly.txt"), None, IngestMode::Replace).await?;
//! let answer = agent.ask("monopoly", "How much rent do I pay with a hotel?").await?;
//! println!("{}", answer.text);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod collections;
pub mod config;
pub mod embeddings;
pub mod memory_index;
pub mod parser;
pub mod rag;
pub mod sqlite_index;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use chunk::{chunk, reconstruct};
pub use collections::CollectionManager;
pub use config::{IndexBackend, RagSettings};
pub use embeddings::{EmbeddingConfig, EmbeddingProvider};
pub use memory_index::MemoryIndex;
pub use parser::{discover_rulebooks, load_rulebook, Rulebook};
pub use rag::{AnswerComposer, AskOptions, RagAgent, Retriever};
pub use sqlite_index::SqliteIndex;
pub use types::{
    Answer, AnswerKind, Chunk, ChunkId, Citation, GameName, GameSummary, IngestMode,
    IngestReport, RetrievalResult, RetrievedChunk,
};
pub use vector_index::{relevance_from_distance, DistanceMetric, VectorIndex};
