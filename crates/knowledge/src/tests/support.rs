//! Shared fixtures for crate-level tests.

use crate::chunk::content_hash;
use crate::collections::CollectionManager;
use crate::config::{IndexBackend, RagSettings};
use crate::embeddings::EmbeddingProvider;
use crate::memory_index::MemoryIndex;
use crate::rag::{AnswerComposer, RagAgent};
use crate::types::{Chunk, ChunkId, GameName};
use async_trait::async_trait;
use meeple_core::{AppError, AppResult, RetryPolicy};
use meeple_llm::{LlmClient, LlmRequest, LlmResponse};
use meeple_prompt::builtin::builtin_prompt;
use meeple_prompt::GROUNDED_ANSWER_PROMPT_ID;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MONOPOLY: &str = "SETUP\n\
Each player chooses a token and places it on GO. The banker gives each player \
1500 in money. Shuffle the cards and place them face down beside the board.\n\
\n\
RENT\n\
When you land on a property owned by another player, the owner collects rent \
from you. The rent is printed on the title deed card. If the owner holds every \
property of a colour group, the rent is doubled. A house or a hotel raises the \
rent further.\n\
\n\
JAIL\n\
You go to jail when you land on Go To Jail or throw doubles three times in a \
row. To get out of jail, pay 50 money or roll doubles on your next turn.\n";

pub const CHESS: &str = "SETUP\n\
The board is placed so that each player has a light square on the right. \
Pawns fill the second rank.\n\
\n\
MOVEMENT\n\
The king moves one square in any direction. A pawn moves forward one square, \
or two squares on its first move. The king may never move into check.\n";

/// Words the keyword embedder knows about, one dimension each.
pub const VOCABULARY: [&str; 14] = [
    "rent", "hotel", "house", "jail", "doubles", "money", "property", "card", "board", "king",
    "pawn", "square", "token", "check",
];

/// Embeds text as counts of vocabulary words.
///
/// Text without any known word embeds to the zero vector, which is maximally
/// distant from everything.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; VOCABULARY.len()];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
    {
        let singular = word.strip_suffix('s').unwrap_or(&word);
        if let Some(i) = VOCABULARY.iter().position(|v| *v == word || *v == singular) {
            vector[i] += 1.0;
        }
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

/// What the stub model does with a request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Cite every passage id that appears in the prompt.
    CitePassages,
    Fixed(String),
    Fail,
    Sleep(Duration),
}

/// Language model stub that counts its calls.
#[derive(Debug)]
pub struct StubLlm {
    reply: Reply,
    pub calls: AtomicUsize,
}

impl StubLlm {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Passage ids labelled in a rendered prompt, in order.
pub fn prompt_ids(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix('['))
        .filter_map(|rest| rest.split_once(']'))
        .map(|(id, _)| id.to_string())
        .collect()
}

#[async_trait]
impl LlmClient for StubLlm {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let content = match &self.reply {
            Reply::CitePassages => {
                let markers: Vec<String> = prompt_ids(&request.prompt)
                    .iter()
                    .map(|id| format!("[{}]", id))
                    .collect();
                format!("Here is what the rulebook says {}.", markers.join(" "))
            }
            Reply::Fixed(text) => text.clone(),
            Reply::Fail => return Err(AppError::Generation("model unavailable".to_string())),
            Reply::Sleep(delay) => {
                tokio::time::sleep(*delay).await;
                "Too late.".to_string()
            }
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: Default::default(),
        })
    }
}

/// Settings for in-memory tests: small passages and no retry delays.
pub fn test_settings() -> RagSettings {
    let mut settings = RagSettings {
        chunk_size: 200,
        chunk_overlap: 20,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        ..Default::default()
    };
    settings.index.backend = IndexBackend::Memory;
    settings
}

/// An agent over a fresh in-memory index, plus its collection manager.
pub fn build_agent(llm: Arc<StubLlm>, settings: RagSettings) -> (RagAgent, Arc<CollectionManager>) {
    let collections = Arc::new(CollectionManager::new(
        Arc::new(MemoryIndex::new()),
        Arc::new(KeywordEmbedder::default()),
        settings.retry,
    ));

    let prompt = builtin_prompt(GROUNDED_ANSWER_PROMPT_ID)
        .unwrap()
        .unwrap();
    let composer = AnswerComposer::new(llm, "stub-model", prompt)
        .with_confidence_threshold(settings.confidence_threshold)
        .with_retry(settings.retry);

    (
        RagAgent::new(Arc::clone(&collections), composer, settings),
        collections,
    )
}

/// One passage per text, with no overlap.
pub fn passages(game: &GameName, texts: &[&str]) -> Vec<Chunk> {
    let mut offset = 0;
    texts
        .iter()
        .enumerate()
        .map(|(sequence, text)| {
            let len = text.chars().count();
            let chunk = Chunk {
                id: ChunkId::new(game, sequence),
                game: game.clone(),
                sequence,
                text: text.to_string(),
                start: offset,
                end: offset + len,
                overlap_len: 0,
                section: None,
                content_hash: content_hash(text),
            };
            offset += len;
            chunk
        })
        .collect()
}
