//! Deterministic local embeddings from word and character-trigram hashes.

use crate::embeddings::provider::EmbeddingProvider;
use meeple_core::AppResult;
use std::collections::BTreeMap;

/// Words too common in rulebooks to carry meaning.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "you", "your", "can", "may", "each", "any", "all",
    "player", "players", "game",
];

/// Offline embedding provider.
///
/// Not semantic in the neural sense, but identical texts always map to the
/// same unit vector and texts sharing vocabulary land close together, which
/// is enough to rank rulebook passages without a model server.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, seed: u64, token: &str) -> usize {
        let hash = token
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(0x0100_0000_01b3).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        // Ordered so the float sums run in the same order every time
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        {
            *counts.entry(word).or_insert(0) += 1;
        }

        for (word, count) in &counts {
            let weight = (*count as f32).sqrt();

            let chars: Vec<char> = format!(" {} ", word).chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(0xcbf2_9ce4_8422_2325, &trigram)] += weight;
            }

            vector[self.bucket(0x8422_2325_cbf2_9ce4, word)] += 2.0 * weight;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
