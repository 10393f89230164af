//! Rulebook chunking.
//!
//! Splits a rulebook into overlapping passages that:
//! - never exceed `chunk_size` characters
//! - share at least `overlap` characters with their predecessor
//! - end on the most natural boundary available in the window
//! - reconstruct the source exactly once each passage's shared prefix is dropped

mod boundaries;
mod metadata;
mod sections;

pub use boundaries::Boundary;
pub use metadata::content_hash;
pub use sections::{find_headings, Heading};

use crate::types::{Chunk, ChunkId, GameName};
use meeple_core::{AppError, AppResult};

/// Split `raw_text` into passages for `game`.
///
/// Sizes are measured in characters (Unicode scalar values).
///
/// # Errors
/// `AppError::InvalidInput` when the text is empty or whitespace only, or
/// when `chunk_size <= overlap`.
pub fn chunk(
    game: &GameName,
    raw_text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    if chunk_size <= overlap {
        return Err(AppError::InvalidInput(format!(
            "chunk_size ({}) must be greater than overlap ({})",
            chunk_size, overlap
        )));
    }

    if raw_text.trim().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Rulebook text for '{}' is empty",
            game
        )));
    }

    let text = boundaries::TextBoundaries::new(raw_text);
    let total = text.len();
    let headings = sections::find_headings(raw_text);

    // Keeps every following window long enough to move past the previous end.
    let max_back = (overlap / 2).min((chunk_size - overlap - 1) / 2);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut prev_end = 0usize;

    loop {
        let window_end = (start + chunk_size).min(total);
        let end = if window_end == total {
            total
        } else {
            let min_end = (start + overlap + 1).max(prev_end + 1);
            // Look for a boundary in the back half of the window first
            let preferred_min = min_end.max(start + chunk_size / 2);
            match boundaries::find_split(&text, preferred_min, window_end) {
                (end, Some(_)) => end,
                _ => boundaries::find_split(&text, min_end, window_end).0,
            }
        };

        let sequence = chunks.len();
        let passage = text.slice(start, end);
        let overlap_len = if sequence == 0 { 0 } else { prev_end - start };

        chunks.push(Chunk {
            id: ChunkId::new(game, sequence),
            game: game.clone(),
            sequence,
            content_hash: metadata::content_hash(&passage),
            section: sections::section_for(&headings, start, end),
            text: passage,
            start,
            end,
            overlap_len,
        });

        if end == total {
            break;
        }

        prev_end = end;
        start = boundaries::align_start(&text, end - overlap, start + 1, max_back);
    }

    tracing::debug!(
        game = %game,
        chunks = chunks.len(),
        chars = total,
        "Chunked rulebook"
    );

    Ok(chunks)
}

/// Rebuild the source text from its passages.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::fresh_text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONOPOLY: &str = "SETUP\n\
Each player starts with $1500. Place all tokens on GO.\n\
\n\
RENT\n\
When you land on a property owned by another player, the owner collects rent \
from you in accordance with the list printed on its Title Deed card. If the \
owner has all properties of a colour group, the rent is doubled on unimproved \
properties.\n\
\n\
JAIL\n\
You land in jail when your token lands on the space marked Go to Jail.\n";

    fn game(name: &str) -> GameName {
        GameName::parse(name).unwrap()
    }

    fn shared(a: &Chunk, b: &Chunk) -> usize {
        a.end.saturating_sub(b.start)
    }

    #[test]
    fn test_reconstructs_source_exactly() {
        for (size, overlap) in [(80, 20), (64, 0), (40, 39), (200, 50), (17, 5)] {
            let chunks = chunk(&game("monopoly"), MONOPOLY, size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks), MONOPOLY, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_size_and_overlap_bounds() {
        let chunks = chunk(&game("monopoly"), MONOPOLY, 80, 20).unwrap();
        assert!(chunks.len() > 3);

        for c in &chunks {
            assert!(c.text.chars().count() <= 80);
            assert_eq!(c.text.chars().count(), c.end - c.start);
        }
        for pair in chunks.windows(2) {
            assert!(shared(&pair[0], &pair[1]) >= 20);
            assert_eq!(pair[1].overlap_len, shared(&pair[0], &pair[1]));
            assert!(pair[1].end > pair[0].end);
        }
    }

    #[test]
    fn test_ids_and_sequences() {
        let chunks = chunk(&game("Monopoly"), MONOPOLY, 100, 10).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence, i);
            assert_eq!(c.id.as_str(), format!("monopoly#{}", i));
            assert_eq!(c.content_hash, content_hash(&c.text));
        }
        assert_eq!(chunks[0].overlap_len, 0);
    }

    #[test]
    fn test_sections_are_attached() {
        let chunks = chunk(&game("monopoly"), MONOPOLY, 120, 20).unwrap();
        assert_eq!(chunks[0].section.as_deref(), Some("SETUP"));
        assert!(chunks
            .iter()
            .any(|c| c.section.as_deref() == Some("RENT") && c.text.contains("rent")));
        assert_eq!(chunks.last().unwrap().section.as_deref(), Some("JAIL"));
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk(&game("uno"), "Match colour or number.", 512, 64).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Match colour or number.");
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "x".repeat(50);
        let chunks = chunk(&game("blob"), &text, 20, 5).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 20));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "Les joueurs placent leurs pions. Ça commence à gauche du donneur. Où est la pièce ? Ici.";
        let chunks = chunk(&game("jeu"), text, 30, 8).unwrap();
        assert_eq!(reconstruct(&chunks), text);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 30));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let g = game("monopoly");
        assert!(matches!(
            chunk(&g, MONOPOLY, 64, 64),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(chunk(&g, MONOPOLY, 0, 0), Err(AppError::InvalidInput(_))));
        assert!(matches!(chunk(&g, MONOPOLY, 10, 20), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_blank_text() {
        let g = game("monopoly");
        assert!(matches!(chunk(&g, "", 64, 8), Err(AppError::InvalidInput(_))));
        assert!(matches!(chunk(&g, " \n\t ", 64, 8), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_deterministic() {
        let a = chunk(&game("monopoly"), MONOPOLY, 90, 15).unwrap();
        let b = chunk(&game("monopoly"), MONOPOLY, 90, 15).unwrap();
        assert_eq!(a, b);
    }
}
