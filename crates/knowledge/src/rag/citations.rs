//! Citation extraction from model output.
//!
//! The model cites passages as `[monopoly#3]` or `[monopoly#3, monopoly#5]`.
//! Only ids that were part of the prompt survive; any other marker is
//! removed from the answer text.

use crate::types::{ChunkId, Citation, RetrievalResult};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum snippet length for citations, in characters.
pub const MAX_SNIPPET_LENGTH: usize = 150;

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("citation pattern is a valid regex"))
}

/// Answer text with unknown markers stripped, plus the cited passages.
#[derive(Debug, Clone)]
pub struct ParsedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Split a completion into answer text and citations.
///
/// Citations are ordered by first mention and never repeat. Text outside the
/// removed markers is kept as written.
pub fn extract_citations(completion: &str, retrieved: &RetrievalResult) -> ParsedAnswer {
    let mut cited: Vec<ChunkId> = Vec::new();
    let mut text = String::with_capacity(completion.len());
    let mut last = 0;

    for caps in marker_pattern().captures_iter(completion) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        text.push_str(&completion[last..whole.start()]);
        last = whole.end();

        let ids: Vec<ChunkId> = inner
            .as_str()
            .split([',', ';'])
            .filter_map(ChunkId::parse)
            .collect();

        // Not a citation at all, e.g. "[optional]"
        if ids.is_empty() {
            text.push_str(whole.as_str());
            continue;
        }

        let known: Vec<ChunkId> = ids
            .into_iter()
            .filter(|id| retrieved.get(id).is_some())
            .collect();

        for id in &known {
            if !cited.contains(id) {
                cited.push(id.clone());
            }
        }

        if known.is_empty() {
            last += close_gap(&mut text, &completion[last..]);
        } else {
            let joined: Vec<&str> = known.iter().map(|id| id.as_str()).collect();
            text.push('[');
            text.push_str(&joined.join(", "));
            text.push(']');
        }
    }
    text.push_str(&completion[last..]);

    let citations = cited
        .iter()
        .filter_map(|id| retrieved.get(id))
        .map(|chunk| Citation {
            chunk_id: chunk.chunk_id.clone(),
            section: chunk.section.clone(),
            relevance: chunk.relevance,
            snippet: truncate_snippet(&chunk.text, MAX_SNIPPET_LENGTH),
        })
        .collect();

    ParsedAnswer {
        text: text.trim_end().to_string(),
        citations,
    }
}

/// Remove the spacing left around a deleted marker.
///
/// `text` is the output so far and `rest` the input after the marker.
/// Returns how many bytes of `rest` to skip.
fn close_gap(text: &mut String, rest: &str) -> usize {
    let at_line_start = text.is_empty() || text.ends_with('\n');
    let trailing = text.len() - text.trim_end_matches([' ', '\t']).len();
    let leading = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let next = rest[leading..].chars().next();

    if at_line_start {
        // Keep indentation, drop the space after the marker
        return leading;
    }

    let before_punctuation = next.is_some_and(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
    if trailing > 0 && (leading > 0 || before_punctuation || next.is_none() || next == Some('\n')) {
        text.truncate(text.len() - trailing);
    }
    if trailing == 0 && leading > 0 && next.is_none() {
        return leading;
    }
    0
}

/// Truncate snippet to maximum length at a word boundary.
pub fn truncate_snippet(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_len)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len());
    let truncated = &text[..cut];

    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}
