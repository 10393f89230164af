//! Section heading detection for rulebook text.

/// Longest line still considered a heading, in characters.
const MAX_HEADING_CHARS: usize = 80;

/// A heading and the character offset of the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub offset: usize,
    pub title: String,
}

/// Find every heading line in `text`.
///
/// A heading is a markdown `#` line, a line written entirely in capitals, or a
/// short title-like line ending with `:`.
pub fn find_headings(text: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if let Some(title) = heading_title(line) {
            headings.push(Heading { offset, title });
        }
        offset += line.chars().count();
    }

    headings
}

/// Heading in effect for the span `[start, end)`.
///
/// The first heading inside the span wins; otherwise the last one before it.
pub fn section_for(headings: &[Heading], start: usize, end: usize) -> Option<String> {
    headings
        .iter()
        .find(|h| h.offset >= start && h.offset < end)
        .or_else(|| headings.iter().rev().find(|h| h.offset < start))
        .map(|h| h.title.clone())
}

fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_CHARS {
        return None;
    }

    if trimmed.starts_with('#') {
        let title = trimmed.trim_start_matches('#').trim();
        return (!title.is_empty()).then(|| title.to_string());
    }

    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 3 {
        return None;
    }

    if letters.iter().all(|c| c.is_uppercase()) && !trimmed.ends_with('.') {
        return Some(trimmed.trim_end_matches(':').trim().to_string());
    }

    let starts_upper = trimmed.chars().next().is_some_and(char::is_uppercase);
    let words = trimmed.split_whitespace().count();
    if trimmed.ends_with(':') && starts_upper && words <= 6 {
        return Some(trimmed.trim_end_matches(':').trim().to_string());
    }

    None
}
