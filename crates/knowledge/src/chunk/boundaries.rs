//! Natural split points inside a character window.
//!
//! Sentence and word positions come from Unicode text segmentation
//! (UAX #29); paragraph and line breaks are plain newlines.

use unicode_segmentation::UnicodeSegmentation;

/// Boundary kinds in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Whitespace,
}

const PREFERENCE: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Whitespace,
];

/// A text split into chars, with every candidate split position precomputed.
///
/// Positions are char offsets; position `p` means "between `chars[p - 1]`
/// and `chars[p]`".
#[derive(Debug)]
pub struct TextBoundaries {
    chars: Vec<char>,
    sentence_ends: Vec<bool>,
    after_space: Vec<bool>,
}

impl TextBoundaries {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();

        let mut sentence_ends = vec![false; chars.len() + 1];
        let mut pos = 0;
        for sentence in text.split_sentence_bounds() {
            pos += sentence.chars().count();
            sentence_ends[pos] = true;
        }

        let mut after_space = vec![false; chars.len() + 1];
        let mut pos = 0;
        for segment in text.split_word_bounds() {
            pos += segment.chars().count();
            if segment.chars().all(char::is_whitespace) {
                after_space[pos] = true;
            }
        }

        Self {
            chars,
            sentence_ends,
            after_space,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Text of the char range `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    /// Whether a passage may end at `end` on a `kind` boundary.
    fn allows_end(&self, kind: Boundary, end: usize) -> bool {
        if end == 0 || end > self.chars.len() {
            return false;
        }
        let last = self.chars[end - 1];

        match kind {
            Boundary::Paragraph => last == '\n' && self.ends_blank_line(end - 1),
            Boundary::Line => last == '\n',
            Boundary::Sentence => self.sentence_ends[end],
            Boundary::Whitespace => self.after_space[end],
        }
    }

    /// The line ending at `newline` contains only whitespace.
    fn ends_blank_line(&self, newline: usize) -> bool {
        self.chars[..newline]
            .iter()
            .rev()
            .find(|c| !matches!(c, ' ' | '\t' | '\r'))
            .is_some_and(|&c| c == '\n')
    }

    /// A word starts at `pos`, right after whitespace.
    fn is_word_start(&self, pos: usize) -> bool {
        pos > 0
            && pos < self.chars.len()
            && self.after_space[pos]
            && !self.chars[pos].is_whitespace()
    }
}

/// Pick where a passage should end.
///
/// Returns the last position in `[min_end, max_end]` that sits on the most
/// preferred boundary kind available, or `max_end` when none exists.
pub fn find_split(text: &TextBoundaries, min_end: usize, max_end: usize) -> (usize, Option<Boundary>) {
    let max_end = max_end.min(text.len());
    if min_end >= max_end {
        return (max_end, None);
    }

    for kind in PREFERENCE {
        if let Some(end) = (min_end..=max_end)
            .rev()
            .find(|&end| text.allows_end(kind, end))
        {
            return (end, Some(kind));
        }
    }

    (max_end, None)
}

/// Move a passage start back (by at most `max_back`, never below `floor`) so
/// that it begins at the start of a word.
pub fn align_start(text: &TextBoundaries, candidate: usize, floor: usize, max_back: usize) -> usize {
    let lowest = candidate.saturating_sub(max_back).max(floor);
    (lowest..=candidate)
        .rev()
        .find(|&pos| text.is_word_start(pos))
        .unwrap_or(candidate)
}
