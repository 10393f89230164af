//! Rulebook loading.
//!
//! A rulebook is a plain-text or markdown file. The game name comes from the
//! file stem unless the caller supplies one.

use crate::types::GameName;
use meeple_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Rulebook file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulebookFormat {
    Markdown,
    PlainText,
}

impl RulebookFormat {
    /// Detect format from file extension. Unsupported files yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => Some(Self::Markdown),
            Some("txt") => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// A loaded rulebook, ready for chunking.
#[derive(Debug, Clone)]
pub struct Rulebook {
    pub game: GameName,
    pub text: String,
    pub path: PathBuf,
}

/// Read one rulebook file.
///
/// `game` overrides the name derived from the file stem.
pub fn load_rulebook(path: &Path, game: Option<&str>) -> AppResult<Rulebook> {
    let format = RulebookFormat::from_path(path).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Unsupported rulebook format: {:?} (expected .txt or .md)",
            path
        ))
    })?;

    let game = match game {
        Some(name) => GameName::parse(name)?,
        None => {
            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                AppError::InvalidInput(format!("Cannot derive a game name from {:?}", path))
            })?;
            GameName::parse(stem)?
        }
    };

    let raw = fs::read_to_string(path)?;

    if raw.contains('\0') {
        return Err(AppError::InvalidInput(format!(
            "{:?} looks like a binary file",
            path
        )));
    }

    let text = match format {
        RulebookFormat::Markdown => clean_markdown(&raw),
        RulebookFormat::PlainText => raw.replace("\r\n", "\n"),
    };

    tracing::debug!(game = %game, chars = text.chars().count(), "Loaded rulebook {:?}", path);

    Ok(Rulebook {
        game,
        text,
        path: path.to_path_buf(),
    })
}

/// Every rulebook under `dir`, sorted by path.
pub fn discover_rulebooks(dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::InvalidInput(format!("{:?} is not a directory", dir)));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| AppError::Other(format!("Failed to walk {:?}: {}", dir, e)))?;
        if entry.file_type().is_file() && RulebookFormat::from_path(entry.path()).is_some() {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    Ok(paths)
}

/// Drop fences and horizontal rules; headings stay so sections can be found.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") || is_rule(trimmed) {
            continue;
        }
        result.push_str(line.trim_end());
        result.push('\n');
    }

    result.trim().to_string()
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-' || c == '*' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            RulebookFormat::from_path(Path::new("catan.MD")),
            Some(RulebookFormat::Markdown)
        );
        assert_eq!(
            RulebookFormat::from_path(Path::new("uno.txt")),
            Some(RulebookFormat::PlainText)
        );
        assert_eq!(RulebookFormat::from_path(Path::new("rules.pdf")), None);
    }

    #[test]
    fn test_game_name_from_stem() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Ticket to Ride.txt");
        fs::write(&path, "Claim routes between cities.\r\n").unwrap();

        let rulebook = load_rulebook(&path, None).unwrap();
        assert_eq!(rulebook.game.as_str(), "ticket-to-ride");
        assert_eq!(rulebook.text, "Claim routes between cities.\n");
    }

    #[test]
    fn test_explicit_game_name_wins() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rules.md");
        fs::write(&path, "# Setup\n\n---\n\nShuffle the deck.\n```\nignored fence\n```\n").unwrap();

        let rulebook = load_rulebook(&path, Some("Codenames")).unwrap();
        assert_eq!(rulebook.game.as_str(), "codenames");
        assert!(rulebook.text.starts_with("# Setup"));
        assert!(!rulebook.text.contains("---"));
        assert!(!rulebook.text.contains("```"));
        assert!(rulebook.text.contains("ignored fence"));
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            load_rulebook(&temp.path().join("rules.pdf"), None),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            load_rulebook(&temp.path().join("missing.txt"), None),
            Err(AppError::Io(_))
        ));
    }

    #[test]
    fn test_discover_rulebooks() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("party")).unwrap();
        fs::write(temp.path().join("uno.txt"), "uno").unwrap();
        fs::write(temp.path().join("party/codenames.md"), "codenames").unwrap();
        fs::write(temp.path().join("cover.png"), "png").unwrap();

        let found = discover_rulebooks(temp.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["codenames.md", "uno.txt"]);
    }
}
