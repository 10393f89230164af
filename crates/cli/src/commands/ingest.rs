//! Ingest command handler.
//!
//! Loads rulebook files into per-game collections.

use clap::Args;
use meeple_core::{config::AppConfig, AppError, AppResult};
use meeple_knowledge::{IngestMode, IngestReport};
use std::path::PathBuf;

/// Ingest a rulebook file, or every rulebook in a directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Rulebook file (.txt, .md) or directory of rulebooks
    pub path: PathBuf,

    /// Game name (default: file stem). Only valid for a single file
    #[arg(short, long)]
    pub game: Option<String>,

    /// Keep games that are already ingested
    #[arg(long, conflicts_with = "append")]
    pub skip_existing: bool,

    /// Add the passages to an existing game instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.path);

        let mode = self.mode();

        let agent = super::build_agent(config)?;

        let reports = if self.path.is_dir() {
            if self.game.is_some() {
                return Err(AppError::InvalidInput(
                    "--game cannot be used with a directory; each file is its own game".to_string(),
                ));
            }
            agent.ingest_dir(&self.path, mode).await?
        } else {
            vec![
                agent
                    .ingest_rulebook(&self.path, self.game.as_deref(), mode)
                    .await?,
            ]
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else if reports.is_empty() {
            println!("No rulebooks found in {}", self.path.display());
        } else {
            for report in &reports {
                print_report(report);
            }
        }

        Ok(())
    }

    fn mode(&self) -> IngestMode {
        if self.skip_existing {
            IngestMode::SkipIfExists
        } else if self.append {
            IngestMode::Append
        } else {
            IngestMode::Replace
        }
    }
}

fn print_report(report: &IngestReport) {
    if report.skipped {
        println!("{}: already ingested, skipped", report.game);
    } else if report.first_sequence > 0 {
        println!(
            "{}: appended {} passages (from #{}) in {:.2}s",
            report.game, report.chunks_count, report.first_sequence, report.duration_secs
        );
    } else {
        println!(
            "{}: {} passages from {} characters in {:.2}s",
            report.game, report.chunks_count, report.chars_processed, report.duration_secs
        );
    }
}
