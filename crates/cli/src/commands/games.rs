//! Games command handler.

use clap::Args;
use meeple_core::{config::AppConfig, AppResult};

/// List ingested games
#[derive(Args, Debug)]
pub struct GamesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl GamesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing games command");

        let agent = super::build_agent(config)?;
        let summaries = agent.summaries().await?;

        if self.json {
            let output = serde_json::json!({
                "count": summaries.len(),
                "games": summaries,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if summaries.is_empty() {
            println!("No games ingested yet. Run 'meeple ingest <rulebook>' first.");
            return Ok(());
        }

        println!("{} game(s):", summaries.len());
        for summary in &summaries {
            println!(
                "  {:<24} {:>5} passages  ingested {}",
                summary.game,
                summary.chunks_count,
                summary.ingested_at.format("%Y-%m-%d %H:%M")
            );
        }

        Ok(())
    }
}
