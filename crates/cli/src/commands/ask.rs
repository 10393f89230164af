//! Ask command handler.
//!
//! Answers one rules question about one game.

use clap::Args;
use meeple_core::{config::AppConfig, AppResult};
use meeple_knowledge::AskOptions;

/// Ask a rules question about one game
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Game name, as shown by `meeple games`
    pub game: String,

    /// The question to ask
    pub question: String,

    /// Number of passages to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum passage relevance (0.0-1.0)
    #[arg(long)]
    pub min_relevance: Option<f32>,

    /// Show the passages the answer cites
    #[arg(short, long)]
    pub sources: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for game '{}'", self.game);

        let agent = super::build_agent(config)?;
        let options = AskOptions {
            top_k: self.top_k,
            min_relevance: self.min_relevance,
        };

        let answer = agent
            .ask_with_timeout(
                &self.game,
                &self.question,
                &options,
                agent.settings().ask_timeout(),
            )
            .await?;

        tracing::debug!(
            kind = ?answer.kind,
            citations = answer.citations.len(),
            top_relevance = ?answer.top_relevance,
            "Answer ready"
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            super::print_answer(&answer, self.sources);
        }

        Ok(())
    }
}
