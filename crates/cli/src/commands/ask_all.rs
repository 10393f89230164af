//! Ask-all command handler.

use clap::Args;
use meeple_core::{config::AppConfig, AppResult};
use meeple_knowledge::AskOptions;

/// Ask a question of every ingested game
#[derive(Args, Debug)]
pub struct AskAllCommand {
    /// The question to ask
    pub question: String,

    /// Show the passages each answer cites
    #[arg(short, long)]
    pub sources: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskAllCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask-all command");

        let agent = super::build_agent(config)?;
        let timeout = agent.settings().ask_timeout();

        let answers = tokio::time::timeout(
            timeout,
            agent.ask_all(&self.question, &AskOptions::default()),
        )
        .await
        .map_err(|_| {
            meeple_core::AppError::Timeout(format!("No answer within {}s", timeout.as_secs()))
        })??;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answers)?);
            return Ok(());
        }

        if answers.is_empty() {
            println!("No game's rulebook covers that question.");
            return Ok(());
        }

        for (i, answer) in answers.iter().enumerate() {
            if i > 0 {
                println!();
            }
            println!(
                "== {} (relevance {:.2}) ==",
                answer.game,
                answer.top_relevance.unwrap_or(0.0)
            );
            super::print_answer(answer, self.sources);
        }

        Ok(())
    }
}
