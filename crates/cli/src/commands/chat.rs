//! Chat command handler.
//!
//! An interactive loop bound to one game.

use clap::Args;
use meeple_core::{config::AppConfig, AppError, AppResult};
use meeple_knowledge::{AskOptions, GameName};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Chat about one game's rules
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Game name, as shown by `meeple games`
    pub game: String,

    /// Number of passages to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for game '{}'", self.game);

        let agent = super::build_agent(config)?;
        let game = GameName::parse(&self.game)?;
        let games = agent.list_games().await?;

        if !games.contains(&game) {
            if games.is_empty() {
                eprintln!("No games ingested yet.");
            } else {
                let names: Vec<&str> = games.iter().map(GameName::as_str).collect();
                eprintln!("Available games: {}", names.join(", "));
            }
            return Err(AppError::UnknownGame(game.to_string()));
        }

        let options = AskOptions {
            top_k: self.top_k,
            min_relevance: None,
        };
        let timeout = agent.settings().ask_timeout();
        let mut show_sources = false;

        println!("Ask about {}. Type 'sources' to toggle sources, 'quit' to exit.", game);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();

            match input {
                "" => continue,
                "quit" | "exit" => break,
                "sources" => {
                    show_sources = !show_sources;
                    println!("Sources {}", if show_sources { "on" } else { "off" });
                    continue;
                }
                _ => {}
            }

            match agent
                .ask_with_timeout(game.as_str(), input, &options, timeout)
                .await
            {
                Ok(answer) => super::print_answer(&answer, show_sources),
                // A failed turn does not end the session
                Err(e) if e.is_retryable() || matches!(e, AppError::Timeout(_)) => {
                    tracing::warn!("Question failed: {}", e);
                    eprintln!("Error: {}", e);
                }
                Err(e) => return Err(e),
            }
            println!();
        }

        Ok(())
    }
}
