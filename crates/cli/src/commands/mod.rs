//! Command handlers for the Meeple CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod ask_all;
pub mod chat;
pub mod games;
pub mod ingest;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ask_all::AskAllCommand;
pub use chat::ChatCommand;
pub use games::GamesCommand;
pub use ingest::IngestCommand;

use meeple_core::{config::AppConfig, AppResult};
use meeple_knowledge::{Answer, RagAgent, RagSettings};
use meeple_llm::create_client;

/// Build the rules assistant for the configured workspace and provider.
pub fn build_agent(config: &AppConfig) -> AppResult<RagAgent> {
    config.validate()?;
    config.ensure_state_dir()?;

    let settings = RagSettings::load(&config.workspace)?;
    let api_key = config.resolve_api_key(&config.provider);
    let llm = create_client(&config.provider, config.provider_endpoint(), api_key.as_deref())?;

    // Remote embeddings authenticate against OpenAI regardless of the chat provider
    let embedding_key = config.resolve_api_key("openai");

    RagAgent::from_settings(
        &config.workspace,
        settings,
        llm,
        &config.model,
        embedding_key.as_deref(),
    )
}

/// Print an answer for humans, optionally followed by its sources.
pub fn print_answer(answer: &Answer, show_sources: bool) {
    println!("{}", answer.text);

    if !show_sources {
        return;
    }

    println!();
    if answer.citations.is_empty() {
        println!("Sources: (none)");
        return;
    }

    println!("Sources:");
    for citation in &answer.citations {
        match &citation.section {
            Some(section) => println!(
                "- [{}] {} (relevance {:.2})",
                citation.chunk_id, section, citation.relevance
            ),
            None => println!("- [{}] (relevance {:.2})", citation.chunk_id, citation.relevance),
        }
        println!("  {}", citation.snippet);
    }
}
