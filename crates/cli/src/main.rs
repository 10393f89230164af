//! Meeple CLI
//!
//! Main entry point for the meeple command-line tool.
//! Answers board game rules questions from ingested rulebooks.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskAllCommand, AskCommand, ChatCommand, GamesCommand, IngestCommand};
use meeple_core::{config::AppConfig, logging, AppError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// Meeple - board game rules answered from the rulebook
#[derive(Parser, Debug)]
#[command(name = "meeple")]
#[command(about = "Board game rules answered from the rulebook", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "MEEPLE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MEEPLE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "MEEPLE_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "MEEPLE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest rulebooks into per-game collections
    Ingest(IngestCommand),

    /// Ask a rules question about one game
    Ask(AskCommand),

    /// Ask a question of every ingested game
    AskAll(AskAllCommand),

    /// List ingested games
    Games(GamesCommand),

    /// Interactive rules chat for one game
    Chat(ChatCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load base configuration from the config file and environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::AskAll(_) => "ask-all",
        Commands::Games(_) => "games",
        Commands::Chat(_) => "chat",
    };
    let span = tracing::info_span!("command", name = command_name);

    // Route to command handlers
    let result = async {
        match &cli.command {
            Commands::Ingest(cmd) => cmd.execute(&config).await,
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::AskAll(cmd) => cmd.execute(&config).await,
            Commands::Games(cmd) => cmd.execute(&config).await,
            Commands::Chat(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(kind = e.kind(), "Command failed: {}", e),
    }

    Ok(result?)
}

/// Caller mistakes exit with 2, everything else with 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AppError>() {
        Some(app_err) if app_err.is_client_error() => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_flags() {
        let cli = Cli::try_parse_from([
            "meeple",
            "ask",
            "monopoly",
            "How much is rent?",
            "-k",
            "6",
            "--min-relevance",
            "0.4",
            "--sources",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.game, "monopoly");
                assert_eq!(cmd.top_k, Some(6));
                assert_eq!(cmd.min_relevance, Some(0.4));
                assert!(cmd.sources);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_append_conflicts_with_skip_existing() {
        let cli = Cli::try_parse_from(["meeple", "ingest", "rules/catan.md", "--append"]).unwrap();
        match cli.command {
            Commands::Ingest(cmd) => assert!(cmd.append && !cmd.skip_existing),
            other => panic!("unexpected command: {:?}", other),
        }

        let both = Cli::try_parse_from([
            "meeple",
            "ingest",
            "rules/catan.md",
            "--append",
            "--skip-existing",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_exit_codes() {
        let client: anyhow::Error = AppError::UnknownGame("chess".into()).into();
        assert_eq!(exit_code(&client), 2);

        let server: anyhow::Error = AppError::Generation("empty".into()).into();
        assert_eq!(exit_code(&server), 1);
    }
}
