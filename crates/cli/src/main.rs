//! medrag CLI
//!
//! Main entry point for the medrag command-line tool.
//! Provides commands for building, querying, and asking questions of
//! a local medical retrieval corpus.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, RetrieveCommand};
use medrag_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// medrag - local medical retrieval and question answering
#[derive(Parser, Debug)]
#[command(name = "medrag")]
#[command(about = "Local medical retrieval and question answering", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the data directory with corpus sources (default: ./data)
    #[arg(short, long, global = true, env = "MEDRAG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MEDRAG_CONFIG")]
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

    /// LLM provider (currently: ollama)
    #[arg(short, long, global = true, env = "MEDRAG_PROVIDER")]
    provider: Option<String>,

    /// Chat model identifier
    #[arg(short, long, global = true, env = "MEDRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or rebuild) the vector index from the corpus sources
    Index(IndexCommand),

    /// Retrieve the corpus snippets nearest to a query
    Retrieve(RetrieveCommand),

    /// Ask a question answered from retrieved corpus snippets
    Ask(AskCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.data_dir,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("medrag CLI starting");
    tracing::debug!("Data directory: {:?}", config.data_dir);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Chat model: {}", config.model);
    tracing::debug!("Embedding model: {}", config.embedding_model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Index(_) => "index",
        Commands::Retrieve(_) => "retrieve",
        Commands::Ask(_) => "ask",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Retrieve(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
