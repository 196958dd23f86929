//! Retrieve command handler.
//!
//! Prints the corpus snippets nearest to a query, without involving
//! the language model.

use clap::Args;
use medrag_core::{config::AppConfig, AppError, AppResult};

/// Retrieve the corpus snippets nearest to a query
#[derive(Args, Debug)]
pub struct RetrieveCommand {
    /// The query text
    pub query: String,

    /// Number of snippets to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RetrieveCommand {
    /// Execute the retrieve command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing retrieve command");

        let engine = super::build_engine(config)?;
        super::warm_up_engine(&engine).await?;

        let snippets = match self.top_k {
            Some(k) => engine.retrieve(&self.query, k).await,
            None => engine.retrieve_default(&self.query).await,
        };

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "snippets": snippets,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            for (i, snippet) in snippets.iter().enumerate() {
                println!("{}. {}", i + 1, snippet);
            }
        }

        Ok(())
    }
}
