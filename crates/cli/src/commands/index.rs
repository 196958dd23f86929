//! Index command handler.
//!
//! Builds the vector index from the corpus sources and persists the
//! artifact, so later invocations warm up without re-embedding.

use clap::Args;
use medrag_core::{config::AppConfig, AppResult};
use medrag_retrieval::EngineStatus;

/// Build (or rebuild) the vector index
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Delete the existing artifact first, forcing a full re-embed
    #[arg(long)]
    pub rebuild: bool,
}

impl IndexCommand {
    /// Execute the index command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        if self.rebuild {
            let retrieval_config = medrag_retrieval::RetrievalConfig::load(&config.data_dir)?;
            let index_path = retrieval_config.index_path();
            if index_path.exists() {
                std::fs::remove_file(&index_path)?;
                tracing::info!("Removed existing index artifact at {:?}", index_path);
            }
        }

        let engine = super::build_engine(config)?;
        super::warm_up_engine(&engine).await?;

        match engine.status() {
            EngineStatus::Ready => println!("Index built."),
            _ => println!("Index build finished with no vectors; check the logs."),
        }

        Ok(())
    }
}
