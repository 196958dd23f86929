//! Command handlers for the medrag CLI.

mod ask;
mod index;
mod retrieve;

pub use ask::AskCommand;
pub use index::IndexCommand;
pub use retrieve::RetrieveCommand;

use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_retrieval::{
    create_provider, EngineStatus, PlainTextExtractor, RetrievalConfig, RetrievalEngine,
};
use std::sync::Arc;

/// Build the retrieval engine from the application configuration.
fn build_engine(config: &AppConfig) -> AppResult<Arc<RetrievalEngine>> {
    let retrieval_config = RetrievalConfig::load(&config.data_dir)?;
    let provider = create_provider(&config.provider, &config.embedding_model, &config.endpoint)?;

    Ok(Arc::new(RetrievalEngine::new(
        retrieval_config,
        provider,
        Arc::new(PlainTextExtractor),
    )))
}

/// Run warm-up to completion and fail if the corpus never loaded.
///
/// A CLI invocation has no later request to degrade to, so a warm-up
/// that ends in the loading state becomes a hard error here.
async fn warm_up_engine(engine: &Arc<RetrievalEngine>) -> AppResult<()> {
    let handle = Arc::clone(engine).spawn_warm_up();
    handle
        .await
        .map_err(|e| AppError::Other(format!("Warm-up task panicked: {}", e)))?;

    match engine.status() {
        EngineStatus::Loading => Err(AppError::Corpus(
            "Corpus failed to load; check the data directory and source files".to_string(),
        )),
        EngineStatus::ReadyEmpty => {
            tracing::warn!("Engine is ready but has no index; retrieval will return placeholders");
            Ok(())
        }
        EngineStatus::Ready => Ok(()),
    }
}
