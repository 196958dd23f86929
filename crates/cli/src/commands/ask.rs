//! Ask command handler.
//!
//! Retrieves the corpus snippets nearest to the question and asks the
//! LLM to answer from them.

use clap::Args;
use futures::StreamExt;
use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_llm::create_client;
use medrag_retrieval::answer;

/// Ask a question answered from retrieved corpus snippets
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of snippets to ground the answer on
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Disable streaming output
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON (implies no streaming)
    #[arg(long)]
    pub json: bool,

    /// Show the retrieved snippets before the answer
    #[arg(long)]
    pub show_snippets: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let engine = super::build_engine(config)?;
        super::warm_up_engine(&engine).await?;

        let snippets = match self.top_k {
            Some(k) => engine.retrieve(&self.question, k).await,
            None => engine.retrieve_default(&self.question).await,
        };
        tracing::debug!("Retrieved {} snippets", snippets.len());

        if self.show_snippets && !self.json {
            for (i, snippet) in snippets.iter().enumerate() {
                eprintln!("[{}] {}", i + 1, snippet);
            }
            eprintln!();
        }

        let client = create_client(&config.provider, Some(&config.endpoint))?;

        if self.json {
            let reply = answer::answer(client.as_ref(), &config.model, &self.question, &snippets)
                .await;

            let output = serde_json::json!({
                "question": self.question,
                "answer": reply,
                "model": config.model,
                "provider": config.provider,
                "snippets": snippets,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else if self.no_stream {
            let reply = answer::answer(client.as_ref(), &config.model, &self.question, &snippets)
                .await;
            println!("{}", reply);
        } else {
            self.stream_answer(client.as_ref(), config, &snippets).await?;
        }

        Ok(())
    }

    /// Stream the answer to stdout as it is generated.
    async fn stream_answer(
        &self,
        client: &dyn medrag_llm::LlmClient,
        config: &AppConfig,
        snippets: &[String],
    ) -> AppResult<()> {
        let mut stream =
            match answer::answer_stream(client, &config.model, &self.question, snippets).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!("Failed to start answer stream: {}", e);
                    println!("{}", answer::GENERATION_TROUBLE);
                    return Ok(());
                }
            };

        while let Some(result) = stream.next().await {
            match result {
                Ok(chunk) => {
                    if !chunk.content.is_empty() {
                        print!("{}", chunk.content);
                        use std::io::Write;
                        std::io::stdout().flush().ok();
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Answer stream failed: {}", e);
                    println!();
                    println!("{}", answer::GENERATION_TROUBLE);
                    return Ok(());
                }
            }
        }

        println!();
        Ok(())
    }
}
