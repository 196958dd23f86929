//! Grounded answer generation.
//!
//! Turns retrieved snippets plus the user's question into an LLM
//! prompt and returns the model's reply. Generation failures degrade
//! to an apology string instead of surfacing an error, matching the
//! retrieval path.

use medrag_llm::{LlmClient, LlmRequest, LlmStream};

/// System prompt framing the assistant as a cautious medical helper.
pub const SYSTEM_PROMPT: &str = "You are a helpful medical assistant. Use the provided medical \
     information to answer the user's question accurately and concisely. If the provided \
     information does not cover the question, say so rather than guessing. Always remind the \
     user to consult a healthcare professional for diagnosis and treatment.";

/// Placeholder returned when generation fails.
pub const GENERATION_TROUBLE: &str =
    "I'm sorry, I encountered an error while processing your question. Please try again.";

/// Assemble the user prompt from retrieved snippets and the question.
///
/// Snippets are numbered so the model can reference them; an empty
/// snippet list still produces a well-formed prompt and the system
/// prompt tells the model how to handle it.
pub fn build_user_prompt(query: &str, snippets: &[String]) -> String {
    let mut prompt = String::from("Relevant medical information:\n\n");

    if snippets.is_empty() {
        prompt.push_str("(no relevant excerpts were found)\n");
    } else {
        for (i, snippet) in snippets.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, snippet));
        }
    }

    prompt.push_str("\nQuestion: ");
    prompt.push_str(query);
    prompt
}

/// Build the complete generation request for a grounded answer.
pub fn build_request(model: &str, query: &str, snippets: &[String], stream: bool) -> LlmRequest {
    let request = LlmRequest::new(build_user_prompt(query, snippets), model)
        .with_system(SYSTEM_PROMPT)
        .with_temperature(0.2);
    if stream {
        request.with_streaming()
    } else {
        request
    }
}

/// Generate a grounded answer, falling back to an apology on error.
pub async fn answer(
    client: &dyn LlmClient,
    model: &str,
    query: &str,
    snippets: &[String],
) -> String {
    let request = build_request(model, query, snippets, false);
    match client.complete(&request).await {
        Ok(response) => response.content,
        Err(e) => {
            tracing::error!("Answer generation failed: {}", e);
            GENERATION_TROUBLE.to_string()
        }
    }
}

/// Start a streaming grounded answer.
pub async fn answer_stream(
    client: &dyn LlmClient,
    model: &str,
    query: &str,
    snippets: &[String],
) -> medrag_core::AppResult<LlmStream> {
    let request = build_request(model, query, snippets, true);
    client.stream(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrag_core::{AppError, AppResult};
    use medrag_llm::{LlmResponse, LlmStreamChunk, LlmUsage};

    struct StubClient {
        reply: Option<String>,
    }

    #[async_trait::async_trait]
    impl LlmClient for StubClient {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            match &self.reply {
                Some(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: "stub-model".to_string(),
                    usage: LlmUsage::default(),
                    done: true,
                }),
                None => Err(AppError::Llm("connection refused".to_string())),
            }
        }

        async fn stream(&self, _request: &LlmRequest) -> AppResult<LlmStream> {
            let chunk = LlmStreamChunk {
                content: "streamed".to_string(),
                model: "stub-model".to_string(),
                done: true,
                usage: None,
            };
            Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
        }
    }

    #[test]
    fn test_prompt_includes_numbered_snippets_and_question() {
        let snippets = vec![
            "Diabetes | High blood sugar".to_string(),
            "Monitor diet regularly".to_string(),
        ];
        let prompt = build_user_prompt("What helps with diabetes?", &snippets);

        assert!(prompt.contains("1. Diabetes | High blood sugar"));
        assert!(prompt.contains("2. Monitor diet regularly"));
        assert!(prompt.ends_with("Question: What helps with diabetes?"));
    }

    #[test]
    fn test_prompt_with_no_snippets() {
        let prompt = build_user_prompt("What is asthma?", &[]);
        assert!(prompt.contains("no relevant excerpts were found"));
        assert!(prompt.contains("Question: What is asthma?"));
    }

    #[test]
    fn test_request_carries_system_prompt() {
        let request = build_request("llama3.2", "q", &[], false);
        assert_eq!(request.system.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(request.model, "llama3.2");
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn test_answer_returns_model_reply() {
        let client = StubClient {
            reply: Some("Rest and fluids.".to_string()),
        };
        let reply = answer(&client, "llama3.2", "flu?", &[]).await;
        assert_eq!(reply, "Rest and fluids.");
    }

    #[tokio::test]
    async fn test_answer_degrades_on_error() {
        let client = StubClient { reply: None };
        let reply = answer(&client, "llama3.2", "flu?", &[]).await;
        assert_eq!(reply, GENERATION_TROUBLE);
    }
}
