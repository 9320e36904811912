//! Retrieval-augmented question answering over one ingested document

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use ragflow_core::{CoreError, StepContext, StepError, Workflow};

use super::events::{query_isolation_key, QueryOutput, QueryRequest};
use crate::data::{IsolationKey, KbError, SearchResult};
use crate::traits::{AnswerGenerator, AnswerRequest, EmbeddingGenerator, VectorStore};

pub const QUERY_WORKFLOW: &str = "rag-query-pdf";

pub const NO_SESSION_ANSWER: &str = "Error: No active document session found.";
pub const NO_CONTEXT_ANSWER: &str =
    "I cannot answer this question because the document context is missing or the session has expired.";
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant. Answer questions using only the provided context.";
pub const ANSWER_TEMPERATURE: f32 = 0.1;
pub const MAX_OUTPUT_TOKENS: u32 = 1500;

/// Contexts as a bullet list, best match first
pub fn build_context_block(contexts: &[String]) -> String {
    contexts
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, context_block: &str) -> String {
    format!(
        "Use the following context to answer the question.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\
         Answer concisely using the context above.",
        context_block, question
    )
}

pub fn answer_request(question: &str, contexts: &[String]) -> AnswerRequest {
    AnswerRequest {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        prompt: build_prompt(question, &build_context_block(contexts)),
        temperature: ANSWER_TEMPERATURE,
        max_output_tokens: MAX_OUTPUT_TOKENS,
    }
}

/// Embeds `question` and searches under `isolation_key`
pub async fn retrieve(
    embedder: &dyn EmbeddingGenerator,
    store: &dyn VectorStore,
    question: &str,
    top_k: usize,
    isolation_key: &IsolationKey,
) -> Result<SearchResult, KbError> {
    let vector = embedder.embed_one(question).await?;
    store.search(&vector, top_k, isolation_key.as_str()).await
}

/// Answers a question from the chunks stored under the caller's isolation key
pub struct QueryWorkflow {
    embedder: Arc<dyn EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn AnswerGenerator>,
}

impl QueryWorkflow {
    pub fn new(
        embedder: Arc<dyn EmbeddingGenerator>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
        }
    }
}

#[async_trait]
impl Workflow for QueryWorkflow {
    fn name(&self) -> &str {
        QUERY_WORKFLOW
    }

    async fn execute(&self, ctx: &StepContext, payload: &Value) -> Result<Value, StepError> {
        let Some(key) = query_isolation_key(payload) else {
            warn!(
                policy = "isolation",
                instance_id = %ctx.instance_id(),
                "Query without an isolation key"
            );
            return Ok(json!(QueryOutput::without_context(NO_SESSION_ANSWER)));
        };

        let request = match QueryRequest::from_payload(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(instance_id = %ctx.instance_id(), error = %e, "Rejected query payload");
                return Ok(json!(QueryOutput::without_context(format!("Error: {}", e))));
            }
        };
        let question = request.question;
        let top_k = request.top_k.max(1);

        let embedder = self.embedder.clone();
        let store = self.store.clone();
        let search_key = key.clone();
        let search_question = question.clone();
        let found: SearchResult = ctx
            .run("embed_and_search", move || {
                let embedder = embedder.clone();
                let store = store.clone();
                let key = search_key.clone();
                let question = search_question.clone();
                async move {
                    let found =
                        retrieve(embedder.as_ref(), store.as_ref(), &question, top_k, &key).await?;
                    Ok::<_, CoreError>(found)
                }
            })
            .await?;

        if found.is_empty() {
            info!(
                instance_id = %ctx.instance_id(),
                isolation_key = %key,
                "No context found for question"
            );
            return Ok(json!(QueryOutput::without_context(NO_CONTEXT_ANSWER)));
        }

        let generator = self.generator.clone();
        let request = answer_request(&question, &found.contexts);
        let answer: String = ctx
            .run("llm_answer", move || {
                let generator = generator.clone();
                let request = request.clone();
                async move { Ok::<_, CoreError>(generator.generate(&request).await?) }
            })
            .await?;

        Ok(json!(QueryOutput {
            answer,
            num_contexts: found.contexts.len(),
            sources: found.sources,
        }))
    }
}
