//! Trigger event names, payloads and workflow outputs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{IsolationKey, KbError};

pub const INGEST_EVENT: &str = "rag/ingest_pdf";
pub const QUERY_EVENT: &str = "rag/query_pdf_ai";

pub const DEFAULT_TOP_K: usize = 5;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Payload of `rag/ingest_pdf`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(alias = "pdf_path")]
    pub document_path: String,
    #[serde(alias = "source_id")]
    pub isolation_key: IsolationKey,
}

impl IngestRequest {
    pub fn from_payload(payload: &Value) -> Result<Self, KbError> {
        let request: Self = serde_json::from_value(payload.clone())?;
        if request.document_path.trim().is_empty() {
            return Err(KbError::ValidationError("documentPath must not be empty".to_string()));
        }
        Ok(request)
    }
}

/// Payload of `rag/query_pdf_ai`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_top_k", alias = "top_k")]
    pub top_k: usize,
    #[serde(default, alias = "source_id")]
    pub isolation_key: Option<String>,
}

impl QueryRequest {
    pub fn from_payload(payload: &Value) -> Result<Self, KbError> {
        let request: Self = serde_json::from_value(payload.clone())?;
        if request.question.trim().is_empty() {
            return Err(KbError::ValidationError("question must not be empty".to_string()));
        }
        Ok(request)
    }
}

/// The isolation key of a query payload, if it carries a usable one.
/// Read separately so a query without a session is answered before anything else is checked.
pub fn query_isolation_key(payload: &Value) -> Option<IsolationKey> {
    ["isolationKey", "source_id"]
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_str))
        .and_then(|raw| IsolationKey::parse(raw).ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutput {
    pub status: String,
    pub ingested_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub answer: String,
    pub sources: Vec<String>,
    pub num_contexts: usize,
}

impl QueryOutput {
    /// An answer that was produced without any retrieved context
    pub fn without_context(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            num_contexts: 0,
        }
    }
}
