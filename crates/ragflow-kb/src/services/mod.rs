//! The RAG workflows and their trigger events

pub mod events;
pub mod ingestion;
pub mod query;

pub use events::{
    IngestOutput, IngestRequest, QueryOutput, QueryRequest, DEFAULT_TOP_K, INGEST_EVENT,
    QUERY_EVENT,
};
pub use ingestion::{IngestionWorkflow, DEFAULT_RETENTION, EXPIRED_STATUS, INGEST_WORKFLOW};
pub use query::{QueryWorkflow, NO_CONTEXT_ANSWER, NO_SESSION_ANSWER, QUERY_WORKFLOW};

#[cfg(test)]
mod tests;
