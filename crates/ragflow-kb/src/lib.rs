//! RAGFlow knowledge base
//!
//! Session-scoped vector storage and the two workflows that run on the
//! durable runtime from `ragflow-core`: document ingestion with a retention
//! window, and retrieval-augmented question answering.

// Core modules
pub mod chunking;
pub mod data;
pub mod services;
pub mod storage;
pub mod traits;

// External service adapters (Qdrant, OpenAI)
#[cfg(feature = "adapters")]
pub mod adapters;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenient usage
pub use chunking::{TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use data::{Chunk, IsolationKey, KbError, RecordPayload, SearchResult, VectorRecord};
pub use storage::InMemoryVectorStore;
pub use traits::{AnswerGenerator, AnswerRequest, DocumentChunker, EmbeddingGenerator, VectorStore};

pub use services::{
    IngestOutput, IngestRequest, IngestionWorkflow, QueryOutput, QueryRequest, QueryWorkflow,
    DEFAULT_RETENTION, DEFAULT_TOP_K, EXPIRED_STATUS, INGEST_EVENT, NO_CONTEXT_ANSWER,
    NO_SESSION_ANSWER, QUERY_EVENT,
};

#[cfg(feature = "adapters")]
pub use adapters::{QdrantConfig, QdrantVectorStore};
