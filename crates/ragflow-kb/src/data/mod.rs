//! Data types shared by the vector stores and the RAG workflows

pub mod errors;
pub mod isolation_key;
pub mod types;

pub use errors::KbError;
pub use isolation_key::IsolationKey;
pub use types::{cosine_similarity, Chunk, RecordPayload, SearchResult, VectorRecord};
