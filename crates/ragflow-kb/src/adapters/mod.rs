//! Adapters for external vector stores and model providers

pub mod qdrant_store;
#[cfg(feature = "async-openai")]
pub mod openai;

pub use qdrant_store::{QdrantConfig, QdrantVectorStore};
#[cfg(feature = "async-openai")]
pub use openai::{OpenAiAnswerGenerator, OpenAiEmbeddingGenerator, OpenAiSettings};
