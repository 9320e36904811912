//! Fakes for testing the RAG workflows without external services

pub mod fakes;

pub use fakes::*;
pub use crate::traits::{
    MockAnswerGenerator, MockDocumentChunker, MockEmbeddingGenerator, MockVectorStore,
};
