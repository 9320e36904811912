//! Core traits (interfaces) for the RAGFlow knowledge base

mod answer_generator;
mod document_chunker;
mod embedding_generator;
mod vector_store;

pub use answer_generator::{AnswerGenerator, AnswerRequest};
pub use document_chunker::DocumentChunker;
pub use embedding_generator::EmbeddingGenerator;
pub use vector_store::VectorStore;

#[cfg(any(test, feature = "test-utils"))]
pub use answer_generator::MockAnswerGenerator;
#[cfg(any(test, feature = "test-utils"))]
pub use document_chunker::MockDocumentChunker;
#[cfg(any(test, feature = "test-utils"))]
pub use embedding_generator::MockEmbeddingGenerator;
#[cfg(any(test, feature = "test-utils"))]
pub use vector_store::MockVectorStore;
