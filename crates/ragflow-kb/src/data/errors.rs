//! Error types for the RAGFlow knowledge base

use ragflow_core::CoreError;
use thiserror::Error;

/// Errors raised by vector stores, model providers and the RAG workflows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KbError {
    /// An operation was attempted without a usable isolation key
    #[error("Isolation violation: {0}")]
    IsolationViolation(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector store rejected the request
    #[error("Vector store error: {0}")]
    VectorStoreError(String),

    /// The vector store could not be reached or answered with a server error
    #[error("Vector store unavailable: {0}")]
    TransientVectorStoreError(String),

    /// The model provider timed out, refused the connection or asked to back off
    #[error("Model provider unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding generation error: {0}")]
    EmbeddingError(String),

    #[error("Answer generation error: {0}")]
    GenerationError(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl KbError {
    /// Whether a step that failed with this error is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KbError::TransientVectorStoreError(_) | KbError::ModelUnavailable(_)
        )
    }
}

impl From<std::io::Error> for KbError {
    fn from(err: std::io::Error) -> Self {
        KbError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        KbError::ValidationError(err.to_string())
    }
}

impl From<KbError> for CoreError {
    fn from(err: KbError) -> Self {
        let message = err.to_string();
        match err {
            KbError::TransientVectorStoreError(_) | KbError::ModelUnavailable(_) => {
                CoreError::ExternalDependencyError(message)
            }
            KbError::IsolationViolation(_)
            | KbError::DimensionMismatch { .. }
            | KbError::ValidationError(_)
            | KbError::ChunkingError(_) => CoreError::ValidationError(message),
            KbError::VectorStoreError(_)
            | KbError::EmbeddingError(_)
            | KbError::GenerationError(_)
            | KbError::IoError(_) => CoreError::StepExecutionError(message),
        }
    }
}
