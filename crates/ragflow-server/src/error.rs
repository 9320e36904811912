//! Error types for the RAGFlow Server

use ragflow_core::CoreError;
use ragflow_kb::KbError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The request conflicts with the current state of a run
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Workflow runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Vector store or model provider error
    #[error("Knowledge base error: {0}")]
    KnowledgeBaseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::WorkflowNotFound(msg) | CoreError::InstanceNotFound(msg) => {
                ServerError::NotFound(msg)
            }
            CoreError::InvalidStateTransition(msg) => ServerError::Conflict(msg),
            CoreError::ValidationError(msg) => ServerError::ValidationError(msg),
            CoreError::StateStoreError(msg) => ServerError::StateStoreError(msg),
            CoreError::ConfigurationError(msg) => ServerError::ConfigurationError(msg),
            other => ServerError::RuntimeError(other.to_string()),
        }
    }
}

impl From<KbError> for ServerError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::ValidationError(msg) => ServerError::ConfigurationError(msg),
            other => ServerError::KnowledgeBaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::ValidationError(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_http_meaningful_variants() {
        assert!(matches!(
            ServerError::from(CoreError::WorkflowNotFound("rag/x".into())),
            ServerError::NotFound(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::InstanceNotFound("run-1".into())),
            ServerError::NotFound(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::InvalidStateTransition("done".into())),
            ServerError::Conflict(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::TimerError("clock".into())),
            ServerError::RuntimeError(_)
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ServerError::NotFound("run-1".into()).to_string(),
            "Not found: run-1"
        );
        assert_eq!(
            ServerError::from(KbError::TransientVectorStoreError("down".into())).to_string(),
            "Knowledge base error: Vector store unavailable: down"
        );
    }
}
