use thiserror::Error;

/// Core error type for the RAGFlow runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No workflow is registered for an event
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Workflow instance not found
    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(String),

    /// A lifecycle transition was attempted from a state that does not allow it
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Step execution error
    #[error("Step execution error: {0}")]
    StepExecutionError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Timer error
    #[error("Timer error: {0}")]
    TimerError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// External dependency error (network, vector store, model provider)
    #[error("External dependency error: {0}")]
    ExternalDependencyError(String),

    /// An external call did not answer in time
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether the step executor should retry an action that failed with this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::ExternalDependencyError(_) | CoreError::TimeoutError(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => CoreError::TimeoutError(err.to_string()),
            _ => CoreError::Other(format!("I/O error: {}", err)),
        }
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
