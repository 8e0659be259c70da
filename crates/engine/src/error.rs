//! Error types for the workflow store and engine.

use thiserror::Error;

/// Errors raised by [`WorkflowStore`](crate::store::WorkflowStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Workflow already exists: {id}")]
    Duplicate { id: String },

    #[error("Workflow not found: {id}")]
    NotFound { id: String },
}

/// Errors returned synchronously to callers of the engine.
///
/// Stage failures are not part of this type: they are recorded on the
/// workflow and observed through status/result queries.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid workflow request: {reason}")]
    Validation { reason: String },

    #[error("Workflow already exists: {id}")]
    DuplicateWorkflow { id: String },

    #[error("Workflow not found: {id}")]
    NotFound { id: String },

    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate { id } => EngineError::DuplicateWorkflow { id },
            StoreError::NotFound { id } => EngineError::NotFound { id },
        }
    }
}
