//! Error types for the subscription core.

use thiserror::Error;

/// Errors surfaced by watchers and the external service clients they drive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The call's context was cancelled. Terminal for a consumption loop.
    #[error("operation cancelled")]
    Cancelled,

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rpc failed: {0}")]
    Rpc(String),
}

impl ControllerError {
    /// True for the cancellation outcome, which loops treat as a clean exit.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ControllerError::Cancelled)
    }
}

/// Errors returned by catalog mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog is closed")]
    Closed,
}

/// Result type for watcher and client operations.
pub type Result<T> = std::result::Result<T, ControllerError>;
