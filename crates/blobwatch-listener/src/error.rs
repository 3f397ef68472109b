//! Listener error types

use thiserror::Error;

/// Result type for listener operations
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Listener-related errors
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Function already registered: {0}")]
    DuplicateFunction(String),

    #[error("Enqueue to {queue} failed after {attempts} attempts: {source}")]
    EnqueueFailed {
        queue: String,
        attempts: u32,
        #[source]
        source: blobwatch_core::Error,
    },

    #[error("Shared listener for key {0} has an unexpected type")]
    SharedTypeMismatch(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Storage error: {0}")]
    Storage(#[from] blobwatch_core::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ListenerError {
    /// Startup errors abort the registration that caused them
    pub fn is_fatal_startup(&self) -> bool {
        matches!(
            self,
            ListenerError::InvalidRegistration(_)
                | ListenerError::DuplicateFunction(_)
                | ListenerError::SharedTypeMismatch(_)
        ) || matches!(
            self,
            ListenerError::Storage(e) if !e.is_transient()
        )
    }
}
