//! Error types for Blobwatch

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Container Errors
    #[error("The specified container does not exist: {0}")]
    NoSuchContainer(String),

    #[error("Invalid container name: {0}")]
    InvalidContainerName(String),

    // Object Errors
    #[error("The specified object does not exist: {container}/{path}")]
    NoSuchObject { container: String, path: String },

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    // Queue Errors
    #[error("The specified queue does not exist: {0}")]
    NoSuchQueue(String),

    #[error("The specified message does not exist or its pop receipt expired: {0}")]
    NoSuchMessage(String),

    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    // Concurrency Errors
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    // Validation Errors
    #[error("Invalid path pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Infrastructure Errors
    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Storage backend error: {0}")]
    StorageError(String),

    #[error("Queue backend error: {0}")]
    QueueError(String),

    // Internal Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn no_such_object(container: impl Into<String>, path: impl Into<String>) -> Self {
        Error::NoSuchObject {
            container: container.into(),
            path: path.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::NoSuchContainer(_) => "ContainerNotFound",
            Error::InvalidContainerName(_) => "InvalidContainerName",
            Error::NoSuchObject { .. } => "BlobNotFound",
            Error::InvalidPath(_) => "InvalidBlobName",
            Error::NoSuchQueue(_) => "QueueNotFound",
            Error::NoSuchMessage(_) => "MessageNotFound",
            Error::InvalidQueueName(_) => "InvalidQueueName",
            Error::PreconditionFailed(_) => "ConditionNotMet",
            Error::InvalidPattern(_) => "InvalidPathPattern",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::ServiceUnavailable(_) => "ServerBusy",
            Error::StorageError(_) => "InternalError",
            Error::QueueError(_) => "InternalError",
            Error::Serialization(_) => "InvalidMessageContent",
            Error::InternalError(_) => "InternalError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Object, container, queue or message is gone
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NoSuchContainer(_)
                | Error::NoSuchObject { .. }
                | Error::NoSuchQueue(_)
                | Error::NoSuchMessage(_)
        )
    }

    /// Optimistic concurrency check lost against another writer
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::PreconditionFailed(_))
    }

    /// Failures worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable(_)
                | Error::StorageError(_)
                | Error::QueueError(_)
                | Error::Io(_)
        )
    }
}
