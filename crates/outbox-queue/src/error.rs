//! Queue errors.

use thiserror::Error;

use outbox_config::ConfigError;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Durable store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload holds a value the store cannot keep verbatim.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The queue was built without an operation handler.
    #[error("An operation handler is required")]
    MissingHandler,

    /// `start` was called twice.
    #[error("Queue is already started")]
    AlreadyStarted,

    /// `start` was called after `stop`.
    #[error("Queue has been stopped")]
    Stopped,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        QueueError::Storage(e.to_string())
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        QueueError::Storage(e.to_string())
    }
}
