//! Error types for the messaging core

use campus_database::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the synchronous messaging paths
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Message store error: {0}")]
    Store(String),

    #[error("Message not found: {0}")]
    MessageNotFound(Uuid),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Message has neither content nor attachment")]
    EmptyMessage,
}

impl From<DatabaseError> for MessagingError {
    fn from(error: DatabaseError) -> Self {
        MessagingError::Store(error.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;

/// Outcome of one best-effort push into a connection's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,

    #[error("connection outbound queue is full")]
    Full,
}

/// Why an inbound stream stopped yielding frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,

    #[error("transport error: {0}")]
    Io(String),
}
