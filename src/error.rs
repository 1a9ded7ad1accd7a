//! Error types for nsp-socket.

use thiserror::Error;

/// Main error type for socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Attempted to emit an event whose name is reserved for lifecycle notifications.
    #[error("\"{0}\" is a reserved event name")]
    ReservedEvent(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while draining a streaming body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error (unknown packet type, malformed text packet, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An outgoing request method is not an HTTP token.
    #[error("Invalid request method: {0:?}")]
    InvalidMethod(String),

    /// An ack reply could not be read as `(headers?, status, ...body)`.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// The reply channel was dropped before an answer arrived.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using SocketError.
pub type Result<T> = std::result::Result<T, SocketError>;
