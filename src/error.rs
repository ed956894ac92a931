//! Error types for the Quizwire client.

use thiserror::Error;

/// Errors that can occur when using the Quizwire client.
#[derive(Debug, Error)]
pub enum QuizwireError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Local input was rejected before any network call was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// The server acknowledged a request with `success: false`.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The acknowledgment for a request never arrived — either the ack
    /// timeout elapsed or the connection dropped while the request was in
    /// flight. The in-flight action must be treated as failed, never as
    /// silently succeeded.
    #[error("acknowledgment never arrived")]
    AckTimeout,

    /// An answer was already submitted for the current question.
    #[error("answer already submitted for this question")]
    AlreadyAnswered,

    /// Attempted to answer while no question is active.
    #[error("no active question")]
    NoActiveQuestion,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Quizwire client operations.
pub type Result<T> = std::result::Result<T, QuizwireError>;
