//! Transport abstraction for the Quizwire quiz protocol.
//!
//! The [`Transport`] trait defines a bidirectional text message channel
//! between the client and server. The quiz protocol uses JSON text messages,
//! so every transport implementation must handle message framing internally
//! (e.g., WebSocket frames, length-prefixed TCP, QUIC streams).
//!
//! # Connection Setup
//!
//! Connection parameters differ per backend (URLs for WebSocket, host:port
//! for TCP, …), so dialing lives behind the separate [`Connector`] trait: a
//! factory the connection manager calls whenever it needs a fresh transport.
//! This is what makes `connect()` idempotent and reconnects possible — the
//! manager never holds a dead transport it cannot replace.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use quizwire_client::error::QuizwireError;
//! use quizwire_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), QuizwireError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, QuizwireError>> {
//!         // Receive the next JSON text message
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), QuizwireError> {
//!         // Gracefully shut down the connection
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::QuizwireError;

/// A bidirectional text message transport for the Quizwire quiz protocol.
///
/// Implementors shuttle serialized JSON strings between the client and
/// server. Each call to [`send`](Transport::send) transmits one complete JSON
/// message. Each call to [`recv`](Transport::recv) returns one complete JSON
/// message.
///
/// # Object Safety
///
/// This trait is object-safe; the connection manager drives transports as
/// [`BoxedTransport`] so any backend a [`Connector`] produces can be used.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// used inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data. Channel-based implementations (e.g.,
/// wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`QuizwireError::TransportSend`] if the message could not be
    /// sent (e.g., connection broken, write buffer full).
    async fn send(&mut self, message: String) -> Result<(), QuizwireError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred (e.g., [`QuizwireError::TransportReceive`])
    /// - `None` — the connection was closed cleanly by the server
    ///
    /// # Cancel Safety
    ///
    /// This method **MUST** be cancel-safe (see [trait documentation](Transport)).
    async fn recv(&mut self) -> Option<Result<String, QuizwireError>>;

    /// Close the transport connection gracefully.
    ///
    /// After calling this method, subsequent calls to [`send`](Transport::send)
    /// and [`recv`](Transport::recv) may return errors or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), QuizwireError>;
}

/// A transport behind dynamic dispatch, as produced by a [`Connector`].
pub type BoxedTransport = Box<dyn Transport>;

#[async_trait]
impl Transport for BoxedTransport {
    async fn send(&mut self, message: String) -> Result<(), QuizwireError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Option<Result<String, QuizwireError>> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), QuizwireError> {
        (**self).close().await
    }
}

/// A factory that dials a fresh [`Transport`].
///
/// The connection manager calls [`connect`](Connector::connect) on the first
/// `connect()` and again for every reconnect. Implementations hold whatever
/// dialing parameters their backend needs and must be safe to call multiple
/// times.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a new transport connection.
    ///
    /// # Errors
    ///
    /// Returns the backend's connection error; the connection manager
    /// surfaces it as a `ConnectError` event and leaves the client
    /// disconnected.
    async fn connect(&self) -> Result<BoxedTransport, QuizwireError>;
}
