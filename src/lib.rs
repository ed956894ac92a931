//! # Quizwire Client
//!
//! Transport-agnostic Rust client for the Quizwire real-time multiplayer
//! quiz protocol.
//!
//! This crate is the state-synchronization layer of a quiz client: it keeps
//! local lobby and game state consistent with an out-of-order stream of
//! server push events and request acknowledgments, across reconnects and
//! races between local actions and server confirmations. Rendering, routing
//! and styling are the caller's concern — drive the session types from your
//! view layer and display whatever state they hold.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`]/[`Connector`]
//!   traits for any backend
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   [`WebSocketTransport`]/[`WebSocketConnector`]
//! - **Event-driven** — receive typed [`QuizwireEvent`]s via a broadcast
//!   channel; dropping a receiver is the unsubscribe
//! - **Explicit state machines** — [`LobbySession`](lobby::LobbySession) and
//!   [`GameSession`](game::GameSession) hold one tagged phase value each, and
//!   every transition is a function of (state, event)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("ws://localhost:5001/ws");
//! let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());
//! conn.connect().await?;
//!
//! let mut directory = LobbyDirectory::new();
//! directory.refresh(&conn).await?;
//!
//! let name = PlayerName::new("Ann")?;
//! let lobby_id = directory.create(&conn, &name, "Ann's Game", "Music").await?;
//! let mut lobby = LobbySession::join(&conn, lobby_id, &name).await;
//!
//! while let Ok(event) = events.recv().await {
//!     lobby.apply_event(conn.session_id().as_deref(), &event);
//!     // … render, and hand control to a GameSession once
//!     //   lobby.phase() == &LobbyPhase::Starting …
//! }
//! ```

pub mod error;
pub mod event;
pub mod identity;
pub mod protocol;
pub mod transport;
pub mod transports;

#[cfg(feature = "tokio-runtime")]
pub mod connection;
#[cfg(feature = "tokio-runtime")]
pub mod directory;
#[cfg(feature = "tokio-runtime")]
pub mod game;
#[cfg(feature = "tokio-runtime")]
pub mod lobby;

/// Grace period before a session that ended in an error hands control back
/// to the lobby directory — long enough to read the message, and not a
/// retry.
pub const ERROR_RETURN_DELAY: std::time::Duration = std::time::Duration::from_secs(3);

// Re-export primary types for ergonomic imports.
pub use error::QuizwireError;
pub use event::QuizwireEvent;
pub use identity::{IdentityStore, PlayerName};
pub use protocol::{ClientRequest, ServerEvent, ServerMessage};
pub use transport::{BoxedTransport, Connector, Transport};

#[cfg(feature = "tokio-runtime")]
pub use connection::{QuizwireConfig, QuizwireConnection};
#[cfg(feature = "tokio-runtime")]
pub use directory::LobbyDirectory;
#[cfg(feature = "tokio-runtime")]
pub use game::{GamePhase, GameSession};
#[cfg(feature = "tokio-runtime")]
pub use lobby::{LobbyExit, LobbyPhase, LobbySession};

#[cfg(feature = "transport-websocket")]
pub use transports::websocket::{WebSocketConnector, WebSocketTransport};
