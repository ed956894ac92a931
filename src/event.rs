//! Typed events delivered to Quizwire client consumers.
//!
//! [`QuizwireEvent`] is what comes out of the connection's broadcast channel:
//! every server push event, plus synthetic transport-lifecycle events
//! ([`Disconnected`](QuizwireEvent::Disconnected),
//! [`ConnectError`](QuizwireEvent::ConnectError)) emitted by the transport
//! loop itself. Lifecycle and push events share one channel so sessions can
//! react to both uniformly — a directory re-fetches on `Connected`, a lobby
//! or game session terminates on `Disconnected`.

use crate::protocol::{
    LobbyDetails, LobbyId, LobbySummary, NewQuestionPayload, PlayerRef, PlayerScore, ServerEvent,
    SessionId,
};

/// An event observed on a Quizwire connection.
///
/// Wire push events map 1:1 from [`ServerEvent`]; the lifecycle variants are
/// synthesized by the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizwireEvent {
    /// The server assigned this connection's identity. Also the reconnect
    /// signal: any state held across the preceding gap is stale and must be
    /// re-fetched.
    Connected { session_id: SessionId },
    /// The transport dropped. Pending acknowledgments have already been
    /// failed; no further events arrive until a fresh `connect()`.
    Disconnected { reason: Option<String> },
    /// A `connect()` attempt failed before the transport was established.
    ConnectError { message: String },
    /// Full replacement of the joinable-lobby listing.
    LobbiesListUpdate { lobbies: Vec<LobbySummary> },
    /// A player joined the current lobby (full snapshot attached).
    PlayerJoined {
        player: PlayerRef,
        lobby_details: LobbyDetails,
    },
    /// A player left the current lobby (full snapshot attached).
    PlayerLeft {
        player_id: SessionId,
        player_name: Option<String>,
        lobby_details: LobbyDetails,
    },
    /// Host authority was reassigned (full snapshot attached).
    NewHost {
        host: PlayerRef,
        lobby_details: LobbyDetails,
    },
    /// The game for the current lobby is starting.
    GameStarted { lobby_id: Option<LobbyId> },
    /// This client was removed from the lobby by the host.
    Kicked { message: String },
    /// The current lobby was torn down.
    LobbyClosed,
    /// A new question opens the next round.
    NewQuestion(Box<NewQuestionPayload>),
    /// Full replacement of the scoreboard.
    ScoreUpdate { players: Vec<PlayerScore> },
    /// Resolution of the local player's submitted answer.
    AnswerFeedback {
        correct: bool,
        correct_answer_index: usize,
        score_earned: i64,
    },
    /// Round resolution for players without personal feedback.
    RoundEnd { correct_answer_index: usize },
    /// The game finished with final scores.
    GameOver { players: Vec<PlayerScore> },
    /// The game failed server-side.
    GameError { message: String },
    /// Generic server error outside any particular flow.
    ServerError { message: String },
}

impl From<ServerEvent> for QuizwireEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::Connected { session_id } => Self::Connected { session_id },
            ServerEvent::LobbiesListUpdate(lobbies) => Self::LobbiesListUpdate { lobbies },
            ServerEvent::PlayerJoined {
                player,
                lobby_details,
            } => Self::PlayerJoined {
                player,
                lobby_details,
            },
            ServerEvent::PlayerLeft {
                player_id,
                player_name,
                lobby_details,
            } => Self::PlayerLeft {
                player_id,
                player_name,
                lobby_details,
            },
            ServerEvent::NewHost {
                host,
                lobby_details,
            } => Self::NewHost {
                host,
                lobby_details,
            },
            ServerEvent::GameStarted { lobby_id } => Self::GameStarted { lobby_id },
            ServerEvent::Kicked { message } => Self::Kicked { message },
            ServerEvent::LobbyClosed => Self::LobbyClosed,
            ServerEvent::NewQuestion(payload) => Self::NewQuestion(payload),
            ServerEvent::ScoreUpdate(players) => Self::ScoreUpdate { players },
            ServerEvent::AnswerFeedback {
                correct,
                correct_answer_index,
                score_earned,
            } => Self::AnswerFeedback {
                correct,
                correct_answer_index,
                score_earned,
            },
            ServerEvent::RoundEnd {
                correct_answer_index,
            } => Self::RoundEnd {
                correct_answer_index,
            },
            ServerEvent::GameOver { players } => Self::GameOver { players },
            ServerEvent::GameError { message } => Self::GameError { message },
            ServerEvent::Error { message } => Self::ServerError { message },
        }
    }
}
