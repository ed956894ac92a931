//! Wire-compatible protocol types for the Quizwire quiz protocol.
//!
//! Every type in this module produces JSON identical to what the Quizwire
//! server emits and accepts. Messages travel as JSON text over any
//! [`Transport`](crate::transport::Transport):
//!
//! - Client → server: [`RequestEnvelope`] — an event-named request carrying a
//!   client-minted `ackId`. The server answers each request exactly once with
//!   an acknowledgment envelope echoing that id.
//! - Server → client: [`ServerMessage`] — either an [`AckEnvelope`] answering
//!   a request, or a [`ServerEvent`] pushed without acknowledgment.
//!
//! Identifiers issued by the server (session, lobby, question) are opaque
//! strings; consumers must not parse or compare them beyond equality.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned connection identity. Doubles as the local player's key
/// inside lobby and game entities. Re-issued (possibly with a different
/// value) on every reconnect — never assume stability across connections.
pub type SessionId = String;

/// Unique identifier for lobbies.
pub type LobbyId = String;

/// Unique identifier for questions.
pub type QuestionId = String;

/// Client-generated correlation id for request acknowledgments.
pub type AckId = Uuid;

// ── Enums ───────────────────────────────────────────────────────────

/// Whether a lobby is still gathering players or already mid-game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LobbyStatus {
    #[default]
    Waiting,
    Playing,
}

// ── Structs ─────────────────────────────────────────────────────────

/// One entry in the joinable-lobby listing.
///
/// A read-only snapshot: each `lobbiesListUpdate` or `getLobbies` ack fully
/// replaces the previous listing, entry by entry — never patched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbySummary {
    pub id: LobbyId,
    pub name: String,
    pub host_name: String,
    pub category: String,
    pub player_count: u32,
    pub max_players: u32,
    pub status: LobbyStatus,
}

/// Settings chosen when a lobby was created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbySettings {
    pub category: String,
    pub max_players: u32,
}

/// A player as referenced inside lobby state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    pub id: SessionId,
    pub name: String,
}

/// Full state of one lobby.
///
/// Mutated only by substituting whole snapshots received from the server;
/// join/leave requests never edit this speculatively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbyDetails {
    pub id: LobbyId,
    pub name: String,
    pub settings: LobbySettings,
    pub host: PlayerRef,
    /// Members in join order, unique by id.
    pub players: Vec<PlayerRef>,
}

/// A quiz question as presented to players.
///
/// The correct option index is withheld by the server until the round
/// resolves; it arrives separately via `answerFeedback` or `roundEnd`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    /// At least two options, in presentation order.
    pub options: Vec<String>,
}

/// One scoreboard row. Score broadcasts replace the whole list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScore {
    pub id: SessionId,
    pub name: String,
    pub score: i64,
}

// ── Payload structs ─────────────────────────────────────────────────

/// Payload for the `newQuestion` push event.
/// Boxed in [`ServerEvent`] to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestionPayload {
    pub question: Question,
    /// 1-based position of this question within the game.
    pub question_number: u32,
    pub total_questions: u32,
    /// Answer window in seconds; seeds the local countdown.
    pub time_limit: u32,
    /// Current scoreboard. Empty when the server omits it.
    #[serde(default)]
    pub players: Vec<PlayerScore>,
}

// ── Acknowledgment payloads ─────────────────────────────────────────

/// Acknowledgment payload for `createLobby`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby_id: Option<LobbyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgment payload for `joinLobby`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby_details: Option<LobbyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgment payload for `leaveLobby`, `startGame` and `submitAnswer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgment payload for `getLobbies`: either the full listing or an
/// error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LobbiesAck {
    Lobbies(Vec<LobbySummary>),
    Failed { error: String },
}

// ── Messages ────────────────────────────────────────────────────────

/// Request types sent from client to server. Every request expects exactly
/// one acknowledgment, correlated via [`RequestEnvelope::ack_id`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    /// Create a new lobby hosted by this player.
    CreateLobby {
        player_name: String,
        lobby_name: String,
        category: String,
    },
    /// Fetch the current lobby listing.
    GetLobbies {},
    /// Join an existing lobby.
    JoinLobby {
        lobby_id: LobbyId,
        player_name: String,
    },
    /// Leave the lobby the player is currently in.
    LeaveLobby { lobby_id: LobbyId },
    /// Host-only: start the game. Success does not start anything locally —
    /// all participants transition on the `gameStarted` broadcast.
    StartGame { lobby_id: LobbyId },
    /// Submit the local player's answer for the current question.
    SubmitAnswer {
        lobby_id: LobbyId,
        question_id: QuestionId,
        answer_index: usize,
    },
}

/// Envelope for a client request on the wire: the request plus the
/// client-minted acknowledgment correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub ack_id: AckId,
    #[serde(flatten)]
    pub request: ClientRequest,
}

/// Server acknowledgment of a single request. `data` is the request-specific
/// ack payload ([`CreateLobbyAck`], [`LobbiesAck`], …).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckEnvelope {
    pub ack_id: AckId,
    pub data: serde_json::Value,
}

/// Events pushed from server to client with no acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First event after the transport opens: the server assigns this
    /// connection's identity. Re-sent with a fresh id after a reconnect.
    Connected { session_id: SessionId },
    /// Full replacement of the joinable-lobby listing.
    LobbiesListUpdate(Vec<LobbySummary>),
    /// A player joined the lobby. `lobby_details` is the authoritative
    /// snapshot; `player` exists for display only.
    PlayerJoined {
        player: PlayerRef,
        lobby_details: LobbyDetails,
    },
    /// A player left the lobby. When `player_id` equals the local session id
    /// this client has itself been removed.
    PlayerLeft {
        player_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
        lobby_details: LobbyDetails,
    },
    /// Host authority was reassigned.
    NewHost {
        host: PlayerRef,
        lobby_details: LobbyDetails,
    },
    /// The game for this lobby is starting.
    GameStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lobby_id: Option<LobbyId>,
    },
    /// This client was removed from the lobby by the host.
    Kicked { message: String },
    /// The lobby was torn down.
    LobbyClosed,
    /// A new question opens the next round (boxed to reduce enum size).
    NewQuestion(Box<NewQuestionPayload>),
    /// Full replacement of the scoreboard.
    ScoreUpdate(Vec<PlayerScore>),
    /// Per-player resolution of the local player's submitted answer.
    AnswerFeedback {
        correct: bool,
        correct_answer_index: usize,
        score_earned: i64,
    },
    /// Round resolution broadcast to all players; used when no personal
    /// feedback was received (e.g. the player never answered).
    RoundEnd { correct_answer_index: usize },
    /// The game finished; final scores attached. The lobby is torn down.
    GameOver { players: Vec<PlayerScore> },
    /// The game failed server-side and cannot continue.
    GameError { message: String },
    /// Generic server error outside any particular flow.
    Error { message: String },
}

/// Any message the server can send: an acknowledgment or a push event.
///
/// Deserialization distinguishes the two by shape — acknowledgments carry an
/// `ackId`, push events carry an `event` name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Ack(AckEnvelope),
    Event(ServerEvent),
}
