#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Quizwire client integration tests.
//!
//! Provides a scripted [`MockTransport`] plus a [`ServerHandle`] for playing
//! the server side of a conversation: push events at any time, auto-answer
//! requests with queued acknowledgment payloads, and close the transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use quizwire_client::connection::{QuizwireConfig, QuizwireConnection};
use quizwire_client::protocol::{
    AckEnvelope, LobbyDetails, LobbySettings, LobbyStatus, LobbySummary, NewQuestionPayload,
    PlayerRef, PlayerScore, Question, RequestEnvelope, ServerEvent, ServerMessage,
};
use quizwire_client::{Connector, QuizwireError, QuizwireEvent, Transport};

type Incoming = Option<Result<String, QuizwireError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// An in-memory transport driven from the test through a [`ServerHandle`].
///
/// `recv()` drains a shared queue (hanging when empty, like a quiet socket).
/// `send()` records the outgoing request and, when an acknowledgment payload
/// has been queued, immediately answers it with the request's own `ackId`.
pub struct MockTransport {
    queue: Arc<StdMutex<VecDeque<Incoming>>>,
    notify: Arc<Notify>,
    ack_data: Arc<StdMutex<VecDeque<serde_json::Value>>>,
    sent: Arc<StdMutex<Vec<String>>>,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Self, ServerHandle) {
        let transport = Self {
            queue: Arc::new(StdMutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            ack_data: Arc::new(StdMutex::new(VecDeque::new())),
            sent: Arc::new(StdMutex::new(Vec::new())),
            fail_sends: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let handle = ServerHandle {
            queue: Arc::clone(&transport.queue),
            notify: Arc::clone(&transport.notify),
            ack_data: Arc::clone(&transport.ack_data),
            sent: Arc::clone(&transport.sent),
            fail_sends: Arc::clone(&transport.fail_sends),
            closed: Arc::clone(&transport.closed),
        };
        (transport, handle)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), QuizwireError> {
        if self.fail_sends.load(Ordering::Acquire) {
            return Err(QuizwireError::TransportSend("mock send failure".into()));
        }
        let envelope: RequestEnvelope = serde_json::from_str(&message).unwrap();
        self.sent.lock().unwrap().push(message);
        if let Some(data) = self.ack_data.lock().unwrap().pop_front() {
            let ack = ServerMessage::Ack(AckEnvelope {
                ack_id: envelope.ack_id,
                data,
            });
            self.queue
                .lock()
                .unwrap()
                .push_back(Some(Ok(serde_json::to_string(&ack).unwrap())));
            self.notify.notify_one();
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, QuizwireError>> {
        loop {
            if let Some(item) = self.queue.lock().unwrap().pop_front() {
                return item;
            }
            // Queue drained — wait like a quiet socket until the test (or an
            // auto-ack) pushes something.
            self.notify.notified().await;
        }
    }

    async fn close(&mut self) -> Result<(), QuizwireError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Test-side remote control for a [`MockTransport`].
#[derive(Clone)]
pub struct ServerHandle {
    queue: Arc<StdMutex<VecDeque<Incoming>>>,
    notify: Arc<Notify>,
    ack_data: Arc<StdMutex<VecDeque<serde_json::Value>>>,
    sent: Arc<StdMutex<Vec<String>>>,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Push a server event to the client.
    pub fn push_event(&self, event: ServerEvent) {
        let json = serde_json::to_string(&ServerMessage::Event(event)).unwrap();
        self.push_raw(Some(Ok(json)));
    }

    /// Push a raw frame (malformed JSON, receive error, or `None` close).
    pub fn push_raw(&self, item: Incoming) {
        self.queue.lock().unwrap().push_back(item);
        self.notify.notify_one();
    }

    /// Close the transport from the server side.
    pub fn close_connection(&self) {
        self.push_raw(None);
    }

    /// Queue the acknowledgment payload for the next outgoing request.
    pub fn queue_ack(&self, data: serde_json::Value) {
        self.ack_data.lock().unwrap().push_back(data);
    }

    /// Make subsequent `send` calls fail, dropping the connection.
    pub fn fail_next_sends(&self) {
        self.fail_sends.store(true, Ordering::Release);
    }

    /// Whether `close()` was called on the transport.
    pub fn transport_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// All requests sent by the client, parsed.
    pub fn sent_requests(&self) -> Vec<RequestEnvelope> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// A connector yielding scripted transports in order; dialing past the
/// script fails like an unreachable server.
pub struct MockConnector {
    transports: StdMutex<VecDeque<MockTransport>>,
}

impl MockConnector {
    pub fn new(transports: Vec<MockTransport>) -> Self {
        Self {
            transports: StdMutex::new(VecDeque::from(transports)),
        }
    }

    pub fn single(transport: MockTransport) -> Self {
        Self::new(vec![transport])
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<quizwire_client::BoxedTransport, QuizwireError> {
        match self.transports.lock().unwrap().pop_front() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(QuizwireError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "no transport scripted",
            ))),
        }
    }
}

// ── Connection helpers ──────────────────────────────────────────────

/// Start a connected client whose server identity is `session_id`. Returns
/// once the `Connected` event has been observed.
pub async fn connect_client(
    session_id: &str,
) -> (
    QuizwireConnection,
    broadcast::Receiver<QuizwireEvent>,
    ServerHandle,
) {
    connect_client_with_config(session_id, QuizwireConfig::new()).await
}

/// Same as [`connect_client`] with a custom config.
pub async fn connect_client_with_config(
    session_id: &str,
    config: QuizwireConfig,
) -> (
    QuizwireConnection,
    broadcast::Receiver<QuizwireEvent>,
    ServerHandle,
) {
    let (transport, server) = MockTransport::new();
    let (conn, mut events) = QuizwireConnection::new(MockConnector::single(transport), config);

    conn.connect().await.expect("mock dial should succeed");
    server.push_event(ServerEvent::Connected {
        session_id: session_id.into(),
    });

    let event = recv_event(&mut events).await;
    assert!(
        matches!(event, QuizwireEvent::Connected { .. }),
        "first event should be Connected, got {event:?}"
    );

    (conn, events, server)
}

/// Receive the next event, failing the test after one second of silence.
pub async fn recv_event(rx: &mut broadcast::Receiver<QuizwireEvent>) -> QuizwireEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

// ── Fixture builders ────────────────────────────────────────────────

pub fn player(id: &str, name: &str) -> PlayerRef {
    PlayerRef {
        id: id.into(),
        name: name.into(),
    }
}

pub fn lobby_summary(id: &str, name: &str, host_name: &str) -> LobbySummary {
    LobbySummary {
        id: id.into(),
        name: name.into(),
        host_name: host_name.into(),
        category: "Music".into(),
        player_count: 1,
        max_players: 8,
        status: LobbyStatus::Waiting,
    }
}

pub fn lobby_details(lobby_id: &str, host: &PlayerRef, players: &[PlayerRef]) -> LobbyDetails {
    LobbyDetails {
        id: lobby_id.into(),
        name: format!("{}'s Game", host.name),
        settings: LobbySettings {
            category: "Music".into(),
            max_players: 8,
        },
        host: host.clone(),
        players: players.to_vec(),
    }
}

pub fn question_payload(question_id: &str, number: u32, time_limit: u32) -> NewQuestionPayload {
    NewQuestionPayload {
        question: Question {
            id: question_id.into(),
            text: "Which instrument has 88 keys?".into(),
            options: vec![
                "Violin".into(),
                "Piano".into(),
                "Drums".into(),
                "Flute".into(),
            ],
        },
        question_number: number,
        total_questions: 3,
        time_limit,
        players: vec![score("S1", "Ann", 0), score("S2", "Bo", 0)],
    }
}

pub fn score(id: &str, name: &str, points: i64) -> PlayerScore {
    PlayerScore {
        id: id.into(),
        name: name.into(),
        score: points,
    }
}

// ── Ack payload builders ────────────────────────────────────────────

pub fn ok_ack() -> serde_json::Value {
    serde_json::json!({ "success": true })
}

pub fn failed_ack(message: &str) -> serde_json::Value {
    serde_json::json!({ "success": false, "message": message })
}

pub fn create_lobby_ack(lobby_id: &str) -> serde_json::Value {
    serde_json::json!({ "success": true, "lobbyId": lobby_id })
}

pub fn join_lobby_ack(details: &LobbyDetails) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "lobbyDetails": serde_json::to_value(details).unwrap(),
    })
}

pub fn lobbies_ack(lobbies: &[LobbySummary]) -> serde_json::Value {
    serde_json::to_value(lobbies).unwrap()
}

pub fn lobbies_error_ack(error: &str) -> serde_json::Value {
    serde_json::json!({ "error": error })
}
