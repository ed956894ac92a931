//! Connection manager for the Quizwire quiz protocol.
//!
//! [`QuizwireConnection`] owns the single persistent connection every other
//! component shares. It is a cheap-to-clone handle around a background
//! transport loop task:
//!
//! - **Requests** are event-named messages carrying a client-minted `ackId`;
//!   [`QuizwireConnection::request`] awaits the server's acknowledgment,
//!   [`QuizwireConnection::request_deferred`] splits issue and await so the
//!   caller can keep processing pushed events while an ack is in flight.
//!   An ack resolves at most once; if the connection drops first the pending
//!   future fails with [`QuizwireError::AckTimeout`] — it never fires late.
//! - **Push events** fan out on a [`tokio::sync::broadcast`] channel as
//!   [`QuizwireEvent`]s. Subscribing is [`QuizwireConnection::subscribe`];
//!   dropping the receiver is the unsubscribe, which ties handler lifetime
//!   to the owning session. Transport lifecycle (`Connected`,
//!   `Disconnected`, `ConnectError`) is delivered on the same channel.
//! - **Reconnecting** is this component's sole responsibility: `connect()`
//!   is a no-op while connected and re-dials the [`Connector`] after a drop.
//!   The server assigns a fresh session id each time, so dependents re-fetch
//!   authoritative state on every `Connected` event instead of resuming in
//!   place.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("ws://localhost:5001/ws");
//! let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());
//! conn.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         QuizwireEvent::Connected { session_id } => { /* … */ }
//!         QuizwireEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{QuizwireError, Result};
use crate::event::QuizwireEvent;
use crate::protocol::{
    AckEnvelope, AckId, ClientRequest, RequestEnvelope, ServerEvent, ServerMessage, SessionId,
};
use crate::transport::{BoxedTransport, Connector, Transport};

/// Default timeout for a request acknowledgment.
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the broadcast event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Lock a mutex, recovering the guard if a holder panicked mid-update.
fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`QuizwireConnection`].
///
/// All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use quizwire_client::connection::QuizwireConfig;
/// use std::time::Duration;
///
/// let config = QuizwireConfig::new()
///     .with_ack_timeout(Duration::from_secs(5))
///     .with_event_channel_capacity(512);
/// assert_eq!(config.ack_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct QuizwireConfig {
    /// How long a request waits for its acknowledgment before the in-flight
    /// action is treated as failed.
    ///
    /// Defaults to **10 seconds**.
    pub ack_timeout: Duration,
    /// Capacity of the broadcast event channel.
    ///
    /// A subscriber that cannot keep up with incoming events observes a
    /// `Lagged` gap rather than blocking the transport loop.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`QuizwireConnection::disconnect`] is called, the background
    /// transport loop is given this much time to close the transport and
    /// emit a final `Disconnected` event. If the timeout expires the task is
    /// aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl QuizwireConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the acknowledgment timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the capacity of the broadcast event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for QuizwireConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between connection handles and the transport loop.
struct ConnectionState {
    connected: AtomicBool,
    /// Server-assigned identity; cleared on every disconnect.
    session_id: StdMutex<Option<SessionId>>,
    /// Requests awaiting acknowledgment, keyed by correlation id.
    pending_acks: StdMutex<HashMap<AckId, oneshot::Sender<serde_json::Value>>>,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            session_id: StdMutex::new(None),
            pending_acks: StdMutex::new(HashMap::new()),
        }
    }
}

/// State shared only between connection handles, never the loop. When the
/// last handle drops, the command sender drops with it and the loop shuts
/// down on the closed channel.
struct HandleShared {
    /// Sender half of the command channel to the current transport loop.
    /// Replaced on every successful `connect()`.
    cmd_tx: StdMutex<Option<mpsc::UnboundedSender<RequestEnvelope>>>,
    /// Handle to the current background transport loop task.
    task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: StdMutex<Option<oneshot::Sender<()>>>,
}

// ── Connection handle ───────────────────────────────────────────────

/// Handle to the shared Quizwire server connection.
///
/// Created via [`QuizwireConnection::new`]. Clones share the same underlying
/// connection; pass a clone (or a reference) into each session component —
/// no component other than the top-level owner may call
/// [`disconnect`](Self::disconnect).
#[derive(Clone)]
pub struct QuizwireConnection {
    connector: Arc<dyn Connector>,
    state: Arc<ConnectionState>,
    handle: Arc<HandleShared>,
    event_tx: broadcast::Sender<QuizwireEvent>,
    ack_timeout: Duration,
    shutdown_timeout: Duration,
}

impl QuizwireConnection {
    /// Create a connection handle and its first event receiver.
    ///
    /// No network activity happens yet; call [`connect`](Self::connect) to
    /// dial the server. The receiver observes every event from every
    /// connection attempt, across reconnects.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn new(
        connector: impl Connector,
        config: QuizwireConfig,
    ) -> (Self, broadcast::Receiver<QuizwireEvent>) {
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = broadcast::channel(capacity);

        let connection = Self {
            connector: Arc::new(connector),
            state: Arc::new(ConnectionState::new()),
            handle: Arc::new(HandleShared {
                cmd_tx: StdMutex::new(None),
                task: StdMutex::new(None),
                shutdown_tx: StdMutex::new(None),
            }),
            event_tx,
            ack_timeout: config.ack_timeout,
            shutdown_timeout: config.shutdown_timeout,
        };

        (connection, event_rx)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Establish the transport if not already connected.
    ///
    /// A no-op while connected — calling again never creates a duplicate
    /// session. After a disconnect this is also the reconnect path: the
    /// connector is re-dialed and the server assigns a fresh session id,
    /// announced via [`QuizwireEvent::Connected`].
    ///
    /// Drive connection lifecycle from a single task; concurrent `connect`
    /// calls are not supported.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when dialing fails. The same failure is
    /// also emitted as [`QuizwireEvent::ConnectError`] so subscribers observe
    /// it uniformly.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            debug!("connect() called while already connected; ignoring");
            return Ok(());
        }

        let transport = match self.connector.connect().await {
            Ok(transport) => transport,
            Err(e) => {
                error!("connection attempt failed: {e}");
                emit_event(
                    &self.event_tx,
                    QuizwireEvent::ConnectError {
                        message: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<RequestEnvelope>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        *lock(&self.handle.cmd_tx) = Some(cmd_tx);
        *lock(&self.handle.shutdown_tx) = Some(shutdown_tx);
        self.state.connected.store(true, Ordering::Release);

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            self.event_tx.clone(),
            Arc::clone(&self.state),
            shutdown_rx,
        ));
        *lock(&self.handle.task) = Some(task);

        Ok(())
    }

    /// Close the connection, stopping the background transport loop.
    ///
    /// The only sanctioned top-level close: session components must never
    /// call this. Subscribers receive a final `Disconnected` event once the
    /// loop exits.
    pub async fn disconnect(&self) {
        debug!("disconnect requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = lock(&self.handle.shutdown_tx).take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in
        // time, abort it so the task cannot detach and run indefinitely.
        let task = lock(&self.handle.task).take();
        if let Some(mut task) = task {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── Requests ────────────────────────────────────────────────────

    /// Send a request and await its typed acknowledgment.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::NotConnected`] if no transport is up,
    /// [`QuizwireError::AckTimeout`] if the acknowledgment never arrives
    /// (including when the connection drops mid-flight), or
    /// [`QuizwireError::Serialization`] if the ack payload has an unexpected
    /// shape.
    pub async fn request<T: serde::de::DeserializeOwned>(
        &self,
        request: ClientRequest,
    ) -> Result<T> {
        self.request_deferred(request)?.ack().await
    }

    /// Send a request and return a [`PendingAck`] to await separately.
    ///
    /// Use this when the caller must keep processing pushed events while the
    /// acknowledgment is in flight (e.g. answer submission during a live
    /// round).
    ///
    /// # Errors
    ///
    /// Returns [`QuizwireError::NotConnected`] if the transport is down.
    pub fn request_deferred(&self, request: ClientRequest) -> Result<PendingAck> {
        if !self.is_connected() {
            return Err(QuizwireError::NotConnected);
        }

        let ack_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        lock(&self.state.pending_acks).insert(ack_id, tx);

        let envelope = RequestEnvelope { ack_id, request };
        let queued = match lock(&self.handle.cmd_tx).as_ref() {
            Some(cmd_tx) => cmd_tx.send(envelope).is_ok(),
            None => false,
        };
        if !queued {
            lock(&self.state.pending_acks).remove(&ack_id);
            return Err(QuizwireError::NotConnected);
        }

        debug!(ack_id = %ack_id, "request queued");
        Ok(PendingAck {
            ack_id,
            rx: Some(rx),
            timeout: self.ack_timeout,
            state: Arc::downgrade(&self.state),
        })
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Subscribe to the event stream.
    ///
    /// Multiple subscribers are allowed; each receives every event from the
    /// subscription point on. Dropping the receiver is the unsubscribe — tie
    /// the receiver's lifetime to the session that registered it so a torn
    /// down session can never act on events for an unrelated context. A slow
    /// subscriber observes [`broadcast::error::RecvError::Lagged`] instead of
    /// blocking the transport loop.
    pub fn subscribe(&self) -> broadcast::Receiver<QuizwireEvent> {
        self.event_tx.subscribe()
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// The server-assigned session identity, if connected and assigned.
    ///
    /// This value keys the local player inside lobby and game entities. It
    /// changes on every reconnect, so read it at use time — never cache it
    /// across a `Disconnected`/`Connected` pair.
    pub fn session_id(&self) -> Option<SessionId> {
        lock(&self.state.session_id).clone()
    }
}

impl std::fmt::Debug for QuizwireConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizwireConnection")
            .field("connected", &self.is_connected())
            .field("session_id", &self.session_id())
            .finish()
    }
}

// ── Pending acknowledgment ──────────────────────────────────────────

/// A request that has been sent and is awaiting its acknowledgment.
///
/// Resolve with [`ack`](Self::ack). The underlying callback fires at most
/// once; if the connection drops before the server answers, `ack` fails with
/// [`QuizwireError::AckTimeout`] rather than ever resolving successfully.
/// Dropping a `PendingAck` deregisters the request, so a late acknowledgment
/// for an abandoned request is discarded by the transport loop.
#[derive(Debug)]
pub struct PendingAck {
    ack_id: AckId,
    rx: Option<oneshot::Receiver<serde_json::Value>>,
    timeout: Duration,
    state: Weak<ConnectionState>,
}

impl PendingAck {
    /// The correlation id this request was sent with.
    pub fn ack_id(&self) -> AckId {
        self.ack_id
    }

    /// Await the acknowledgment and deserialize its payload.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::AckTimeout`] if the acknowledgment does not arrive
    /// within the configured timeout or the connection drops first;
    /// [`QuizwireError::Serialization`] if the payload does not match `T`.
    pub async fn ack<T: serde::de::DeserializeOwned>(mut self) -> Result<T> {
        let Some(rx) = self.rx.take() else {
            return Err(QuizwireError::AckTimeout);
        };
        match tokio::time::timeout(self.timeout, rx).await {
            // Timer elapsed with no acknowledgment.
            Err(_) => Err(QuizwireError::AckTimeout),
            // Sender dropped: the connection went down with the request in flight.
            Ok(Err(_)) => Err(QuizwireError::AckTimeout),
            Ok(Ok(value)) => Ok(serde_json::from_value(value)?),
        }
    }
}

impl Drop for PendingAck {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state.pending_acks).remove(&self.ack_id);
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background transport loop that multiplexes send/receive via `tokio::select!`.
///
/// Exits when:
/// - The command channel closes (every connection handle dropped)
/// - The shutdown signal fires (`disconnect` called)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
async fn transport_loop(
    mut transport: BoxedTransport,
    mut cmd_rx: mpsc::UnboundedReceiver<RequestEnvelope>,
    event_tx: broadcast::Sender<QuizwireEvent>,
    state: Arc<ConnectionState>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    loop {
        tokio::select! {
            // Branch 1: outgoing request from a connection handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(envelope) => {
                        let ack_id = envelope.ack_id;
                        debug!(ack_id = %ack_id, "sending request");
                        match serde_json::to_string(&envelope) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    finish_disconnected(
                                        &event_tx,
                                        &state,
                                        Some(format!("transport send error: {e}")),
                                    );
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize request envelope: {e}");
                                // A serialization failure is a programming bug;
                                // fail this request's ack but keep the loop alive.
                                lock(&state.pending_acks).remove(&ack_id);
                            }
                        }
                    }
                    // Command channel closed — every connection handle dropped.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        finish_disconnected(&event_tx, &state, Some("client shut down".into()));
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                finish_disconnected(&event_tx, &state, Some("client shut down".into()));
                break;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(ServerMessage::Ack(ack)) => {
                                deliver_ack(&state, ack);
                            }
                            Ok(ServerMessage::Event(event)) => {
                                update_state(&state, &event);
                                emit_event(&event_tx, QuizwireEvent::from(event));
                            }
                            Err(e) => {
                                warn!("failed to deserialize server message: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        finish_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        );
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        finish_disconnected(&event_tx, &state, None);
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Update shared [`ConnectionState`] based on a received [`ServerEvent`].
fn update_state(state: &ConnectionState, event: &ServerEvent) {
    if let ServerEvent::Connected { session_id } = event {
        *lock(&state.session_id) = Some(session_id.clone());
        debug!(session_id = %session_id, "state: session identity assigned");
    }
}

/// Resolve the pending request matching an acknowledgment, exactly once.
fn deliver_ack(state: &ConnectionState, ack: AckEnvelope) {
    match lock(&state.pending_acks).remove(&ack.ack_id) {
        Some(tx) => {
            if tx.send(ack.data).is_err() {
                debug!(ack_id = %ack.ack_id, "ack receiver dropped before delivery");
            }
        }
        // Unknown or duplicate correlation id. The at-most-once contract
        // means a second acknowledgment for the same request is discarded.
        None => {
            warn!(ack_id = %ack.ack_id, "acknowledgment with no pending request, discarding");
        }
    }
}

/// Tear down connection state and emit the final `Disconnected` event.
///
/// Pending acknowledgments are failed by dropping their senders — a callback
/// must never fire after the connection it belongs to is gone.
fn finish_disconnected(
    event_tx: &broadcast::Sender<QuizwireEvent>,
    state: &ConnectionState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    *lock(&state.session_id) = None;

    let pending_count = {
        let mut pending = lock(&state.pending_acks);
        let count = pending.len();
        pending.clear();
        count
    };
    if pending_count > 0 {
        debug!(count = pending_count, "failed pending acknowledgments on disconnect");
    }

    emit_event(event_tx, QuizwireEvent::Disconnected { reason });
}

/// Broadcast an event; with no live subscribers the event is dropped.
fn emit_event(event_tx: &broadcast::Sender<QuizwireEvent>, event: QuizwireEvent) {
    if event_tx.send(event).is_err() {
        debug!("no event subscribers, event dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{LobbiesAck, LobbyStatus, LobbySummary};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    // ── Mock transport ──────────────────────────────────────────────

    type Incoming = Option<std::result::Result<String, QuizwireError>>;

    /// A mock transport fed from a shared queue. Scripted messages are
    /// yielded in order; requests recorded via `send` can be auto-acked
    /// with pre-scripted payloads.
    struct MockTransport {
        queue: Arc<StdMutex<VecDeque<Incoming>>>,
        notify: Arc<tokio::sync::Notify>,
        /// Ack payloads consumed one per outgoing request.
        ack_data: Arc<StdMutex<VecDeque<serde_json::Value>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        fail_sends: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    #[derive(Clone)]
    struct MockHandles {
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        fail_sends: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(incoming: Vec<Incoming>, ack_data: Vec<serde_json::Value>) -> (Self, MockHandles) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let fail_sends = Arc::new(AtomicBool::new(false));
            let transport = Self {
                queue: Arc::new(StdMutex::new(VecDeque::from(incoming))),
                notify: Arc::new(tokio::sync::Notify::new()),
                ack_data: Arc::new(StdMutex::new(VecDeque::from(ack_data))),
                sent: Arc::clone(&sent),
                fail_sends: Arc::clone(&fail_sends),
                closed: Arc::clone(&closed),
            };
            let handles = MockHandles {
                sent,
                closed,
                fail_sends: Arc::clone(&transport.fail_sends),
            };
            (transport, handles)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), QuizwireError> {
            if self.fail_sends.load(Ordering::Acquire) {
                return Err(QuizwireError::TransportSend("mock send failure".into()));
            }
            // Auto-acknowledge: echo the request's ackId with the next
            // scripted payload.
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

        async fn recv(&mut self) -> Option<std::result::Result<String, QuizwireError>> {
            loop {
                if let Some(item) = self.queue.lock().unwrap().pop_front() {
                    return item;
                }
                // Queue drained — wait for an auto-ack or hang until shutdown.
                self.notify.notified().await;
            }
        }

        async fn close(&mut self) -> std::result::Result<(), QuizwireError> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    /// A connector yielding scripted transports in order; dialing with none
    /// left fails like an unreachable server.
    struct MockConnector {
        transports: StdMutex<VecDeque<MockTransport>>,
        dials: AtomicUsize,
    }

    impl MockConnector {
        fn new(transports: Vec<MockTransport>) -> Arc<Self> {
            Arc::new(Self {
                transports: StdMutex::new(VecDeque::from(transports)),
                dials: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Connector for Arc<MockConnector> {
        async fn connect(&self) -> std::result::Result<BoxedTransport, QuizwireError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            match lock(&self.transports).pop_front() {
                Some(transport) => Ok(Box::new(transport)),
                None => Err(QuizwireError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "no transport scripted",
                ))),
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn connected_json(session_id: &str) -> Incoming {
        Some(Ok(serde_json::to_string(&ServerMessage::Event(
            ServerEvent::Connected {
                session_id: session_id.into(),
            },
        ))
        .unwrap()))
    }

    fn lobby_list_value() -> serde_json::Value {
        serde_json::to_value(vec![LobbySummary {
            id: "L1".into(),
            name: "Ann's Game".into(),
            host_name: "Ann".into(),
            category: "Music".into(),
            player_count: 1,
            max_players: 8,
            status: LobbyStatus::Waiting,
        }])
        .unwrap()
    }

    async fn recv_event(rx: &mut broadcast::Receiver<QuizwireEvent>) -> QuizwireEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn config_defaults() {
        let config = QuizwireConfig::new();
        assert_eq!(config.ack_timeout, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = QuizwireConfig::new()
            .with_ack_timeout(Duration::from_secs(3))
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.ack_timeout, Duration::from_secs(3));
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = QuizwireConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn connect_emits_connected_with_session_id() {
        let (transport, _handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        assert!(!conn.is_connected());
        conn.connect().await.unwrap();
        assert!(conn.is_connected());

        let event = recv_event(&mut events).await;
        assert_eq!(
            event,
            QuizwireEvent::Connected {
                session_id: "S1".into()
            }
        );
        assert_eq!(conn.session_id().as_deref(), Some("S1"));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_connected() {
        let (transport, _handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(Arc::clone(&connector), QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        // Second connect must not dial a second transport.
        conn.connect().await.unwrap();
        assert_eq!(connector.dials.load(Ordering::SeqCst), 1);

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn connect_failure_emits_connect_error() {
        let connector = MockConnector::new(vec![]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(err, QuizwireError::Io(_)));
        assert!(!conn.is_connected());

        let event = recv_event(&mut events).await;
        assert!(matches!(event, QuizwireEvent::ConnectError { .. }));
    }

    #[tokio::test]
    async fn request_resolves_with_matching_ack() {
        let (transport, handles) =
            MockTransport::new(vec![connected_json("S1")], vec![lobby_list_value()]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        let ack: LobbiesAck = conn.request(ClientRequest::GetLobbies {}).await.unwrap();
        match ack {
            LobbiesAck::Lobbies(lobbies) => {
                assert_eq!(lobbies.len(), 1);
                assert_eq!(lobbies[0].id, "L1");
            }
            LobbiesAck::Failed { error } => panic!("unexpected failure: {error}"),
        }

        // The request went out as a proper envelope.
        {
            let sent = handles.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            let envelope: RequestEnvelope = serde_json::from_str(&sent[0]).unwrap();
            assert_eq!(envelope.request, ClientRequest::GetLobbies {});
        }

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn ack_with_unknown_id_is_discarded() {
        let spurious = serde_json::to_string(&ServerMessage::Ack(AckEnvelope {
            ack_id: Uuid::new_v4(),
            data: serde_json::json!({ "success": true }),
        }))
        .unwrap();
        let (transport, _handles) = MockTransport::new(
            vec![connected_json("S1"), Some(Ok(spurious))],
            vec![lobby_list_value()],
        );
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        // A later request still correlates correctly.
        let ack: LobbiesAck = conn.request(ClientRequest::GetLobbies {}).await.unwrap();
        assert!(matches!(ack, LobbiesAck::Lobbies(_)));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn ack_timeout_elapses_without_ack() {
        // No ack payload scripted: the request is swallowed.
        let (transport, _handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let config = QuizwireConfig::new().with_ack_timeout(Duration::from_millis(50));
        let (conn, mut events) = QuizwireConnection::new(connector, config);

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        let err = conn
            .request::<LobbiesAck>(ClientRequest::GetLobbies {})
            .await
            .unwrap_err();
        assert!(matches!(err, QuizwireError::AckTimeout));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn pending_ack_fails_when_connection_drops_mid_flight() {
        let (transport, handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        // The next send breaks the transport while the request is in flight.
        handles.fail_sends.store(true, Ordering::Release);
        let err = conn
            .request::<LobbiesAck>(ClientRequest::GetLobbies {})
            .await
            .unwrap_err();
        assert!(matches!(err, QuizwireError::AckTimeout));

        let event = recv_event(&mut events).await;
        assert!(matches!(event, QuizwireEvent::Disconnected { .. }));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn request_while_disconnected_is_rejected() {
        let connector = MockConnector::new(vec![]);
        let (conn, _events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        let err = conn.request_deferred(ClientRequest::GetLobbies {}).unwrap_err();
        assert!(matches!(err, QuizwireError::NotConnected));
    }

    #[tokio::test]
    async fn disconnect_emits_disconnected_and_closes_transport() {
        let (transport, handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        conn.disconnect().await;

        let event = recv_event(&mut events).await;
        assert_eq!(
            event,
            QuizwireEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(handles.closed.load(Ordering::Acquire));
        assert!(!conn.is_connected());
        assert!(conn.session_id().is_none());
    }

    #[tokio::test]
    async fn double_disconnect_does_not_panic() {
        let (transport, _handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        conn.disconnect().await;
        conn.disconnect().await; // should not panic
    }

    #[tokio::test]
    async fn reconnect_gets_fresh_session_id() {
        let (first, _h1) = MockTransport::new(vec![connected_json("S1"), None], vec![]);
        let (second, _h2) = MockTransport::new(vec![connected_json("S2")], vec![]);
        let connector = MockConnector::new(vec![first, second]);
        let (conn, mut events) = QuizwireConnection::new(Arc::clone(&connector), QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected S1

        // Server closes the first transport.
        let event = recv_event(&mut events).await;
        assert!(matches!(event, QuizwireEvent::Disconnected { reason: None }));
        assert!(!conn.is_connected());
        assert!(conn.session_id().is_none());

        // Reconnect dials again and picks up a different identity.
        conn.connect().await.unwrap();
        let event = recv_event(&mut events).await;
        assert_eq!(
            event,
            QuizwireEvent::Connected {
                session_id: "S2".into()
            }
        );
        assert_eq!(connector.dials.load(Ordering::SeqCst), 2);
        assert_eq!(conn.session_id().as_deref(), Some("S2"));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive_events() {
        let (transport, _handles) = MockTransport::new(vec![connected_json("S1")], vec![]);
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut first) = QuizwireConnection::new(connector, QuizwireConfig::new());
        let mut second = conn.subscribe();

        conn.connect().await.unwrap();

        let a = recv_event(&mut first).await;
        let b = recv_event(&mut second).await;
        assert_eq!(a, b);

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn malformed_server_message_is_skipped() {
        let (transport, _handles) = MockTransport::new(
            vec![Some(Ok("{not json".into())), connected_json("S1")],
            vec![],
        );
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();

        // The garbage frame is logged and skipped; the next event arrives.
        let event = recv_event(&mut events).await;
        assert!(matches!(event, QuizwireEvent::Connected { .. }));

        conn.disconnect().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected_with_reason() {
        let (transport, _handles) = MockTransport::new(
            vec![
                connected_json("S1"),
                Some(Err(QuizwireError::TransportReceive("boom".into()))),
            ],
            vec![],
        );
        let connector = MockConnector::new(vec![transport]);
        let (conn, mut events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        conn.connect().await.unwrap();
        let _ = recv_event(&mut events).await; // Connected

        let event = recv_event(&mut events).await;
        if let QuizwireEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        } else {
            panic!("expected Disconnected, got {event:?}");
        }
    }

    #[tokio::test]
    async fn debug_impl_for_connection() {
        let connector = MockConnector::new(vec![]);
        let (conn, _events) = QuizwireConnection::new(connector, QuizwireConfig::new());

        let debug_str = format!("{conn:?}");
        assert!(debug_str.contains("QuizwireConnection"));
        assert!(debug_str.contains("connected"));
    }
}
