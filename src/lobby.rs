//! Lobby session: membership tracking for one lobby until its game starts.
//!
//! A [`LobbySession`] moves through [`LobbyPhase`]s:
//!
//! ```text
//! Joining ──ack ok──▶ Waiting ──gameStarted──▶ Starting
//!    │                   │
//!    └──ack failed──▶ Ended(Failed)
//!                        ├── self playerLeft / leave() ──▶ Ended(Left)
//!                        ├── kicked ────────────────────▶ Ended(Kicked)
//!                        ├── lobbyClosed ───────────────▶ Ended(Closed)
//!                        └── disconnect ────────────────▶ Ended(Failed)
//! ```
//!
//! Lobby state is only ever mutated by substituting the full
//! [`LobbyDetails`] snapshot attached to server events — never by
//! speculative local edits. Join and leave wait for their acknowledgment;
//! the host's `startGame` ack transitions nothing, because every
//! participant (host included) moves to the game on the `gameStarted`
//! broadcast in lockstep.
//!
//! On `Ended(Failed)` the driver surfaces the message and returns to the
//! directory after [`ERROR_RETURN_DELAY`](crate::ERROR_RETURN_DELAY) — a
//! grace period for reading the message, not a retry.

use tracing::debug;

use crate::connection::QuizwireConnection;
use crate::error::{QuizwireError, Result};
use crate::event::QuizwireEvent;
use crate::identity::PlayerName;
use crate::protocol::{BasicAck, ClientRequest, JoinLobbyAck, LobbyDetails, LobbyId};

/// Where a lobby session currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyPhase {
    /// Join request in flight.
    Joining,
    /// In the lobby, waiting for the host to start.
    Waiting,
    /// `gameStarted` received — control passes to a
    /// [`GameSession`](crate::game::GameSession).
    Starting,
    /// The session is over; the driver returns to the directory.
    Ended(LobbyExit),
}

/// Why a lobby session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyExit {
    /// The local player left, voluntarily or via a self-referential
    /// `playerLeft` event.
    Left { notice: String },
    /// Removed by the host.
    Kicked { message: String },
    /// The lobby was torn down server-side.
    Closed,
    /// Join failure or connection loss; surfaced, then back to directory.
    Failed { message: String },
}

/// Notice shown when the local player leaves a lobby.
const LEFT_NOTICE: &str = "You have left the lobby.";

/// Message used when the transport drops mid-session.
const CONNECTION_LOST: &str = "Connection to the server was lost.";

/// State machine for membership in one lobby.
#[derive(Debug)]
pub struct LobbySession {
    lobby_id: LobbyId,
    phase: LobbyPhase,
    details: Option<LobbyDetails>,
}

impl LobbySession {
    /// Join the given lobby, returning the session in `Waiting` on success
    /// or `Ended(Failed)` with the server's message on failure. Either way
    /// the session is in a named, displayable state.
    pub async fn join(
        conn: &QuizwireConnection,
        lobby_id: impl Into<LobbyId>,
        player_name: &PlayerName,
    ) -> Self {
        let lobby_id = lobby_id.into();
        let mut session = Self {
            lobby_id: lobby_id.clone(),
            phase: LobbyPhase::Joining,
            details: None,
        };

        let result = conn
            .request::<JoinLobbyAck>(ClientRequest::JoinLobby {
                lobby_id,
                player_name: player_name.as_str().to_owned(),
            })
            .await;

        match result {
            Ok(ack) if ack.success => match ack.lobby_details {
                Some(details) => {
                    debug!(lobby_id = %session.lobby_id, "lobby: joined");
                    session.details = Some(details);
                    session.phase = LobbyPhase::Waiting;
                }
                None => {
                    session.phase = LobbyPhase::Ended(LobbyExit::Failed {
                        message: "lobby details missing from join acknowledgment".into(),
                    });
                }
            },
            Ok(ack) => {
                session.phase = LobbyPhase::Ended(LobbyExit::Failed {
                    message: ack
                        .message
                        .unwrap_or_else(|| "could not join lobby".into()),
                });
            }
            Err(e) => {
                session.phase = LobbyPhase::Ended(LobbyExit::Failed {
                    message: e.to_string(),
                });
            }
        }

        session
    }

    /// The lobby this session tracks.
    pub fn lobby_id(&self) -> &LobbyId {
        &self.lobby_id
    }

    /// Current phase.
    pub fn phase(&self) -> &LobbyPhase {
        &self.phase
    }

    /// Latest full lobby snapshot, if one has been applied.
    pub fn details(&self) -> Option<&LobbyDetails> {
        self.details.as_ref()
    }

    /// Whether the local player currently holds host authority.
    ///
    /// Evaluated against the latest snapshot on every call — host identity
    /// can change at any time via `newHost`, and the local session id can
    /// change across reconnects, so neither side is cached.
    pub fn is_host(&self, local_id: Option<&str>) -> bool {
        match (&self.details, local_id) {
            (Some(details), Some(id)) => details.host.id == id,
            _ => false,
        }
    }

    /// Apply one event to the session.
    ///
    /// `local_id` is the current server-assigned session id
    /// ([`QuizwireConnection::session_id`]); it is needed to recognize the
    /// one self-referential event (`playerLeft` naming this client). Events
    /// arriving after the session ended are ignored entirely.
    pub fn apply_event(&mut self, local_id: Option<&str>, event: &QuizwireEvent) {
        if matches!(self.phase, LobbyPhase::Ended(_)) {
            return;
        }

        match event {
            QuizwireEvent::PlayerJoined {
                player,
                lobby_details,
            } => {
                debug!(player = %player.name, "lobby: player joined");
                self.apply_snapshot(lobby_details);
            }
            QuizwireEvent::PlayerLeft {
                player_id,
                player_name,
                lobby_details,
            } => {
                // The departing player being *us* overrides everything the
                // snapshot says: we are out of this lobby.
                if local_id == Some(player_id.as_str()) {
                    debug!("lobby: local player left");
                    self.phase = LobbyPhase::Ended(LobbyExit::Left {
                        notice: LEFT_NOTICE.into(),
                    });
                } else {
                    debug!(player = player_name.as_deref().unwrap_or(player_id), "lobby: player left");
                    self.apply_snapshot(lobby_details);
                }
            }
            QuizwireEvent::NewHost {
                host,
                lobby_details,
            } => {
                debug!(host = %host.name, "lobby: host reassigned");
                self.apply_snapshot(lobby_details);
            }
            QuizwireEvent::GameStarted { lobby_id } => {
                if lobby_id.as_deref().is_none_or(|id| id == self.lobby_id) {
                    debug!(lobby_id = %self.lobby_id, "lobby: game starting");
                    self.phase = LobbyPhase::Starting;
                }
            }
            QuizwireEvent::Kicked { message } => {
                self.phase = LobbyPhase::Ended(LobbyExit::Kicked {
                    message: message.clone(),
                });
            }
            QuizwireEvent::LobbyClosed => {
                self.phase = LobbyPhase::Ended(LobbyExit::Closed);
            }
            QuizwireEvent::Disconnected { .. } => {
                // Membership does not survive a transport gap; recovery is
                // reconnect-then-resynchronize from the directory.
                self.phase = LobbyPhase::Ended(LobbyExit::Failed {
                    message: CONNECTION_LOST.into(),
                });
            }
            _ => {}
        }
    }

    /// Ask the server to start the game. Host-only by server contract.
    ///
    /// A successful acknowledgment deliberately transitions nothing: the
    /// session enters `Starting` only when the `gameStarted` broadcast
    /// arrives, so the host never jumps ahead of the other players.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::RequestFailed`] with the server's message, or any
    /// connection-level error. State is unchanged on failure.
    pub async fn start_game(&self, conn: &QuizwireConnection) -> Result<()> {
        let ack: BasicAck = conn
            .request(ClientRequest::StartGame {
                lobby_id: self.lobby_id.clone(),
            })
            .await?;
        if ack.success {
            debug!(lobby_id = %self.lobby_id, "lobby: start accepted, awaiting broadcast");
            Ok(())
        } else {
            Err(QuizwireError::RequestFailed(
                ack.message.unwrap_or_else(|| "failed to start game".into()),
            ))
        }
    }

    /// Leave the lobby. No optimistic removal: membership changes only when
    /// the server confirms, and on failure the state is untouched.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::RequestFailed`] with the server's message, or any
    /// connection-level error.
    pub async fn leave(&mut self, conn: &QuizwireConnection) -> Result<()> {
        let ack: BasicAck = conn
            .request(ClientRequest::LeaveLobby {
                lobby_id: self.lobby_id.clone(),
            })
            .await?;
        if ack.success {
            self.phase = LobbyPhase::Ended(LobbyExit::Left {
                notice: LEFT_NOTICE.into(),
            });
            Ok(())
        } else {
            Err(QuizwireError::RequestFailed(
                ack.message.unwrap_or_else(|| "failed to leave lobby".into()),
            ))
        }
    }

    /// Replace the held snapshot if it belongs to this lobby.
    fn apply_snapshot(&mut self, details: &LobbyDetails) {
        if details.id == self.lobby_id {
            self.details = Some(details.clone());
        }
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
    use crate::protocol::{LobbySettings, PlayerRef};

    fn player(id: &str, name: &str) -> PlayerRef {
        PlayerRef {
            id: id.into(),
            name: name.into(),
        }
    }

    fn details(lobby_id: &str, host: &PlayerRef, players: &[PlayerRef]) -> LobbyDetails {
        LobbyDetails {
            id: lobby_id.into(),
            name: "Test Lobby".into(),
            settings: LobbySettings {
                category: "Music".into(),
                max_players: 8,
            },
            host: host.clone(),
            players: players.to_vec(),
        }
    }

    fn waiting_session(lobby_id: &str, snapshot: LobbyDetails) -> LobbySession {
        LobbySession {
            lobby_id: lobby_id.into(),
            phase: LobbyPhase::Waiting,
            details: Some(snapshot),
        }
    }

    #[test]
    fn player_joined_replaces_snapshot_wholesale() {
        let ann = player("S1", "Ann");
        let bo = player("S2", "Bo");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));

        let updated = details("L1", &ann, &[ann.clone(), bo.clone()]);
        let event = QuizwireEvent::PlayerJoined {
            player: bo,
            lobby_details: updated.clone(),
        };
        session.apply_event(Some("S1"), &event);
        assert_eq!(session.details(), Some(&updated));

        // Re-applying the same snapshot changes nothing.
        session.apply_event(Some("S1"), &event);
        assert_eq!(session.details(), Some(&updated));
        assert_eq!(session.phase(), &LobbyPhase::Waiting);
    }

    #[test]
    fn snapshot_for_a_different_lobby_is_rejected() {
        let ann = player("S1", "Ann");
        let original = details("L1", &ann, &[ann.clone()]);
        let mut session = waiting_session("L1", original.clone());

        session.apply_event(
            Some("S1"),
            &QuizwireEvent::PlayerJoined {
                player: player("S9", "Stray"),
                lobby_details: details("L9", &ann, &[]),
            },
        );
        assert_eq!(session.details(), Some(&original));
    }

    #[test]
    fn self_player_left_ends_session_regardless_of_snapshot() {
        let ann = player("S1", "Ann");
        let bo = player("S2", "Bo");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone(), bo.clone()]));

        // Snapshot still lists us — irrelevant, the id match decides.
        session.apply_event(
            Some("S1"),
            &QuizwireEvent::PlayerLeft {
                player_id: "S1".into(),
                player_name: Some("Ann".into()),
                lobby_details: details("L1", &bo, &[ann, bo.clone()]),
            },
        );
        assert_eq!(
            session.phase(),
            &LobbyPhase::Ended(LobbyExit::Left {
                notice: LEFT_NOTICE.into()
            })
        );
    }

    #[test]
    fn other_player_left_applies_snapshot_and_stays_waiting() {
        let ann = player("S1", "Ann");
        let bo = player("S2", "Bo");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone(), bo.clone()]));

        let updated = details("L1", &ann, &[ann.clone()]);
        session.apply_event(
            Some("S1"),
            &QuizwireEvent::PlayerLeft {
                player_id: "S2".into(),
                player_name: Some("Bo".into()),
                lobby_details: updated.clone(),
            },
        );
        assert_eq!(session.phase(), &LobbyPhase::Waiting);
        assert_eq!(session.details(), Some(&updated));
    }

    #[test]
    fn host_identity_follows_every_snapshot() {
        let ann = player("S1", "Ann");
        let bo = player("S2", "Bo");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone(), bo.clone()]));
        assert!(session.is_host(Some("S1")));
        assert!(!session.is_host(Some("S2")));

        session.apply_event(
            Some("S1"),
            &QuizwireEvent::NewHost {
                host: bo.clone(),
                lobby_details: details("L1", &bo, &[ann, bo.clone()]),
            },
        );
        assert!(!session.is_host(Some("S1")));
        assert!(session.is_host(Some("S2")));
    }

    #[test]
    fn new_host_snapshot_applies_even_while_joining() {
        let ann = player("S1", "Ann");
        let bo = player("S2", "Bo");
        let mut session = LobbySession {
            lobby_id: "L1".into(),
            phase: LobbyPhase::Joining,
            details: None,
        };

        session.apply_event(
            Some("S1"),
            &QuizwireEvent::NewHost {
                host: bo.clone(),
                lobby_details: details("L1", &bo, &[ann, bo.clone()]),
            },
        );
        assert!(session.is_host(Some("S2")));
        assert_eq!(session.phase(), &LobbyPhase::Joining);
    }

    #[test]
    fn is_host_without_identity_is_false() {
        let ann = player("S1", "Ann");
        let session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));
        assert!(!session.is_host(None));
    }

    #[test]
    fn game_started_enters_starting() {
        let ann = player("S1", "Ann");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));

        // A start broadcast for a different lobby is not ours.
        session.apply_event(
            Some("S1"),
            &QuizwireEvent::GameStarted {
                lobby_id: Some("L9".into()),
            },
        );
        assert_eq!(session.phase(), &LobbyPhase::Waiting);

        session.apply_event(
            Some("S1"),
            &QuizwireEvent::GameStarted {
                lobby_id: Some("L1".into()),
            },
        );
        assert_eq!(session.phase(), &LobbyPhase::Starting);
    }

    #[test]
    fn game_started_without_lobby_id_counts_as_ours() {
        let ann = player("S1", "Ann");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));
        session.apply_event(Some("S1"), &QuizwireEvent::GameStarted { lobby_id: None });
        assert_eq!(session.phase(), &LobbyPhase::Starting);
    }

    #[test]
    fn kicked_and_closed_end_the_session() {
        let ann = player("S1", "Ann");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));
        session.apply_event(
            Some("S1"),
            &QuizwireEvent::Kicked {
                message: "Removed by host".into(),
            },
        );
        assert_eq!(
            session.phase(),
            &LobbyPhase::Ended(LobbyExit::Kicked {
                message: "Removed by host".into()
            })
        );

        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));
        session.apply_event(Some("S1"), &QuizwireEvent::LobbyClosed);
        assert_eq!(session.phase(), &LobbyPhase::Ended(LobbyExit::Closed));
    }

    #[test]
    fn disconnect_ends_the_session() {
        let ann = player("S1", "Ann");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));
        session.apply_event(Some("S1"), &QuizwireEvent::Disconnected { reason: None });
        assert!(matches!(
            session.phase(),
            LobbyPhase::Ended(LobbyExit::Failed { .. })
        ));
    }

    #[test]
    fn events_after_end_are_ignored() {
        let ann = player("S1", "Ann");
        let bo = player("S2", "Bo");
        let mut session = waiting_session("L1", details("L1", &ann, &[ann.clone()]));
        session.apply_event(Some("S1"), &QuizwireEvent::LobbyClosed);

        session.apply_event(
            Some("S1"),
            &QuizwireEvent::PlayerJoined {
                player: bo.clone(),
                lobby_details: details("L1", &bo, &[bo.clone()]),
            },
        );
        session.apply_event(Some("S1"), &QuizwireEvent::GameStarted { lobby_id: None });
        assert_eq!(session.phase(), &LobbyPhase::Ended(LobbyExit::Closed));
    }
}
