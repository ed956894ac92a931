//! Lobby directory: the list of joinable lobbies.
//!
//! The directory is fed from two sources — `getLobbies` acknowledgments and
//! `lobbiesListUpdate` pushes — and both replace the held list wholesale.
//! Diffing or patching is deliberately impossible: a snapshot either becomes
//! the entire displayed state or is rejected, which makes duplicate and
//! reordered deliveries harmless.
//!
//! Any list held across a disconnection is stale. [`LobbyDirectory::apply_event`]
//! flags this on every `Connected` event so the driver re-fetches before
//! trusting the display again.

use tracing::debug;

use crate::connection::QuizwireConnection;
use crate::error::{QuizwireError, Result};
use crate::event::QuizwireEvent;
use crate::identity::PlayerName;
use crate::protocol::{ClientRequest, CreateLobbyAck, LobbiesAck, LobbyId, LobbySummary};

/// Client-side view of the joinable-lobby listing.
#[derive(Debug, Default)]
pub struct LobbyDirectory {
    lobbies: Vec<LobbySummary>,
    /// Last refresh/push error, for inline display next to the listing.
    last_error: Option<String>,
    /// Whether any listing has been applied yet — distinguishes "never
    /// fetched" from "fetched and empty".
    loaded: bool,
}

impl LobbyDirectory {
    /// Create an empty, not-yet-loaded directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current listing (empty until loaded).
    pub fn lobbies(&self) -> &[LobbySummary] {
        &self.lobbies
    }

    /// Whether a listing (possibly empty) has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The last error surfaced by a refresh or update, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch the listing and replace local state with the acknowledgment.
    ///
    /// On any failure the list becomes empty and the error is both recorded
    /// for display and returned — whether to retry is the caller's call.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::RequestFailed`] when the server answers with an
    /// error object, or any connection-level error from the request itself.
    pub async fn refresh(&mut self, conn: &QuizwireConnection) -> Result<()> {
        match conn.request::<LobbiesAck>(ClientRequest::GetLobbies {}).await {
            Ok(LobbiesAck::Lobbies(lobbies)) => {
                debug!(count = lobbies.len(), "directory: listing refreshed");
                self.lobbies = lobbies;
                self.loaded = true;
                self.last_error = None;
                Ok(())
            }
            Ok(LobbiesAck::Failed { error }) => {
                self.lobbies.clear();
                self.loaded = true;
                self.last_error = Some(error.clone());
                Err(QuizwireError::RequestFailed(error))
            }
            Err(e) => {
                self.lobbies.clear();
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Create a new lobby hosted by this player.
    ///
    /// Validates the lobby name and category locally before any network
    /// call. On success returns the new lobby id — the caller transitions
    /// into a [`LobbySession`](crate::lobby::LobbySession) for it. On
    /// failure local state is unchanged.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::Validation`] for empty inputs,
    /// [`QuizwireError::RequestFailed`] with the server's message when the
    /// lobby could not be created, or any connection-level error.
    pub async fn create(
        &self,
        conn: &QuizwireConnection,
        player_name: &PlayerName,
        lobby_name: &str,
        category: &str,
    ) -> Result<LobbyId> {
        let lobby_name = lobby_name.trim();
        if lobby_name.is_empty() {
            return Err(QuizwireError::Validation(
                "lobby name must not be empty".into(),
            ));
        }
        if category.trim().is_empty() {
            return Err(QuizwireError::Validation("category must not be empty".into()));
        }

        let ack: CreateLobbyAck = conn
            .request(ClientRequest::CreateLobby {
                player_name: player_name.as_str().to_owned(),
                lobby_name: lobby_name.to_owned(),
                category: category.trim().to_owned(),
            })
            .await?;

        match (ack.success, ack.lobby_id) {
            (true, Some(lobby_id)) => {
                debug!(lobby_id = %lobby_id, "directory: lobby created");
                Ok(lobby_id)
            }
            _ => Err(QuizwireError::RequestFailed(
                ack.message
                    .unwrap_or_else(|| "failed to create lobby".into()),
            )),
        }
    }

    /// Apply one event to the directory.
    ///
    /// Returns `true` when the caller must follow up with
    /// [`refresh`](Self::refresh): after every `Connected` event the held
    /// list is stale (it was frozen while disconnected) and only a fresh
    /// fetch makes it authoritative again.
    pub fn apply_event(&mut self, event: &QuizwireEvent) -> bool {
        match event {
            QuizwireEvent::LobbiesListUpdate { lobbies } => {
                debug!(count = lobbies.len(), "directory: push update applied");
                self.lobbies = lobbies.clone();
                self.loaded = true;
                self.last_error = None;
                false
            }
            QuizwireEvent::Connected { .. } => true,
            _ => false,
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
    use crate::protocol::LobbyStatus;

    fn summary(id: &str, name: &str) -> LobbySummary {
        LobbySummary {
            id: id.into(),
            name: name.into(),
            host_name: "Host".into(),
            category: "Music".into(),
            player_count: 1,
            max_players: 8,
            status: LobbyStatus::Waiting,
        }
    }

    #[test]
    fn starts_empty_and_unloaded() {
        let directory = LobbyDirectory::new();
        assert!(directory.lobbies().is_empty());
        assert!(!directory.is_loaded());
        assert!(directory.last_error().is_none());
    }

    #[test]
    fn push_update_replaces_list_wholesale() {
        let mut directory = LobbyDirectory::new();
        directory.apply_event(&QuizwireEvent::LobbiesListUpdate {
            lobbies: vec![summary("L1", "First"), summary("L2", "Second")],
        });
        assert_eq!(directory.lobbies().len(), 2);
        assert!(directory.is_loaded());

        // The next snapshot is the whole truth — entries absent from it are gone.
        directory.apply_event(&QuizwireEvent::LobbiesListUpdate {
            lobbies: vec![summary("L3", "Third")],
        });
        assert_eq!(directory.lobbies().len(), 1);
        assert_eq!(directory.lobbies()[0].id, "L3");
    }

    #[test]
    fn applying_the_same_snapshot_twice_is_idempotent() {
        let mut directory = LobbyDirectory::new();
        let update = QuizwireEvent::LobbiesListUpdate {
            lobbies: vec![summary("L1", "First")],
        };
        directory.apply_event(&update);
        let after_once = directory.lobbies().to_vec();
        directory.apply_event(&update);
        assert_eq!(directory.lobbies(), after_once.as_slice());
    }

    #[test]
    fn connected_event_demands_refresh() {
        let mut directory = LobbyDirectory::new();
        directory.apply_event(&QuizwireEvent::LobbiesListUpdate {
            lobbies: vec![summary("L1", "First")],
        });

        let needs_refresh = directory.apply_event(&QuizwireEvent::Connected {
            session_id: "S2".into(),
        });
        assert!(needs_refresh);
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let mut directory = LobbyDirectory::new();
        let needs_refresh = directory.apply_event(&QuizwireEvent::LobbyClosed);
        assert!(!needs_refresh);
        assert!(!directory.is_loaded());
    }
}
