//! Identity store: the player's chosen display name.
//!
//! The display name is the single gate into every lobby and game context: a
//! screen other than the entry screen must check [`IdentityStore::is_authorized`]
//! on every entry, not just at startup, because the stored value can be
//! cleared independently.
//!
//! The name is the only client state that survives a process restart. It is
//! persisted under a single durable key (a small JSON document in the
//! platform config directory) and rewritten on every change.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuizwireError, Result};

/// Maximum display name length in characters, after trimming.
pub const MAX_NAME_LENGTH: usize = 20;

/// File name of the durable identity document.
const IDENTITY_FILE: &str = "identity.json";

/// On-disk shape: one key, nothing else persists across restarts.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    player_name: String,
}

// ── PlayerName ──────────────────────────────────────────────────────

/// A validated display name: non-empty after trimming, at most
/// [`MAX_NAME_LENGTH`] characters.
///
/// Construction is the only validation point; holding a `PlayerName` means
/// the value is fit to send in `createLobby`/`joinLobby` requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerName(String);

impl PlayerName {
    /// Validate and normalize a raw name.
    ///
    /// # Errors
    ///
    /// Returns [`QuizwireError::Validation`] when the trimmed name is empty
    /// or longer than [`MAX_NAME_LENGTH`] characters.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuizwireError::Validation(
                "player name must not be empty".into(),
            ));
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(QuizwireError::Validation(format!(
                "player name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The validated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PlayerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── IdentityStore ───────────────────────────────────────────────────

/// Durable store for the local player's display name.
///
/// Construct once at process start and pass it (or a reference) explicitly
/// into whatever drives the screens — there is no ambient global.
#[derive(Debug)]
pub struct IdentityStore {
    path: PathBuf,
    name: Option<PlayerName>,
}

impl IdentityStore {
    /// Open the store backed by the given file, reading any persisted name.
    ///
    /// An absent, unreadable, or malformed file simply means no name is set
    /// yet; a stored name that no longer passes validation is discarded the
    /// same way.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = read_persisted_name(&path);
        Self { path, name }
    }

    /// Open the store at the platform-default location
    /// (the `quizwire` config directory).
    ///
    /// # Errors
    ///
    /// Returns [`QuizwireError::Io`] when no config directory can be
    /// resolved for this platform.
    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("co", "theambiguous", "quizwire").ok_or_else(
            || {
                QuizwireError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no config directory available",
                ))
            },
        )?;
        Ok(Self::open(dirs.config_dir().join(IDENTITY_FILE)))
    }

    /// The current name, if one is set.
    pub fn name(&self) -> Option<&PlayerName> {
        self.name.as_ref()
    }

    /// The current name as a string, empty when unset.
    pub fn display_name(&self) -> &str {
        self.name.as_ref().map_or("", PlayerName::as_str)
    }

    /// Whether lobby/game screens may be entered. Re-check on every entry
    /// into a protected context.
    pub fn is_authorized(&self) -> bool {
        self.name.is_some()
    }

    /// Validate, set, and durably persist a new name.
    ///
    /// # Errors
    ///
    /// [`QuizwireError::Validation`] for an invalid name (store unchanged),
    /// or [`QuizwireError::Io`] when persisting fails (the in-memory value
    /// is still updated so the session can proceed).
    pub fn set_name(&mut self, raw: &str) -> Result<()> {
        let name = PlayerName::new(raw)?;
        tracing::debug!(name = %name, "identity: name updated");
        let document = IdentityDocument {
            player_name: name.as_str().to_owned(),
        };
        self.name = Some(name);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&document)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Clear the stored name (explicit user action only).
    ///
    /// # Errors
    ///
    /// Returns [`QuizwireError::Io`] when the durable copy cannot be
    /// removed; the in-memory value is cleared regardless.
    pub fn clear(&mut self) -> Result<()> {
        self.name = None;
        tracing::debug!("identity: name cleared");
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read and validate the persisted name, treating any failure as "unset".
fn read_persisted_name(path: &Path) -> Option<PlayerName> {
    let raw = fs::read_to_string(path).ok()?;
    let document: IdentityDocument = serde_json::from_str(&raw).ok()?;
    match PlayerName::new(&document.player_name) {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::warn!("identity: discarding invalid persisted name: {e}");
            None
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

    fn temp_store() -> (tempfile::TempDir, IdentityStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::open(dir.path().join(IDENTITY_FILE));
        (dir, store)
    }

    #[test]
    fn player_name_trims_whitespace() {
        let name = PlayerName::new("  Ann  ").unwrap();
        assert_eq!(name.as_str(), "Ann");
    }

    #[test]
    fn player_name_rejects_empty() {
        assert!(matches!(
            PlayerName::new("   "),
            Err(QuizwireError::Validation(_))
        ));
    }

    #[test]
    fn player_name_rejects_overlong() {
        let raw = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            PlayerName::new(&raw),
            Err(QuizwireError::Validation(_))
        ));
        // Exactly the limit is fine.
        let raw = "x".repeat(MAX_NAME_LENGTH);
        assert!(PlayerName::new(&raw).is_ok());
    }

    #[test]
    fn player_name_counts_characters_not_bytes() {
        // 20 multi-byte characters are within the limit.
        let raw = "ä".repeat(MAX_NAME_LENGTH);
        assert!(PlayerName::new(&raw).is_ok());
    }

    #[test]
    fn store_starts_unauthorized() {
        let (_dir, store) = temp_store();
        assert!(!store.is_authorized());
        assert!(store.name().is_none());
        assert_eq!(store.display_name(), "");
    }

    #[test]
    fn set_name_persists_across_reopen() {
        let (dir, mut store) = temp_store();
        store.set_name("Ann").unwrap();
        assert!(store.is_authorized());
        assert_eq!(store.display_name(), "Ann");

        let reopened = IdentityStore::open(dir.path().join(IDENTITY_FILE));
        assert_eq!(reopened.display_name(), "Ann");
    }

    #[test]
    fn set_name_rejects_invalid_without_touching_state() {
        let (_dir, mut store) = temp_store();
        store.set_name("Ann").unwrap();

        let err = store.set_name("").unwrap_err();
        assert!(matches!(err, QuizwireError::Validation(_)));
        assert_eq!(store.display_name(), "Ann");
    }

    #[test]
    fn clear_removes_durable_copy() {
        let (dir, mut store) = temp_store();
        store.set_name("Ann").unwrap();
        store.clear().unwrap();
        assert!(!store.is_authorized());

        let reopened = IdentityStore::open(dir.path().join(IDENTITY_FILE));
        assert!(!reopened.is_authorized());
    }

    #[test]
    fn clear_when_nothing_persisted_is_ok() {
        let (_dir, mut store) = temp_store();
        store.clear().unwrap();
        assert!(!store.is_authorized());
    }

    #[test]
    fn malformed_file_reads_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IDENTITY_FILE);
        fs::write(&path, "{ not json").unwrap();

        let store = IdentityStore::open(&path);
        assert!(!store.is_authorized());
    }

    #[test]
    fn persisted_overlong_name_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IDENTITY_FILE);
        let document = format!(
            r#"{{"playerName":"{}"}}"#,
            "x".repeat(MAX_NAME_LENGTH + 1)
        );
        fs::write(&path, document).unwrap();

        let store = IdentityStore::open(&path);
        assert!(!store.is_authorized());
    }
}
