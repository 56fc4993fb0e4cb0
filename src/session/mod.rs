//! File-backed web sessions.
//!
//! A [`Session`] is a uuid-identified bag of string values with an absolute
//! expiry. Stores implement [`SessionStore`]; the default [`FileStore`] keeps
//! one JSON file per session under a configured root directory and sweeps
//! expired records on access, mirroring the session settings of the config
//! file (`sessions.root`, `sessions.timeout_secs`).
//!
//! The store is deliberately synchronous: a session record is a few hundred
//! bytes touched at most once per request, and nothing in the routing engine
//! awaits it.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Session persistence failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed session record: {0}")]
    Format(#[from] serde_json::Error),

    #[error("session {id} not found")]
    NotFound { id: Uuid },

    #[error("session {id} expired")]
    Expired { id: Uuid },
}

/// Seconds since the Unix epoch; 0 when the clock is set before the epoch.
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A web session: identity, expiry, and string key/value content.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use plugweb::session::Session;
///
/// let mut session = Session::new(Duration::from_secs(3600));
/// session.insert("username", "goofy");
/// assert_eq!(session.get("username"), Some("goofy"));
/// assert!(!session.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    expires_at: u64,
    content: HashMap<String, String>,
}

impl Session {
    /// Creates a fresh session expiring `ttl` from now.
    pub fn new(ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            expires_at: now_secs() + ttl.as_secs(),
            content: HashMap::new(),
        }
    }

    /// The session's identity — also its file name in a [`FileStore`].
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns `true` once the expiry instant has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_secs()
    }

    /// Returns the stored value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.content.get(key).map(String::as_str)
    }

    /// Stores a value, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.content.insert(key.into(), value.into());
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.content.remove(key)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns `true` when the session holds no values.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Persistence contract for sessions.
pub trait SessionStore {
    /// Persists `session`, replacing any record with the same id.
    fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Loads the session with the given id.
    fn load(&self, id: Uuid) -> Result<Session, SessionError>;

    /// Returns `true` when a live record exists for `id`.
    fn contains(&self, id: Uuid) -> bool;

    /// Removes every expired record.
    fn cleanup(&self) -> Result<(), SessionError>;
}

/// The default store: one JSON file per session, named by uuid, under a root
/// directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }
}

impl SessionStore for FileStore {
    fn save(&self, session: &Session) -> Result<(), SessionError> {
        let json = serde_json::to_string(session)?;
        fs::write(self.path_for(session.id), json)?;
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<Session, SessionError> {
        self.cleanup()?;
        let path = self.path_for(id);
        let raw = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SessionError::NotFound { id }
            } else {
                SessionError::Io(e)
            }
        })?;
        let session: Session = serde_json::from_str(&raw)?;
        if session.is_expired() {
            // Raced past cleanup; drop the record now.
            let _ = fs::remove_file(&path);
            return Err(SessionError::Expired { id });
        }
        Ok(session)
    }

    fn contains(&self, id: Uuid) -> bool {
        let _ = self.cleanup();
        self.path_for(id).is_file()
    }

    fn cleanup(&self) -> Result<(), SessionError> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            // Only uuid-named files are session records; leave anything else alone.
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if Uuid::parse_str(name).is_err() {
                continue;
            }
            let Ok(raw) = fs::read_to_string(entry.path()) else {
                continue;
            };
            let Ok(session) = serde_json::from_str::<Session>(&raw) else {
                continue;
            };
            if session.is_expired() {
                debug!(id = %session.id, "removing expired session");
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let mut session = Session::new(HOUR);
        session.insert("username", "goofy");
        store.save(&session).unwrap();

        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.get("username"), Some("goofy"));
    }

    #[test]
    fn load_unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store.load(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[test]
    fn expired_session_is_reported_and_removed() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let session = Session::new(Duration::ZERO);
        assert!(session.is_expired());
        store.save(&session).unwrap();

        // cleanup inside load sweeps the expired record first, so the id is
        // simply gone by the time the read happens.
        let err = store.load(session.id()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Expired { .. } | SessionError::NotFound { .. }
        ));
        assert!(!dir.path().join(session.id().to_string()).exists());
    }

    #[test]
    fn contains_tracks_liveness() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let live = Session::new(HOUR);
        store.save(&live).unwrap();
        assert!(store.contains(live.id()));

        let dead = Session::new(Duration::ZERO);
        store.save(&dead).unwrap();
        assert!(!store.contains(dead.id()));
    }

    #[test]
    fn cleanup_keeps_live_sessions_and_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let live = Session::new(HOUR);
        store.save(&live).unwrap();
        let dead = Session::new(Duration::ZERO);
        store.save(&dead).unwrap();
        fs::write(dir.path().join("not-a-session.txt"), "keep me").unwrap();

        store.cleanup().unwrap();

        assert!(dir.path().join(live.id().to_string()).exists());
        assert!(!dir.path().join(dead.id().to_string()).exists());
        assert!(dir.path().join("not-a-session.txt").exists());
    }

    #[test]
    fn values_can_be_replaced_and_removed() {
        let mut session = Session::new(HOUR);
        session.insert("k", "v1");
        session.insert("k", "v2");
        assert_eq!(session.get("k"), Some("v2"));
        assert_eq!(session.remove("k"), Some("v2".to_owned()));
        assert!(session.is_empty());
    }
}
