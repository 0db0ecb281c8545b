//! Submitter identity lookup.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

/// The signed-in reporter as the session records them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submitter {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Read-only lookup of the current submitter. A missing identity surfaces as
/// a validation failure at submit time, never as a pipeline crash.
pub trait SessionStore: Send + Sync {
    fn current(&self) -> Option<Submitter>;
}

/// Reads the session file on every lookup, so a reporter signing in or out
/// between actions is honored without restarting the kiosk.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn current(&self) -> Option<Submitter> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no session file");
                return None;
            }
        };
        match serde_json::from_slice::<Submitter>(&data) {
            Ok(submitter) if !submitter.id.trim().is_empty() => Some(submitter),
            Ok(_) => {
                debug!(path = %self.path.display(), "session file has an empty submitter id");
                None
            }
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "unreadable session file");
                None
            }
        }
    }
}

/// Fixed identity for tests and bench rigs.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    submitter: Option<Submitter>,
}

impl StaticSession {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            submitter: Some(Submitter {
                id: id.into(),
                name: None,
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl SessionStore for StaticSession {
    fn current(&self) -> Option<Submitter> {
        self.submitter.clone()
    }
}
