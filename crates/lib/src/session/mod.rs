//! Sync sessions
//!
//! A [`SyncSession`] binds one local store to a remote endpoint on behalf of one
//! user. Sessions live in their owning user's session table and point back at
//! that user weakly; the coordinator only drives their lifecycle (close,
//! invalidate).

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, Weak},
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::user::SyncUser;

pub mod errors;

pub use errors::SessionError;

/// Where a local store should sync to, and as whom.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Identity of the user that owns the binding
    pub user: String,

    /// Remote endpoint for this store
    pub server_url: Url,
}

impl SyncConfig {
    /// Build a configuration, parsing `server_url`.
    pub fn new(user: impl Into<String>, server_url: &str) -> Result<Self, SessionError> {
        let server_url = Url::parse(server_url).map_err(|e| SessionError::InvalidServerUrl {
            url: server_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            user: user.into(),
            server_url,
        })
    }
}

/// Who asked for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// Opened directly by the application via `session_for_configuration`
    Standalone,
    /// Opened in response to an engine bind request
    Engine,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Bound and syncing
    Active,
    /// Closed; the binding may be re-registered
    Inactive,
    /// Torn down after a fatal error; terminal
    Invalid,
}

/// One binding of a local store to a remote endpoint for one user.
pub struct SyncSession {
    id: Uuid,
    path: PathBuf,
    config: SyncConfig,
    kind: SessionKind,
    state: Mutex<SessionState>,
    /// The handle that registered this session
    user: Weak<SyncUser>,
}

impl SyncSession {
    pub(crate) fn new(
        path: PathBuf,
        config: SyncConfig,
        kind: SessionKind,
        user: Weak<SyncUser>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            config,
            kind,
            state: Mutex::new(SessionState::Active),
            user,
        }
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Identity of the owning user.
    pub fn owner(&self) -> &str {
        &self.config.user
    }

    /// The user handle this session was registered on, if it is still alive.
    ///
    /// This is the exact handle, not whichever user currently holds the
    /// identity in the registry.
    pub fn user(&self) -> Option<Arc<SyncUser>> {
        self.user.upgrade()
    }

    /// Local store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Check if the session has not been invalidated.
    pub fn is_valid(&self) -> bool {
        self.state() != SessionState::Invalid
    }

    /// Close an active session. Returns `true` if the state changed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != SessionState::Active {
            return false;
        }
        *state = SessionState::Inactive;
        debug!(session = %self.id, path = %self.path.display(), "Closed session");
        true
    }

    /// Invalidate the session permanently. Returns `true` if the state changed.
    pub fn invalidate(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Invalid {
            return false;
        }
        *state = SessionState::Invalid;
        debug!(session = %self.id, path = %self.path.display(), "Invalidated session");
        true
    }

    /// Fail with [`SessionError::Invalidated`] if the session is no longer usable.
    pub fn ensure_valid(&self) -> Result<(), SessionError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SessionError::Invalidated {
                path: self.path.clone(),
            })
        }
    }
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("id", &self.id)
            .field("owner", &self.config.user)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
