//! User handles
//!
//! Represents one authenticated identity and the sessions opened on its behalf.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, info};
use zeroize::Zeroizing;

use super::UserError;
use crate::{
    Result,
    constants::STORE_EXTENSION,
    metadata::UserRecord,
    session::{SessionError, SessionKind, SessionState, SyncConfig, SyncSession},
};

/// Replace anything that is not safe in a single path component with `_`.
pub(crate) fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

/// One authenticated identity.
///
/// Handles are shared (`Arc<SyncUser>`) between the registry and whoever
/// looked them up. Invalidation is one-way: an invalid handle stays invalid and
/// refuses new sessions.
pub struct SyncUser {
    /// Registry key
    identity: String,

    /// Remote service the user authenticated against
    server_url: String,

    /// Credential, cleared from memory on drop
    refresh_token: Zeroizing<String>,

    /// Directory holding this user's local stores
    data_dir: PathBuf,

    /// Creation timestamp from the metadata record
    created_at: u64,

    valid: AtomicBool,

    /// Sessions keyed by local store path
    sessions: Mutex<HashMap<PathBuf, Arc<SyncSession>>>,
}

impl SyncUser {
    /// Materialize a handle from a persisted record.
    pub fn from_record(record: &UserRecord) -> Result<Self> {
        record.validate()?;
        Ok(Self {
            identity: record.identity.clone(),
            server_url: record.server_url.clone(),
            refresh_token: Zeroizing::new(record.refresh_token.clone()),
            data_dir: record.data_dir.clone(),
            created_at: record.created_at,
            valid: AtomicBool::new(true),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// A copy of the refresh token that is zeroized when dropped.
    pub fn refresh_token(&self) -> Zeroizing<String> {
        self.refresh_token.clone()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Local file location for a store synced under `config`.
    ///
    /// Derived from the server host and path so that distinct remote stores of
    /// the same user never collide on disk.
    pub fn file_path_for(&self, config: &SyncConfig) -> PathBuf {
        let url = &config.server_url;
        let mut name = url.host_str().unwrap_or("local").to_string();
        if let Some(port) = url.port() {
            name.push('_');
            name.push_str(&port.to_string());
        }
        let path = url.path().trim_matches('/');
        if !path.is_empty() {
            name.push('_');
            name.push_str(path);
        }
        self.data_dir
            .join(format!("{}.{STORE_EXTENSION}", sanitize_component(&name)))
    }

    /// Register a session for the local store at `path`.
    ///
    /// An active session already bound to `path` is returned as is. Closed or
    /// invalidated sessions for `path` are replaced. New sessions keep a weak
    /// reference to this handle.
    pub fn register_session(
        self: &Arc<Self>,
        path: impl Into<PathBuf>,
        config: SyncConfig,
        kind: SessionKind,
    ) -> Result<Arc<SyncSession>> {
        if config.user != self.identity {
            return Err(SessionError::UserMismatch {
                user: self.identity.clone(),
                config_user: config.user,
            }
            .into());
        }
        let path = path.into();

        let mut sessions = self.sessions.lock().unwrap();
        // Checked under the session lock so a concurrent invalidate() either
        // sees this session or rejects it.
        if !self.is_valid() {
            return Err(UserError::Invalidated {
                identity: self.identity.clone(),
            }
            .into());
        }
        if let Some(existing) = sessions.get(&path) {
            if existing.state() == SessionState::Active {
                return Ok(Arc::clone(existing));
            }
        }

        let session = Arc::new(SyncSession::new(
            path.clone(),
            config,
            kind,
            Arc::downgrade(self),
        ));
        sessions.insert(path, Arc::clone(&session));
        debug!(
            identity = %self.identity,
            session = %session.id(),
            path = %session.path().display(),
            ?kind,
            "Registered session"
        );
        Ok(session)
    }

    /// The session bound to `path`, if any.
    pub fn session_for_path(&self, path: &Path) -> Option<Arc<SyncSession>> {
        self.sessions.lock().unwrap().get(path).cloned()
    }

    /// Snapshot of every session in this user's table.
    pub fn sessions(&self) -> Vec<Arc<SyncSession>> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }

    /// Mark the user invalid and invalidate all of its sessions.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn invalidate(&self) -> bool {
        if !self.valid.swap(false, Ordering::AcqRel) {
            return false;
        }
        let sessions = self.sessions.lock().unwrap();
        for session in sessions.values() {
            session.invalidate();
        }
        info!(identity = %self.identity, sessions = sessions.len(), "Invalidated user");
        true
    }
}

impl fmt::Debug for SyncUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncUser")
            .field("identity", &self.identity)
            .field("server_url", &self.server_url)
            .field("refresh_token", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("valid", &self.is_valid())
            .field(
                "sessions",
                &format!("<{} sessions>", self.sessions.lock().unwrap().len()),
            )
            .finish()
    }
}
