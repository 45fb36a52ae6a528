//! Seam between the coordinator and the low-level sync engine.
//!
//! The engine owns transports and connection state. It tells the coordinator
//! about two things, each on a thread of its own choosing: session failures
//! (the error callback) and local stores that want to be bound to a remote
//! session (the login callback). The coordinator in turn sets the engine's
//! verbosity and asks it to cancel connections that are no longer wanted.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{LogLevel, session::SyncConfig, session::SyncSession};

pub mod loopback;

pub use loopback::LoopbackEngine;

/// Severity class the engine attaches to every failure it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureClass {
    /// The user's credentials are no longer accepted
    UserFatal,
    /// The session cannot continue
    SessionFatal,
    /// The server refused access to the remote store
    AccessDenied,
    /// Informational failure, of interest only with verbose diagnostics
    Debug,
}

/// A failure reported by the engine.
#[derive(Clone)]
pub struct EngineError {
    /// Engine-specific numeric code
    pub code: i32,
    /// Human-readable description
    pub message: String,
    pub class: FailureClass,
    /// The session the failure belongs to, if it is session-scoped
    pub session: Option<Arc<SyncSession>>,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>, class: FailureClass) -> Self {
        Self {
            code,
            message: message.into(),
            class,
            session: None,
        }
    }

    /// Attach the session the failure belongs to.
    pub fn with_session(mut self, session: Arc<SyncSession>) -> Self {
        self.session = Some(session);
        self
    }
}

impl fmt::Debug for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("class", &self.class)
            .field("session", &self.session.as_ref().map(|s| s.id()))
            .finish()
    }
}

/// Invoked by the engine for every failure, on an engine thread.
pub type EngineErrorCallback = Arc<dyn Fn(EngineError) + Send + Sync>;

/// Invoked by the engine when the store at `path` wants a session, on an engine thread.
pub type LoginCallback = Arc<dyn Fn(PathBuf, SyncConfig) + Send + Sync>;

/// The low-level sync engine as seen by the coordinator.
///
/// Callbacks may fire at any time after they are installed, from any thread,
/// including while the coordinator is still bootstrapping.
pub trait SyncEngine: Send + Sync + fmt::Debug {
    /// Install the process-wide error callback, replacing any previous one.
    fn set_error_callback(&self, callback: EngineErrorCallback);

    /// Install the process-wide login callback, replacing any previous one.
    fn set_login_callback(&self, callback: LoginCallback);

    /// Change the engine's log verbosity.
    fn set_log_level(&self, level: LogLevel);

    /// Abort the in-flight connection for `path` if it has not finished connecting.
    fn cancel_connecting_session(&self, path: &Path);
}
