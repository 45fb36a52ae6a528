//! In-process engine.
//!
//! `LoopbackEngine` has no transport. It keeps the callbacks the coordinator
//! installs and lets the embedding code fire them directly, which is how the
//! CLI drives the coordinator and how tests simulate engine threads.

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};

use tracing::{debug, trace};

use super::{EngineError, EngineErrorCallback, LoginCallback, SyncEngine};
use crate::{LogLevel, session::SyncConfig};

#[derive(Default)]
pub struct LoopbackEngine {
    error_callback: RwLock<Option<EngineErrorCallback>>,
    login_callback: RwLock<Option<LoginCallback>>,
    log_level: RwLock<Option<LogLevel>>,
    cancelled: Mutex<Vec<PathBuf>>,
}

impl std::fmt::Debug for LoopbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackEngine")
            .field("error_callback", &self.error_callback.read().unwrap().is_some())
            .field("login_callback", &self.login_callback.read().unwrap().is_some())
            .field("log_level", &self.log_level())
            .field("cancelled", &self.cancelled.lock().unwrap().len())
            .finish()
    }
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the error callback on the calling thread.
    ///
    /// Returns `false` if no callback is installed.
    pub fn report_error(&self, error: EngineError) -> bool {
        // Clone out of the lock so the callback runs unlocked.
        let callback = self.error_callback.read().unwrap().clone();
        match callback {
            Some(callback) => {
                trace!(code = error.code, class = ?error.class, "Reporting engine error");
                callback(error);
                true
            }
            None => false,
        }
    }

    /// Fire the login callback on the calling thread.
    ///
    /// Returns `false` if no callback is installed.
    pub fn request_bind(&self, path: impl Into<PathBuf>, config: SyncConfig) -> bool {
        let callback = self.login_callback.read().unwrap().clone();
        match callback {
            Some(callback) => {
                callback(path.into(), config);
                true
            }
            None => false,
        }
    }

    /// Last level pushed by the coordinator.
    pub fn log_level(&self) -> Option<LogLevel> {
        *self.log_level.read().unwrap()
    }

    /// Paths passed to `cancel_connecting_session`, oldest first.
    pub fn cancelled_paths(&self) -> Vec<PathBuf> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl SyncEngine for LoopbackEngine {
    fn set_error_callback(&self, callback: EngineErrorCallback) {
        *self.error_callback.write().unwrap() = Some(callback);
    }

    fn set_login_callback(&self, callback: LoginCallback) {
        *self.login_callback.write().unwrap() = Some(callback);
    }

    fn set_log_level(&self, level: LogLevel) {
        *self.log_level.write().unwrap() = Some(level);
    }

    fn cancel_connecting_session(&self, path: &Path) {
        debug!(path = %path.display(), "Cancelling connecting session");
        self.cancelled.lock().unwrap().push(path.to_path_buf());
    }
}
