//! Bind request handling.
//!
//! The engine asks for a local store to be bound to a remote session. The
//! request is resolved against the registry: a live user gets an engine-owned
//! session registered, anything else is a stale request whose in-flight
//! connection is cancelled.

use std::{path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::{
    engine::SyncEngine,
    session::{SessionKind, SyncConfig, SyncSession},
    user::UserRegistry,
};

/// Result of handling one bind request.
#[derive(Debug, Clone)]
pub enum BindOutcome {
    /// A session was registered (or an active one reused) for the store
    Registered(Arc<SyncSession>),
    /// The request was stale and the engine was told to cancel the connection
    Rejected,
}

impl BindOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, BindOutcome::Registered(_))
    }
}

/// Resolves bind requests against the user registry.
///
/// Must only run on the delivery context.
pub struct BindCoordinator<'a> {
    registry: &'a UserRegistry,
    engine: &'a dyn SyncEngine,
}

impl<'a> BindCoordinator<'a> {
    pub fn new(registry: &'a UserRegistry, engine: &'a dyn SyncEngine) -> Self {
        Self { registry, engine }
    }

    /// Bind the store at `path` under `config`, or reject the request.
    ///
    /// A missing or invalidated user is not an error: the user logged out between
    /// the request and its delivery. No error is reported to the application.
    pub fn handle_bind_request(&self, path: &Path, config: SyncConfig) -> BindOutcome {
        let user = match self.registry.lookup(&config.user) {
            Some(user) if user.is_valid() => user,
            Some(_) => {
                debug!(identity = %config.user, path = %path.display(), "Bind request for invalidated user");
                return self.reject(path);
            }
            None => {
                debug!(identity = %config.user, path = %path.display(), "Bind request for unknown user");
                return self.reject(path);
            }
        };

        match user.register_session(path, config, SessionKind::Engine) {
            Ok(session) => BindOutcome::Registered(session),
            Err(e) => {
                // Lost a race with invalidation between lookup and registration.
                warn!(identity = %user.identity(), path = %path.display(), error = %e, "Bind request failed");
                self.reject(path)
            }
        }
    }

    fn reject(&self, path: &Path) -> BindOutcome {
        self.engine.cancel_connecting_session(path);
        BindOutcome::Rejected
    }
}
