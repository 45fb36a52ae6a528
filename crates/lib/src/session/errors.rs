//! Error types for sync sessions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when operating on a [`SyncSession`](super::SyncSession).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session was invalidated and can no longer be used.
    #[error("Session for {path} has been invalidated")]
    Invalidated {
        /// Local store path of the session
        path: PathBuf,
    },

    /// The configuration names a different user than the one asked to open the session.
    #[error("Configuration belongs to user '{config_user}', not '{user}'")]
    UserMismatch {
        /// The user asked to register the session
        user: String,
        /// The user named by the configuration
        config_user: String,
    },

    /// The server URL in a configuration could not be parsed.
    #[error("Invalid server URL '{url}': {reason}")]
    InvalidServerUrl {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },
}

impl SessionError {
    /// Check if this error was caused by an invalidated session.
    pub fn is_invalidated(&self) -> bool {
        matches!(self, SessionError::Invalidated { .. })
    }

    /// Check if this error was caused by a malformed configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SessionError::UserMismatch { .. } | SessionError::InvalidServerUrl { .. }
        )
    }
}

impl From<SessionError> for crate::Error {
    fn from(err: SessionError) -> Self {
        crate::Error::Session(err)
    }
}
