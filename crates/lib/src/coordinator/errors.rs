//! Error types for the coordinator.

use thiserror::Error;

/// Errors raised by [`SyncCoordinator`](super::SyncCoordinator) operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// `configure` was called after the shared coordinator was built.
    #[error("Shared coordinator is already initialized")]
    AlreadyInitialized,

    /// A bootstrap step failed; the coordinator was not constructed.
    #[error("Coordinator bootstrap failed during {stage}: {source}")]
    BootstrapFailed {
        /// The failing step
        stage: &'static str,
        /// What went wrong
        #[source]
        source: Box<crate::Error>,
    },

    /// The configuration names a user that is not logged in.
    #[error("No registered user for identity: {identity}")]
    UserNotFound {
        /// The identity that was looked up
        identity: String,
    },

    /// The configuration names a user that has been invalidated.
    #[error("User '{identity}' has been invalidated")]
    UserInvalid {
        /// The invalidated identity
        identity: String,
    },

    /// A log level string could not be parsed.
    #[error("Unknown log level: {value}")]
    InvalidLogLevel {
        /// The rejected input
        value: String,
    },

    /// The delivery thread could not be started.
    #[error("Failed to start delivery thread: {source}")]
    DeliveryStart {
        #[source]
        source: std::io::Error,
    },

    /// The delivery thread has shut down and no longer accepts tasks.
    #[error("Delivery context is closed")]
    DeliveryClosed,
}

impl CoordinatorError {
    /// Wrap an error raised by a bootstrap step.
    pub(crate) fn bootstrap(stage: &'static str, source: crate::Error) -> Self {
        CoordinatorError::BootstrapFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// Check if this error indicates a user was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoordinatorError::UserNotFound { .. })
    }

    /// Check if this error was caused by an invalidated user.
    pub fn is_invalidated(&self) -> bool {
        matches!(self, CoordinatorError::UserInvalid { .. })
    }

    /// Check if this error is a caller contract violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CoordinatorError::AlreadyInitialized)
    }

    /// Check if this error came from bootstrap.
    pub fn is_bootstrap_error(&self) -> bool {
        matches!(self, CoordinatorError::BootstrapFailed { .. })
    }

    /// The bootstrap step that failed, if any.
    pub fn bootstrap_stage(&self) -> Option<&'static str> {
        match self {
            CoordinatorError::BootstrapFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

impl From<CoordinatorError> for crate::Error {
    fn from(err: CoordinatorError) -> Self {
        crate::Error::Coordinator(err)
    }
}
