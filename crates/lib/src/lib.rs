//! Concord: the client-side coordinator for a multi-user sync client.
//! This library tracks authenticated users, persists them across restarts, binds
//! local stores to remote sessions, and routes session failures to the application.
//!
//! ## Core Concepts
//!
//! * **Users (`user::SyncUser`)**: One authenticated identity, keyed by an opaque identity string.
//! * **Registry (`user::UserRegistry`)**: The authoritative in-memory set of logged-in users.
//! * **Sessions (`session::SyncSession`)**: One binding of a local store to a remote endpoint for one user.
//! * **Metadata (`metadata::MetadataStore`)**: Persisted user records, including the removal flag
//!   that drives garbage collection at startup.
//! * **Engine (`engine::SyncEngine`)**: The low-level sync layer. It reports failures and asks for
//!   local stores to be bound; both arrive on arbitrary threads.
//! * **Coordinator (`coordinator::SyncCoordinator`)**: The process-wide singleton tying the above
//!   together. Engine events are marshaled onto a single delivery thread before they touch
//!   application-visible state.

pub mod clock;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod engine;
pub mod metadata;
pub mod session;
pub mod user;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use config::{CoordinatorConfig, LogLevel};
pub use coordinator::{ClassifiedError, ErrorHandler, ErrorKind, Remediation, SyncCoordinator};
pub use session::{SyncConfig, SyncSession};
pub use user::{SyncUser, UserRegistry};

/// Result type used throughout the Concord library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Concord library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured user errors from the user module
    #[error(transparent)]
    User(user::UserError),

    /// Structured session errors from the session module
    #[error(transparent)]
    Session(session::SessionError),

    /// Structured persistence errors from the metadata module
    #[error(transparent)]
    Metadata(metadata::MetadataError),

    /// Structured coordinator errors from the coordinator module
    #[error(transparent)]
    Coordinator(coordinator::CoordinatorError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::User(_) => "user",
            Error::Session(_) => "session",
            Error::Metadata(_) => "metadata",
            Error::Coordinator(_) => "coordinator",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::User(user_err) => user_err.is_not_found(),
            Error::Metadata(metadata_err) => metadata_err.is_not_found(),
            Error::Coordinator(coordinator_err) => coordinator_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error was caused by an invalidated user or session.
    pub fn is_invalidated(&self) -> bool {
        match self {
            Error::User(user_err) => user_err.is_invalidated(),
            Error::Session(session_err) => session_err.is_invalidated(),
            Error::Coordinator(coordinator_err) => coordinator_err.is_invalidated(),
            _ => false,
        }
    }

    /// Check if this error is a caller contract violation rather than a runtime failure.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Error::User(user_err) => user_err.is_contract_violation(),
            Error::Coordinator(coordinator_err) => coordinator_err.is_contract_violation(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Metadata(metadata_err) => metadata_err.is_io_error(),
            _ => false,
        }
    }
}
