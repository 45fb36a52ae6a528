//! Classification and remediation of engine failures.
//!
//! Classifying a failure also performs its remediation. The two are one step so
//! that bad users and sessions are torn down exactly once per failure, whether
//! or not the application ever installed an error handler.

use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{
    LogLevel,
    constants::ERROR_DOMAIN,
    engine::{EngineError, FailureClass},
    session::SyncSession,
};

/// Kind of error delivered to the application handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The owning user was invalidated; treat its credentials as revoked
    User,
    /// A specific session failed or was denied access
    Session,
    /// Diagnostic failure with no required action
    Internal,
}

/// Lifecycle change performed while classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remediation {
    None,
    SessionInvalidated,
    UserInvalidated,
}

/// A classified failure, ready for delivery.
#[derive(Clone)]
pub struct ClassifiedError {
    /// Error domain qualifying `code`
    pub domain: &'static str,
    /// Numeric code reported by the engine
    pub code: i32,
    pub message: String,
    pub kind: ErrorKind,
    pub class: FailureClass,
    /// What was already done about it
    pub remediation: Remediation,
    pub session: Option<Arc<SyncSession>>,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.domain, self.code, self.message)
    }
}

impl fmt::Debug for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifiedError")
            .field("domain", &self.domain)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("kind", &self.kind)
            .field("class", &self.class)
            .field("remediation", &self.remediation)
            .field("session", &self.session.as_ref().map(|s| s.id()))
            .finish()
    }
}

/// Whether a classified failure of `class` is forwarded to an installed handler.
///
/// Debug-class failures are only forwarded when verbosity is at least `Debug`.
pub fn should_deliver(class: FailureClass, level: LogLevel) -> bool {
    match class {
        FailureClass::Debug => level.includes_debug(),
        FailureClass::UserFatal | FailureClass::SessionFatal | FailureClass::AccessDenied => true,
    }
}

/// Classifies engine failures and applies their remediation.
///
/// Stateless: the user to invalidate is reached through the failing session,
/// never looked up by identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `error` and perform its remediation on the calling thread.
    ///
    /// | class        | remediation                  | kind     |
    /// |--------------|------------------------------|----------|
    /// | UserFatal    | invalidate the session owner | User     |
    /// | SessionFatal | invalidate the session       | Session  |
    /// | AccessDenied | none                         | Session  |
    /// | Debug        | none                         | Internal |
    pub fn classify(&self, error: EngineError) -> ClassifiedError {
        let EngineError {
            code,
            message,
            class,
            session,
        } = error;

        let (kind, remediation) = match class {
            FailureClass::UserFatal => (ErrorKind::User, self.invalidate_owner(session.as_deref())),
            FailureClass::SessionFatal => {
                let remediation = match &session {
                    Some(session) => {
                        session.invalidate();
                        Remediation::SessionInvalidated
                    }
                    None => {
                        warn!(code, "Session-fatal error without a session");
                        Remediation::None
                    }
                };
                (ErrorKind::Session, remediation)
            }
            // Delivered like SessionFatal, but the session stays open.
            FailureClass::AccessDenied => (ErrorKind::Session, Remediation::None),
            FailureClass::Debug => (ErrorKind::Internal, Remediation::None),
        };

        debug!(code, ?class, ?kind, ?remediation, "Classified engine error");
        ClassifiedError {
            domain: ERROR_DOMAIN,
            code,
            message,
            kind,
            class,
            remediation,
            session,
        }
    }

    fn invalidate_owner(&self, session: Option<&SyncSession>) -> Remediation {
        let Some(session) = session else {
            warn!("User-fatal error without a session; no user to invalidate");
            return Remediation::None;
        };
        match session.user() {
            Some(user) => {
                user.invalidate();
                Remediation::UserInvalidated
            }
            None => {
                warn!(
                    identity = %session.owner(),
                    session = %session.id(),
                    "User-fatal error for a dropped user"
                );
                Remediation::None
            }
        }
    }
}
