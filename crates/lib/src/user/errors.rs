//! Error types for the user system
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UserError {
    /// Deregistration of an identity the registry never held.
    ///
    /// This is a caller bug, not a runtime condition; it is returned directly
    /// and never routed to the application's error handler.
    #[error("User not registered: {identity}")]
    NotRegistered { identity: String },

    #[error("User not found: {identity}")]
    UserNotFound { identity: String },

    #[error("User has been invalidated: {identity}")]
    Invalidated { identity: String },

    #[error("Invalid identity: {reason}")]
    InvalidIdentity { reason: String },
}

impl UserError {
    /// Check if this error indicates a user was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            UserError::UserNotFound { .. } | UserError::NotRegistered { .. }
        )
    }

    /// Check if this error was caused by an invalidated user.
    pub fn is_invalidated(&self) -> bool {
        matches!(self, UserError::Invalidated { .. })
    }

    /// Check if this error is a caller contract violation.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, UserError::NotRegistered { .. })
    }
}

impl From<UserError> for crate::Error {
    fn from(err: UserError) -> Self {
        crate::Error::User(err)
    }
}
