//! User system for Concord
//!
//! Provides user handles, the registry of logged-in users, and the user error type.

pub mod errors;
pub mod registry;
pub mod sync_user;

pub use errors::UserError;
pub use registry::UserRegistry;
pub use sync_user::SyncUser;
