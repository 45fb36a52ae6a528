//! In-memory registry of logged-in users.
//!
//! Every operation runs under one mutex. The map is small (one entry per
//! logged-in user) and every operation is a single hash map call, so the lock
//! is never held for long and never across I/O or callbacks.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::debug;

use super::{SyncUser, UserError};

/// Authoritative identity → user mapping.
///
/// First registration wins: registering an identity that is already present
/// returns the existing handle and leaves the map untouched.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: Mutex<HashMap<String, Arc<SyncUser>>>,
}

impl UserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user` under its identity.
    ///
    /// Returns `None` if this call inserted the user, or the handle that was
    /// already registered. Among concurrent callers with the same identity,
    /// exactly one observes `None`.
    pub fn register(&self, user: Arc<SyncUser>) -> Option<Arc<SyncUser>> {
        let mut users = self.users.lock().unwrap();
        if let Some(existing) = users.get(user.identity()) {
            return Some(Arc::clone(existing));
        }
        debug!(identity = %user.identity(), "Registered user");
        users.insert(user.identity().to_string(), user);
        None
    }

    /// Remove `user` from the registry.
    ///
    /// Fails with [`UserError::NotRegistered`] if the identity is absent or is
    /// registered to a different handle.
    pub fn deregister(&self, user: &SyncUser) -> Result<(), UserError> {
        let mut users = self.users.lock().unwrap();
        match users.get(user.identity()) {
            Some(existing) if std::ptr::eq(Arc::as_ptr(existing), user) => {
                users.remove(user.identity());
                debug!(identity = %user.identity(), "Deregistered user");
                Ok(())
            }
            _ => Err(UserError::NotRegistered {
                identity: user.identity().to_string(),
            }),
        }
    }

    /// Remove the entry for `identity`, returning the removed handle.
    pub fn deregister_identity(&self, identity: &str) -> Result<Arc<SyncUser>, UserError> {
        let removed = self.users.lock().unwrap().remove(identity);
        match removed {
            Some(user) => {
                debug!(identity, "Deregistered user");
                Ok(user)
            }
            None => Err(UserError::NotRegistered {
                identity: identity.to_string(),
            }),
        }
    }

    /// Look up a user by identity.
    pub fn lookup(&self, identity: &str) -> Option<Arc<SyncUser>> {
        self.users.lock().unwrap().get(identity).cloned()
    }

    /// Consistent snapshot of all registered users.
    pub fn all_users(&self) -> Vec<Arc<SyncUser>> {
        self.users.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().unwrap().is_empty()
    }
}
