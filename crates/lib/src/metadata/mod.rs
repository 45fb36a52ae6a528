//! Persisted user metadata.
//!
//! A [`MetadataStore`] holds one [`UserRecord`] per identity. Logging out does
//! not delete a record immediately; it marks it for removal, and the next
//! coordinator bootstrap purges it together with the user's local data.

use std::{fmt::Debug, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

pub mod errors;
pub mod file_store;

pub use errors::MetadataError;
pub use file_store::FileMetadataStore;

/// Persisted representation of one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique identity (registry key)
    pub identity: String,

    /// Remote sync service the user authenticated against
    pub server_url: String,

    /// Credential used to resume the user's sessions
    pub refresh_token: String,

    /// Directory holding the user's local stores
    pub data_dir: PathBuf,

    /// Creation timestamp (milliseconds since Unix epoch)
    pub created_at: u64,

    /// Set on logout; the record and `data_dir` are deleted at next bootstrap
    #[serde(default)]
    pub marked_for_removal: bool,
}

impl UserRecord {
    /// Check that the record is usable as a registry entry.
    pub fn validate(&self) -> std::result::Result<(), MetadataError> {
        let reason = if self.identity.trim().is_empty() {
            "identity is empty"
        } else if self.server_url.trim().is_empty() {
            "server url is empty"
        } else {
            return Ok(());
        };
        Err(MetadataError::InvalidRecord {
            identity: self.identity.clone(),
            reason: reason.to_string(),
        })
    }
}

/// Storage for user records.
///
/// Implementations must be safe to call from any thread. The coordinator never
/// calls into the store while holding its registry lock.
pub trait MetadataStore: Send + Sync + Debug {
    /// All records not marked for removal.
    fn active_records(&self) -> Result<Vec<UserRecord>>;

    /// All records marked for removal.
    fn records_marked_for_removal(&self) -> Result<Vec<UserRecord>>;

    /// Delete a record and the on-disk data it points to.
    ///
    /// Fails with [`MetadataError::RecordNotFound`] when no such record exists.
    fn remove(&self, identity: &str) -> Result<()>;

    /// Insert a record, replacing any record with the same identity.
    fn upsert(&self, record: UserRecord) -> Result<()>;

    /// Flag a record for deletion at next bootstrap.
    ///
    /// Fails with [`MetadataError::RecordNotFound`] when no such record exists.
    fn mark_for_removal(&self, identity: &str) -> Result<()>;

    /// Look up a single record, regardless of its removal flag.
    fn record(&self, identity: &str) -> Result<Option<UserRecord>>;
}

/// Delete a user's local data directory. A missing directory is not an error.
pub fn remove_user_data(data_dir: &Path) -> std::result::Result<(), MetadataError> {
    match std::fs::remove_dir_all(data_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(MetadataError::DataRemovalFailed {
            path: data_dir.to_path_buf(),
            source,
        }),
    }
}
