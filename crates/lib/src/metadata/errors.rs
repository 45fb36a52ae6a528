//! Error types for user metadata persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing user metadata.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No record exists for the identity.
    #[error("No metadata record for user: {identity}")]
    RecordNotFound {
        /// The identity that was looked up
        identity: String,
    },

    /// A record failed validation before being stored or loaded.
    #[error("Invalid metadata record for '{identity}': {reason}")]
    InvalidRecord {
        /// The identity of the offending record
        identity: String,
        /// Why the record was rejected
        reason: String,
    },

    /// Reading or writing the metadata file failed.
    #[error("Metadata file I/O failed for {path}: {source}")]
    FileIo {
        /// The metadata file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Removing a user's on-disk data failed.
    #[error("Failed to remove user data at {path}: {source}")]
    DataRemovalFailed {
        /// The directory being removed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The metadata file could not be encoded.
    #[error("Metadata serialization failed: {source}")]
    SerializationFailed {
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The metadata file could not be decoded.
    #[error("Metadata deserialization failed: {source}")]
    DeserializationFailed {
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
    },
}

impl MetadataError {
    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::RecordNotFound { .. })
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            MetadataError::FileIo { .. } | MetadataError::DataRemovalFailed { .. }
        )
    }

    /// Check if this error came from encoding or decoding the metadata file.
    pub fn is_serialization_error(&self) -> bool {
        matches!(
            self,
            MetadataError::SerializationFailed { .. } | MetadataError::DeserializationFailed { .. }
        )
    }
}

impl From<MetadataError> for crate::Error {
    fn from(err: MetadataError) -> Self {
        crate::Error::Metadata(err)
    }
}
