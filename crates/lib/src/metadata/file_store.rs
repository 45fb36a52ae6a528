//! JSON-file backed metadata store.
//!
//! Records live in memory and the whole document is rewritten on every
//! mutation. Writes go to a sibling temp file that is then renamed over the
//! target, so a crash mid-write leaves the previous document intact. The
//! in-memory map only changes once the write has succeeded.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};

use super::{MetadataError, MetadataStore, UserRecord, remove_user_data};
use crate::Result;

/// The current metadata file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const METADATA_VERSION: u8 = 0;

fn is_v0(v: &u8) -> bool {
    *v == 0
}

fn validate_metadata_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != METADATA_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported metadata version {version}; only version {METADATA_VERSION} is supported"
        )));
    }
    Ok(version)
}

/// On-disk document layout.
#[derive(Serialize, Deserialize, Default)]
struct MetadataDocument {
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_metadata_version"
    )]
    version: u8,
    #[serde(default)]
    users: BTreeMap<String, UserRecord>,
}

/// Metadata store persisted as a single JSON file.
#[derive(Debug)]
pub struct FileMetadataStore {
    /// Backing file; `None` keeps everything in memory
    path: Option<PathBuf>,
    /// Restrict the file to the owning OS user when writing
    protect_records: bool,
    records: RwLock<BTreeMap<String, UserRecord>>,
}

impl FileMetadataStore {
    /// Open (or create) the metadata file at `path`.
    ///
    /// A missing file yields an empty store; the file is created on first write.
    /// With `protect_records`, the file is written owner-read/write only on Unix.
    pub fn open(path: impl Into<PathBuf>, protect_records: bool) -> Result<Self> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(json) => {
                let document: MetadataDocument = serde_json::from_str(&json)
                    .map_err(|source| MetadataError::DeserializationFailed { source })?;
                document.users
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(MetadataError::FileIo {
                    path: path.clone(),
                    source,
                }
                .into());
            }
        };
        debug!(path = %path.display(), records = records.len(), "Opened metadata store");
        Ok(Self {
            path: Some(path),
            protect_records,
            records: RwLock::new(records),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            protect_records: false,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Backing file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether new writes are restricted to the owning OS user.
    pub fn protects_records(&self) -> bool {
        self.protect_records
    }

    /// Number of records, including those marked for removal.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    fn persist(&self, records: &BTreeMap<String, UserRecord>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let document = MetadataDocument {
            version: METADATA_VERSION,
            users: records.clone(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|source| MetadataError::SerializationFailed { source })?;

        let io_err = |source| MetadataError::FileIo {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        let mut file = self.open_for_write(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        trace!(path = %path.display(), records = records.len(), "Persisted metadata");
        Ok(())
    }

    #[cfg(unix)]
    fn open_for_write(&self, path: &Path) -> std::io::Result<fs::File> {
        use std::os::unix::fs::OpenOptionsExt;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        if self.protect_records {
            options.mode(0o600);
        }
        options.open(path)
    }

    #[cfg(not(unix))]
    fn open_for_write(&self, path: &Path) -> std::io::Result<fs::File> {
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    /// Apply `change` to a copy of the records, persist the copy, then swap it in.
    ///
    /// The write lock is held throughout, so mutations are serialized and a
    /// failed persist leaves the live map untouched.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, UserRecord>) -> Result<T>,
    ) -> Result<T> {
        let mut records = self.records.write().unwrap();
        let mut next = records.clone();
        let value = change(&mut next)?;
        self.persist(&next)?;
        *records = next;
        Ok(value)
    }

    fn not_found(identity: &str) -> crate::Error {
        MetadataError::RecordNotFound {
            identity: identity.to_string(),
        }
        .into()
    }
}

impl MetadataStore for FileMetadataStore {
    fn active_records(&self) -> Result<Vec<UserRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .filter(|r| !r.marked_for_removal)
            .cloned()
            .collect())
    }

    fn records_marked_for_removal(&self) -> Result<Vec<UserRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .filter(|r| r.marked_for_removal)
            .cloned()
            .collect())
    }

    fn remove(&self, identity: &str) -> Result<()> {
        // Data goes first so that a failure at any step leaves the record in
        // place for the next purge to retry.
        self.mutate(|records| {
            let record = records
                .remove(identity)
                .ok_or_else(|| Self::not_found(identity))?;
            remove_user_data(&record.data_dir)?;
            Ok(())
        })?;
        debug!(identity, "Removed user metadata and local data");
        Ok(())
    }

    fn upsert(&self, record: UserRecord) -> Result<()> {
        record.validate()?;
        self.mutate(|records| {
            records.insert(record.identity.clone(), record);
            Ok(())
        })
    }

    fn mark_for_removal(&self, identity: &str) -> Result<()> {
        self.mutate(|records| {
            let record = records
                .get_mut(identity)
                .ok_or_else(|| Self::not_found(identity))?;
            record.marked_for_removal = true;
            Ok(())
        })
    }

    fn record(&self, identity: &str) -> Result<Option<UserRecord>> {
        Ok(self.records.read().unwrap().get(identity).cloned())
    }
}
