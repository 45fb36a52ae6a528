use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use concord::{
    ClassifiedError, CoordinatorConfig, FixedClock, SyncCoordinator,
    engine::LoopbackEngine,
    metadata::{FileMetadataStore, MetadataStore, UserRecord},
};

pub const SERVER_URL: &str = "https://sync.example.com";

/// Configuration rooted at `dir` with a fixed app identifier.
pub fn test_config(dir: &Path) -> CoordinatorConfig {
    CoordinatorConfig {
        app_identifier: Some("concord-tests".to_string()),
        ..CoordinatorConfig::new(dir)
    }
}

/// Open a file-backed coordinator in `dir` with a fresh loopback engine.
pub fn open_coordinator(dir: &Path) -> (SyncCoordinator, Arc<LoopbackEngine>) {
    let engine = Arc::new(LoopbackEngine::new());
    let coordinator = SyncCoordinator::open(test_config(dir), engine.clone())
        .expect("Failed to open coordinator");
    (coordinator, engine)
}

/// Open a coordinator over an in-memory store and a fixed clock.
pub fn in_memory_coordinator(dir: &Path) -> (SyncCoordinator, Arc<LoopbackEngine>) {
    let engine = Arc::new(LoopbackEngine::new());
    let coordinator = SyncCoordinator::with_metadata(
        test_config(dir),
        engine.clone(),
        Arc::new(FileMetadataStore::in_memory()),
        Arc::new(FixedClock::default()),
    )
    .expect("Failed to build coordinator");
    (coordinator, engine)
}

/// A user record whose data lives under `root/<identity>`.
pub fn record(identity: &str, root: &Path) -> UserRecord {
    UserRecord {
        identity: identity.to_string(),
        server_url: SERVER_URL.to_string(),
        refresh_token: format!("{identity}-token"),
        data_dir: root.join(identity),
        created_at: 1704067200000,
        marked_for_removal: false,
    }
}

/// Write `records` to the metadata file a coordinator in `dir` would open.
///
/// Each record's data directory is created with a single store file in it.
pub fn seed_metadata(dir: &Path, records: Vec<UserRecord>) -> Vec<PathBuf> {
    let store = FileMetadataStore::open(test_config(dir).metadata_path(), true)
        .expect("Failed to open metadata store");
    let mut data_dirs = Vec::new();
    for record in records {
        std::fs::create_dir_all(&record.data_dir).unwrap();
        std::fs::write(record.data_dir.join("default.store"), b"data").unwrap();
        data_dirs.push(record.data_dir.clone());
        store.upsert(record).unwrap();
    }
    data_dirs
}

/// Install an error handler that collects everything delivered to it.
pub fn collect_errors(coordinator: &SyncCoordinator) -> Arc<Mutex<Vec<ClassifiedError>>> {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    coordinator.set_error_handler(move |error| sink.lock().unwrap().push(error));
    delivered
}

/// Identities currently registered, sorted.
pub fn registered_identities(coordinator: &SyncCoordinator) -> Vec<String> {
    let mut identities: Vec<String> = coordinator
        .all_users()
        .iter()
        .map(|user| user.identity().to_string())
        .collect();
    identities.sort();
    identities
}
