//! Provides the process-wide [`SyncCoordinator`].
//!
//! The coordinator owns the user registry, the metadata store, the engine seam
//! and the delivery context. Engine failures are classified and remediated on
//! the engine thread that reported them, then handed to the application's error
//! handler on the delivery thread. Bind requests go straight to the delivery
//! thread and are resolved there.

use std::{
    fmt,
    path::PathBuf,
    sync::{
        Arc, Mutex, OnceLock, PoisonError, RwLock, Weak,
        atomic::{AtomicU8, Ordering},
    },
};

use handle_trait::Handle;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    Clock, CoordinatorConfig, LogLevel, Result, SystemClock,
    constants::USERS_DIR,
    engine::{EngineError, LoopbackEngine, SyncEngine},
    metadata::{FileMetadataStore, MetadataStore, UserRecord},
    session::{SessionError, SessionKind, SyncConfig, SyncSession},
    user::{SyncUser, UserError, UserRegistry, sync_user::sanitize_component},
};

pub mod bind;
pub mod classifier;
pub mod delivery;
pub mod errors;

pub use bind::{BindCoordinator, BindOutcome};
pub use classifier::{ClassifiedError, ErrorClassifier, ErrorKind, Remediation, should_deliver};
pub use delivery::DeliveryQueue;
pub use errors::CoordinatorError;

/// Application callback receiving classified errors on the delivery thread.
pub type ErrorHandler = Arc<dyn Fn(ClassifiedError) + Send + Sync>;

/// Process-wide instance, built on first access.
static SHARED: OnceLock<SyncCoordinator> = OnceLock::new();

/// Serializes construction of [`SHARED`] and updates to [`SHARED_SETUP`].
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Setup recorded by [`SyncCoordinator::configure`].
static SHARED_SETUP: Mutex<Option<(CoordinatorConfig, Arc<dyn SyncEngine>)>> = Mutex::new(None);

/// Internal state for SyncCoordinator
///
/// SyncCoordinator itself is a cheap-to-clone handle wrapping Arc<CoordinatorInner>.
struct CoordinatorInner {
    config: CoordinatorConfig,
    app_identifier: String,
    registry: UserRegistry,
    metadata: Arc<dyn MetadataStore>,
    engine: Arc<dyn SyncEngine>,
    clock: Arc<dyn Clock>,
    delivery: DeliveryQueue,
    error_handler: RwLock<Option<ErrorHandler>>,
    log_level: AtomicU8,
    /// Serializes log_in and log_out so the registry and the metadata store
    /// change together
    lifecycle: Mutex<()>,
}

/// The user registry and session coordinator.
///
/// Cheap-to-clone handle. Use [`SyncCoordinator::shared`] for the process-wide
/// instance, or [`SyncCoordinator::open`] / [`SyncCoordinator::with_metadata`]
/// to build an independent one.
///
/// ## Example
///
/// ```
/// # use std::sync::Arc;
/// # use concord::{CoordinatorConfig, SyncConfig, SyncCoordinator, engine::LoopbackEngine};
/// # fn main() -> concord::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// let engine = Arc::new(LoopbackEngine::new());
/// let coordinator = SyncCoordinator::open(CoordinatorConfig::new(dir.path()), engine)?;
///
/// coordinator.set_error_handler(|error| eprintln!("sync error: {error}"));
/// coordinator.log_in("alice", "https://sync.example.com", "refresh-token")?;
///
/// let config = SyncConfig::new("alice", "https://sync.example.com/notes")?;
/// let session = coordinator.session_for_configuration(config)?;
/// assert!(session.is_valid());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Handle)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

/// Weak reference to a SyncCoordinator.
///
/// Engine callbacks hold this so that the engine never keeps a coordinator alive.
#[derive(Clone, Handle)]
pub struct WeakCoordinator {
    inner: Weak<CoordinatorInner>,
}

impl SyncCoordinator {
    /// Record the configuration and engine used to build the shared instance.
    ///
    /// Must be called before the first [`SyncCoordinator::shared`]; afterwards it
    /// fails with [`CoordinatorError::AlreadyInitialized`].
    pub fn configure(config: CoordinatorConfig, engine: Arc<dyn SyncEngine>) -> Result<()> {
        let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if SHARED.get().is_some() {
            return Err(CoordinatorError::AlreadyInitialized.into());
        }
        *SHARED_SETUP.lock().unwrap_or_else(PoisonError::into_inner) = Some((config, engine));
        Ok(())
    }

    /// The process-wide coordinator, constructed on first access.
    ///
    /// Concurrent first callers all receive the same fully bootstrapped
    /// instance. Without a prior [`SyncCoordinator::configure`], the
    /// configuration comes from the environment and the engine is a
    /// [`LoopbackEngine`]. A failed construction is returned to the caller and
    /// attempted again on the next access.
    pub fn shared() -> Result<SyncCoordinator> {
        if let Some(coordinator) = SHARED.get() {
            return Ok(coordinator.handle());
        }
        let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(coordinator) = SHARED.get() {
            return Ok(coordinator.handle());
        }

        let setup = SHARED_SETUP
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let (config, engine) = match setup {
            Some(setup) => setup,
            None => (
                CoordinatorConfig::from_env()?,
                Arc::new(LoopbackEngine::new()) as Arc<dyn SyncEngine>,
            ),
        };
        let coordinator = Self::open(config, engine)?;
        let _ = SHARED.set(coordinator.handle());
        Ok(coordinator)
    }

    /// Build a coordinator backed by the JSON metadata file named in `config`.
    pub fn open(config: CoordinatorConfig, engine: Arc<dyn SyncEngine>) -> Result<Self> {
        let metadata = FileMetadataStore::open(config.metadata_path(), config.protect_records)
            .map_err(|e| CoordinatorError::bootstrap("open_metadata", e))?;
        Self::with_metadata(config, engine, Arc::new(metadata), Arc::new(SystemClock))
    }

    /// Build a coordinator over an already opened metadata store.
    ///
    /// Installs the engine callbacks, pushes the configured log level, purges
    /// users marked for removal and then loads the remaining users. Purging
    /// first keeps a record deleted out-of-band from being resurrected. If
    /// either step fails nothing is returned; the engine callbacks installed
    /// so far turn into no-ops.
    pub fn with_metadata(
        config: CoordinatorConfig,
        engine: Arc<dyn SyncEngine>,
        metadata: Arc<dyn MetadataStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let delivery = DeliveryQueue::start()?;
        let coordinator = Self {
            inner: Arc::new(CoordinatorInner {
                app_identifier: config.resolve_app_identifier(),
                log_level: AtomicU8::new(config.log_level as u8),
                config,
                registry: UserRegistry::new(),
                metadata,
                engine,
                clock,
                delivery,
                error_handler: RwLock::new(None),
                lifecycle: Mutex::new(()),
            }),
        };

        coordinator.install_engine_callbacks();
        coordinator
            .inner
            .engine
            .set_log_level(coordinator.log_level());

        coordinator
            .purge_removed_users()
            .map_err(|e| CoordinatorError::bootstrap("purge", e))?;
        coordinator
            .load_active_users()
            .map_err(|e| CoordinatorError::bootstrap("load", e))?;

        info!(
            users = coordinator.inner.registry.len(),
            app = %coordinator.inner.app_identifier,
            "Sync coordinator ready"
        );
        Ok(coordinator)
    }

    fn install_engine_callbacks(&self) {
        let weak = self.downgrade();
        self.inner
            .engine
            .set_error_callback(Arc::new(move |error: EngineError| {
                if let Some(coordinator) = weak.upgrade() {
                    coordinator.handle_engine_error(error);
                }
            }));

        let weak = self.downgrade();
        self.inner
            .engine
            .set_login_callback(Arc::new(move |path: PathBuf, config: SyncConfig| {
                if let Some(coordinator) = weak.upgrade() {
                    coordinator.request_bind(path, config);
                }
            }));
    }

    fn purge_removed_users(&self) -> Result<()> {
        let removed = self.inner.metadata.records_marked_for_removal()?;
        for record in &removed {
            self.inner.metadata.remove(&record.identity)?;
            info!(identity = %record.identity, "Purged removed user");
        }
        Ok(())
    }

    fn load_active_users(&self) -> Result<()> {
        // Build every handle before registering any, so a bad record leaves the
        // registry untouched.
        let users = self
            .inner
            .metadata
            .active_records()?
            .iter()
            .map(|record| SyncUser::from_record(record).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        for user in users {
            if self.inner.registry.register(Arc::clone(&user)).is_some() {
                warn!(identity = %user.identity(), "Duplicate metadata record ignored");
            }
        }
        Ok(())
    }

    // === Engine events ===

    /// Classify and remediate an engine failure, then queue it for the error handler.
    ///
    /// Remediation happens on the calling thread before this returns. The
    /// handler slot and log level are read once here; delivery itself happens
    /// later on the delivery thread.
    pub fn handle_engine_error(&self, error: EngineError) {
        let classified = ErrorClassifier::new().classify(error);

        let handler = self
            .inner
            .error_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            debug!(code = classified.code, "No error handler installed; dropping error");
            return;
        };
        if !should_deliver(classified.class, self.log_level()) {
            debug!(code = classified.code, "Suppressing debug-class error");
            return;
        }
        if let Err(e) = self.inner.delivery.dispatch(move || handler(classified)) {
            warn!(error = %e, "Failed to queue error delivery");
        }
    }

    /// Queue a bind request for resolution on the delivery thread.
    pub fn request_bind(&self, path: PathBuf, config: SyncConfig) {
        let weak = self.downgrade();
        let queued = self.inner.delivery.dispatch(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.bind_coordinator().handle_bind_request(&path, config);
            }
        });
        if let Err(e) = queued {
            warn!(error = %e, "Failed to queue bind request");
        }
    }

    /// Bind resolver over this coordinator's registry and engine.
    pub fn bind_coordinator(&self) -> BindCoordinator<'_> {
        BindCoordinator::new(&self.inner.registry, self.inner.engine.as_ref())
    }

    /// Block until all work queued on the delivery thread so far has run.
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush_delivery(&self) -> Result<()> {
        Ok(self.inner.delivery.flush()?)
    }

    /// Check if the caller is running on the delivery thread.
    pub fn is_delivery_context(&self) -> bool {
        self.inner.delivery.is_current()
    }

    // === Application surface ===

    /// Open a standalone session for `config` on the owning user.
    ///
    /// The local file location is derived from the user and the server URL.
    pub fn session_for_configuration(&self, config: SyncConfig) -> Result<Arc<SyncSession>> {
        let user = self.user_for_identity(&config.user).ok_or_else(|| {
            CoordinatorError::UserNotFound {
                identity: config.user.clone(),
            }
        })?;
        if !user.is_valid() {
            return Err(CoordinatorError::UserInvalid {
                identity: config.user.clone(),
            }
            .into());
        }
        let path = user.file_path_for(&config);
        user.register_session(path, config, SessionKind::Standalone)
    }

    /// Install the error handler, replacing any previous one.
    pub fn set_error_handler(&self, handler: impl Fn(ClassifiedError) + Send + Sync + 'static) {
        *self
            .inner
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Remove the error handler. Errors are still remediated, then dropped.
    pub fn clear_error_handler(&self) {
        *self
            .inner
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_error_handler(&self) -> bool {
        self.inner
            .error_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.log_level.load(Ordering::Acquire))
    }

    /// Change verbosity locally and in the engine.
    pub fn set_log_level(&self, level: LogLevel) {
        self.inner.log_level.store(level as u8, Ordering::Release);
        self.inner.engine.set_log_level(level);
        debug!(%level, "Log level changed");
    }

    pub fn app_identifier(&self) -> &str {
        &self.inner.app_identifier
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.inner.metadata
    }

    pub fn engine(&self) -> &Arc<dyn SyncEngine> {
        &self.inner.engine
    }

    // === User lifecycle ===

    /// Log a user in, persisting its record.
    ///
    /// If a valid user with this identity is already registered, that handle is
    /// returned and nothing is written. An invalidated user with the same
    /// identity is replaced. The record is written before the handle is
    /// registered; if the write fails nothing is registered.
    pub fn log_in(
        &self,
        identity: &str,
        server_url: &str,
        refresh_token: &str,
    ) -> Result<Arc<SyncUser>> {
        if identity.trim().is_empty() {
            return Err(UserError::InvalidIdentity {
                reason: "identity is empty".to_string(),
            }
            .into());
        }
        Url::parse(server_url).map_err(|e| SessionError::InvalidServerUrl {
            url: server_url.to_string(),
            reason: e.to_string(),
        })?;

        let _lifecycle = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = self.user_for_identity(identity) {
            if existing.is_valid() {
                return Ok(existing);
            }
            match self.inner.registry.deregister(&existing) {
                Ok(()) => debug!(identity, "Replacing invalidated user"),
                // Swapped through deregister_user/register_user since the lookup.
                Err(e) => debug!(identity, error = %e, "Invalidated user already replaced"),
            }
        }

        let record = UserRecord {
            identity: identity.to_string(),
            server_url: server_url.to_string(),
            refresh_token: refresh_token.to_string(),
            data_dir: self.user_data_dir(identity),
            created_at: self.inner.clock.now_millis(),
            marked_for_removal: false,
        };
        let user = Arc::new(SyncUser::from_record(&record)?);
        self.inner.metadata.upsert(record)?;

        if let Some(existing) = self.register_user(Arc::clone(&user)) {
            // Only register_user bypasses the lifecycle lock.
            warn!(identity, "Identity registered directly during login; keeping that handle");
            return Ok(existing);
        }
        info!(identity, "User logged in");
        Ok(user)
    }

    /// Log a user out.
    ///
    /// The user is deregistered and invalidated (tearing down its sessions) and
    /// its record is marked for removal, to be purged at the next bootstrap.
    /// Fails with [`UserError::NotRegistered`] if the identity is not registered.
    pub fn log_out(&self, identity: &str) -> Result<()> {
        let _lifecycle = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let user = self.inner.registry.deregister_identity(identity)?;
        user.invalidate();
        match self.inner.metadata.mark_for_removal(identity) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(identity, "Logged out user had no metadata record");
            }
            Err(e) => return Err(e),
        }
        info!(identity, "User logged out");
        Ok(())
    }

    fn user_data_dir(&self, identity: &str) -> PathBuf {
        self.inner
            .config
            .data_dir
            .join(USERS_DIR)
            .join(sanitize_component(identity))
    }

    // === Registry delegates ===

    /// Register a user; returns the existing handle if the identity is taken.
    pub fn register_user(&self, user: Arc<SyncUser>) -> Option<Arc<SyncUser>> {
        self.inner.registry.register(user)
    }

    /// Deregister a user. Deregistering an unknown user is a caller bug and
    /// fails with [`UserError::NotRegistered`].
    pub fn deregister_user(&self, user: &SyncUser) -> Result<()> {
        Ok(self.inner.registry.deregister(user)?)
    }

    pub fn user_for_identity(&self, identity: &str) -> Option<Arc<SyncUser>> {
        self.inner.registry.lookup(identity)
    }

    pub fn all_users(&self) -> Vec<Arc<SyncUser>> {
        self.inner.registry.all_users()
    }

    /// Check if two handles refer to the same coordinator.
    pub fn ptr_eq(&self, other: &SyncCoordinator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Downgrade to a weak reference.
    pub fn downgrade(&self) -> WeakCoordinator {
        WeakCoordinator {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl WeakCoordinator {
    /// Upgrade to a strong reference, if the coordinator is still alive.
    pub fn upgrade(&self) -> Option<SyncCoordinator> {
        self.inner.upgrade().map(|inner| SyncCoordinator { inner })
    }
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("app_identifier", &self.inner.app_identifier)
            .field("data_dir", &self.inner.config.data_dir)
            .field("users", &self.inner.registry.len())
            .field("log_level", &self.log_level())
            .field("error_handler", &self.has_error_handler())
            .field("metadata", &self.inner.metadata)
            .field("engine", &self.inner.engine)
            .finish()
    }
}

impl fmt::Debug for WeakCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCoordinator")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
