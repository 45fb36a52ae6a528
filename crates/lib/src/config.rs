//! Coordinator configuration and log verbosity.
//!
//! [`CoordinatorConfig`] is plain serde data. It can be read from a JSON file,
//! built from defaults plus environment overrides, or constructed directly.

use std::{fmt, path::Path, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::{
    Result,
    constants::{
        DEFAULT_APP_IDENTIFIER, DEFAULT_DATA_DIR, ENV_APP_ID, ENV_DATA_DIR, ENV_LOG_LEVEL,
        METADATA_FILE,
    },
    coordinator::CoordinatorError,
};

/// Verbosity of the sync engine, ordered from quietest to loudest.
///
/// The coordinator consults this when deciding whether debug-class engine
/// failures reach the application's error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Fatal = 1,
    Error = 2,
    Warn = 3,
    #[default]
    Info = 4,
    Detail = 5,
    Debug = 6,
    Trace = 7,
    All = 8,
}

impl LogLevel {
    /// All levels in ascending order of verbosity.
    pub const ALL: [LogLevel; 9] = [
        LogLevel::Off,
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Detail,
        LogLevel::Debug,
        LogLevel::Trace,
        LogLevel::All,
    ];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Detail => "detail",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
            LogLevel::All => "all",
        }
    }

    /// Whether debug-level diagnostics are enabled at this verbosity.
    pub fn includes_debug(&self) -> bool {
        *self >= LogLevel::Debug
    }

    /// The closest `tracing` filter for this level.
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Fatal | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info | LogLevel::Detail => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace | LogLevel::All => LevelFilter::TRACE,
        }
    }

    pub(crate) fn from_u8(value: u8) -> LogLevel {
        LogLevel::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(LogLevel::All)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == lowered)
            .ok_or_else(|| CoordinatorError::InvalidLogLevel {
                value: s.to_string(),
            })
    }
}

/// Settings used to construct a [`SyncCoordinator`](crate::SyncCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Root directory for metadata and per-user local stores.
    pub data_dir: PathBuf,

    /// Metadata file name, relative to `data_dir`.
    pub metadata_file: String,

    /// Whether newly written metadata is restricted to the owning OS user.
    pub protect_records: bool,

    /// Initial engine verbosity.
    pub log_level: LogLevel,

    /// Identifier of the embedding application.
    /// Falls back to the executable name when unset.
    pub app_identifier: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            metadata_file: METADATA_FILE.to_string(),
            protect_records: true,
            log_level: LogLevel::default(),
            app_identifier: None,
        }
    }
}

impl CoordinatorConfig {
    /// Configuration rooted at `data_dir`, everything else default.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Defaults with `CONCORD_DATA_DIR`, `CONCORD_LOG_LEVEL` and `CONCORD_APP_ID` applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            self.log_level = level.parse()?;
        }
        if let Ok(app_id) = std::env::var(ENV_APP_ID) {
            self.app_identifier = Some(app_id);
        }
        Ok(self)
    }

    /// Full path of the metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata_file)
    }

    /// The app identifier to report.
    ///
    /// Uses the configured value, then the running executable's name, then `"(none)"`.
    pub fn resolve_app_identifier(&self) -> String {
        if let Some(app_id) = self.app_identifier.as_deref().filter(|id| !id.is_empty()) {
            return app_id.to_string();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_IDENTIFIER.to_string())
    }
}
