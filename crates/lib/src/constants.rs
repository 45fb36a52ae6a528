//! Constants used throughout the Concord library.

/// Error domain attached to every error delivered to the application handler.
pub const ERROR_DOMAIN: &str = "io.concord.sync";

/// App identifier reported when none is configured and the platform provides none.
pub const DEFAULT_APP_IDENTIFIER: &str = "(none)";

/// Default name of the metadata file inside the data directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "concord-data";

/// Subdirectory of the data directory holding per-user local stores.
pub const USERS_DIR: &str = "users";

/// File extension for local stores created by `session_for_configuration`.
pub const STORE_EXTENSION: &str = "store";

/// Name of the thread that runs delivery-context tasks.
pub const DELIVERY_THREAD_NAME: &str = "concord-delivery";

/// Environment variable overriding [`DEFAULT_DATA_DIR`].
pub const ENV_DATA_DIR: &str = "CONCORD_DATA_DIR";

/// Environment variable overriding the configured log level.
pub const ENV_LOG_LEVEL: &str = "CONCORD_LOG_LEVEL";

/// Environment variable overriding the app identifier.
pub const ENV_APP_ID: &str = "CONCORD_APP_ID";
