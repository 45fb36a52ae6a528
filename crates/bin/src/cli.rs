//! CLI argument definitions for the Concord binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Concord multi-user sync coordinator
#[derive(Parser, Debug)]
#[command(name = "concord")]
#[command(about = "Administer the users of a Concord data directory")]
#[command(version)]
pub struct Cli {
    /// Root directory for metadata and per-user local stores
    #[arg(short = 'D', long, global = true, env = "CONCORD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Engine verbosity (off, fatal, error, warn, info, detail, debug, trace, all)
    #[arg(long, global = true, env = "CONCORD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered users
    Users,
    /// Log a user in and persist its record
    Login(LoginArgs),
    /// Log a user out; its data is removed on the next start
    Logout(LogoutArgs),
    /// Show coordinator settings and user counts
    Info,
}

/// Arguments for the login command
#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    /// Identity of the user
    #[arg(short, long)]
    pub identity: String,

    /// Sync server URL
    #[arg(short, long)]
    pub server: String,

    /// Refresh token issued by the server
    #[arg(short, long, env = "CONCORD_REFRESH_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Arguments for the logout command
#[derive(clap::Args, Debug)]
pub struct LogoutArgs {
    /// Identity of the user
    #[arg(short, long)]
    pub identity: String,
}
