use std::sync::Arc;

use clap::Parser;
use concord::{CoordinatorConfig, LogLevel, SyncCoordinator, engine::LoopbackEngine};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = CoordinatorConfig::from_env()?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }
    if let Some(level) = cli.log_level.as_deref() {
        config.log_level = level.parse::<LogLevel>()?;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("concord={}", config.log_level.to_level_filter()).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    SyncCoordinator::configure(config, Arc::new(LoopbackEngine::new()))?;
    let coordinator = SyncCoordinator::shared()?;
    coordinator.set_error_handler(|error| {
        tracing::warn!(kind = ?error.kind, remediation = ?error.remediation, "{error}");
    });

    let format = OutputFormat::from_flag(cli.json);
    let result = match &cli.command {
        Commands::Users => commands::users::run(&coordinator, format),
        Commands::Login(args) => commands::login::run_login(&coordinator, args, format),
        Commands::Logout(args) => commands::login::run_logout(&coordinator, args, format),
        Commands::Info => commands::info::run(&coordinator, format),
    };

    coordinator.flush_delivery()?;
    result
}
