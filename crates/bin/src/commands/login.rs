//! Login and logout commands.

use concord::SyncCoordinator;

use crate::cli::{LoginArgs, LogoutArgs};
use crate::output::OutputFormat;

/// Run the login command
pub fn run_login(
    coordinator: &SyncCoordinator,
    args: &LoginArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = coordinator.log_in(&args.identity, &args.server, &args.token)?;

    match format {
        OutputFormat::Human => {
            println!("Logged in {} ({})", user.identity(), user.server_url());
            println!("Data directory: {}", user.data_dir().display());
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "identity": user.identity(),
                "server_url": user.server_url(),
                "data_dir": user.data_dir(),
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(())
}

/// Run the logout command
pub fn run_logout(
    coordinator: &SyncCoordinator,
    args: &LogoutArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    coordinator.log_out(&args.identity)?;

    match format {
        OutputFormat::Human => {
            println!("Logged out {}", args.identity);
            println!("Local data will be removed on next start");
        }
        OutputFormat::Json => {
            let value = serde_json::json!({ "identity": args.identity, "logged_out": true });
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(())
}
