//! Coordinator info command - shows app identifier, data directory and user count.

use concord::SyncCoordinator;

use crate::output::OutputFormat;

/// Run the info command
pub fn run(
    coordinator: &SyncCoordinator,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = coordinator.config();
    let users = coordinator.all_users();
    let invalid = users.iter().filter(|u| !u.is_valid()).count();

    match format {
        OutputFormat::Human => {
            println!("App:         {}", coordinator.app_identifier());
            println!("Data dir:    {}", config.data_dir.display());
            println!("Metadata:    {}", config.metadata_path().display());
            println!("Log level:   {}", coordinator.log_level());
            println!("Users:       {}", users.len());
            if invalid > 0 {
                println!("Invalid:     {invalid}");
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "app_identifier": coordinator.app_identifier(),
                "data_dir": config.data_dir,
                "metadata": config.metadata_path(),
                "log_level": coordinator.log_level(),
                "users": users.len(),
                "invalid_users": invalid,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
