//! List the users loaded at bootstrap.

use concord::{SyncCoordinator, clock::format_millis};

use crate::output::{OutputFormat, print_table};

pub fn run(
    coordinator: &SyncCoordinator,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut users = coordinator.all_users();
    users.sort_by(|a, b| a.identity().cmp(b.identity()));

    match format {
        OutputFormat::Human => {
            if users.is_empty() {
                println!("No users logged in");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = users
                .iter()
                .map(|user| {
                    vec![
                        user.identity().to_string(),
                        user.server_url().to_string(),
                        format_millis(user.created_at()),
                        user.data_dir().display().to_string(),
                    ]
                })
                .collect();
            print_table(&["IDENTITY", "SERVER", "CREATED", "DATA"], &rows);
        }
        OutputFormat::Json => {
            let value: Vec<_> = users
                .iter()
                .map(|user| {
                    serde_json::json!({
                        "identity": user.identity(),
                        "server_url": user.server_url(),
                        "created_at": user.created_at(),
                        "data_dir": user.data_dir(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
