use concord::SyncConfig;

use crate::helpers::*;

#[test]
fn test_login_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let created_at = {
        let (coordinator, _) = open_coordinator(dir.path());
        coordinator
            .log_in("alice", SERVER_URL, "refresh-1")
            .unwrap()
            .created_at()
    };

    let (coordinator, _) = open_coordinator(dir.path());
    let alice = coordinator.user_for_identity("alice").unwrap();
    assert!(alice.is_valid());
    assert_eq!(alice.server_url(), SERVER_URL);
    assert_eq!(alice.refresh_token().as_str(), "refresh-1");
    assert_eq!(alice.created_at(), created_at);
}

#[test]
fn test_logout_data_is_purged_on_next_start() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = {
        let (coordinator, _) = open_coordinator(dir.path());
        let alice = coordinator.log_in("alice", SERVER_URL, "t").unwrap();
        let session = coordinator
            .session_for_configuration(SyncConfig::new("alice", SERVER_URL).unwrap())
            .unwrap();
        std::fs::create_dir_all(alice.data_dir()).unwrap();
        std::fs::write(session.path(), b"local data").unwrap();

        coordinator.log_out("alice").unwrap();
        // Data stays until the next bootstrap.
        assert!(session.path().exists());
        alice.data_dir().to_path_buf()
    };

    let (coordinator, _) = open_coordinator(dir.path());
    assert!(coordinator.all_users().is_empty());
    assert!(!data_dir.exists());
    assert!(coordinator.metadata().record("alice").unwrap().is_none());
}

#[test]
fn test_only_removed_users_are_purged() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (coordinator, _) = open_coordinator(dir.path());
        coordinator.log_in("alice", SERVER_URL, "t").unwrap();
        coordinator.log_in("bob", SERVER_URL, "t").unwrap();
        coordinator.log_out("bob").unwrap();
    }

    let (coordinator, _) = open_coordinator(dir.path());
    assert_eq!(registered_identities(&coordinator), vec!["alice"]);
}

#[cfg(unix)]
#[test]
fn test_metadata_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = open_coordinator(dir.path());
    coordinator.log_in("alice", SERVER_URL, "t").unwrap();

    let mode = std::fs::metadata(coordinator.config().metadata_path())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
