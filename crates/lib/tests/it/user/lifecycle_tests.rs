//! Login, logout and the sessions that hang off a user.

use std::{
    sync::{Arc, Barrier},
    thread,
};

use concord::{
    SyncConfig,
    session::{SessionKind, SessionState},
    user::UserError,
};

use crate::helpers::*;

#[test]
fn test_logout_invalidates_and_marks_record() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = open_coordinator(dir.path());
    let user = coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    let session = coordinator
        .session_for_configuration(SyncConfig::new("alice", SERVER_URL).unwrap())
        .unwrap();

    coordinator.log_out("alice").unwrap();

    assert!(!user.is_valid());
    assert_eq!(session.state(), SessionState::Invalid);
    assert!(coordinator.user_for_identity("alice").is_none());
    let record = coordinator.metadata().record("alice").unwrap().unwrap();
    assert!(record.marked_for_removal);

    let err = coordinator
        .session_for_configuration(SyncConfig::new("alice", SERVER_URL).unwrap())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_logout_twice_is_contract_violation() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = in_memory_coordinator(dir.path());
    coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    coordinator.log_out("alice").unwrap();

    let err = coordinator.log_out("alice").unwrap_err();
    assert!(matches!(
        err,
        concord::Error::User(UserError::NotRegistered { ref identity }) if identity == "alice"
    ));
}

#[test]
fn test_login_after_logout_is_fresh_user() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = in_memory_coordinator(dir.path());
    let first = coordinator.log_in("alice", SERVER_URL, "t1").unwrap();
    coordinator.log_out("alice").unwrap();

    let second = coordinator.log_in("alice", SERVER_URL, "t2").unwrap();
    assert!(second.is_valid());
    assert!(!first.is_valid());
    assert_eq!(second.refresh_token().as_str(), "t2");
    let record = coordinator.metadata().record("alice").unwrap().unwrap();
    assert!(!record.marked_for_removal);
}

#[test]
fn test_sessions_are_keyed_by_server_path() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = in_memory_coordinator(dir.path());
    let user = coordinator.log_in("alice", SERVER_URL, "t").unwrap();

    let notes = SyncConfig::new("alice", "https://sync.example.com/notes").unwrap();
    let photos = SyncConfig::new("alice", "https://sync.example.com/photos").unwrap();
    let a = coordinator.session_for_configuration(notes.clone()).unwrap();
    let b = coordinator.session_for_configuration(photos).unwrap();
    let again = coordinator.session_for_configuration(notes).unwrap();

    assert_ne!(a.path(), b.path());
    assert_eq!(a.id(), again.id());
    assert!(a.path().starts_with(user.data_dir()));
    assert_eq!(user.sessions().len(), 2);
    assert!(user.sessions().iter().all(|s| s.kind() == SessionKind::Standalone));
}

#[test]
fn test_closed_session_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = in_memory_coordinator(dir.path());
    coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    let config = SyncConfig::new("alice", SERVER_URL).unwrap();

    let first = coordinator.session_for_configuration(config.clone()).unwrap();
    assert!(first.close());
    let second = coordinator.session_for_configuration(config).unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(first.state(), SessionState::Inactive);
    assert!(second.is_valid());
}

#[test]
fn test_concurrent_login_and_logout_keep_metadata_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = open_coordinator(dir.path());
    let barrier = Arc::new(Barrier::new(2));

    let logins = {
        let coordinator = coordinator.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..200 {
                coordinator
                    .log_in("alice", SERVER_URL, &format!("t{i}"))
                    .unwrap();
            }
        })
    };
    let logouts = {
        let coordinator = coordinator.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                // NotRegistered just means the login thread has not caught up.
                let _ = coordinator.log_out("alice");
            }
        })
    };
    logins.join().unwrap();
    logouts.join().unwrap();

    let record = coordinator.metadata().record("alice").unwrap().unwrap();
    match coordinator.user_for_identity("alice") {
        Some(user) => {
            assert!(user.is_valid());
            assert!(!record.marked_for_removal);
            assert_eq!(record.refresh_token, user.refresh_token().as_str());
        }
        None => assert!(record.marked_for_removal),
    }

    // A restart sees exactly what the running coordinator saw.
    let registered = registered_identities(&coordinator);
    drop(coordinator);
    let (reopened, _) = open_coordinator(dir.path());
    assert_eq!(registered_identities(&reopened), registered);
}
