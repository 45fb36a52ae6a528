//! Engine failures: remediation on the reporting thread, delivery on the delivery thread.

use std::{
    sync::{Arc, Mutex, mpsc},
    thread,
};

use concord::{
    ErrorKind, LogLevel, Remediation, SyncConfig,
    engine::{EngineError, FailureClass},
    session::{SessionKind, SessionState},
};

use crate::helpers::*;

fn notes_config(identity: &str) -> SyncConfig {
    SyncConfig::new(identity, "https://sync.example.com/notes").unwrap()
}

#[test]
fn test_user_fatal_remediates_before_report_returns() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let user = coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    let session = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();

    let (seen_tx, seen_rx) = mpsc::channel();
    let weak = coordinator.downgrade();
    coordinator.set_error_handler(move |error| {
        let on_delivery = weak.upgrade().is_some_and(|c| c.is_delivery_context());
        let _ = seen_tx.send((error, on_delivery));
    });

    let reporter = {
        let engine = engine.clone();
        let session = Arc::clone(&session);
        thread::spawn(move || {
            engine.report_error(
                EngineError::new(211, "refresh token revoked", FailureClass::UserFatal)
                    .with_session(session),
            )
        })
    };
    assert!(reporter.join().unwrap());

    // Already remediated, whether or not delivery has happened yet.
    assert!(!user.is_valid());
    assert_eq!(session.state(), SessionState::Invalid);
    assert!(coordinator.user_for_identity("alice").is_some());

    coordinator.flush_delivery().unwrap();
    let (error, on_delivery) = seen_rx.try_recv().unwrap();
    assert!(on_delivery);
    assert_eq!(error.kind, ErrorKind::User);
    assert_eq!(error.remediation, Remediation::UserInvalidated);
    assert_eq!(error.code, 211);
    assert_eq!(error.session.unwrap().id(), session.id());
    assert!(seen_rx.try_recv().is_err());
}

#[test]
fn test_late_user_fatal_spares_fresh_login() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let first = coordinator.log_in("alice", SERVER_URL, "t1").unwrap();
    let stale = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();
    coordinator.log_out("alice").unwrap();
    let fresh = coordinator.log_in("alice", SERVER_URL, "t2").unwrap();
    let fresh_session = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();
    let delivered = collect_errors(&coordinator);

    engine.report_error(
        EngineError::new(211, "refresh token revoked", FailureClass::UserFatal)
            .with_session(Arc::clone(&stale)),
    );
    coordinator.flush_delivery().unwrap();

    assert!(!first.is_valid());
    assert!(fresh.is_valid());
    assert!(fresh_session.is_valid());
    let current = coordinator.user_for_identity("alice").unwrap();
    assert!(Arc::ptr_eq(&current, &fresh));
    assert_eq!(delivered.lock().unwrap()[0].kind, ErrorKind::User);

    // Once the old handle is gone there is nothing left to invalidate.
    drop(first);
    engine.report_error(
        EngineError::new(212, "refresh token revoked", FailureClass::UserFatal)
            .with_session(stale),
    );
    coordinator.flush_delivery().unwrap();

    assert!(fresh.is_valid());
    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[1].remediation, Remediation::None);
}

#[test]
fn test_user_fatal_after_relogin_of_invalidated_user() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let first = coordinator.log_in("alice", SERVER_URL, "t1").unwrap();
    let stale = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();

    engine.report_error(
        EngineError::new(211, "revoked", FailureClass::UserFatal).with_session(Arc::clone(&stale)),
    );
    assert!(!first.is_valid());

    let fresh = coordinator.log_in("alice", SERVER_URL, "t2").unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    engine.report_error(
        EngineError::new(211, "revoked", FailureClass::UserFatal).with_session(stale),
    );

    assert!(fresh.is_valid());
    assert!(
        coordinator
            .session_for_configuration(notes_config("alice"))
            .unwrap()
            .is_valid()
    );
}

#[test]
fn test_session_fatal_leaves_user_valid() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let user = coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    let session = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();
    let delivered = collect_errors(&coordinator);

    engine.report_error(
        EngineError::new(101, "bad changeset", FailureClass::SessionFatal)
            .with_session(Arc::clone(&session)),
    );
    coordinator.flush_delivery().unwrap();

    assert!(user.is_valid());
    assert_eq!(session.state(), SessionState::Invalid);
    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, ErrorKind::Session);
    assert_eq!(delivered[0].remediation, Remediation::SessionInvalidated);

    // A new session for the same store replaces the invalidated one.
    let replacement = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();
    assert_ne!(replacement.id(), session.id());
    assert_eq!(replacement.kind(), SessionKind::Standalone);
    assert!(replacement.is_valid());
}

#[test]
fn test_remediation_without_handler() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let user = coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    let session = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();
    assert!(!coordinator.has_error_handler());

    engine.report_error(
        EngineError::new(211, "revoked", FailureClass::UserFatal).with_session(session),
    );
    assert!(!user.is_valid());

    // Installing a handler afterwards does not replay the dropped error.
    let delivered = collect_errors(&coordinator);
    coordinator.flush_delivery().unwrap();
    assert!(delivered.lock().unwrap().is_empty());
}

#[test]
fn test_debug_errors_follow_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let delivered = collect_errors(&coordinator);
    assert_eq!(coordinator.log_level(), LogLevel::Info);

    engine.report_error(EngineError::new(7, "reconnecting", FailureClass::Debug));
    coordinator.flush_delivery().unwrap();
    assert!(delivered.lock().unwrap().is_empty());

    coordinator.set_log_level(LogLevel::Debug);
    engine.report_error(EngineError::new(8, "reconnecting", FailureClass::Debug));
    coordinator.flush_delivery().unwrap();

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].code, 8);
    assert_eq!(delivered[0].kind, ErrorKind::Internal);
}

#[test]
fn test_access_denied_is_delivered_without_remediation() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    coordinator.log_in("alice", SERVER_URL, "t").unwrap();
    let session = coordinator
        .session_for_configuration(notes_config("alice"))
        .unwrap();
    let delivered = collect_errors(&coordinator);

    engine.report_error(
        EngineError::new(206, "permission denied", FailureClass::AccessDenied)
            .with_session(Arc::clone(&session)),
    );
    coordinator.flush_delivery().unwrap();

    assert!(session.is_valid());
    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered[0].kind, ErrorKind::Session);
    assert_eq!(delivered[0].remediation, Remediation::None);
}

#[test]
fn test_handler_is_captured_when_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());

    // Park the delivery thread inside a handler so later errors stay queued.
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    coordinator.set_error_handler(move |_| {
        let _ = release_rx.lock().unwrap().recv();
    });
    engine.report_error(EngineError::new(0, "park", FailureClass::AccessDenied));

    let first = collect_errors(&coordinator);
    engine.report_error(EngineError::new(1, "first", FailureClass::AccessDenied));
    let second = collect_errors(&coordinator);
    engine.report_error(EngineError::new(2, "second", FailureClass::AccessDenied));

    release_tx.send(()).unwrap();
    coordinator.flush_delivery().unwrap();

    let first: Vec<i32> = first.lock().unwrap().iter().map(|e| e.code).collect();
    let second: Vec<i32> = second.lock().unwrap().iter().map(|e| e.code).collect();
    assert_eq!(first, vec![1]);
    assert_eq!(second, vec![2]);
}

#[test]
fn test_deliveries_preserve_report_order() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());
    let delivered = collect_errors(&coordinator);

    for code in 0..50 {
        engine.report_error(EngineError::new(code, "denied", FailureClass::AccessDenied));
    }
    coordinator.flush_delivery().unwrap();

    let codes: Vec<i32> = delivered.lock().unwrap().iter().map(|e| e.code).collect();
    assert_eq!(codes, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_panicking_handler_does_not_stop_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, engine) = in_memory_coordinator(dir.path());

    coordinator.set_error_handler(|error| {
        if error.code == 1 {
            panic!("handler bug");
        }
    });
    engine.report_error(EngineError::new(1, "boom", FailureClass::AccessDenied));
    let delivered = collect_errors(&coordinator);
    engine.report_error(EngineError::new(2, "fine", FailureClass::AccessDenied));
    coordinator.flush_delivery().unwrap();

    assert_eq!(delivered.lock().unwrap().len(), 1);
}
