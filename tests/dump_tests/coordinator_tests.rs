//! Tests for BackupCoordinator
//!
//! These tests verify:
//! - Archive files and entries produced by a full session
//! - Teardown on success and on every failure path
//! - Write gate behavior while tables are being read
//! - Progress events

#[path = "../common/mod.rs"]
mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use common::{entry, entry_names, parse_header, parse_lengths, read_zip, text, Cell, MemoryConnection, MemoryTable};
use tabledump::codec::SqlType;
use tabledump::intercept::{MutationEvent, MutationKind};
use tabledump::{
    BackupConfig, BackupCoordinator, DumpError, DumpProgress, InterceptorConfig, MutationHub,
    Result, TableSpec, WriteInterceptor, WritePolicy,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &TempDir, policy: WritePolicy) -> BackupConfig {
    BackupConfig::builder()
        .storage_dir(dir.path().join("backup"))
        .write_policy(policy)
        .build()
}

fn users() -> MemoryTable {
    MemoryTable::new(&[
        ("id", SqlType::Integer),
        ("name", SqlType::VarChar),
        ("data", SqlType::Blob),
    ])
    .row(vec![Cell::Int(1), text("a"), Cell::Null])
    .row(vec![Cell::Int(2), text("b"), Cell::Bytes(vec![1, 2])])
}

fn groups() -> MemoryTable {
    MemoryTable::new(&[("gid", SqlType::BigInt), ("label", SqlType::VarChar)])
        .row(vec![Cell::Int(10), text("admins")])
}

fn two_tables() -> Vec<TableSpec> {
    vec![TableSpec::select_all("users"), TableSpec::select_all("groups")]
}

fn update_user() -> MutationEvent {
    MutationEvent::new(MutationKind::Update, "user")
}

// =============================================================================
// Success Tests
// =============================================================================

#[test]
fn test_full_session() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let interceptor = Arc::new(WriteInterceptor::default());
    let coordinator = BackupCoordinator::new(config(&dir, WritePolicy::Ignore), interceptor.clone()).unwrap();

    let connection = MemoryConnection::new()
        .with_table("users", users())
        .with_table("groups", groups());
    let state = connection.state();

    let report = coordinator.run(connection, &two_tables()).unwrap();

    assert!(state.committed());
    assert!(state.closed());
    assert!(!interceptor.is_active());

    assert_eq!(report.tables.len(), 2);
    assert_eq!(report.total_rows(), 3);
    assert_eq!(report.content_archive, dir.path().join("backup").join("dump.zip"));
    assert_eq!(report.length_archive, dir.path().join("backup").join("dump-len.zip"));

    let content = read_zip(&report.content_archive);
    let lengths = read_zip(&report.length_archive);
    assert_eq!(entry_names(&content), vec!["users", "groups"]);
    assert_eq!(entry_names(&lengths), vec!["users", "groups"]);

    let header = parse_header(entry(&content, "users"));
    assert_eq!(&entry(&content, "users")[header.body_offset..], b"1a2b\x01\x02");
    assert_eq!(parse_lengths(entry(&lengths, "users")), vec![1, 1, -1, 1, 1, 2]);

    let header = parse_header(entry(&content, "groups"));
    assert_eq!(header.columns, vec![(-5, "gid".to_string()), (12, "label".to_string())]);
    assert_eq!(parse_lengths(entry(&lengths, "groups")), vec![2, 6]);
}

#[test]
fn test_empty_table_set_produces_empty_archives() {
    let dir = TempDir::new().unwrap();
    let coordinator =
        BackupCoordinator::new(config(&dir, WritePolicy::Ignore), Arc::new(WriteInterceptor::default())).unwrap();

    let report = coordinator.run(MemoryConnection::new(), &[]).unwrap();

    assert!(read_zip(&report.content_archive).is_empty());
    assert!(read_zip(&report.length_archive).is_empty());
}

#[test]
fn test_rerun_replaces_previous_archives() {
    let dir = TempDir::new().unwrap();
    let coordinator =
        BackupCoordinator::new(config(&dir, WritePolicy::Ignore), Arc::new(WriteInterceptor::default())).unwrap();

    let connection = MemoryConnection::new()
        .with_table("users", users())
        .with_table("groups", groups());
    coordinator.run(connection, &two_tables()).unwrap();

    let connection = MemoryConnection::new().with_table("groups", groups());
    let report = coordinator
        .run(connection, &[TableSpec::select_all("groups")])
        .unwrap();

    assert_eq!(entry_names(&read_zip(&report.content_archive)), vec!["groups"]);
}

#[test]
fn test_progress_events() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = crossbeam::channel::unbounded();
    let coordinator =
        BackupCoordinator::new(config(&dir, WritePolicy::Ignore), Arc::new(WriteInterceptor::default()))
            .unwrap()
            .with_progress(tx);

    let connection = MemoryConnection::new()
        .with_table("users", users())
        .with_table("groups", groups());
    let report = coordinator.run(connection, &two_tables()).unwrap();

    let events: Vec<DumpProgress> = rx.try_iter().collect();
    assert_eq!(events.len(), 5);
    assert_eq!(
        events[0],
        DumpProgress::TableStarted { table: "users".to_string(), index: 0, total: 2 }
    );
    assert_eq!(events[1], DumpProgress::TableCompleted(report.tables[0].clone()));
    assert_eq!(
        events[2],
        DumpProgress::TableStarted { table: "groups".to_string(), index: 1, total: 2 }
    );
    assert_eq!(events[3], DumpProgress::TableCompleted(report.tables[1].clone()));
    assert!(matches!(
        events[4],
        DumpProgress::SessionFinished { tables: 2, succeeded: true, .. }
    ));
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_row_failure_still_tears_down() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = crossbeam::channel::unbounded();
    let interceptor = Arc::new(WriteInterceptor::default());
    let cfg = config(&dir, WritePolicy::Reject);
    let coordinator = BackupCoordinator::new(cfg.clone(), interceptor.clone())
        .unwrap()
        .with_progress(tx);

    let connection = MemoryConnection::new()
        .with_table("users", users())
        .with_table("groups", groups().row(vec![Cell::Int(11), text("x")]).failing_at(1));
    let state = connection.state();

    let err = coordinator.run(connection, &two_tables()).unwrap_err();
    assert!(matches!(err, DumpError::SourceRead(_)));

    assert!(state.committed());
    assert!(state.closed());
    assert!(!interceptor.is_active());
    assert!(interceptor.check_write_allowed().is_ok());

    // Archives are closed and readable; the failed table is incomplete
    let content = read_zip(&cfg.content_archive_path());
    let lengths = read_zip(&cfg.length_archive_path());
    assert_eq!(entry_names(&content), vec!["users", "groups"]);
    assert_eq!(parse_lengths(entry(&lengths, "groups")), vec![2, 6]);

    let last = rx.try_iter().last().unwrap();
    assert!(matches!(last, DumpProgress::SessionFinished { succeeded: false, .. }));
}

#[test]
fn test_commit_failure_is_cleanup_error() {
    let dir = TempDir::new().unwrap();
    let coordinator =
        BackupCoordinator::new(config(&dir, WritePolicy::Ignore), Arc::new(WriteInterceptor::default())).unwrap();

    let connection = MemoryConnection::new()
        .with_table("users", users())
        .failing_commit();
    let state = connection.state();

    let err = coordinator
        .run(connection, &[TableSpec::select_all("users")])
        .unwrap_err();

    match err {
        DumpError::Cleanup { stage, source } => {
            assert_eq!(stage, "committing the connection");
            assert!(matches!(*source, DumpError::SourceRead(_)));
        }
        other => panic!("expected a cleanup error, got {:?}", other),
    }
    // Close and archive teardown still ran
    assert!(state.closed());
    let content = read_zip(&coordinator.config().content_archive_path());
    assert_eq!(entry_names(&content), vec!["users"]);
}

#[test]
fn test_primary_error_wins_over_cleanup_error() {
    let dir = TempDir::new().unwrap();
    let coordinator =
        BackupCoordinator::new(config(&dir, WritePolicy::Ignore), Arc::new(WriteInterceptor::default())).unwrap();

    let connection = MemoryConnection::new()
        .with_table("users", users().failing_at(1))
        .failing_close();
    let state = connection.state();

    let err = coordinator
        .run(connection, &[TableSpec::select_all("users")])
        .unwrap_err();

    assert!(matches!(err, DumpError::SourceRead(_)));
    assert!(state.closed());
}

#[test]
fn test_duplicate_table_names_rejected() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, WritePolicy::Ignore);
    let coordinator = BackupCoordinator::new(cfg.clone(), Arc::new(WriteInterceptor::default())).unwrap();

    let connection = MemoryConnection::new().with_table("users", users());
    let state = connection.state();
    let tables = vec![TableSpec::select_all("users"), TableSpec::select_all("users")];

    let err = coordinator.run(connection, &tables).unwrap_err();

    assert!(matches!(err, DumpError::InvalidTableSet(_)));
    assert!(state.closed());
    assert!(!cfg.content_archive_path().exists());
}

#[test]
fn test_empty_table_name_rejected() {
    let dir = TempDir::new().unwrap();
    let coordinator =
        BackupCoordinator::new(config(&dir, WritePolicy::Ignore), Arc::new(WriteInterceptor::default())).unwrap();

    let err = coordinator
        .run(MemoryConnection::new(), &[TableSpec::new("", "select 1")])
        .unwrap_err();
    assert!(matches!(err, DumpError::InvalidTableSet(_)));
}

#[test]
fn test_second_session_while_gate_held() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, WritePolicy::Ignore);
    let interceptor = Arc::new(WriteInterceptor::default());
    let coordinator = BackupCoordinator::new(cfg.clone(), interceptor.clone()).unwrap();

    let held = interceptor.activate(WritePolicy::Reject).unwrap();
    let connection = MemoryConnection::new().with_table("users", users());
    let state = connection.state();

    let err = coordinator
        .run(connection, &[TableSpec::select_all("users")])
        .unwrap_err();

    assert!(matches!(err, DumpError::SessionActive));
    assert!(state.closed());
    assert!(!cfg.content_archive_path().exists());
    // The other holder's session is untouched
    assert!(interceptor.is_active());
    assert_eq!(interceptor.policy(), WritePolicy::Reject);
    drop(held);
    assert!(!interceptor.is_active());
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let cfg = BackupConfig::builder()
        .storage_dir(dir.path())
        .chunk_size(0)
        .build();

    let result = BackupCoordinator::new(cfg, Arc::new(WriteInterceptor::default()));
    assert!(matches!(result, Err(DumpError::Config(_))));
}

// =============================================================================
// Write Gate Tests
// =============================================================================

#[test]
fn test_reject_policy_during_session() {
    let dir = TempDir::new().unwrap();
    let hub = MutationHub::new();
    let interceptor = Arc::new(WriteInterceptor::default());
    let coordinator = BackupCoordinator::new(config(&dir, WritePolicy::Reject), interceptor)
        .unwrap()
        .with_mutation_source(Arc::new(hub.clone()));

    let during: Rc<RefCell<Vec<Result<()>>>> = Rc::new(RefCell::new(Vec::new()));
    let hook_hub = hub.clone();
    let hook_results = Rc::clone(&during);
    let connection = MemoryConnection::new()
        .with_table("users", users())
        .on_scan(move |_| {
            hook_results
                .borrow_mut()
                .push(hook_hub.before_mutation(&update_user()));
        });

    assert!(hub.before_mutation(&update_user()).is_ok());
    coordinator
        .run(connection, &[TableSpec::select_all("users")])
        .unwrap();

    let during = during.borrow();
    assert_eq!(during.len(), 1);
    assert!(matches!(during[0], Err(DumpError::BackupInProgress)));

    // Unsubscribed once the session ended
    assert_eq!(hub.listener_count(), 0);
    assert!(hub.before_mutation(&update_user()).is_ok());
}

#[test]
fn test_ignore_policy_during_session() {
    let dir = TempDir::new().unwrap();
    let hub = MutationHub::new();
    let coordinator = BackupCoordinator::new(
        config(&dir, WritePolicy::Ignore),
        Arc::new(WriteInterceptor::default()),
    )
    .unwrap()
    .with_mutation_source(Arc::new(hub.clone()));

    let during: Rc<RefCell<Vec<Result<()>>>> = Rc::new(RefCell::new(Vec::new()));
    let hook_hub = hub.clone();
    let hook_results = Rc::clone(&during);
    let connection = MemoryConnection::new()
        .with_table("users", users())
        .on_scan(move |_| {
            hook_results
                .borrow_mut()
                .push(hook_hub.before_mutation(&update_user()));
        });

    coordinator
        .run(connection, &[TableSpec::select_all("users")])
        .unwrap();

    assert!(during.borrow()[0].is_ok());
}

#[test]
fn test_suspend_policy_releases_writer_after_session() {
    let dir = TempDir::new().unwrap();
    let hub = MutationHub::new();
    let interceptor = Arc::new(WriteInterceptor::new(InterceptorConfig {
        poll_interval: Duration::from_millis(20),
        suspend_timeout: None,
    })
    .unwrap());
    let coordinator = BackupCoordinator::new(config(&dir, WritePolicy::Suspend), interceptor.clone())
        .unwrap()
        .with_mutation_source(Arc::new(hub.clone()));

    let writer: Rc<RefCell<Option<JoinHandle<Result<()>>>>> = Rc::new(RefCell::new(None));
    let suspended_seen = Rc::new(RefCell::new(false));

    let hook_writer = Rc::clone(&writer);
    let hook_seen = Rc::clone(&suspended_seen);
    let hook_hub = hub.clone();
    let hook_gate = interceptor.clone();
    let connection = MemoryConnection::new()
        .with_table("users", users())
        .on_scan(move |_| {
            let hub = hook_hub.clone();
            *hook_writer.borrow_mut() = Some(thread::spawn(move || hub.before_mutation(&update_user())));

            let deadline = Instant::now() + Duration::from_secs(5);
            while hook_gate.suspended_writers() == 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            *hook_seen.borrow_mut() = hook_gate.suspended_writers() == 1;
        });

    coordinator
        .run(connection, &[TableSpec::select_all("users")])
        .unwrap();

    assert!(*suspended_seen.borrow());
    let handle = writer.borrow_mut().take().unwrap();
    assert!(handle.join().unwrap().is_ok());
    assert_eq!(interceptor.suspended_writers(), 0);
}
