//! Lifecycle Tests for Tables and Databases
//!
//! Readiness, the ready-wrapper, disconnect idempotence, the database
//! teardown cascade and backend failure pass-through.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tabula_core::{row, BackendError, Schema};
use tabula_db::{Database, ReadyState};
use tabula_events::{DatabaseEvent, DatabaseEventKind, TableEvent, TableEventKind};
use tabula_test_utils::assertions::*;
use tabula_test_utils::fixtures::*;
use tabula_test_utils::{BackendOp, EventRecorder, FaultyBackend, MemoryBackend};

fn lazy_db(backend: MemoryBackend) -> Database {
    Database::with_config("life", backend, lazy_config()).unwrap()
}

// ============================================================================
// READINESS
// ============================================================================

#[tokio::test]
async fn test_table_initialises_on_first_use() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.table("users", users_schema()).into_table();

    assert_eq!(users.state(), ReadyState::Uninitialized);
    assert_eq!(backend.calls(BackendOp::CreateTable), 0);

    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();
    assert_eq!(users.state(), ReadyState::Ready);
    assert_eq!(db.state(), ReadyState::Ready);

    users.query().get().await.unwrap();
    assert_eq!(backend.calls(BackendOp::Connect), 1);
    assert_eq!(backend.calls(BackendOp::CreateTable), 1);
}

#[tokio::test]
async fn test_eager_init_connects_in_background() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::new("eager", backend.clone());
    let users = db.for_table("users", users_schema()).await.unwrap();

    assert!(users.state().is_ready());
    assert_eq!(backend.calls(BackendOp::Connect), 1);
    assert_eq!(backend.inner().table_names(), vec!["users".to_string()]);
}

#[tokio::test]
async fn test_failed_initialisation_is_shared() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    backend.fail(BackendOp::CreateTable, BackendError::NotConnected);
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.table("users", users_schema()).into_table();

    let first = users.query().get().await;
    assert_backend_error(&first, &BackendError::NotConnected);
    let second = users.insert(row! { "id" => 1, "name" => "a" }).await;
    assert_backend_error(&second, &BackendError::NotConnected);

    assert!(matches!(users.state(), ReadyState::Failed(_)));
    assert_eq!(backend.calls(BackendOp::CreateTable), 1);
}

#[tokio::test]
async fn test_database_ready_event_fires_once() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let recorder: EventRecorder<DatabaseEvent> = EventRecorder::new();
    db.on(DatabaseEventKind::Ready, recorder.listener());
    assert_eq!(db.state(), ReadyState::Uninitialized);

    db.for_table("users", users_schema()).await.unwrap();
    assert_eq!(recorder.events(), vec![DatabaseEvent::Ready]);

    db.ready().await.unwrap();
    db.for_table("people", people_schema()).await.unwrap();
    assert_eq!(recorder.len(), 1);
    assert_eq!(backend.calls(BackendOp::Connect), 1);
}

// ============================================================================
// READY WRAPPER
// ============================================================================

#[tokio::test]
async fn test_ready_wrapper_listeners_before_resolution() {
    let db = lazy_db(MemoryBackend::new());
    let pending = db.table("users", users_schema());

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let sub = pending.on(TableEventKind::Insert, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    pending.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(sub.remove());
    assert!(!sub.remove());

    let users = pending.await.unwrap();
    users.insert(row! { "id" => 2, "name" => "b" }).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(users.listener_count(TableEventKind::Insert), 0);
}

#[tokio::test]
async fn test_ready_wrapper_query_waits_for_table() {
    let db = lazy_db(MemoryBackend::new());
    let pending = db.table("users", users_schema());

    let count = pending.query().count().await.unwrap();
    assert_eq!(count, 0);
    assert!(pending.table().state().is_ready());
}

#[tokio::test]
async fn test_once_listener_fires_once() {
    let db = lazy_db(MemoryBackend::new());
    let users = db.for_table("users", users_schema()).await.unwrap();
    let recorder: EventRecorder<TableEvent> = EventRecorder::new();
    users.once(TableEventKind::Insert, recorder.listener());

    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();
    users.insert(row! { "id" => 2, "name" => "b" }).await.unwrap();
    assert_eq!(recorder.len(), 1);
}

// ============================================================================
// DISCONNECT
// ============================================================================

#[tokio::test]
async fn test_table_disconnect_is_not_repeatable() {
    let db = lazy_db(MemoryBackend::new());
    let users = db.for_table("users", users_schema()).await.unwrap();

    users.disconnect().unwrap();
    assert_disconnected(&users.disconnect());
    assert_disconnected(&users.query().get().await);
    assert_disconnected(&users.insert(row! { "id" => 1, "name" => "a" }).await);
    assert_eq!(users.state(), ReadyState::Disconnected);
}

#[tokio::test]
async fn test_database_disconnect_cascades() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.for_table("users", users_schema()).await.unwrap();
    let recorder: EventRecorder<DatabaseEvent> = EventRecorder::new();
    db.on(DatabaseEventKind::Disconnect, recorder.listener());

    db.disconnect().await.unwrap();
    assert_eq!(users.state(), ReadyState::Disconnected);
    assert_eq!(db.state(), ReadyState::Disconnected);
    assert_eq!(recorder.events(), vec![DatabaseEvent::Disconnect]);
    assert_eq!(backend.calls(BackendOp::Disconnect), 1);

    assert_disconnected(&db.disconnect().await);
    assert_eq!(backend.calls(BackendOp::Disconnect), 1);
    assert_disconnected(&users.query().count().await);
}

#[tokio::test]
async fn test_failed_backend_disconnect_can_be_retried() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.for_table("users", users_schema()).await.unwrap();
    let failure = BackendError::Other {
        reason: "io".to_string(),
    };
    backend.fail(BackendOp::Disconnect, failure.clone());

    assert_backend_error(&db.disconnect().await, &failure);
    assert_eq!(db.state(), ReadyState::Ready);
    assert_eq!(users.query().count().await.unwrap(), 0);

    backend.heal(BackendOp::Disconnect);
    db.disconnect().await.unwrap();
    assert_eq!(db.state(), ReadyState::Disconnected);
    assert_eq!(users.state(), ReadyState::Disconnected);
}

// ============================================================================
// REGISTRY AND DELETE CASCADE
// ============================================================================

#[tokio::test]
async fn test_tables_names_are_unique_and_ordered() {
    let db = lazy_db(MemoryBackend::new());
    let first = db.table("users", users_schema()).into_table();
    db.table("people", people_schema());
    let again = db.table("users", Schema::default()).into_table();

    assert_eq!(db.tables_names(), vec!["users".to_string(), "people".to_string()]);
    assert!(again.schema().has_column("name"), "live handle is reused");
    assert_eq!(first.name(), again.name());
    assert!(db.get_table("people").is_some());
    assert!(db.get_table("missing").is_none());
}

#[tokio::test]
async fn test_delete_table_drops_and_disconnects() {
    let memory = MemoryBackend::new();
    let db = lazy_db(memory.clone());
    let users = db.for_table("users", users_schema()).await.unwrap();
    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();
    let recorder: EventRecorder<DatabaseEvent> = EventRecorder::new();
    db.on(DatabaseEventKind::DeleteTable, recorder.listener());

    db.delete_table("users").await.unwrap();
    assert!(memory.table_names().is_empty());
    assert_eq!(users.state(), ReadyState::Disconnected);
    assert_eq!(recorder.events(), vec![DatabaseEvent::DeleteTable("users".to_string())]);

    // A fresh handle starts from an empty table.
    let users = db.for_table("users", users_schema()).await.unwrap();
    assert_eq!(users.query().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_uncreated_table_only_disconnects() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let later = db.table("later", users_schema()).into_table();
    let recorder: EventRecorder<DatabaseEvent> = EventRecorder::new();
    db.on(DatabaseEventKind::DeleteTable, recorder.listener());

    db.delete_table("later").await.unwrap();
    assert_eq!(later.state(), ReadyState::Disconnected);
    assert!(db.get_table("later").is_none());
    assert_eq!(recorder.events(), vec![DatabaseEvent::DeleteTable("later".to_string())]);
    assert_eq!(backend.calls(BackendOp::DeleteTable), 0);

    // Unregistered names still go to the backend.
    let missing = db.delete_table("missing").await;
    assert!(matches!(missing, Err(tabula_core::TabulaError::Backend(_))));
    assert_eq!(backend.calls(BackendOp::DeleteTable), 1);
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_delete_database_retries_after_backend_failure() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.for_table("users", users_schema()).await.unwrap();
    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();
    let recorder: EventRecorder<DatabaseEvent> = EventRecorder::new();
    db.on(DatabaseEventKind::Delete, recorder.listener());

    let failure = BackendError::Other {
        reason: "io".to_string(),
    };
    backend.fail(BackendOp::DeleteTable, failure.clone());
    assert_backend_error(&db.delete_database().await, &failure);
    assert_eq!(db.state(), ReadyState::Ready);
    assert_eq!(users.state(), ReadyState::Ready);
    assert_eq!(backend.inner().row_count("users"), Some(1));
    assert!(recorder.is_empty());

    backend.heal(BackendOp::DeleteTable);
    db.delete_database().await.unwrap();
    assert!(backend.inner().table_names().is_empty());
    assert_eq!(db.state(), ReadyState::Disconnected);
    assert_eq!(users.state(), ReadyState::Disconnected);
    assert_eq!(recorder.events(), vec![DatabaseEvent::Delete]);
}

#[tokio::test]
async fn test_delete_database_cascades_in_order() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.for_table("users", users_schema()).await.unwrap();
    let people = db.for_table("people", people_schema()).await.unwrap();
    let pending = db.table("never_used", users_schema()).into_table();

    let recorder: EventRecorder<DatabaseEvent> = EventRecorder::new();
    db.on(DatabaseEventKind::DeleteTable, recorder.listener());
    db.on(DatabaseEventKind::Delete, recorder.listener());

    db.delete_database().await.unwrap();
    assert_eq!(
        recorder.events(),
        vec![
            DatabaseEvent::DeleteTable("users".to_string()),
            DatabaseEvent::DeleteTable("people".to_string()),
            DatabaseEvent::DeleteTable("never_used".to_string()),
            DatabaseEvent::Delete,
        ]
    );
    // Only tables that were created reach the backend.
    assert_eq!(backend.calls(BackendOp::DeleteTable), 2);
    assert_eq!(backend.calls(BackendOp::DeleteDatabase), 1);
    assert!(backend.inner().table_names().is_empty());

    for table in [&users, &people, &pending] {
        assert_eq!(table.state(), ReadyState::Disconnected);
    }
    assert_disconnected(&db.delete_database().await);
}

// ============================================================================
// BACKEND ERRORS
// ============================================================================

#[tokio::test]
async fn test_backend_errors_pass_through_without_events() {
    let backend = FaultyBackend::new(MemoryBackend::new());
    let db = Database::with_config("life", backend.clone(), lazy_config()).unwrap();
    let users = db.for_table("users", users_schema()).await.unwrap();
    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();

    let recorder: EventRecorder<TableEvent> = EventRecorder::new();
    users.on(TableEventKind::Update, recorder.listener());
    users.on(TableEventKind::Delete, recorder.listener());

    let failure = BackendError::Other {
        reason: "disk full".to_string(),
    };
    backend.fail(BackendOp::Update, failure.clone());
    backend.fail(BackendOp::Delete, failure.clone());

    let updated = users.query().update(&row! { "name" => "b" }).await;
    assert_backend_error(&updated, &failure);
    let deleted = users.query().delete().await;
    assert_backend_error(&deleted, &failure);
    assert!(recorder.is_empty());

    backend.heal(BackendOp::Delete);
    assert_eq!(users.query().delete().await.unwrap().len(), 1);
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_partial_batch_failure_reports_stored_rows() {
    let memory = MemoryBackend::new();
    let db = lazy_db(memory.clone());
    let users = db.for_table("users", users_schema()).await.unwrap();
    let recorder: EventRecorder<TableEvent> = EventRecorder::new();
    users.on(TableEventKind::Insert, recorder.listener());

    // Second row collides on the primary key inside the backend.
    let result = users
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 1, "name" => "b" },
        ])
        .await;
    assert!(matches!(result, Err(tabula_core::TabulaError::Backend(_))));

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].rows().len(), 1);
    assert_eq!(memory.row_count("users"), Some(1));
}
