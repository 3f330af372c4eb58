//! Smoke Tests for Table CRUD
//!
//! End-to-end flows against the in-memory backend: insert, read back,
//! update, delete and upsert, with the change events each one emits.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tabula_core::{row, OnePolicy, OneOrMany, Row, Value};
use tabula_db::{Database, Table};
use tabula_events::{TableEvent, TableEventKind};
use tabula_test_utils::assertions::*;
use tabula_test_utils::fixtures::*;
use tabula_test_utils::{init_tracing, EventRecorder, MemoryBackend, TabulaConfig};

// ============================================================================
// HELPERS
// ============================================================================

async fn users_table() -> Table {
    users_table_with(lazy_config()).await
}

async fn users_table_with(config: TabulaConfig) -> Table {
    init_tracing();
    let db = Database::with_config("smoke", MemoryBackend::new(), config).unwrap();
    db.for_table("users", users_schema()).await.unwrap()
}

fn ids(rows: &[Row]) -> Vec<Value> {
    rows.iter().map(|r| r.get("id").unwrap_or(Value::Null)).collect()
}

// ============================================================================
// INSERT AND READ
// ============================================================================

#[tokio::test]
async fn test_insert_emits_and_reads_back() {
    let users = users_table().await;
    let recorder: EventRecorder<TableEvent> = EventRecorder::new();
    users.on(TableEventKind::Insert, recorder.listener());

    let inserted = users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();
    let row = inserted.one().unwrap();
    assert_eq!(row.to_json(), json!({ "id": 1, "name": "a", "rowid": 1 }));

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], TableEvent::Insert(OneOrMany::One(row.clone())));

    let missing = users.insert(row! { "id" => 2 }).await;
    assert_missing_column(&missing, "name");
    assert_eq!(recorder.len(), 1, "failed insert must not emit");

    let first = users.query().filter("id", "=", 1).unwrap().first().await.unwrap();
    assert_eq!(first, Some(row));
}

#[tokio::test]
async fn test_batch_insert_mirrors_input_shape() {
    let users = users_table().await;
    let inserted = users
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 2, "name" => "b" },
        ])
        .await
        .unwrap();

    match inserted {
        OneOrMany::Many(rows) => assert_eq!(rows.len(), 2),
        OneOrMany::One(_) => panic!("batch insert returned a single row"),
    }
    assert_eq!(users.query().length().await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalid_batch_writes_nothing() {
    let users = users_table().await;
    let result = users
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => "x", "name" => "b" },
        ])
        .await;

    assert_validation_error(&result);
    assert_eq!(users.query().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_defaults_auto_increment_and_checks() {
    let db = Database::with_config("people", MemoryBackend::new(), lazy_config()).unwrap();
    let people = db.for_table("people", people_schema()).await.unwrap();

    let first = people.insert(row! { "name" => "ann" }).await.unwrap().one().unwrap();
    let second = people.insert(row! { "name" => "bob" }).await.unwrap().one().unwrap();
    assert_eq!(first.get("id"), Some(Value::Integer(1)));
    assert_eq!(second.get("id"), Some(Value::Integer(2)));
    assert_eq!(first.get("role"), Some(Value::from("user")));

    let bad_role = people.insert(row! { "name" => "c", "role" => "root" }).await;
    assert_validation_error(&bad_role);

    let bad_age = people.insert(row! { "name" => "c", "age" => -1 }).await;
    assert_validation_error(&bad_age);
}

#[tokio::test]
async fn test_unique_violation_is_backend_error() {
    let db = Database::with_config("people", MemoryBackend::new(), lazy_config()).unwrap();
    let people = db.for_table("people", people_schema()).await.unwrap();

    people
        .insert(row! { "name" => "a", "email" => "a@x" })
        .await
        .unwrap();
    let duplicate = people.insert(row! { "name" => "b", "email" => "a@x" }).await;
    assert!(matches!(duplicate, Err(tabula_core::TabulaError::Backend(_))));
    assert_eq!(people.query().count().await.unwrap(), 1);
}

// ============================================================================
// UPDATE, DELETE, SET
// ============================================================================

#[tokio::test]
async fn test_update_reports_previous_rows() {
    let users = users_table().await;
    users
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 2, "name" => "b" },
        ])
        .await
        .unwrap();
    let recorder: EventRecorder<TableEvent> = EventRecorder::new();
    users.on(TableEventKind::Update, recorder.listener());

    let updated = users
        .query()
        .filter("id", "=", 2)
        .unwrap()
        .update(&row! { "name" => "z" })
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].get("name"), Some(Value::from("z")));

    match &recorder.events()[..] {
        [TableEvent::Update { updated, previous }] => {
            assert_eq!(previous[0].get("name"), Some(Value::from("b")));
            assert_eq!(updated[0].get("name"), Some(Value::from("z")));
            assert_eq!(previous[0].rowid, updated[0].rowid);
        }
        other => panic!("Expected one update event, got: {:?}", other),
    }

    let untouched = users.query().filter("id", "=", 1).unwrap().one().await.unwrap();
    assert_eq!(untouched.and_then(|r| r.get("name")), Some(Value::from("a")));
}

#[tokio::test]
async fn test_update_rejects_null_for_not_null_column() {
    let users = users_table().await;
    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();

    let result = users.query().update(&row! { "name" => Value::Null }).await;
    assert_validation_error(&result);
}

#[tokio::test]
async fn test_delete_returns_and_emits_removed_rows() {
    let users = users_table().await;
    users
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 2, "name" => "b" },
            row! { "id" => 3, "name" => "c" },
        ])
        .await
        .unwrap();
    let recorder: EventRecorder<TableEvent> = EventRecorder::new();
    users.on(TableEventKind::Delete, recorder.listener());

    let removed = users
        .query()
        .filter("id", ">=", 2)
        .unwrap()
        .delete()
        .await
        .unwrap();
    assert_eq!(ids(&removed), vec![Value::Integer(2), Value::Integer(3)]);
    assert_eq!(recorder.events(), vec![TableEvent::Delete(removed)]);
    assert_eq!(users.query().count().await.unwrap(), 1);

    // Nothing matched, nothing emitted.
    let none = users.query().filter("id", "=", 9).unwrap().delete().await.unwrap();
    assert!(none.is_empty());
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_set_updates_by_primary_key_or_inserts() {
    let users = users_table().await;
    users.insert(row! { "id" => 1, "name" => "a" }).await.unwrap();

    let updated = users.query().set(&row! { "id" => 1, "name" => "b" }).await.unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].rowid, 1);
    assert_eq!(users.query().count().await.unwrap(), 1);

    let inserted = users.query().set(&row! { "id" => 2, "name" => "c" }).await.unwrap();
    assert_eq!(inserted[0].rowid, 2);
    assert_eq!(users.query().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_one_policy() {
    let users = users_table().await;
    users
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 2, "name" => "a" },
        ])
        .await
        .unwrap();
    let same_name = users.query().filter("name", "=", "a").unwrap();
    assert_eq!(same_name.one().await.unwrap(), None);

    let strict = users_table_with(lazy_config().with_one_policy(OnePolicy::ErrorOnAmbiguous)).await;
    strict
        .insert(vec![
            row! { "id" => 1, "name" => "a" },
            row! { "id" => 2, "name" => "a" },
        ])
        .await
        .unwrap();
    let result = strict.query().filter("name", "=", "a").unwrap().one().await;
    assert_invalid_argument(&result);

    let single = strict.query().filter("id", "=", 2).unwrap().one().await.unwrap();
    assert_eq!(single.map(|r| r.rowid), Some(2));
}

// ============================================================================
// TYPED BINDING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: i64,
    name: String,
}

#[tokio::test]
async fn test_bound_table_round_trip() {
    let users = users_table().await;
    let bound = users.bind::<User>();

    let ann = User { id: 1, name: "ann".to_string() };
    assert_eq!(bound.insert(&ann).await.unwrap(), ann);
    bound
        .insert_many(&[User { id: 2, name: "bob".to_string() }])
        .await
        .unwrap();

    let all = bound.all().await.unwrap();
    assert_eq!(all.len(), 2);

    let query = users.query().filter("name", "=", "bob").unwrap();
    assert_eq!(bound.one(&query).await.unwrap().map(|u| u.id), Some(2));

    let renamed = User { id: 1, name: "anna".to_string() };
    assert_eq!(bound.set(&renamed).await.unwrap(), vec![renamed.clone()]);
    assert_eq!(bound.first(&users.query()).await.unwrap(), Some(renamed));
}
