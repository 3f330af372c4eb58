//! TABULA Test Utilities
//!
//! Centralized test infrastructure for the TABULA workspace:
//! - A fault-injecting backend wrapper
//! - An event recorder for listener assertions
//! - Proptest generators for values, schemas and valid rows
//! - Test fixtures for common schemas and configurations
//! - Custom assertions for TABULA error kinds

// Re-export the reference backend from its source crate
pub use tabula_storage::{Backend, MemoryBackend};

// Re-export core types for convenience
pub use tabula_core::{
    BackendError, ColumnSpec, DataType, QueryError, Row, RowData, Schema, TabulaConfig,
    TabulaError, TabulaResult, ValidationError, Value, WhereClause,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Install a `tracing` subscriber writing to the test output.
///
/// Honours `RUST_LOG` and defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FAULTY BACKEND
// ============================================================================

/// Backend operations a [`FaultyBackend`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Connect,
    Disconnect,
    DeleteDatabase,
    CreateTable,
    DeleteTable,
    SelectAll,
    SelectOne,
    SelectFirst,
    SelectLast,
    Length,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct FaultState {
    faults: HashMap<BackendOp, BackendError>,
    calls: HashMap<BackendOp, usize>,
}

/// Wraps a backend, counting calls and failing chosen operations.
///
/// Clones share faults and counters, so a test can keep a handle after
/// moving the backend into a database.
#[derive(Debug, Clone)]
pub struct FaultyBackend<B> {
    inner: B,
    state: Arc<Mutex<FaultState>>,
}

impl<B: Backend> FaultyBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(FaultState::default())),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Make every later call of `op` fail with `error`.
    pub fn fail(&self, op: BackendOp, error: BackendError) {
        self.lock().faults.insert(op, error);
    }

    pub fn heal(&self, op: BackendOp) {
        self.lock().faults.remove(&op);
    }

    /// How many times `op` was called, failed calls included.
    pub fn calls(&self, op: BackendOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, op: BackendOp) -> TabulaResult<()> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        match state.faults.get(&op) {
            Some(error) => Err(TabulaError::Backend(error.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<B: Backend> Backend for FaultyBackend<B> {
    async fn connect(&self, name: &str) -> TabulaResult<()> {
        self.enter(BackendOp::Connect)?;
        self.inner.connect(name).await
    }

    async fn disconnect(&self) -> TabulaResult<()> {
        self.enter(BackendOp::Disconnect)?;
        self.inner.disconnect().await
    }

    async fn delete_database(&self) -> TabulaResult<()> {
        self.enter(BackendOp::DeleteDatabase)?;
        self.inner.delete_database().await
    }

    async fn create_table(&self, table: &str, schema: &Schema) -> TabulaResult<()> {
        self.enter(BackendOp::CreateTable)?;
        self.inner.create_table(table, schema).await
    }

    async fn delete_table(&self, table: &str) -> TabulaResult<()> {
        self.enter(BackendOp::DeleteTable)?;
        self.inner.delete_table(table).await
    }

    async fn select_all(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Vec<Row>> {
        self.enter(BackendOp::SelectAll)?;
        self.inner.select_all(table, columns, wheres).await
    }

    async fn select_one(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        self.enter(BackendOp::SelectOne)?;
        self.inner.select_one(table, columns, wheres).await
    }

    async fn select_first(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        self.enter(BackendOp::SelectFirst)?;
        self.inner
            .select_first(table, order_column, columns, wheres)
            .await
    }

    async fn select_last(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        self.enter(BackendOp::SelectLast)?;
        self.inner
            .select_last(table, order_column, columns, wheres)
            .await
    }

    async fn length(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize> {
        self.enter(BackendOp::Length)?;
        self.inner.length(table, wheres).await
    }

    async fn insert(&self, table: &str, row: &RowData) -> TabulaResult<Row> {
        self.enter(BackendOp::Insert)?;
        self.inner.insert(table, row).await
    }

    async fn update(
        &self,
        table: &str,
        data: &RowData,
        wheres: &[WhereClause],
    ) -> TabulaResult<usize> {
        self.enter(BackendOp::Update)?;
        self.inner.update(table, data, wheres).await
    }

    async fn delete(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize> {
        self.enter(BackendOp::Delete)?;
        self.inner.delete(table, wheres).await
    }
}

// ============================================================================
// EVENT RECORDER
// ============================================================================

/// Collects every event handed to its listener.
#[derive(Debug)]
pub struct EventRecorder<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> Clone for EventRecorder<E> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<E> Default for EventRecorder<E> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone + Send + 'static> EventRecorder<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that appends each event it receives.
    pub fn listener(&self) -> impl Fn(&E) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &E| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }
    }

    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for TABULA types.

    use super::*;
    use chrono::DateTime;
    use proptest::prelude::*;
    use tabula_core::Column;

    /// Column types a value can be stored as.
    pub fn arb_data_type() -> impl Strategy<Value = DataType> {
        prop_oneof![
            Just(DataType::Text),
            Just(DataType::Integer),
            Just(DataType::Float),
            Just(DataType::Boolean),
            Just(DataType::DateTime),
            Just(DataType::BigInt),
        ]
    }

    /// A non-null value of `data_type`.
    pub fn arb_value_of(data_type: DataType) -> BoxedStrategy<Value> {
        match data_type {
            DataType::Text => "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text).boxed(),
            DataType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
            DataType::Float => (-1.0e9f64..1.0e9).prop_map(Value::Float).boxed(),
            DataType::Boolean => any::<bool>().prop_map(Value::Boolean).boxed(),
            DataType::DateTime => (0i64..4_000_000_000)
                .prop_filter_map("timestamp in range", |secs| DateTime::from_timestamp(secs, 0))
                .prop_map(Value::DateTime)
                .boxed(),
            DataType::BigInt => any::<i128>().prop_map(Value::BigInt).boxed(),
            DataType::Null => Just(Value::Null).boxed(),
        }
    }

    /// A plain column: any stored type, optionally `not_null`.
    pub fn arb_column_spec() -> impl Strategy<Value = ColumnSpec> {
        (arb_data_type(), any::<bool>()).prop_map(|(data_type, not_null)| {
            let spec = ColumnSpec::new(data_type);
            if not_null {
                spec.not_null()
            } else {
                spec
            }
        })
    }

    /// A schema of one to six plain columns named `c0`, `c1`, ...
    pub fn arb_schema() -> impl Strategy<Value = Schema> {
        prop::collection::vec(arb_column_spec(), 1..6).prop_filter_map(
            "valid schema",
            |specs| {
                let columns = specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, spec)| Column {
                        name: format!("c{}", i),
                        spec,
                    })
                    .collect();
                Schema::new(columns).ok()
            },
        )
    }

    /// Row data that passes insert validation for `schema`.
    ///
    /// `not_null` columns always get a value; others are sometimes omitted.
    pub fn arb_row_for(schema: &Schema) -> BoxedStrategy<RowData> {
        let entries: Vec<BoxedStrategy<Option<(String, Value)>>> = schema
            .iter()
            .map(|column| {
                let name = column.name.clone();
                let value = arb_value_of(column.spec.data_type);
                if column.spec.not_null {
                    value.prop_map(move |v| Some((name.clone(), v))).boxed()
                } else {
                    proptest::option::of(value)
                        .prop_map(move |v| v.map(|v| (name.clone(), v)))
                        .boxed()
                }
            })
            .collect();
        entries
            .prop_map(|entries| entries.into_iter().flatten().collect())
            .boxed()
    }

    /// A schema together with a valid row for it.
    pub fn arb_schema_and_row() -> impl Strategy<Value = (Schema, RowData)> {
        arb_schema().prop_flat_map(|schema| {
            let row = arb_row_for(&schema);
            (Just(schema), row)
        })
    }

    /// A compare operand of any shape, for build-time shape checks.
    pub fn arb_compare() -> impl Strategy<Value = tabula_core::Compare> {
        use tabula_core::Compare;
        prop_oneof![
            any::<i64>().prop_map(|v| Compare::Scalar(Value::Integer(v))),
            (any::<i64>(), any::<i64>())
                .prop_map(|(lo, hi)| Compare::Range(Value::Integer(lo), Value::Integer(hi))),
            prop::collection::vec(any::<i64>(), 0..4)
                .prop_map(|items| Compare::List(items.into_iter().map(Value::Integer).collect())),
        ]
    }

    pub fn arb_operator() -> impl Strategy<Value = tabula_core::Operator> {
        use tabula_core::Operator;
        prop_oneof![
            Just(Operator::Eq),
            Just(Operator::Ne),
            Just(Operator::Gt),
            Just(Operator::Lt),
            Just(Operator::Gte),
            Just(Operator::Lte),
            Just(Operator::Between),
            Just(Operator::NotBetween),
            Just(Operator::Like),
            Just(Operator::NotLike),
            Just(Operator::In),
            Just(Operator::NotIn),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built schemas and configurations.

    use super::*;

    /// `{id: INTEGER primary key, name: TEXT not null}`.
    pub fn users_schema() -> Schema {
        Schema::builder()
            .column("id", ColumnSpec::integer().primary_key())
            .column("name", ColumnSpec::text().not_null())
            .build()
            .expect("users schema is valid")
    }

    /// A richer schema: auto-increment key, options with a default, a unique
    /// column and a custom check.
    pub fn people_schema() -> Schema {
        Schema::builder()
            .column("id", ColumnSpec::integer().primary_key().auto_increment())
            .column("name", ColumnSpec::text().not_null())
            .column(
                "age",
                ColumnSpec::integer().check(|v| match v.as_i64() {
                    Some(age) if age < 0 => Err("age cannot be negative".to_string()),
                    _ => Ok(()),
                }),
            )
            .column(
                "role",
                ColumnSpec::text()
                    .options(["admin", "user"])
                    .default_value("user"),
            )
            .column("email", ColumnSpec::text().unique())
            .build()
            .expect("people schema is valid")
    }

    /// Default configuration without background initialisation, so tests
    /// control when the backend is first touched.
    pub fn lazy_config() -> TabulaConfig {
        TabulaConfig::new().with_eager_init(false)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for TABULA-specific error kinds.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_missing_column<T: std::fmt::Debug>(result: &TabulaResult<T>, column: &str) {
        match result {
            Err(TabulaError::Validation(ValidationError::MissingColumn { column: c })) => {
                assert_eq!(c, column, "Wrong column in MissingColumn error");
            }
            other => panic!("Expected MissingColumn for {}, got: {:?}", column, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(TabulaError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_invalid_argument<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(e) if e.is_invalid_argument() => {}
            other => panic!("Expected InvalidArgument, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_disconnected<T: std::fmt::Debug>(result: &TabulaResult<T>) {
        match result {
            Err(e) if e.is_disconnected() => {}
            other => panic!("Expected Disconnected, got: {:?}", other),
        }
    }

    /// Assert the exact backend error came through untouched.
    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(
        result: &TabulaResult<T>,
        expected: &BackendError,
    ) {
        match result {
            Err(TabulaError::Backend(e)) => assert_eq!(e, expected),
            other => panic!("Expected Backend error {:?}, got: {:?}", expected, other),
        }
    }
}
