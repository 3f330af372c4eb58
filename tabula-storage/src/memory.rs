//! In-memory backend

use crate::Backend;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tabula_core::{
    matches_all, BackendError, DataType, Row, RowData, RowId, Schema, TabulaResult, Value,
    WhereClause,
};

#[derive(Debug)]
struct MemoryTable {
    schema: Schema,
    rows: Vec<Row>,
    next_rowid: RowId,
}

impl MemoryTable {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            next_rowid: 1,
        }
    }

    fn matching<'a>(&'a self, wheres: &'a [WhereClause]) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows.iter().filter(move |row| matches_all(wheres, row))
    }

    /// Next value of an auto-increment column: one past the current maximum.
    fn next_sequence(&self, column: &str, data_type: DataType) -> Value {
        let max = self
            .rows
            .iter()
            .filter_map(|row| match row.values.get(column) {
                Some(Value::Integer(n)) => Some(i128::from(*n)),
                Some(Value::BigInt(n)) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        match data_type {
            DataType::BigInt => Value::BigInt(max + 1),
            _ => Value::Integer(i64::try_from(max + 1).unwrap_or(i64::MAX)),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    database: Option<String>,
    tables: HashMap<String, MemoryTable>,
}

/// Backend keeping every table in process memory.
///
/// Enforces primary key and unique constraints and fills auto-increment
/// columns. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    /// Create a new, unconnected backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the connected database.
    pub fn database(&self) -> Option<String> {
        self.read().ok().and_then(|state| state.database.clone())
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .map(|state| state.tables.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of rows stored in a table, or `None` when it does not exist.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.read()
            .ok()
            .and_then(|state| state.tables.get(table).map(|t| t.rows.len()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, BackendError> {
        self.state.read().map_err(|_| BackendError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, BackendError> {
        self.state.write().map_err(|_| BackendError::LockPoisoned)
    }

    fn with_table<R>(
        &self,
        table: &str,
        f: impl FnOnce(&MemoryTable) -> TabulaResult<R>,
    ) -> TabulaResult<R> {
        let state = self.read()?;
        if state.database.is_none() {
            return Err(BackendError::NotConnected.into());
        }
        let stored = state.tables.get(table).ok_or_else(|| not_found(table))?;
        f(stored)
    }

    fn with_table_mut<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> TabulaResult<R>,
    ) -> TabulaResult<R> {
        let mut state = self.write()?;
        if state.database.is_none() {
            return Err(BackendError::NotConnected.into());
        }
        let stored = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
        f(stored)
    }

    fn ordered(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Vec<Row>> {
        self.with_table(table, |stored| {
            let mut rows: Vec<Row> = stored.matching(wheres).cloned().collect();
            if let Some(column) = order_column {
                rows.sort_by(|a, b| {
                    let left = a.get(column).unwrap_or(Value::Null);
                    let right = b.get(column).unwrap_or(Value::Null);
                    left.sort_cmp(&right).then(a.rowid.cmp(&b.rowid))
                });
            }
            Ok(rows.into_iter().map(|row| project(row, columns)).collect())
        })
    }
}

fn not_found(table: &str) -> BackendError {
    BackendError::TableNotFound {
        table: table.to_string(),
    }
}

fn project(row: Row, columns: Option<&[String]>) -> Row {
    match columns {
        Some(columns) => row.project(columns),
        None => row,
    }
}

/// Reject `changes` that would repeat a non-null value of a unique column.
///
/// Each change is a new row, replacing `rows[i]` when it carries `Some(i)`
/// and appended otherwise. Stored rows are assumed unique already.
fn check_unique(
    table: &str,
    schema: &Schema,
    rows: &[Row],
    changes: &[(Option<usize>, Row)],
) -> Result<(), BackendError> {
    let replaced: HashSet<usize> = changes.iter().filter_map(|(i, _)| *i).collect();
    for column in schema.iter().filter(|c| c.spec.is_unique()) {
        let key = |row: &Row| {
            row.values
                .get(&column.name)
                .filter(|v| !v.is_null())
                .map(ToString::to_string)
        };
        let mut seen: HashSet<String> = rows
            .iter()
            .enumerate()
            .filter(|(i, _)| !replaced.contains(i))
            .filter_map(|(_, row)| key(row))
            .collect();
        for (_, row) in changes {
            let Some(value) = key(row) else {
                continue;
            };
            if !seen.insert(value.clone()) {
                return Err(BackendError::ConstraintViolation {
                    table: table.to_string(),
                    column: column.name.clone(),
                    reason: format!("duplicate value {}", value),
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn connect(&self, name: &str) -> TabulaResult<()> {
        let mut state = self.write()?;
        state.database = Some(name.to_string());
        tracing::debug!(database = %name, "Memory backend connected");
        Ok(())
    }

    async fn disconnect(&self) -> TabulaResult<()> {
        let mut state = self.write()?;
        state.database = None;
        Ok(())
    }

    async fn delete_database(&self) -> TabulaResult<()> {
        let mut state = self.write()?;
        state.tables.clear();
        state.database = None;
        Ok(())
    }

    async fn create_table(&self, table: &str, schema: &Schema) -> TabulaResult<()> {
        let mut state = self.write()?;
        if state.database.is_none() {
            return Err(BackendError::NotConnected.into());
        }
        state
            .tables
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable::new(schema.clone()));
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> TabulaResult<()> {
        let mut state = self.write()?;
        if state.database.is_none() {
            return Err(BackendError::NotConnected.into());
        }
        state.tables.remove(table).ok_or_else(|| not_found(table))?;
        Ok(())
    }

    async fn select_all(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Vec<Row>> {
        self.ordered(table, None, columns, wheres)
    }

    async fn select_one(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        self.with_table(table, |stored| {
            let mut matches = stored.matching(wheres);
            match (matches.next(), matches.next()) {
                (Some(row), None) => Ok(Some(project(row.clone(), columns))),
                _ => Ok(None),
            }
        })
    }

    async fn select_first(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        Ok(self
            .ordered(table, order_column, columns, wheres)?
            .into_iter()
            .next())
    }

    async fn select_last(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        Ok(self.ordered(table, order_column, columns, wheres)?.pop())
    }

    async fn length(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize> {
        self.with_table(table, |stored| Ok(stored.matching(wheres).count()))
    }

    async fn insert(&self, table: &str, data: &RowData) -> TabulaResult<Row> {
        self.with_table_mut(table, |stored| {
            let mut values = data.clone();
            for column in stored.schema.iter().filter(|c| c.spec.auto_increment) {
                let missing = values.get(&column.name).map_or(true, Value::is_null);
                if missing {
                    let next = stored.next_sequence(&column.name, column.spec.data_type);
                    values.insert(column.name.clone(), next);
                }
            }

            let change = [(None, Row::new(stored.next_rowid, values))];
            check_unique(table, &stored.schema, &stored.rows, &change)?;

            let [(_, row)] = change;
            stored.rows.push(row.clone());
            stored.next_rowid += 1;
            Ok(row)
        })
    }

    async fn update(
        &self,
        table: &str,
        data: &RowData,
        wheres: &[WhereClause],
    ) -> TabulaResult<usize> {
        self.with_table_mut(table, |stored| {
            let changes: Vec<(Option<usize>, Row)> = stored
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| matches_all(wheres, row))
                .map(|(i, row)| {
                    let mut row = row.clone();
                    for (column, value) in data {
                        row.values.insert(column.clone(), value.clone());
                    }
                    (Some(i), row)
                })
                .collect();
            check_unique(table, &stored.schema, &stored.rows, &changes)?;

            let count = changes.len();
            for (i, row) in changes {
                if let Some(i) = i {
                    stored.rows[i] = row;
                }
            }
            Ok(count)
        })
    }

    async fn delete(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize> {
        self.with_table_mut(table, |stored| {
            let before = stored.rows.len();
            stored.rows.retain(|row| !matches_all(wheres, row));
            Ok(before - stored.rows.len())
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
