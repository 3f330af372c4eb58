//! Tables: schema-checked CRUD over a backend, with change events.

use crate::database::DatabaseShared;
use crate::readiness::{ReadyState, Readiness};
use crate::{BoundTable, Query};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tabula_core::{
    validate_for_insert_with, validate_for_update_with, DataType, HandleKind, OnePolicy,
    OneOrMany, Operator, QueryError, QueryOptions, Row, RowData, RowId, Schema, TabulaError,
    TabulaResult, WhereClause, ROWID,
};
use tabula_events::{EventEmitter, ListenerId, Subscription, TableEvent, TableEventKind};
use tabula_storage::Backend;

struct TableInner {
    name: String,
    schema: Schema,
    database: Arc<DatabaseShared>,
    readiness: Readiness,
    events: EventEmitter<TableEvent>,
}

/// Handle to a table of a [`Database`](crate::Database).
///
/// Every operation waits until the backend has created the table, and fails
/// with `Disconnected` once the table or its database is torn down. Clones
/// share state, events included.
#[derive(Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

/// Where clauses coerced to column types, plus the columns to fetch.
struct Resolved {
    wheres: Vec<WhereClause>,
    fetch: Option<Vec<String>>,
}

impl Table {
    pub(crate) fn new(name: String, schema: Schema, database: Arc<DatabaseShared>) -> Self {
        Self {
            inner: Arc::new(TableInner {
                readiness: Readiness::new(HandleKind::Table, name.clone()),
                name,
                schema,
                database,
                events: EventEmitter::new(),
            }),
        }
    }

    /// Spawn initialisation on the current runtime when eager init is on.
    pub(crate) fn start(&self) {
        if !self.inner.database.config.eager_init {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let table = self.clone();
            handle.spawn(async move {
                if let Err(e) = table.ready().await {
                    tracing::warn!(table = %table.name(), error = %e, "Table initialisation failed");
                }
            });
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Column specifications of the table.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Declared type of a column. `rowid` is INTEGER.
    pub fn column_type(&self, column: &str) -> Option<DataType> {
        self.inner.schema.column_type(column)
    }

    pub fn state(&self) -> ReadyState {
        self.inner.readiness.state()
    }

    /// Whether the backend ever created this table through this handle.
    pub(crate) fn is_created(&self) -> bool {
        self.inner.readiness.is_initialised()
    }

    fn backend(&self) -> &dyn Backend {
        self.inner.database.backend.as_ref()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Wait until the backend has created the table.
    ///
    /// Connects the database first if needed. Fails with `Disconnected` after
    /// teardown.
    pub async fn ready(&self) -> TabulaResult<()> {
        let inner = &self.inner;
        inner
            .readiness
            .wait_with(|| async move {
                inner.database.ready().await?;
                inner
                    .database
                    .backend
                    .create_table(&inner.name, &inner.schema)
                    .await?;
                tracing::debug!(table = %inner.name, database = %inner.database.name, "Table ready");
                Ok(())
            })
            .await
    }

    /// Mark the table disconnected. A second call fails with `Disconnected`.
    pub fn disconnect(&self) -> TabulaResult<()> {
        self.inner.readiness.disconnect()?;
        tracing::debug!(table = %self.inner.name, "Table disconnected");
        Ok(())
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    pub fn on<F>(&self, kind: TableEventKind, listener: F) -> Subscription
    where
        F: Fn(&TableEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    pub fn once<F>(&self, kind: TableEventKind, listener: F) -> Subscription
    where
        F: Fn(&TableEvent) + Send + Sync + 'static,
    {
        self.inner.events.once(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn listener_count(&self, kind: TableEventKind) -> usize {
        self.inner.events.listener_count(kind)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Start a deferred query against this table.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// View rows as `T` through serde.
    pub fn bind<T>(&self) -> BoundTable<T>
    where
        T: Serialize + DeserializeOwned,
    {
        BoundTable::new(self.clone())
    }

    fn unknown_column(&self, column: &str) -> TabulaError {
        QueryError::UnknownColumn {
            table: self.inner.name.clone(),
            column: column.to_string(),
        }
        .into()
    }

    /// Check every referenced column and coerce compare values.
    fn resolve(&self, options: &QueryOptions) -> TabulaResult<Resolved> {
        let schema = &self.inner.schema;

        if let (Some(take), Some(max)) = (options.take, self.inner.database.config.max_take) {
            if take > max {
                return Err(TabulaError::invalid_argument(format!(
                    "take({}) exceeds the maximum of {}",
                    take, max
                )));
            }
        }

        let ordered_or_projected = options
            .order
            .iter()
            .map(|o| o.column.as_str())
            .chain(options.columns.iter().map(String::as_str));
        for column in ordered_or_projected {
            if !schema.has_column(column) {
                return Err(self.unknown_column(column));
            }
        }

        let wheres = options
            .wheres
            .iter()
            .map(|clause| {
                let data_type = schema
                    .column_type(clause.column())
                    .ok_or_else(|| self.unknown_column(clause.column()))?;
                clause.coerce_to(data_type)
            })
            .collect::<TabulaResult<Vec<_>>>()?;

        let fetch = if options.columns.is_empty() {
            None
        } else {
            let mut fetch: Vec<String> = Vec::new();
            for column in options.columns.iter().chain(options.order.iter().map(|o| &o.column)) {
                if column != ROWID && !fetch.contains(column) {
                    fetch.push(column.clone());
                }
            }
            Some(fetch)
        };

        tracing::trace!(
            table = %self.inner.name,
            wheres = wheres.len(),
            order = options.order.len(),
            "Resolved query"
        );
        Ok(Resolved { wheres, fetch })
    }

    fn finish(&self, row: Row, options: &QueryOptions) -> Row {
        self.inner.schema.deserialize_row(row.project(&options.columns))
    }

    /// The backend's single-column ordering reproduces `options` when the
    /// order is empty or one ascending key and nothing is paginated.
    fn backend_order(options: &QueryOptions) -> Option<Option<&str>> {
        if options.is_paginated() {
            return None;
        }
        match options.order.as_slice() {
            [] => Some(None),
            [term] if term.ascending => Some(Some(term.column.as_str())),
            _ => None,
        }
    }

    /// Every match, ordered then paginated.
    pub async fn select_all(&self, options: &QueryOptions) -> TabulaResult<Vec<Row>> {
        self.ready().await?;
        let resolved = self.resolve(options)?;
        let mut rows = self
            .backend()
            .select_all(&self.inner.name, resolved.fetch.as_deref(), &resolved.wheres)
            .await?;
        options.sort(&mut rows);
        Ok(options
            .paginate(rows)
            .into_iter()
            .map(|row| self.finish(row, options))
            .collect())
    }

    pub async fn select_first(&self, options: &QueryOptions) -> TabulaResult<Option<Row>> {
        self.ready().await?;
        let resolved = self.resolve(options)?;
        match Self::backend_order(options) {
            Some(order_column) => {
                let row = self
                    .backend()
                    .select_first(
                        &self.inner.name,
                        order_column,
                        resolved.fetch.as_deref(),
                        &resolved.wheres,
                    )
                    .await?;
                Ok(row.map(|row| self.finish(row, options)))
            }
            None => Ok(self.select_all(options).await?.into_iter().next()),
        }
    }

    pub async fn select_last(&self, options: &QueryOptions) -> TabulaResult<Option<Row>> {
        self.ready().await?;
        let resolved = self.resolve(options)?;
        match Self::backend_order(options) {
            Some(order_column) => {
                let row = self
                    .backend()
                    .select_last(
                        &self.inner.name,
                        order_column,
                        resolved.fetch.as_deref(),
                        &resolved.wheres,
                    )
                    .await?;
                Ok(row.map(|row| self.finish(row, options)))
            }
            None => Ok(self.select_all(options).await?.pop()),
        }
    }

    /// The single match. Zero matches give `None`; several give `None` or
    /// `InvalidArgument` depending on the configured [`OnePolicy`].
    pub async fn select_one(&self, options: &QueryOptions) -> TabulaResult<Option<Row>> {
        self.ready().await?;
        let resolved = self.resolve(options)?;
        let policy = self.inner.database.config.one_policy;

        if policy == OnePolicy::NoneOnAmbiguous && !options.is_paginated() {
            let row = self
                .backend()
                .select_one(&self.inner.name, resolved.fetch.as_deref(), &resolved.wheres)
                .await?;
            return Ok(row.map(|row| self.finish(row, options)));
        }

        let mut rows = self.select_all(options).await?;
        match rows.len() {
            1 => Ok(rows.pop()),
            0 => Ok(None),
            n if policy == OnePolicy::ErrorOnAmbiguous => Err(TabulaError::invalid_argument(
                format!("expected one row in {}, found {}", self.inner.name, n),
            )),
            _ => Ok(None),
        }
    }

    /// Number of matches, bounded by the page when paginated.
    pub async fn length(&self, options: &QueryOptions) -> TabulaResult<usize> {
        self.ready().await?;
        let resolved = self.resolve(options)?;
        let total = self
            .backend()
            .length(&self.inner.name, &resolved.wheres)
            .await?;
        Ok(options.page_len(total))
    }

    pub async fn exists(&self, options: &QueryOptions) -> TabulaResult<bool> {
        Ok(self.length(options).await? > 0)
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Validate and store one row or a batch. The result mirrors the input
    /// shape and is announced with an `Insert` event.
    ///
    /// A batch is validated as a whole before anything is written. If the
    /// backend rejects a row midway, the rows already stored are announced
    /// and the backend error is returned.
    pub async fn insert(
        &self,
        data: impl Into<OneOrMany<RowData>>,
    ) -> TabulaResult<OneOrMany<Row>> {
        self.inner.readiness.check()?;
        let data = data.into();
        let policy = self.inner.database.config.unknown_columns();
        let validated = match &data {
            OneOrMany::One(row) => vec![validate_for_insert_with(&self.inner.schema, row, policy)?],
            OneOrMany::Many(rows) => rows
                .iter()
                .map(|row| validate_for_insert_with(&self.inner.schema, row, policy))
                .collect::<TabulaResult<Vec<_>>>()?,
        };

        self.ready().await?;
        let mut stored = Vec::with_capacity(validated.len());
        for row in &validated {
            match self.backend().insert(&self.inner.name, row).await {
                Ok(row) => stored.push(self.inner.schema.deserialize_row(row)),
                Err(e) => {
                    if !stored.is_empty() {
                        self.inner
                            .events
                            .emit(&TableEvent::Insert(OneOrMany::Many(stored)));
                    }
                    return Err(e);
                }
            }
        }

        let inserted = data.same_shape(stored).ok_or_else(|| {
            TabulaError::invalid_argument("insert result does not match the input shape")
        })?;
        tracing::debug!(table = %self.inner.name, count = inserted.len(), "Inserted rows");
        self.inner.events.emit(&TableEvent::Insert(inserted.clone()));
        Ok(inserted)
    }

    /// Apply a partial row to every row the options select.
    ///
    /// Returns the updated rows in query order and emits `Update` with the
    /// rows before and after.
    pub async fn update(&self, data: &RowData, options: &QueryOptions) -> TabulaResult<Vec<Row>> {
        self.inner.readiness.check()?;
        let policy = self.inner.database.config.unknown_columns();
        let partial = validate_for_update_with(&self.inner.schema, data, policy)?;

        let previous = self.select_all(&full_rows(options)).await?;
        if previous.is_empty() {
            return Ok(Vec::new());
        }
        let ids = rowid_clause(&previous)?;
        self.backend()
            .update(&self.inner.name, &partial, std::slice::from_ref(&ids))
            .await?;

        let mut updated: Vec<Row> = self
            .backend()
            .select_all(&self.inner.name, None, std::slice::from_ref(&ids))
            .await?
            .into_iter()
            .map(|row| self.inner.schema.deserialize_row(row))
            .collect();
        updated.sort_by_key(|row| previous.iter().position(|p| p.rowid == row.rowid));

        tracing::debug!(table = %self.inner.name, count = updated.len(), "Updated rows");
        self.inner.events.emit(&TableEvent::Update {
            updated: updated.clone(),
            previous,
        });
        Ok(updated)
    }

    /// Remove every row the options select. Returns the removed rows and
    /// emits `Delete` with them.
    pub async fn delete(&self, options: &QueryOptions) -> TabulaResult<Vec<Row>> {
        self.inner.readiness.check()?;
        let removed = self.select_all(&full_rows(options)).await?;
        if removed.is_empty() {
            return Ok(Vec::new());
        }
        let ids = rowid_clause(&removed)?;
        self.backend()
            .delete(&self.inner.name, std::slice::from_ref(&ids))
            .await?;

        tracing::debug!(table = %self.inner.name, count = removed.len(), "Deleted rows");
        self.inner.events.emit(&TableEvent::Delete(removed.clone()));
        Ok(removed)
    }

    /// Upsert: update the rows matching the primary key carried by `data`,
    /// or the rows the options select when `data` has no key; insert when
    /// nothing matches.
    pub async fn set(&self, data: &RowData, options: &QueryOptions) -> TabulaResult<Vec<Row>> {
        self.inner.readiness.check()?;
        let key = self
            .inner
            .schema
            .primary_key()
            .and_then(|pk| data.get(&pk.name).filter(|v| !v.is_null()).map(|v| (pk, v)));

        let scope = match key {
            Some((pk, value)) => {
                let mut scope = QueryOptions::new();
                scope.push_where(WhereClause::new(pk.name.clone(), Operator::Eq, value.clone())?);
                scope
            }
            None => QueryOptions {
                wheres: options.wheres.clone(),
                ..QueryOptions::default()
            },
        };

        if !scope.wheres.is_empty() && self.exists(&scope).await? {
            return self.update(data, &scope).await;
        }
        Ok(self.insert(data.clone()).await?.into_vec())
    }
}

/// Same selection, ordering and page, without projection.
fn full_rows(options: &QueryOptions) -> QueryOptions {
    QueryOptions {
        columns: Vec::new(),
        ..options.clone()
    }
}

fn rowid_clause(rows: &[Row]) -> TabulaResult<WhereClause> {
    let ids: Vec<RowId> = rows.iter().map(|row| row.rowid).collect();
    WhereClause::new(ROWID, Operator::In, ids)
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.inner.name)
            .field("database", &self.inner.database.name)
            .field("state", &self.state())
            .finish()
    }
}
