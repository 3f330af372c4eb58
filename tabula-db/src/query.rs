//! Deferred fluent query builder.
//!
//! A [`Query`] only accumulates [`QueryOptions`]; nothing touches the
//! backend until a terminal operation runs. Builder methods consume the
//! query and hand it back, so branching a partially built query is an
//! explicit `clone()`.
//!
//! ```no_run
//! # async fn demo(users: tabula_db::Table) -> tabula_core::TabulaResult<()> {
//! let admins = users
//!     .query()
//!     .filter("role", "=", "admin")?
//!     .order("name", true)
//!     .take(10)
//!     .get()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::Table;
use tabula_core::{
    Compare, OneOrMany, Operator, QueryOptions, Row, RowData, TabulaError, TabulaResult,
    WhereClause,
};

/// A composable selection or mutation request against one table.
#[derive(Debug, Clone)]
pub struct Query {
    table: Table,
    options: QueryOptions,
}

impl Query {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            options: QueryOptions::new(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    // ========================================================================
    // BUILDERS
    // ========================================================================

    /// Appends a `column operator compare` predicate.
    ///
    /// Fails with `InvalidArgument` right away when the operator is unknown
    /// or the compare operand has the wrong shape for it.
    pub fn filter<O>(
        mut self,
        column: impl Into<String>,
        operator: O,
        compare: impl Into<Compare>,
    ) -> TabulaResult<Self>
    where
        O: TryInto<Operator>,
        TabulaError: From<O::Error>,
    {
        let operator = operator.try_into()?;
        self.options
            .push_where(WhereClause::new(column, operator, compare)?);
        Ok(self)
    }

    /// Alias for [`Query::filter`].
    pub fn r#where<O>(
        self,
        column: impl Into<String>,
        operator: O,
        compare: impl Into<Compare>,
    ) -> TabulaResult<Self>
    where
        O: TryInto<Operator>,
        TabulaError: From<O::Error>,
    {
        self.filter(column, operator, compare)
    }

    /// Appends a sort key. Keys apply left to right; `rowid` ascending
    /// breaks remaining ties.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.options.push_order(column, ascending);
        self
    }

    /// Alias for [`Query::order`].
    pub fn sort(self, column: impl Into<String>, ascending: bool) -> Self {
        self.order(column, ascending)
    }

    /// Skips the first `n` rows of the ordered result.
    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = Some(n);
        self
    }

    /// Keeps at most `n` rows of the ordered result.
    pub fn take(mut self, n: usize) -> Self {
        self.options.take = Some(n);
        self
    }

    /// Restricts the projected columns. Repeated calls union.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.add_columns(columns);
        self
    }

    // ========================================================================
    // TERMINALS
    // ========================================================================

    /// Every matching row.
    pub async fn get(&self) -> TabulaResult<Vec<Row>> {
        self.table.select_all(&self.options).await
    }

    pub async fn first(&self) -> TabulaResult<Option<Row>> {
        self.table.select_first(&self.options).await
    }

    pub async fn last(&self) -> TabulaResult<Option<Row>> {
        self.table.select_last(&self.options).await
    }

    /// The only matching row; `None` when zero rows match, and when several
    /// match unless the database is configured to treat that as an error.
    pub async fn one(&self) -> TabulaResult<Option<Row>> {
        self.table.select_one(&self.options).await
    }

    pub async fn length(&self) -> TabulaResult<usize> {
        self.table.length(&self.options).await
    }

    /// Alias for [`Query::length`].
    pub async fn count(&self) -> TabulaResult<usize> {
        self.length().await
    }

    pub async fn exists(&self) -> TabulaResult<bool> {
        self.table.exists(&self.options).await
    }

    /// Upsert `data`; see [`Table::set`].
    pub async fn set(&self, data: &RowData) -> TabulaResult<Vec<Row>> {
        self.table.set(data, &self.options).await
    }

    /// Apply a partial row to every match and return the updated rows.
    pub async fn update(&self, data: &RowData) -> TabulaResult<Vec<Row>> {
        self.table.update(data, &self.options).await
    }

    /// Remove every match and return the removed rows.
    pub async fn delete(&self) -> TabulaResult<Vec<Row>> {
        self.table.delete(&self.options).await
    }

    /// Insert through the query's table.
    pub async fn insert(
        &self,
        data: impl Into<OneOrMany<RowData>>,
    ) -> TabulaResult<OneOrMany<Row>> {
        self.table.insert(data).await
    }
}
