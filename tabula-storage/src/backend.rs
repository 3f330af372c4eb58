//! Backend contract for table storage.
//!
//! A backend owns persistence. The data-access layer validates rows, resolves
//! where clauses against the schema and deserializes results; everything in
//! between is up to the implementation. Errors a backend returns are handed
//! to callers unchanged.

use async_trait::async_trait;
use std::sync::Arc;
use tabula_core::{Row, RowData, Schema, TabulaResult, WhereClause};

/// Storage capability a database and its tables are bound to.
///
/// `columns: None` selects every column. `wheres` are already coerced to the
/// column types, and an empty slice matches every row.
#[async_trait]
pub trait Backend: Send + Sync {
    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Open (or create) the named database.
    async fn connect(&self, name: &str) -> TabulaResult<()>;

    /// Close the connection. Stored data survives.
    async fn disconnect(&self) -> TabulaResult<()>;

    /// Drop the database and everything in it.
    async fn delete_database(&self) -> TabulaResult<()>;

    /// Create a table if it does not exist yet.
    async fn create_table(&self, table: &str, schema: &Schema) -> TabulaResult<()>;

    async fn delete_table(&self, table: &str) -> TabulaResult<()>;

    // ========================================================================
    // READS
    // ========================================================================

    /// All matching rows in `rowid` order.
    async fn select_all(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Vec<Row>>;

    /// The matching row when exactly one row matches.
    async fn select_one(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>>;

    /// First matching row ordered by `order_column` ascending, then `rowid`.
    async fn select_first(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>>;

    /// Mirror of [`Backend::select_first`]: the last row in the same order.
    async fn select_last(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>>;

    async fn length(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Store a validated row and return it with its assigned `rowid` and
    /// auto-increment values.
    async fn insert(&self, table: &str, row: &RowData) -> TabulaResult<Row>;

    /// Apply a validated partial row to every match. Returns the match count.
    async fn update(
        &self,
        table: &str,
        data: &RowData,
        wheres: &[WhereClause],
    ) -> TabulaResult<usize>;

    /// Remove every match. Returns the number of removed rows.
    async fn delete(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn connect(&self, name: &str) -> TabulaResult<()> {
        (**self).connect(name).await
    }

    async fn disconnect(&self) -> TabulaResult<()> {
        (**self).disconnect().await
    }

    async fn delete_database(&self) -> TabulaResult<()> {
        (**self).delete_database().await
    }

    async fn create_table(&self, table: &str, schema: &Schema) -> TabulaResult<()> {
        (**self).create_table(table, schema).await
    }

    async fn delete_table(&self, table: &str) -> TabulaResult<()> {
        (**self).delete_table(table).await
    }

    async fn select_all(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Vec<Row>> {
        (**self).select_all(table, columns, wheres).await
    }

    async fn select_one(
        &self,
        table: &str,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        (**self).select_one(table, columns, wheres).await
    }

    async fn select_first(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        (**self).select_first(table, order_column, columns, wheres).await
    }

    async fn select_last(
        &self,
        table: &str,
        order_column: Option<&str>,
        columns: Option<&[String]>,
        wheres: &[WhereClause],
    ) -> TabulaResult<Option<Row>> {
        (**self).select_last(table, order_column, columns, wheres).await
    }

    async fn length(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize> {
        (**self).length(table, wheres).await
    }

    async fn insert(&self, table: &str, row: &RowData) -> TabulaResult<Row> {
        (**self).insert(table, row).await
    }

    async fn update(
        &self,
        table: &str,
        data: &RowData,
        wheres: &[WhereClause],
    ) -> TabulaResult<usize> {
        (**self).update(table, data, wheres).await
    }

    async fn delete(&self, table: &str, wheres: &[WhereClause]) -> TabulaResult<usize> {
        (**self).delete(table, wheres).await
    }
}
