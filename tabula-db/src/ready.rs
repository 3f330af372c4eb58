//! Ready-wrapper: use a table before it has been created.

use crate::{Query, Table};
use futures_util::future::BoxFuture;
use std::future::IntoFuture;
use tabula_core::{OneOrMany, Row, RowData, TabulaResult};
use tabula_events::{ListenerId, Subscription, TableEvent, TableEventKind};

/// A table that may still be initialising.
///
/// Queries, inserts and listeners can be attached right away; work that
/// needs the backend waits for readiness on its own. Awaiting the wrapper
/// yields the ready [`Table`].
///
/// ```no_run
/// # async fn demo(db: tabula_db::Database, schema: tabula_core::Schema) -> tabula_core::TabulaResult<()> {
/// let users = db.table("users", schema);
/// let sub = users.on(tabula_events::TableEventKind::Insert, |event| {
///     println!("{} new rows", event.rows().len());
/// });
/// users.insert(tabula_core::row! { "name" => "a" }).await?;
/// sub.remove();
/// let _table = users.await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReadyTable {
    table: Table,
}

impl ReadyTable {
    pub(crate) fn new(table: Table) -> Self {
        Self { table }
    }

    /// The underlying handle, ready or not.
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    /// Deferred query; runs once the table is ready.
    pub fn query(&self) -> Query {
        self.table.query()
    }

    /// Insert once the table is ready.
    pub async fn insert(
        &self,
        data: impl Into<OneOrMany<RowData>>,
    ) -> TabulaResult<OneOrMany<Row>> {
        self.table.insert(data).await
    }

    /// Attach a listener now. The returned handle can detach it whether or
    /// not the table has resolved.
    pub fn on<F>(&self, kind: TableEventKind, listener: F) -> Subscription
    where
        F: Fn(&TableEvent) + Send + Sync + 'static,
    {
        self.table.on(kind, listener)
    }

    pub fn once<F>(&self, kind: TableEventKind, listener: F) -> Subscription
    where
        F: Fn(&TableEvent) + Send + Sync + 'static,
    {
        self.table.once(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.table.off(id)
    }

    /// Wait for readiness and return the table.
    pub async fn ready(self) -> TabulaResult<Table> {
        self.table.ready().await?;
        Ok(self.table)
    }
}

impl IntoFuture for ReadyTable {
    type Output = TabulaResult<Table>;
    type IntoFuture = BoxFuture<'static, TabulaResult<Table>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.ready())
    }
}

impl From<ReadyTable> for Table {
    fn from(ready: ReadyTable) -> Self {
        ready.table
    }
}
