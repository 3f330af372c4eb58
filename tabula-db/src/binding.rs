//! Typed table views through serde.

use crate::{Query, Table};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tabula_core::{data_from_json, OneOrMany, Row, RowData, TabulaError, TabulaResult, ROWID};

/// A [`Table`] whose rows convert to and from `T`.
///
/// Rows serialize through their JSON form: column names are field names and
/// the `rowid` is offered as a field too, so `T` may declare it or ignore it.
pub struct BoundTable<T> {
    table: Table,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for BoundTable<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for BoundTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTable")
            .field("table", &self.table)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> BoundTable<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Serialize an item into row data. A `rowid` field is dropped.
    pub fn to_data(item: &T) -> TabulaResult<RowData> {
        let json = serde_json::to_value(item)
            .map_err(|e| TabulaError::invalid_argument(format!("cannot serialize row: {}", e)))?;
        let mut data = data_from_json(&json)?;
        data.remove(ROWID);
        Ok(data)
    }

    /// Build an item from a row.
    pub fn from_row(row: &Row) -> TabulaResult<T> {
        serde_json::from_value(row.to_json())
            .map_err(|e| TabulaError::invalid_argument(format!("cannot deserialize row: {}", e)))
    }

    fn from_rows(rows: Vec<Row>) -> TabulaResult<Vec<T>> {
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn insert(&self, item: &T) -> TabulaResult<T> {
        let row = self.table.insert(Self::to_data(item)?).await?;
        match row {
            OneOrMany::One(row) => Self::from_row(&row),
            OneOrMany::Many(_) => Err(TabulaError::invalid_argument(
                "single insert returned a batch",
            )),
        }
    }

    pub async fn insert_many(&self, items: &[T]) -> TabulaResult<Vec<T>> {
        let data = items
            .iter()
            .map(Self::to_data)
            .collect::<TabulaResult<Vec<_>>>()?;
        let rows = self.table.insert(data).await?;
        Self::from_rows(rows.into_vec())
    }

    /// Every row as `T`.
    pub async fn all(&self) -> TabulaResult<Vec<T>> {
        self.get(&self.table.query()).await
    }

    pub async fn get(&self, query: &Query) -> TabulaResult<Vec<T>> {
        Self::from_rows(query.get().await?)
    }

    pub async fn first(&self, query: &Query) -> TabulaResult<Option<T>> {
        query.first().await?.as_ref().map(Self::from_row).transpose()
    }

    pub async fn last(&self, query: &Query) -> TabulaResult<Option<T>> {
        query.last().await?.as_ref().map(Self::from_row).transpose()
    }

    pub async fn one(&self, query: &Query) -> TabulaResult<Option<T>> {
        query.one().await?.as_ref().map(Self::from_row).transpose()
    }

    /// Upsert an item; see [`Table::set`].
    pub async fn set(&self, item: &T) -> TabulaResult<Vec<T>> {
        let data = Self::to_data(item)?;
        let rows = self.table.set(&data, self.table.query().options()).await?;
        Self::from_rows(rows)
    }
}
