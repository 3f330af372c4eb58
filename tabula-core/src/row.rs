//! Row types

use crate::{TabulaError, TabulaResult, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Synthetic record identifier assigned by the backend.
pub type RowId = i64;

/// Column name of the synthetic row identifier.
pub const ROWID: &str = "rowid";

/// Column values without a row identifier: insert payloads, partial updates,
/// validated rows on their way to the backend.
pub type RowData = BTreeMap<String, Value>;

/// Build a [`RowData`] from `column => value` pairs.
///
/// ```
/// use tabula_core::{row, Value};
///
/// let data = row! { "id" => 1, "name" => "a" };
/// assert_eq!(data.get("name"), Some(&Value::from("a")));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::RowData::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut data = $crate::RowData::new();
        $(
            data.insert(::std::string::String::from($column), $crate::Value::from($value));
        )+
        data
    }};
}

/// A stored record: its values plus the synthetic `rowid`.
///
/// Serializes flat, with `rowid` next to the column values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub rowid: RowId,
    #[serde(flatten)]
    pub values: RowData,
}

impl Row {
    pub fn new(rowid: RowId, values: RowData) -> Self {
        Self { rowid, values }
    }

    /// Look up a column, treating `rowid` as a regular INTEGER column.
    pub fn get(&self, column: &str) -> Option<Value> {
        if column == ROWID {
            return Some(Value::Integer(self.rowid));
        }
        self.values.get(column).cloned()
    }

    /// Keep only the listed columns. An empty list keeps everything.
    pub fn project(mut self, columns: &[String]) -> Self {
        if !columns.is_empty() {
            self.values.retain(|name, _| columns.iter().any(|c| c == name));
        }
        self
    }

    pub fn into_data(self) -> RowData {
        self.values
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.values {
            map.insert(name.clone(), value.to_json());
        }
        map.insert(ROWID.to_string(), serde_json::Value::from(self.rowid));
        serde_json::Value::Object(map)
    }

    pub fn from_json(json: &serde_json::Value) -> TabulaResult<Self> {
        let mut values = data_from_json(json)?;
        let rowid = values
            .remove(ROWID)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TabulaError::invalid_argument("row is missing an integer rowid"))?;
        Ok(Self { rowid, values })
    }
}

/// Convert a JSON object into [`RowData`].
pub fn data_from_json(json: &serde_json::Value) -> TabulaResult<RowData> {
    let object = json
        .as_object()
        .ok_or_else(|| TabulaError::invalid_argument("row data must be a JSON object"))?;
    Ok(object
        .iter()
        .map(|(name, value)| (name.clone(), Value::from_json(value)))
        .collect())
}

/// Convert [`RowData`] into a JSON object.
pub fn data_to_json(data: &RowData) -> serde_json::Value {
    serde_json::Value::Object(
        data.iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

/// Single item or batch. Insert results mirror the shape of their input.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    /// Rebuild a value of the same shape as `self` from `items`.
    ///
    /// `items` must hold as many elements as `self` when `self` is `One`.
    pub fn same_shape<U>(&self, mut items: Vec<U>) -> Option<OneOrMany<U>> {
        match self {
            OneOrMany::One(_) if items.len() == 1 => items.pop().map(OneOrMany::One),
            OneOrMany::One(_) => None,
            OneOrMany::Many(_) => Some(OneOrMany::Many(items)),
        }
    }

    pub fn one(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(_) => None,
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(item: T) -> Self {
        OneOrMany::One(item)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}
