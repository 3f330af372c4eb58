//! Column specifications and table schemas

use crate::{DataType, Row, TabulaError, TabulaResult, Value, ROWID};
use std::fmt;
use std::sync::Arc;

/// Custom column validator. Returns a reason when the value is rejected.
pub type CheckFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Default applied when an insert omits a column.
#[derive(Clone)]
pub enum ColumnDefault {
    /// Fixed value.
    Value(Value),
    /// Evaluated once per insert call that needs it.
    Thunk(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl ColumnDefault {
    pub fn resolve(&self) -> Value {
        match self {
            ColumnDefault::Value(value) => value.clone(),
            ColumnDefault::Thunk(thunk) => thunk(),
        }
    }
}

impl fmt::Debug for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ColumnDefault::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// Specification of a single column.
#[derive(Clone)]
pub struct ColumnSpec {
    pub data_type: DataType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
    pub options: Option<Vec<String>>,
    pub check: Option<CheckFn>,
}

impl ColumnSpec {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            primary_key: false,
            auto_increment: false,
            not_null: false,
            unique: false,
            default: None,
            options: None,
            check: None,
        }
    }

    pub fn text() -> Self {
        Self::new(DataType::Text)
    }

    pub fn integer() -> Self {
        Self::new(DataType::Integer)
    }

    pub fn float() -> Self {
        Self::new(DataType::Float)
    }

    pub fn boolean() -> Self {
        Self::new(DataType::Boolean)
    }

    pub fn datetime() -> Self {
        Self::new(DataType::DateTime)
    }

    pub fn bigint() -> Self {
        Self::new(DataType::BigInt)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, thunk: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(ColumnDefault::Thunk(Arc::new(thunk)));
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Primary keys are implicitly unique.
    pub fn is_unique(&self) -> bool {
        self.unique || self.primary_key
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("data_type", &self.data_type)
            .field("primary_key", &self.primary_key)
            .field("auto_increment", &self.auto_increment)
            .field("not_null", &self.not_null)
            .field("unique", &self.unique)
            .field("default", &self.default)
            .field("options", &self.options)
            .field("check", &self.check.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A named column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub spec: ColumnSpec,
}

/// Ordered mapping of column name to [`ColumnSpec`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema, rejecting duplicate or reserved column names.
    pub fn new(columns: Vec<Column>) -> TabulaResult<Self> {
        for (i, column) in columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(TabulaError::invalid_argument("column name cannot be empty"));
            }
            if column.name == ROWID {
                return Err(TabulaError::invalid_argument(format!(
                    "column name {} is reserved",
                    ROWID
                )));
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(TabulaError::invalid_argument(format!(
                    "duplicate column name: {}",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.spec)
    }

    /// True for schema columns and for the synthetic `rowid`.
    pub fn has_column(&self, name: &str) -> bool {
        name == ROWID || self.get(name).is_some()
    }

    /// Declared type of a column; `rowid` is INTEGER.
    pub fn column_type(&self, name: &str) -> Option<DataType> {
        if name == ROWID {
            return Some(DataType::Integer);
        }
        self.get(name).map(|spec| spec.data_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.spec.primary_key)
    }

    /// Coerce a raw backend row into the declared column types.
    ///
    /// Values that cannot be coerced are passed through as stored.
    pub fn deserialize_row(&self, mut row: Row) -> Row {
        for (name, value) in row.values.iter_mut() {
            if value.is_null() {
                continue;
            }
            if let Some(coerced) = self.get(name).and_then(|spec| spec.data_type.coerce(value)) {
                *value = coerced;
            }
        }
        row
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn column(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.columns.push(Column {
            name: name.into(),
            spec,
        });
        self
    }

    pub fn build(self) -> TabulaResult<Schema> {
        Schema::new(self.columns)
    }
}
