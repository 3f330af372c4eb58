//! TABULA Core - Values, Schemas and Query Types
//!
//! Pure data structures and the synchronous rules around them: the value
//! model and its type coercion, column specifications, insert/update
//! validation, where clauses and accumulated query options. Everything here
//! is storage-agnostic; backends and tables live in other crates.

mod config;
mod error;
mod filter;
mod query;
mod row;
mod schema;
mod validation;
mod value;

pub use config::{OnePolicy, TabulaConfig};
pub use error::{
    BackendError, ConfigError, HandleKind, LifecycleError, QueryError, TabulaError, TabulaResult,
    ValidationError,
};
pub use filter::{matches_all, Compare, CompareShape, LikePattern, Operator, WhereClause};
pub use query::{OrderTerm, QueryOptions};
pub use row::{data_from_json, data_to_json, OneOrMany, Row, RowData, RowId, ROWID};
pub use schema::{CheckFn, Column, ColumnDefault, ColumnSpec, Schema, SchemaBuilder};
pub use validation::{
    validate_for_insert, validate_for_insert_with, validate_for_update, validate_for_update_with,
    UnknownColumnPolicy,
};
pub use value::{infer_type, matches_type, DataType, Value};
