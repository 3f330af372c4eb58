//! TABULA DB - Tables, Queries and Databases
//!
//! The data-access layer between application code and a pluggable
//! [`Backend`](tabula_storage::Backend):
//!
//! - [`Database`]: connects the backend, keeps the table registry, and
//!   cascades disconnect and delete to every table.
//! - [`Table`]: schema-validated CRUD with `insert`/`update`/`delete`
//!   change events and a readiness gate (`Uninitialized -> Ready ->
//!   Disconnected`).
//! - [`Query`]: deferred predicates, ordering, pagination and projection.
//! - [`ReadyTable`]: a table handle usable before the table exists.
//! - [`BoundTable`]: a typed view converting rows through serde.
//!
//! # Example
//!
//! ```no_run
//! use tabula_core::{row, ColumnSpec, Schema};
//! use tabula_db::Database;
//! use tabula_storage::MemoryBackend;
//!
//! # async fn demo() -> tabula_core::TabulaResult<()> {
//! let db = Database::new("app", MemoryBackend::new());
//! let schema = Schema::builder()
//!     .column("id", ColumnSpec::integer().primary_key())
//!     .column("name", ColumnSpec::text().not_null())
//!     .build()?;
//! let users = db.for_table("users", schema).await?;
//!
//! users.insert(row! { "id" => 1, "name" => "a" }).await?;
//! let first = users.query().filter("id", "=", 1)?.first().await?;
//! assert!(first.is_some());
//! # Ok(())
//! # }
//! ```

mod binding;
mod database;
mod query;
mod readiness;
mod ready;
mod table;

pub use binding::BoundTable;
pub use database::Database;
pub use query::Query;
pub use readiness::ReadyState;
pub use ready::ReadyTable;
pub use table::Table;
