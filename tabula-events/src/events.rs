//! Table and database change events

use crate::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabula_core::{OneOrMany, Row, TabulaError};

// ============================================================================
// TABLE EVENTS
// ============================================================================

/// Kinds of change a table reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableEventKind {
    Insert,
    Update,
    Delete,
}

impl TableEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableEventKind::Insert => "insert",
            TableEventKind::Update => "update",
            TableEventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for TableEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableEventKind {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(TableEventKind::Insert),
            "update" => Ok(TableEventKind::Update),
            "delete" => Ok(TableEventKind::Delete),
            other => Err(TabulaError::invalid_argument(format!(
                "unknown table event: {}",
                other
            ))),
        }
    }
}

/// A committed change to a table.
///
/// Emitted only after the backend call succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// Inserted rows, shaped like the insert input.
    Insert(OneOrMany<Row>),
    /// Rows after the update, plus the same rows as they were before it.
    Update { updated: Vec<Row>, previous: Vec<Row> },
    /// Rows removed by a delete.
    Delete(Vec<Row>),
}

impl TableEvent {
    /// Rows carried by the event. For updates, the post-update rows.
    pub fn rows(&self) -> Vec<&Row> {
        match self {
            TableEvent::Insert(OneOrMany::One(row)) => vec![row],
            TableEvent::Insert(OneOrMany::Many(rows)) => rows.iter().collect(),
            TableEvent::Update { updated, .. } => updated.iter().collect(),
            TableEvent::Delete(rows) => rows.iter().collect(),
        }
    }
}

impl Event for TableEvent {
    type Kind = TableEventKind;

    fn kind(&self) -> TableEventKind {
        match self {
            TableEvent::Insert(_) => TableEventKind::Insert,
            TableEvent::Update { .. } => TableEventKind::Update,
            TableEvent::Delete(_) => TableEventKind::Delete,
        }
    }
}

// ============================================================================
// DATABASE EVENTS
// ============================================================================

/// Kinds of lifecycle change a database reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEventKind {
    Ready,
    DeleteTable,
    Disconnect,
    Delete,
}

impl DatabaseEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEventKind::Ready => "ready",
            DatabaseEventKind::DeleteTable => "delete_table",
            DatabaseEventKind::Disconnect => "disconnect",
            DatabaseEventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for DatabaseEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseEventKind {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ready" => Ok(DatabaseEventKind::Ready),
            "delete_table" | "deletetable" => Ok(DatabaseEventKind::DeleteTable),
            "disconnect" => Ok(DatabaseEventKind::Disconnect),
            "delete" => Ok(DatabaseEventKind::Delete),
            other => Err(TabulaError::invalid_argument(format!(
                "unknown database event: {}",
                other
            ))),
        }
    }
}

/// A database lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseEvent {
    /// The backend connection is established.
    Ready,
    /// A table was dropped; carries its name.
    DeleteTable(String),
    Disconnect,
    /// The whole database was deleted.
    Delete,
}

impl Event for DatabaseEvent {
    type Kind = DatabaseEventKind;

    fn kind(&self) -> DatabaseEventKind {
        match self {
            DatabaseEvent::Ready => DatabaseEventKind::Ready,
            DatabaseEvent::DeleteTable(_) => DatabaseEventKind::DeleteTable,
            DatabaseEvent::Disconnect => DatabaseEventKind::Disconnect,
            DatabaseEvent::Delete => DatabaseEventKind::Delete,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
