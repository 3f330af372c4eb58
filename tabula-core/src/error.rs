//! Error types for TABULA operations

use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

/// Row validation errors.
///
/// Raised synchronously before any backend call, so a failed validation
/// never leaves a partial write behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Invalid type for {column}: expected {expected}, got {found}")]
    InvalidType {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Invalid option for {column}: {value} is not one of {allowed:?}")]
    InvalidOption {
        column: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Check failed for {column}: {reason}")]
    CheckFailed { column: String, reason: String },

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },
}

/// Query construction and resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },
}

/// Which kind of handle a lifecycle error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Table,
    Database,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Table => write!(f, "table"),
            HandleKind::Database => write!(f, "database"),
        }
    }
}

/// Lifecycle errors for tables and databases.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("The {kind} {name} is disconnected")]
    Disconnected { kind: HandleKind, name: String },
}

/// Errors produced by storage backends.
///
/// The data-access layer never rewrites these; they reach the caller as the
/// backend produced them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Constraint violation on {table}.{column}: {reason}")]
    ConstraintViolation {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Backend is not connected")]
    NotConnected,

    #[error("Backend lock poisoned")]
    LockPoisoned,

    #[error("Backend error: {reason}")]
    Other { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all TABULA errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TabulaError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TabulaError {
    /// Shorthand for `QueryError::InvalidArgument`.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        TabulaError::Query(QueryError::InvalidArgument {
            reason: reason.into(),
        })
    }

    /// Shorthand for a disconnected handle.
    pub fn disconnected(kind: HandleKind, name: impl Into<String>) -> Self {
        TabulaError::Lifecycle(LifecycleError::Disconnected {
            kind,
            name: name.into(),
        })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, TabulaError::Lifecycle(LifecycleError::Disconnected { .. }))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TabulaError::Validation(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TabulaError::Query(QueryError::InvalidArgument { .. }))
    }
}

impl From<Infallible> for TabulaError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Result type alias for TABULA operations.
pub type TabulaResult<T> = Result<T, TabulaError>;

// =============================================================================
// TESTS
// =============================================================================
