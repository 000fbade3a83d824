//! Error types for sqlite_rows

use std::time::Duration;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Caller-input mistakes, detected before anything reaches SQLite.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("table name is empty")]
    EmptyTableName,

    #[error("row has no columns")]
    EmptyRow,

    #[error("condition has no columns")]
    EmptyCondition,

    #[error("column name is empty")]
    EmptyColumnName,

    #[error("statement is empty")]
    EmptyStatement,

    #[error("table '{0}' declares no columns")]
    NoColumns(String),

    #[error("database name is empty")]
    EmptyDatabaseName,

    #[error("default for column '{0}' is not a finite number")]
    NonFiniteDefault(String),
}

/// Error types for statement building and execution
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid caller input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A conflict key that is not one of the row's columns
    #[error("Conflict key '{column}' is not a column of the row")]
    ConflictSpec { column: String },

    /// Failure reported by SQLite, including syntax errors in generated SQL
    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// The caller's time budget ran out
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task running a statement failed
    #[error("Task error: {0}")]
    Task(String),

    /// Any of the above, annotated with the operation and table it came from
    #[error("{operation} failed{}: {source}", on_table(.table))]
    Operation {
        operation: &'static str,
        table: Option<String>,
        #[source]
        source: Box<StoreError>,
    },
}

fn on_table(table: &Option<String>) -> String {
    match table {
        Some(table) => format!(" on table '{}'", table),
        None => String::new(),
    }
}

impl StoreError {
    /// Create a conflict spec error for a specific column
    pub fn conflict_spec(column: impl Into<String>) -> Self {
        Self::ConflictSpec {
            column: column.into(),
        }
    }

    /// Attach the operation name and table to this error.
    pub fn during(self, operation: &'static str, table: Option<&str>) -> Self {
        Self::Operation {
            operation,
            table: table.map(str::to_string),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping operation context.
    pub fn root(&self) -> &StoreError {
        let mut current = self;
        while let Self::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Validation(_))
    }

    /// Check if this is a conflict spec error
    pub fn is_conflict_spec(&self) -> bool {
        matches!(self.root(), Self::ConflictSpec { .. })
    }

    /// Check if this is a driver error
    pub fn is_driver(&self) -> bool {
        matches!(self.root(), Self::Driver(_))
    }

    /// Check if this is a deadline error
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root(), Self::DeadlineExceeded(_))
    }

    /// The validation failure behind this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self.root() {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}
