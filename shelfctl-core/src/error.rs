//! Structured error types for shelfctl-core.
//!
//! Every failure a table operation can produce is a `TableError` variant.
//! Components fail fast on the first violated precondition and the facade
//! forwards the error unchanged, so the message printed to the operator is
//! the one raised by the component that detected the problem.

use std::fmt;
use thiserror::Error;

use crate::schema::ColumnType;

/// Boxed cause carried by storage failures
pub type StorageCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for table operations
#[derive(Error, Debug)]
pub enum TableError {
    /// Table name does not resolve to a registered entity
    #[error("'{table}' is not a valid table.")]
    UnknownTable { table: String },

    /// Table exists but holds no rows
    #[error("No entries found in '{table}'.")]
    EmptyTable { table: String },

    /// Positional value count differs from the column count
    #[error(
        "The number of provided values ({actual}) does not match the number of columns in table '{table}' ({expected})."
    )]
    ArityMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// Raw value cannot be parsed as the column's type
    #[error("Invalid {expected} value '{value}' for column '{column}'.")]
    TypeCoercion {
        column: String,
        expected: ColumnType,
        value: String,
    },

    /// Date column value is not a valid YYYY-MM-DD date
    #[error("Invalid date format for column '{column}', expected 'YYYY-MM-DD'.")]
    InvalidDateFormat { column: String, value: String },

    /// Foreign key value has no matching parent row
    #[error("No matching record in '{table}' for value '{value}'.")]
    ForeignKeyViolation { table: String, value: String },

    /// Primary key value already taken
    #[error("Record with primary key {column}={value} already exists in '{table}'.")]
    DuplicateKey {
        table: String,
        column: String,
        value: String,
    },

    /// No row carries the requested primary key
    #[error("No record with ID {id} found in table '{table}'.")]
    RecordNotFound { table: String, id: String },

    /// Delete refused because another row references the target
    #[error("Cannot delete record; dependent records exist in table '{table}'.")]
    DependentRecordExists { table: String },

    /// Storage engine failure; the session has been rolled back
    #[error("Failed to {action}: {source}")]
    Storage {
        action: &'static str,
        #[source]
        source: StorageCause,
    },
}

/// Result type alias for table operations
pub type Result<T> = std::result::Result<T, TableError>;

/// Coarse classification of a `TableError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownTable,
    EmptyTable,
    ArityMismatch,
    TypeCoercionError,
    InvalidDateFormat,
    ForeignKeyViolation,
    DuplicateKey,
    RecordNotFound,
    DependentRecordExists,
    StorageError,
}

impl ErrorKind {
    /// Whether the operator typed something that can be corrected in place
    pub fn is_input(self) -> bool {
        matches!(
            self,
            Self::UnknownTable
                | Self::EmptyTable
                | Self::ArityMismatch
                | Self::TypeCoercionError
                | Self::InvalidDateFormat
                | Self::RecordNotFound
        )
    }

    /// Whether the failure came from a relational constraint
    pub fn is_integrity(self) -> bool {
        matches!(
            self,
            Self::ForeignKeyViolation | Self::DuplicateKey | Self::DependentRecordExists
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl TableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTable { .. } => ErrorKind::UnknownTable,
            Self::EmptyTable { .. } => ErrorKind::EmptyTable,
            Self::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            Self::TypeCoercion { .. } => ErrorKind::TypeCoercionError,
            Self::InvalidDateFormat { .. } => ErrorKind::InvalidDateFormat,
            Self::ForeignKeyViolation { .. } => ErrorKind::ForeignKeyViolation,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::RecordNotFound { .. } => ErrorKind::RecordNotFound,
            Self::DependentRecordExists { .. } => ErrorKind::DependentRecordExists,
            Self::Storage { .. } => ErrorKind::StorageError,
        }
    }

    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self::UnknownTable {
            table: table.into(),
        }
    }

    pub fn empty_table(table: impl Into<String>) -> Self {
        Self::EmptyTable {
            table: table.into(),
        }
    }

    pub fn record_not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Wrap an underlying storage failure. `action` completes the phrase
    /// "Failed to ..." (e.g. "insert record").
    pub fn storage<E>(action: &'static str, source: E) -> Self
    where
        E: Into<StorageCause>,
    {
        Self::Storage {
            action,
            source: source.into(),
        }
    }
}

/// Program error raised while building a schema registry.
///
/// These describe a broken descriptor set, never bad operator input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table '{0}' is declared more than once")]
    DuplicateTable(&'static str),

    #[error("table '{table}' must declare exactly one primary key column, found {found}")]
    PrimaryKeyArity { table: &'static str, found: usize },

    #[error("table '{table}' has no column '{column}'")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("foreign key {table}.{column} references unknown table '{target}'")]
    UnknownTarget {
        table: &'static str,
        column: &'static str,
        target: &'static str,
    },
}
