//! Typed failures for the ingestion engine.
//!
//! Every failure carries an [`ErrorKind`] so callers can tell "the input was
//! invalid" (user-correctable) apart from "the system failed" without matching
//! on message text.

use std::fmt;

use thiserror::Error;

use crate::schema::LogicalType;
use crate::validate::SchemaMismatch;

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInput,
    ValidationFailure,
    Conflict,
    TypeConversion,
    Storage,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TypeConversion => "type_conversion_error",
            ErrorKind::Storage => "storage_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// True when re-submitting a corrected request can succeed.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedInput
                | ErrorKind::ValidationFailure
                | ErrorKind::Conflict
                | ErrorKind::TypeConversion
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV input is empty: no header row found")]
    EmptyInput,

    #[error("Row {row} has {found} field(s) but the header declares {expected}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid CSV near row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Row {row} column {column} could not be decoded with encoding {encoding}")]
    Decode {
        row: usize,
        column: usize,
        encoding: &'static str,
    },

    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error("Column override list has {found} entr(ies) but the CSV header has {expected}")]
    OverrideCardinality { expected: usize, found: usize },

    #[error("Table '{table}' already exists")]
    TableAlreadyExists { table: String },

    #[error("Table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error(
        "Row {row} column '{column}': cannot convert '{raw_value}' to {target_type}"
    )]
    TypeConversion {
        row: usize,
        column: String,
        raw_value: String,
        target_type: LogicalType,
    },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Commit was cancelled before completion")]
    Cancelled,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::EmptyInput
            | IngestError::MalformedRow { .. }
            | IngestError::Decode { .. } => ErrorKind::MalformedInput,
            IngestError::Csv { source, .. } => {
                if matches!(source.kind(), csv::ErrorKind::Io(_)) {
                    ErrorKind::Storage
                } else {
                    ErrorKind::MalformedInput
                }
            }
            IngestError::Schema(_) | IngestError::OverrideCardinality { .. } => {
                ErrorKind::ValidationFailure
            }
            IngestError::TableAlreadyExists { .. } | IngestError::TableNotFound { .. } => {
                ErrorKind::Conflict
            }
            IngestError::TypeConversion { .. } => ErrorKind::TypeConversion,
            IngestError::Storage(_) | IngestError::Io(_) => ErrorKind::Storage,
            IngestError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_user_error(&self) -> bool {
        self.kind().is_user_error()
    }
}
