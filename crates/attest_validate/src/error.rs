//! Validation errors (spec §4.8).

use attest_protocol::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("column '{field}' not found on dataset '{dataset}'; closest matches: {}", suggestions.join(", "))]
    SchemaDrift {
        field: String,
        dataset: String,
        suggestions: Vec<String>,
    },
    #[error("'{field}' has logical type {actual:?}, incompatible with {expected_use}")]
    TypeMismatch {
        field: String,
        actual: attest_protocol::LogicalType,
        expected_use: &'static str,
    },
}

impl ValidationError {
    /// Maps onto the closed `ErrorKind` set an Execution Report carries.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ValidationError::SchemaDrift { .. } => ErrorKind::SchemaDrift,
            ValidationError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        }
    }
}
