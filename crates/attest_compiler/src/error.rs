//! Compiler errors (spec §7: `ManifestMissing`, a compile-time column
//! collision not named as its own `ErrorKind` but a defect this layer must
//! catch per §4.5's "Join column collisions" design note).

use attest_protocol::{DatasetAlias, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("dataset alias '{0}' referenced by the specification is absent from the manifest")]
    ManifestMissing(DatasetAlias),

    #[error("join step '{step_id}' introduces a duplicate non-key column '{column}'")]
    ColumnCollision { step_id: String, column: String },

    #[error("SQL rendering failed: {0}")]
    Emit(#[from] attest_sql::EmitError),

    #[error("manifest lookup failed: {0}")]
    Manifest(#[from] attest_manifest::ManifestError),
}

impl CompileError {
    /// Maps onto the closed `ErrorKind` set an Execution Report carries.
    /// Column collisions and emit failures are `CompileRejected` — they are
    /// defects in the generated SQL discovered before the engine ever sees
    /// it, the same family the engine's own dry-run rejection belongs to.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            CompileError::ManifestMissing(_) => ErrorKind::ManifestMissing,
            CompileError::ColumnCollision { .. } => ErrorKind::CompileRejected,
            CompileError::Emit(_) => ErrorKind::CompileRejected,
            CompileError::Manifest(_) => ErrorKind::ManifestMissing,
        }
    }
}
