//! Engine-internal errors, always folded into an [`attest_protocol::ExecutionReport`]
//! before they leave this crate (spec §7: every kind but `SpecInvalid` produces a
//! report rather than propagating as a `Result`).

use attest_protocol::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("dry-run planning rejected the generated SQL: {0}")]
    CompileRejected(String),
    #[error("query execution failed: {0}")]
    ExecutionFailed(String),
    #[error("execution was canceled")]
    Canceled,
    #[error("base dataset population, after filters, had zero rows")]
    ZeroPopulation,
}

impl EngineError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            EngineError::CompileRejected(_) => ErrorKind::CompileRejected,
            EngineError::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
            EngineError::Canceled => ErrorKind::Canceled,
            EngineError::ZeroPopulation => ErrorKind::ZeroPopulation,
        }
    }
}
