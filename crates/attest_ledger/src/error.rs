//! Ledger errors (spec §4.11, §7).

use crate::lock::LockError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger lock unavailable: {0}")]
    Lock(#[from] LockError),

    #[error("ledger database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not serialize ledger row: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown execution id: {0}")]
    UnknownExecution(uuid::Uuid),
}
