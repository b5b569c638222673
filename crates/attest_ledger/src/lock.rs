//! Single-writer file locking for the ledger (spec §5 "the ledger is the
//! only shared mutable store... must serialize writes").
//!
//! Grounded on the teacher's `casparian_db::lock`: the same `fs2`
//! exclusive-flock-on-a-sidecar-file approach, trimmed to the one mode this
//! ledger needs (a single writer, no shared/read locks).

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("ledger at {0} is already open for writing by another process")]
    Locked(PathBuf),
    #[error("failed to open lock file: {0}")]
    Open(#[source] io::Error),
    #[error("failed to acquire lock: {0}")]
    Acquire(#[source] io::Error),
}

/// Holds the exclusive lock on a ledger database file for as long as the
/// ledger handle is alive; released automatically on drop.
pub struct LedgerLockGuard {
    _file: File,
    lock_path: PathBuf,
}

impl LedgerLockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut lock_path = db_path.to_path_buf();
    match lock_path.extension() {
        Some(ext) => lock_path.set_extension(format!("{}.lock", ext.to_string_lossy())),
        None => lock_path.set_extension("lock"),
    }
    lock_path
}

/// Acquire the ledger's exclusive writer lock without blocking. A second
/// process attempting to open the same ledger file observes
/// [`LockError::Locked`] immediately rather than stalling.
pub fn try_lock_exclusive(db_path: &Path) -> Result<LedgerLockGuard, LockError> {
    let lock_path = lock_path_for(db_path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(LockError::Open)?;

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(LedgerLockGuard {
            _file: file,
            lock_path,
        }),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            Err(LockError::Locked(db_path.to_path_buf()))
        }
        Err(e) => Err(LockError::Acquire(e)),
    }
}
