//! Append-only audit ledger (spec §4.11).
//!
//! Three logical relations — Specifications, Manifests, Executions — and a
//! read-only Integrity View comparing an execution's inline manifest hashes
//! against the current Manifests table. Grounded on the teacher's
//! `casparian_db::pool` for the `SqlitePool` creation idiom (the license
//! plumbing in that module has no counterpart here and was left behind) and
//! `casparian_db::lock` for single-writer file locking (see [`lock`]).

pub mod error;
mod lock;

pub use error::LedgerError;
pub use lock::LockError;

use attest_manifest::Manifest;
use attest_protocol::{DatasetAlias, ExecutionReport};
use attest_spec::Specification;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// Approval metadata accompanying a specification write. Not part of the
/// specification document itself — it is the ledger's record of who signed
/// off on this version, supplied by the caller at write time.
#[derive(Debug, Clone)]
pub struct ApprovalMetadata {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

/// Per-dataset integrity status for one execution (spec §4.11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
    /// The hash recorded on the execution matches the manifests table.
    Valid,
    /// The manifests table now holds a different hash for this alias —
    /// the evidence file was replaced after this execution ran.
    Mismatch,
    /// No current Manifests row exists for this alias at all.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityRow {
    pub dataset_alias: DatasetAlias,
    pub stored_hash: String,
    pub status: IntegrityStatus,
}

/// Explicit construction parameters for a [`Ledger`], the way
/// `casparian_db::pool::DbConfig` is built and handed to `create_pool`
/// rather than the pool reading its own environment.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub db_path: std::path::PathBuf,
    pub max_connections: u32,
}

impl LedgerConfig {
    pub fn new(db_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            max_connections: 1,
        }
    }
}

/// A handle onto one ledger database. Holds the process-exclusive writer
/// lock for its lifetime; a second `Ledger::open` on the same path fails
/// fast rather than blocking (spec §5).
pub struct Ledger {
    pool: SqlitePool,
    _lock: lock::LedgerLockGuard,
}

impl Ledger {
    /// Open (creating if absent) the ledger named by `config`, acquire the
    /// single-writer lock, and ensure the schema exists.
    pub async fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let guard = lock::try_lock_exclusive(&config.db_path)?;
        let url = format!("sqlite:{}?mode=rwc", config.db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        let ledger = Ledger { pool, _lock: guard };
        ledger.migrate().await?;
        Ok(ledger)
    }

    /// An in-memory ledger for tests; no file lock is taken since there is
    /// no shared file to contend over.
    #[doc(hidden)]
    pub async fn open_in_memory() -> Result<Self, LedgerError> {
        let dir = std::env::temp_dir().join(format!("attest-ledger-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).ok();
        Self::open(&LedgerConfig::new(dir.join("ledger.db"))).await
    }

    async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS specifications (
                control_id TEXT NOT NULL,
                version TEXT NOT NULL,
                document TEXT NOT NULL,
                approved_by TEXT NOT NULL,
                approved_at TEXT NOT NULL,
                PRIMARY KEY (control_id, version)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS manifests (
                dataset_alias TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                path TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                schema_fingerprint TEXT NOT NULL,
                origin_system TEXT NOT NULL,
                extraction_instant TEXT NOT NULL,
                schema_version TEXT NOT NULL,
                PRIMARY KEY (dataset_alias, content_hash)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS executions (
                execution_id TEXT PRIMARY KEY,
                control_id TEXT NOT NULL,
                specification_version TEXT NOT NULL,
                query_text TEXT NOT NULL,
                manifest_hashes TEXT NOT NULL,
                total_population INTEGER NOT NULL,
                exception_count INTEGER NOT NULL,
                exception_rate_percent REAL NOT NULL,
                exceptions_sample TEXT NOT NULL,
                verdict TEXT NOT NULL,
                error_kind TEXT,
                error_message TEXT,
                executed_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a specification verbatim. Idempotent by `(control_id,
    /// version)` — a write for a primary key already present is a silent
    /// no-op, never an error and never a mutation of the existing row.
    pub async fn record_specification(
        &self,
        spec: &Specification,
        approval: &ApprovalMetadata,
    ) -> Result<(), LedgerError> {
        let document = serde_json::to_string(spec)?;
        sqlx::query(
            "INSERT OR IGNORE INTO specifications (control_id, version, document, approved_by, approved_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&spec.governance.control_id)
        .bind(&spec.governance.version)
        .bind(document)
        .bind(&approval.approved_by)
        .bind(approval.approved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert every manifest entry not already present, keyed by
    /// `(dataset_alias, content_hash)`. Idempotent per entry.
    pub async fn record_manifest(&self, manifest: &Manifest) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        for alias in manifest.aliases() {
            let entry = manifest
                .entry(alias)
                .expect("alias came from manifest.aliases()");
            let fingerprint = schema_fingerprint(entry.columns());
            let source = entry.source();
            sqlx::query(
                "INSERT OR IGNORE INTO manifests
                 (dataset_alias, content_hash, path, row_count, schema_fingerprint,
                  origin_system, extraction_instant, schema_version)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(alias.as_str())
            .bind(entry.content_hash())
            .bind(entry.path().display().to_string())
            .bind(entry.row_count() as i64)
            .bind(fingerprint)
            .bind(&source.origin_system)
            .bind(source.extraction_instant.to_rfc3339())
            .bind(&source.schema_version)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Persist an execution report in one transaction, along with any
    /// manifest rows its `manifest_hashes` snapshot references but the
    /// table doesn't yet have a matching `content_hash` for (spec §5: "each
    /// execution is written in a single transaction covering the
    /// Executions row and any new Manifests row"). The execution row itself
    /// is never mutated once written — `execution_id` is a fresh UUID per
    /// call, so this is always an insert, never an update.
    pub async fn record_execution(
        &self,
        report: &ExecutionReport,
        manifest: &Manifest,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        for alias in manifest.aliases() {
            if let Some(hash) = report.manifest_hashes.get(alias) {
                let entry = manifest.entry(alias).expect("alias from manifest.aliases()");
                if entry.content_hash() == hash {
                    let fingerprint = schema_fingerprint(entry.columns());
                    let source = entry.source();
                    sqlx::query(
                        "INSERT OR IGNORE INTO manifests
                         (dataset_alias, content_hash, path, row_count, schema_fingerprint,
                          origin_system, extraction_instant, schema_version)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(alias.as_str())
                    .bind(entry.content_hash())
                    .bind(entry.path().display().to_string())
                    .bind(entry.row_count() as i64)
                    .bind(fingerprint)
                    .bind(&source.origin_system)
                    .bind(source.extraction_instant.to_rfc3339())
                    .bind(&source.schema_version)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        let manifest_hashes_json = serde_json::to_string(&report.manifest_hashes)?;
        let exceptions_json = serde_json::to_string(&report.exceptions_sample)?;
        let verdict_json = serde_json::to_string(&report.verdict)?;
        let error_kind_json = report
            .error_kind
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO executions
             (execution_id, control_id, specification_version, query_text, manifest_hashes,
              total_population, exception_count, exception_rate_percent, exceptions_sample,
              verdict, error_kind, error_message, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(report.execution_id.to_string())
        .bind(&report.control_id)
        .bind(&report.specification_version)
        .bind(&report.query_text)
        .bind(manifest_hashes_json)
        .bind(report.total_population as i64)
        .bind(report.exception_count as i64)
        .bind(report.exception_rate_percent)
        .bind(exceptions_json)
        .bind(verdict_json)
        .bind(error_kind_json)
        .bind(&report.error_message)
        .bind(report.executed_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(execution_id = %report.execution_id, control_id = %report.control_id, "recorded execution");
        Ok(())
    }

    /// Per-dataset integrity status for a previously recorded execution
    /// (spec §4.11). `VALID` iff the `(alias, hash)` pair stored inline on
    /// the execution is still present in the Manifests table; `MISMATCH` if
    /// the alias exists there under a different hash (the evidence file was
    /// replaced); `UNKNOWN` if the alias has no Manifests row at all.
    pub async fn integrity_view(&self, execution_id: Uuid) -> Result<Vec<IntegrityRow>, LedgerError> {
        let row = sqlx::query("SELECT manifest_hashes FROM executions WHERE execution_id = ?")
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::UnknownExecution(execution_id))?;

        let stored: HashMap<DatasetAlias, String> =
            serde_json::from_str(&row.get::<String, _>("manifest_hashes"))?;

        let mut result = Vec::with_capacity(stored.len());
        for (alias, stored_hash) in stored {
            // The Manifests table never deletes a historical (alias, hash) row
            // (inserts are INSERT OR IGNORE), so "valid" means this exact pair
            // is still on record, not that it's the newest one for the alias.
            let status = if self.manifest_hash_exists(&alias, &stored_hash).await? {
                IntegrityStatus::Valid
            } else if self.manifest_has_any_row(&alias).await? {
                IntegrityStatus::Mismatch
            } else {
                IntegrityStatus::Unknown
            };

            result.push(IntegrityRow {
                dataset_alias: alias,
                stored_hash,
                status,
            });
        }

        result.sort_by(|a, b| a.dataset_alias.as_str().cmp(b.dataset_alias.as_str()));
        Ok(result)
    }

    async fn manifest_hash_exists(&self, alias: &DatasetAlias, hash: &str) -> Result<bool, LedgerError> {
        let row = sqlx::query(
            "SELECT 1 FROM manifests WHERE dataset_alias = ? AND content_hash = ? LIMIT 1",
        )
        .bind(alias.as_str())
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn manifest_has_any_row(&self, alias: &DatasetAlias) -> Result<bool, LedgerError> {
        let row = sqlx::query("SELECT 1 FROM manifests WHERE dataset_alias = ? LIMIT 1")
            .bind(alias.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// A stable fingerprint of a dataset's column list, independent of
/// declaration order, used as the Manifests table's `schema_fingerprint`.
fn schema_fingerprint(columns: &[(String, attest_protocol::LogicalType)]) -> String {
    use sha2::{Digest, Sha256};
    let mut sorted: Vec<String> = columns
        .iter()
        .map(|(name, ty)| format!("{name}:{ty:?}"))
        .collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    hasher.update(sorted.join(",").as_bytes());
    hex::encode(hasher.finalize())
}
