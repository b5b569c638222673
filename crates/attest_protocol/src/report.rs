//! Verdicts, error kinds, and the Execution Report itself (spec §3, §7).

use crate::{DatasetAlias, Scalar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// The outcome of executing a control (spec §3 "Execution Report").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

/// The closed set of error kinds a report may carry (spec §7). `SpecInvalid`
/// is raised synchronously during construction and never appears on a
/// report — every other kind is recorded with `verdict = ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    ManifestMissing,
    SchemaDrift,
    TypeMismatch,
    CompileRejected,
    ExecutionFailed,
    ZeroPopulation,
    Canceled,
    LedgerWriteFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single sanitized exception row, column name to canonical [`Scalar`].
/// `BTreeMap` gives the "canonical column ordering" spec §4.9 requires for
/// persisted rows.
pub type ExceptionRecord = BTreeMap<String, Scalar>;

/// The immutable result of executing one control (spec §3 "Execution
/// Report"). Once constructed this never changes — the ledger stores it by
/// value and any re-verification starts from a fresh execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub control_id: String,
    pub specification_version: String,
    pub query_text: String,
    pub manifest_hashes: HashMap<DatasetAlias, String>,
    pub total_population: u64,
    pub exception_count: u64,
    pub exception_rate_percent: f64,
    pub exceptions_sample: Vec<ExceptionRecord>,
    pub verdict: Verdict,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub execution_id: Uuid,
}

impl ExecutionReport {
    /// The maximum number of exception rows ever persisted on a report
    /// (spec §4.9); `exception_count` preserves the true total separately.
    pub const MAX_EXCEPTIONS_SAMPLE: usize = 100;
}
