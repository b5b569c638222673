//! Execution engine and verdict resolver (spec §4.9–§4.10).
//!
//! Grounded on the teacher's `casparian_sinks_duckdb` (opening a DuckDB
//! connection, the Arrow boundary for row data) and `casparian_db::backend`
//! (a typed value model for rows pulled out of the analytical engine). Each
//! call to [`execute`] opens a fresh, stateless DuckDB session — the engine
//! never reuses a connection across controls (spec §5).

mod convert;
mod error;
mod rounding;
mod verdict;

pub use error::EngineError;

use attest_compiler::QueryPlan;
use attest_manifest::Manifest;
use attest_protocol::{ErrorKind, ExceptionRecord, ExecutionReport, Verdict};
use attest_spec::Specification;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-call execution knobs: an optional cooperative cancellation flag and
/// an optional DuckDB memory ceiling, applied via `PRAGMA memory_limit`
/// before any query runs (spec §5 "Shared resources").
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub cancel: Option<Arc<AtomicBool>>,
    pub memory_ceiling_mb: Option<u64>,
}

impl ExecutionContext {
    fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Builds an `ERROR` report for a failure discovered before a query plan
/// exists at all — schema validation or compilation rejection (spec §7:
/// these "must produce a report... still written to the ledger" the same
/// as any failure surfaced during execution). `query_text` is whatever SQL,
/// if any, had been produced before the failure; compilation failures have
/// none to show.
pub fn error_report(
    spec: &Specification,
    manifest: &Manifest,
    query_text: String,
    error_kind: ErrorKind,
    error_message: String,
) -> ExecutionReport {
    ExecutionReport {
        control_id: spec.governance.control_id.clone(),
        specification_version: spec.governance.version.clone(),
        query_text,
        manifest_hashes: manifest.hash_snapshot(),
        total_population: 0,
        exception_count: 0,
        exception_rate_percent: 0.0,
        exceptions_sample: Vec::new(),
        verdict: Verdict::Error,
        error_kind: Some(error_kind),
        error_message: Some(error_message),
        executed_at: Utc::now(),
        execution_id: Uuid::new_v4(),
    }
}

/// Execute one compiled control. Every failure mode in spec §7 except
/// `SpecInvalid` (which never reaches this far) is folded into the
/// returned report rather than surfaced as an `Err` — auditors must see
/// failures, not lose them to an unhandled `Result`.
pub fn execute(spec: &Specification, manifest: &Manifest, plan: &QueryPlan, ctx: &ExecutionContext) -> ExecutionReport {
    let execution_id = Uuid::new_v4();
    let executed_at = Utc::now();
    let manifest_hashes = manifest.hash_snapshot();

    let skeleton = |verdict: Verdict, error_kind: Option<ErrorKind>, error_message: Option<String>| ExecutionReport {
        control_id: spec.governance.control_id.clone(),
        specification_version: spec.governance.version.clone(),
        query_text: plan.sql.clone(),
        manifest_hashes: manifest_hashes.clone(),
        total_population: 0,
        exception_count: 0,
        exception_rate_percent: 0.0,
        exceptions_sample: Vec::new(),
        verdict,
        error_kind,
        error_message,
        executed_at,
        execution_id,
    };

    if ctx.is_canceled() {
        return skeleton(Verdict::Error, Some(ErrorKind::Canceled), Some("canceled before session open".to_string()));
    }

    let conn = match duckdb::Connection::open_in_memory() {
        Ok(c) => c,
        Err(e) => {
            return skeleton(
                Verdict::Error,
                Some(ErrorKind::ExecutionFailed),
                Some(format!("failed to open analytical session: {e}")),
            )
        }
    };

    if let Some(mb) = ctx.memory_ceiling_mb {
        if let Err(e) = conn.execute_batch(&format!("PRAGMA memory_limit='{mb}MB'")) {
            warn!(error = %e, "failed to apply memory ceiling, continuing without it");
        }
    }

    if ctx.is_canceled() {
        return skeleton(Verdict::Error, Some(ErrorKind::Canceled), Some("canceled before dry run".to_string()));
    }

    if let Err(e) = conn.prepare(&format!("EXPLAIN {}", plan.sql)) {
        return skeleton(
            Verdict::Error,
            Some(ErrorKind::CompileRejected),
            Some(e.to_string()),
        );
    }

    if ctx.is_canceled() {
        return skeleton(Verdict::Error, Some(ErrorKind::Canceled), Some("canceled before population count".to_string()));
    }

    let total_population: u64 = match conn.query_row(&plan.population_count_sql(), [], |row| row.get::<_, i64>(0)) {
        Ok(n) => n.max(0) as u64,
        Err(e) => {
            return skeleton(
                Verdict::Error,
                Some(ErrorKind::ExecutionFailed),
                Some(format!("population count failed: {e}")),
            )
        }
    };

    if ctx.is_canceled() {
        return skeleton(Verdict::Error, Some(ErrorKind::Canceled), Some("canceled before main execution".to_string()));
    }

    let (exception_count, exceptions_sample) = match collect_exceptions(&conn, &plan.sql) {
        Ok(result) => result,
        Err(e) => {
            return skeleton(
                Verdict::Error,
                Some(ErrorKind::ExecutionFailed),
                Some(e.to_string()),
            )
        }
    };

    let effective_threshold = verdict::effective_threshold(
        spec.assertions.iter().map(|a| a.materiality_threshold_percent),
    );

    let (verdict, exception_rate_percent) =
        match verdict::resolve(total_population, exception_count, effective_threshold) {
            Ok(pair) => pair,
            Err(e) => {
                return skeleton(
                    Verdict::Error,
                    Some(e.error_kind()),
                    Some(format!(
                        "base dataset '{}' had zero rows after population filters",
                        spec.population.base_dataset
                    )),
                )
            }
        };

    info!(
        control_id = %spec.governance.control_id,
        %verdict,
        total_population,
        exception_count,
        "control executed"
    );

    ExecutionReport {
        control_id: spec.governance.control_id.clone(),
        specification_version: spec.governance.version.clone(),
        query_text: plan.sql.clone(),
        manifest_hashes,
        total_population,
        exception_count,
        exception_rate_percent,
        exceptions_sample,
        verdict,
        error_kind: None,
        error_message: None,
        executed_at,
        execution_id,
    }
}

/// Runs the main query and returns the exact exception count alongside the
/// first [`ExecutionReport::MAX_EXCEPTIONS_SAMPLE`] rows, canonicalized
/// (spec §4.9, §4.11). Both the row-level and the aggregation shape already
/// select only exception rows/groups — the compiled `WHERE`/`HAVING` does
/// that filtering — so every row returned here is an exception.
fn collect_exceptions(conn: &duckdb::Connection, sql: &str) -> duckdb::Result<(u64, Vec<ExceptionRecord>)> {
    let mut stmt = conn.prepare(sql)?;
    let mut arrow_result = stmt.query_arrow([])?;
    let schema = arrow_result.get_schema();

    let mut count = 0u64;
    let mut sample = Vec::new();

    while let Some(batch) = arrow_result.next() {
        for row in 0..batch.num_rows() {
            count += 1;
            if sample.len() < ExecutionReport::MAX_EXCEPTIONS_SAMPLE {
                let mut record: ExceptionRecord = BTreeMap::new();
                for (col_idx, field) in schema.fields().iter().enumerate() {
                    let column = batch.column(col_idx);
                    record.insert(field.name().clone(), convert::arrow_value_to_scalar(column.as_ref(), row));
                }
                sample.push(record);
            }
        }
    }

    Ok((count, sample))
}
