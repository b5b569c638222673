//! The single-control run loop: compile, validate, execute, record.

use crate::config::FileConfig;
use anyhow::{Context, Result};
use attest_engine::ExecutionContext;
use attest_ledger::{ApprovalMetadata, Ledger, LedgerConfig};
use attest_manifest::Manifest;
use attest_protocol::ExecutionReport;
use attest_spec::Specification;
use chrono::Utc;
use std::path::Path;

pub struct RunOutcome {
    pub report: ExecutionReport,
    pub compiled_sql: String,
}

/// Load a specification and manifest from disk, compile and validate the
/// control, and — unless `dry_run` — execute it and record the result.
pub async fn run_control(
    specification_path: &Path,
    manifest_path: &Path,
    config: &FileConfig,
    dry_run: bool,
) -> Result<RunOutcome> {
    let spec_doc: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(specification_path)
            .with_context(|| format!("failed to read {}", specification_path.display()))?,
    )
    .context("specification file is not valid JSON")?;
    let spec = Specification::from_document(spec_doc)
        .map_err(|e| anyhow::anyhow!("specification rejected: {e}"))?;

    let manifest: Manifest = serde_json::from_str(
        &std::fs::read_to_string(manifest_path)
            .with_context(|| format!("failed to read {}", manifest_path.display()))?,
    )
    .context("manifest file is not valid JSON")?;

    // Schema validation and compilation rejections are pre-execution
    // failures (spec §7): they still produce an ERROR report and still
    // reach the ledger, the same as a failure discovered during execution.
    if let Err(e) = attest_validate::validate(&spec, &manifest) {
        let report = attest_engine::error_report(&spec, &manifest, String::new(), e.error_kind(), e.to_string());
        record(config, &spec, &manifest, &report).await?;
        return Ok(RunOutcome { compiled_sql: String::new(), report });
    }

    let plan = match attest_compiler::compile(&spec, &manifest) {
        Ok(plan) => plan,
        Err(e) => {
            let report = attest_engine::error_report(&spec, &manifest, String::new(), e.error_kind(), e.to_string());
            record(config, &spec, &manifest, &report).await?;
            return Ok(RunOutcome { compiled_sql: String::new(), report });
        }
    };

    if dry_run {
        return Ok(RunOutcome {
            compiled_sql: plan.sql.clone(),
            report: ExecutionReport {
                control_id: spec.governance.control_id.clone(),
                specification_version: spec.governance.version.clone(),
                query_text: plan.sql.clone(),
                manifest_hashes: manifest.hash_snapshot(),
                total_population: 0,
                exception_count: 0,
                exception_rate_percent: 0.0,
                exceptions_sample: vec![],
                verdict: attest_protocol::Verdict::Pass,
                error_kind: None,
                error_message: Some("dry run: not executed".to_string()),
                executed_at: Utc::now(),
                execution_id: uuid::Uuid::new_v4(),
            },
        });
    }

    let ctx = ExecutionContext {
        cancel: None,
        memory_ceiling_mb: config.memory_ceiling_mb,
    };
    let report = attest_engine::execute(&spec, &manifest, &plan, &ctx);
    record(config, &spec, &manifest, &report).await?;

    Ok(RunOutcome {
        compiled_sql: plan.sql.clone(),
        report,
    })
}

/// Opens the ledger and records the specification and execution report.
/// Called for every outcome that reaches a report — passing or `ERROR` —
/// so auditors can always find the attempt, not just the successes.
async fn record(config: &FileConfig, spec: &Specification, manifest: &Manifest, report: &ExecutionReport) -> Result<()> {
    let ledger = Ledger::open(&LedgerConfig::new(config.ledger_path.clone()))
        .await
        .context("failed to open ledger")?;
    let approval = ApprovalMetadata {
        approved_by: config
            .approved_by
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        approved_at: Utc::now(),
    };
    ledger
        .record_specification(spec, &approval)
        .await
        .context("failed to record specification")?;
    ledger
        .record_execution(report, manifest)
        .await
        .context("failed to record execution")?;
    Ok(())
}
