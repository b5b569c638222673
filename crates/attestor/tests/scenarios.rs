//! End-to-end scenario tests, each driving the full
//! compile -> validate -> execute pipeline against a real DuckDB-backed
//! Parquet fixture. `end_to_end_temporal_control_reports_exceptions` in
//! `attest_engine` already covers the single row-level filter + assertion
//! shape; the scenarios below cover joins, aggregation, IN-list membership,
//! null-defines-compliance, and the zero-population guard.

use attest_engine::ExecutionContext;
use attest_manifest::{Manifest, ManifestEntry, SourceMetadata};
use attest_protocol::{
    AggregationFunction, ColumnRef, DatasetAlias, EvidenceConfig, Governance, LogicalType,
    Operator, ReviewerWorkflow, Scalar, TestingFrequency, Verdict,
};
use attest_spec::{
    Assertion, AssertionKind, ExpectedValue, PipelineStep, Population, SamplingStrategy,
    Specification, StepAction,
};
use chrono::Utc;
use std::io::Write;

fn governance(control_id: &str) -> Governance {
    Governance {
        control_id: control_id.to_string(),
        version: "1.0.0".to_string(),
        owner_role: "Ops Controller".to_string(),
        testing_frequency: TestingFrequency::Quarterly,
        regulatory_citations: vec![],
        risk_objective: "scenario test".to_string(),
    }
}

fn evidence() -> EvidenceConfig {
    EvidenceConfig {
        retention_years: 7,
        reviewer_workflow: ReviewerWorkflow::RequiresHumanSignoff,
        exception_routing_queue: "queue".to_string(),
    }
}

fn source() -> SourceMetadata {
    SourceMetadata {
        origin_system: "scenario-test".to_string(),
        extraction_instant: Utc::now(),
        schema_version: "1".to_string(),
    }
}

fn write_parquet_fixture(header: &str, rows: &[&str]) -> tempfile::TempPath {
    let mut csv = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(csv, "{header}").unwrap();
    for row in rows {
        writeln!(csv, "{row}").unwrap();
    }
    csv.flush().unwrap();
    let csv_path = csv.into_temp_path();

    let parquet_path = tempfile::NamedTempFile::with_suffix(".parquet").unwrap().into_temp_path();
    let conn = duckdb::Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "COPY (SELECT * FROM read_csv_auto('{}')) TO '{}' (FORMAT PARQUET)",
        csv_path.display(),
        parquet_path.display(),
    ))
    .unwrap();
    parquet_path
}

fn entry(alias: &str, path: &std::path::Path, row_count: u64, columns: Vec<(&str, LogicalType)>) -> ManifestEntry {
    ManifestEntry::new(
        DatasetAlias::new(alias),
        path.to_path_buf(),
        format!("{alias}-hash"),
        row_count,
        columns.into_iter().map(|(c, t)| (c.to_string(), t)).collect(),
        source(),
    )
}

fn run(spec: &Specification, manifest: &Manifest) -> attest_protocol::ExecutionReport {
    attest_validate::validate(spec, manifest).expect("schema validation");
    let plan = attest_compiler::compile(spec, manifest).expect("compilation");
    attest_engine::execute(spec, manifest, &plan, &ExecutionContext::default())
}

/// CTRL-MNPI-707: composite-key left join + column comparison, with
/// `restriction_status IS NOT NULL` pre-filter. A row with status
/// `"CLEARED"` but `trade_date == clearance_date` is the sole exception.
#[test]
fn composite_key_join_with_column_comparison() {
    let trades_parquet = write_parquet_fixture(
        "employee_id,ticker_symbol,trade_date,restriction_status",
        &[
            "E1,ACME,2024-02-01,CLEARED",
            "E2,ACME,2024-02-05,CLEARED",
        ],
    );
    let wallcross_parquet = write_parquet_fixture(
        "employee_id,ticker_symbol,clearance_date",
        &[
            "E1,ACME,2024-02-01",
            "E2,ACME,2024-01-20",
        ],
    );

    let population = Population {
        base_dataset: DatasetAlias::new("trades"),
        steps: vec![
            PipelineStep {
                step_id: "with_wall_cross".to_string(),
                action: StepAction::JoinLeft {
                    left_dataset: DatasetAlias::new("trades"),
                    right_dataset: DatasetAlias::new("wall_cross_register"),
                    left_keys: vec!["employee_id".to_string(), "ticker_symbol".to_string()],
                    right_keys: vec!["employee_id".to_string(), "ticker_symbol".to_string()],
                },
            },
            PipelineStep {
                step_id: "restricted_only".to_string(),
                action: StepAction::FilterIsNull {
                    field: ColumnRef::new("restriction_status"),
                    is_null: false,
                },
            },
        ],
        sampling: None,
    };
    let assertions = vec![
        Assertion {
            assertion_id: "a1".to_string(),
            description: "restriction cleared".to_string(),
            materiality_threshold_percent: 0.0,
            kind: AssertionKind::ValueMatch {
                field: ColumnRef::new("restriction_status"),
                operator: Operator::Eq,
                expected_value: ExpectedValue::Scalar(Scalar::String("CLEARED".to_string())),
                ignore_case_and_space: true,
            },
        },
        Assertion {
            assertion_id: "a2".to_string(),
            description: "trade after clearance".to_string(),
            materiality_threshold_percent: 0.0,
            kind: AssertionKind::ColumnComparison {
                left_field: ColumnRef::new("trade_date"),
                operator: Operator::Gt,
                right_field: ColumnRef::new("clearance_date"),
            },
        },
    ];
    let spec = Specification::new(governance("CTRL-MNPI-707"), vec![], population, assertions, evidence()).unwrap();

    let mut manifest = Manifest::from_entries(vec![entry(
        "trades",
        &trades_parquet,
        2,
        vec![
            ("employee_id", LogicalType::String),
            ("ticker_symbol", LogicalType::String),
            ("trade_date", LogicalType::Date),
            ("restriction_status", LogicalType::String),
        ],
    )])
    .unwrap();
    manifest
        .insert(entry(
            "wall_cross_register",
            &wallcross_parquet,
            2,
            vec![
                ("employee_id", LogicalType::String),
                ("ticker_symbol", LogicalType::String),
                ("clearance_date", LogicalType::Date),
            ],
        ))
        .unwrap();

    let report = run(&spec, &manifest);
    assert_eq!(report.total_population, 2);
    assert_eq!(report.exception_count, 1);
    assert_eq!(report.verdict, Verdict::Fail);
}

/// CTRL-CASS-006: aggregation assertion with a single date summing below
/// the $50M threshold among otherwise-compliant days.
#[test]
fn aggregation_assertion_flags_single_shortfall_day() {
    let parquet = write_parquet_fixture(
        "account_type,calculation_date,current_balance",
        &[
            "CLIENT_FUNDS,2024-03-01,30000000",
            "CLIENT_FUNDS,2024-03-01,19000000",
            "CLIENT_FUNDS,2024-03-02,40000000",
            "CLIENT_FUNDS,2024-03-02,15000000",
        ],
    );

    let population = Population {
        base_dataset: DatasetAlias::new("subledger_balances"),
        steps: vec![PipelineStep {
            step_id: "client_funds_only".to_string(),
            action: StepAction::FilterComparison {
                field: ColumnRef::new("account_type"),
                operator: Operator::Eq,
                value: Scalar::String("CLIENT_FUNDS".to_string()),
            },
        }],
        sampling: None,
    };
    let assertion = Assertion {
        assertion_id: "a1".to_string(),
        description: "daily client funds balance reconciles".to_string(),
        materiality_threshold_percent: 0.0,
        kind: AssertionKind::Aggregation {
            group_by_fields: vec!["calculation_date".to_string()],
            metric_field: ColumnRef::new("current_balance"),
            aggregation_function: AggregationFunction::Sum,
            operator: Operator::Gte,
            threshold: 50_000_000.0,
        },
    };
    let spec = Specification::new(governance("CTRL-CASS-006"), vec![], population, vec![assertion], evidence()).unwrap();
    let manifest = Manifest::from_entries(vec![entry(
        "subledger_balances",
        &parquet,
        4,
        vec![
            ("account_type", LogicalType::String),
            ("calculation_date", LogicalType::Date),
            ("current_balance", LogicalType::Numeric),
        ],
    )])
    .unwrap();

    let report = run(&spec, &manifest);
    assert_eq!(report.total_population, 2, "two distinct calculation_date groups");
    assert_eq!(report.exception_count, 1, "only 2024-03-01 sums below threshold");
    assert_eq!(report.verdict, Verdict::Fail);
}

/// CTRL-SOX-AP-004: a filter step (`invoice_amount gt 100000`) precedes a
/// join (employee titles), then an IN-list membership assertion,
/// case/whitespace-folded. The filter step's population predicate is
/// emitted while the pipeline's current CTE is still `base`, but the
/// assembler selects from the join's CTE — the filter must still resolve
/// against the flattened final rowset. A row with `approver_title = "vp"`
/// is an exception; `" CEO "` is not.
#[test]
fn in_list_assertion_folds_case_and_whitespace() {
    let invoices_parquet = write_parquet_fixture(
        "employee_id,invoice_amount",
        &["E1,150000", "E2,200000", "E3,500000", "E4,50000"],
    );
    let titles_parquet = write_parquet_fixture(
        "employee_id,approver_title",
        &["E1, vp", "E2, CEO ", "E3,EVP", "E4,CFO"],
    );

    let population = Population {
        base_dataset: DatasetAlias::new("invoices"),
        steps: vec![
            PipelineStep {
                step_id: "large_invoices".to_string(),
                action: StepAction::FilterComparison {
                    field: ColumnRef::new("invoice_amount"),
                    operator: Operator::Gt,
                    value: Scalar::Integer(100_000),
                },
            },
            PipelineStep {
                step_id: "with_approver".to_string(),
                action: StepAction::JoinLeft {
                    left_dataset: DatasetAlias::new("invoices"),
                    right_dataset: DatasetAlias::new("employee_titles"),
                    left_keys: vec!["employee_id".to_string()],
                    right_keys: vec!["employee_id".to_string()],
                },
            },
        ],
        sampling: None,
    };
    let assertion = Assertion {
        assertion_id: "a1".to_string(),
        description: "approver has sufficient authority".to_string(),
        materiality_threshold_percent: 0.0,
        kind: AssertionKind::ValueMatch {
            field: ColumnRef::new("approver_title"),
            operator: Operator::In,
            expected_value: ExpectedValue::List(vec![
                Scalar::String("SVP".to_string()),
                Scalar::String("EVP".to_string()),
                Scalar::String("CEO".to_string()),
                Scalar::String("CFO".to_string()),
            ]),
            ignore_case_and_space: true,
        },
    };
    let spec = Specification::new(governance("CTRL-SOX-AP-004"), vec![], population, vec![assertion], evidence()).unwrap();
    let mut manifest = Manifest::from_entries(vec![entry(
        "invoices",
        &invoices_parquet,
        4,
        vec![
            ("employee_id", LogicalType::String),
            ("invoice_amount", LogicalType::Numeric),
        ],
    )])
    .unwrap();
    manifest
        .insert(entry(
            "employee_titles",
            &titles_parquet,
            4,
            vec![
                ("employee_id", LogicalType::String),
                ("approver_title", LogicalType::String),
            ],
        ))
        .unwrap();

    let report = run(&spec, &manifest);
    assert_eq!(report.total_population, 3, "invoice_amount > 100000 excludes E4");
    assert_eq!(report.exception_count, 1, "only the 'vp' row lacks sufficient authority");
}

/// Zero-population guard: a manifest whose base dataset has zero rows
/// always produces `ERROR`/`ZeroPopulation`, regardless of assertion
/// content.
#[test]
fn zero_population_base_dataset_is_rejected() {
    let parquet = write_parquet_fixture("trade_status", &[]);

    let population = Population {
        base_dataset: DatasetAlias::new("equity_settlements"),
        steps: vec![],
        sampling: None,
    };
    let assertion = Assertion {
        assertion_id: "a1".to_string(),
        description: "placeholder".to_string(),
        materiality_threshold_percent: 0.0,
        kind: AssertionKind::ValueMatch {
            field: ColumnRef::new("trade_status"),
            operator: Operator::Eq,
            expected_value: ExpectedValue::Scalar(Scalar::String("SETTLED".to_string())),
            ignore_case_and_space: true,
        },
    };
    let spec = Specification::new(governance("CTRL-ZERO-POP"), vec![], population, vec![assertion], evidence()).unwrap();
    let manifest = Manifest::from_entries(vec![entry(
        "equity_settlements",
        &parquet,
        0,
        vec![("trade_status", LogicalType::String)],
    )])
    .unwrap();

    let report = run(&spec, &manifest);
    assert_eq!(report.verdict, Verdict::Error);
    assert_eq!(report.error_kind, Some(attest_protocol::ErrorKind::ZeroPopulation));
    assert_eq!(report.exception_count, 0);
}

/// Materiality monotonicity: raising an assertion's threshold never flips
/// a verdict from PASS to FAIL.
#[test]
fn raising_materiality_threshold_never_flips_pass_to_fail() {
    let parquet = write_parquet_fixture(
        "trade_status",
        &["SETTLED", "SETTLED", "REJECTED", "SETTLED"],
    );

    let population = Population {
        base_dataset: DatasetAlias::new("equity_settlements"),
        steps: vec![],
        sampling: None,
    };
    let build_spec = |threshold: f64| {
        let assertion = Assertion {
            assertion_id: "a1".to_string(),
            description: "status settled".to_string(),
            materiality_threshold_percent: threshold,
            kind: AssertionKind::ValueMatch {
                field: ColumnRef::new("trade_status"),
                operator: Operator::Eq,
                expected_value: ExpectedValue::Scalar(Scalar::String("SETTLED".to_string())),
                ignore_case_and_space: true,
            },
        };
        Specification::new(
            governance("CTRL-MONOTONIC"),
            vec![],
            population.clone(),
            vec![assertion],
            evidence(),
        )
        .unwrap()
    };
    let manifest = Manifest::from_entries(vec![entry(
        "equity_settlements",
        &parquet,
        4,
        vec![("trade_status", LogicalType::String)],
    )])
    .unwrap();

    let low = run(&build_spec(0.0), &manifest);
    let high = run(&build_spec(50.0), &manifest);
    assert_eq!(low.verdict, Verdict::Fail);
    assert_eq!(high.verdict, Verdict::Pass);
}

/// Sampling clause: a `SamplingStrategy` with a seed renders
/// `TABLESAMPLE RESERVOIR(...) REPEATABLE(...)`, and execution still
/// reports the unsampled population count (population filters, no
/// sampling clause, per the compiler's `population_count_sql`).
#[test]
fn sampled_population_still_reports_full_population_count() {
    let parquet = write_parquet_fixture(
        "trade_status",
        &["SETTLED", "SETTLED", "SETTLED", "REJECTED", "SETTLED", "SETTLED"],
    );

    let population = Population {
        base_dataset: DatasetAlias::new("equity_settlements"),
        steps: vec![],
        sampling: Some(SamplingStrategy {
            method: attest_spec::SamplingMethod::Random,
            sample_size: Some(3),
            sample_percentage: None,
            random_seed: Some(42),
            justification: "quarterly spot check".to_string(),
        }),
    };
    let assertion = Assertion {
        assertion_id: "a1".to_string(),
        description: "status settled".to_string(),
        materiality_threshold_percent: 0.0,
        kind: AssertionKind::ValueMatch {
            field: ColumnRef::new("trade_status"),
            operator: Operator::Eq,
            expected_value: ExpectedValue::Scalar(Scalar::String("SETTLED".to_string())),
            ignore_case_and_space: true,
        },
    };
    let spec = Specification::new(governance("CTRL-SAMPLED"), vec![], population, vec![assertion], evidence()).unwrap();
    let manifest = Manifest::from_entries(vec![entry(
        "equity_settlements",
        &parquet,
        6,
        vec![("trade_status", LogicalType::String)],
    )])
    .unwrap();

    let plan = attest_compiler::compile(&spec, &manifest).unwrap();
    assert!(plan.sql.contains("TABLESAMPLE RESERVOIR"));
    assert!(plan.sql.contains("REPEATABLE (42)"));

    let report = run(&spec, &manifest);
    assert_eq!(report.total_population, 6, "population count ignores the sampling clause");
}
