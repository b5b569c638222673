//! Schema validator (spec §4.8): resolves every field reference a
//! specification makes against the manifest before any data is read.
//!
//! Grounded on the teacher's `casparian_schema::contract` column-validation
//! idiom (walk a declared schema, report violations with enough context to
//! act on) combined with `strsim`, used the way
//! `other_examples/manifests/surrealdb-surrealdb` uses it for
//! nearest-name suggestions.
//!
//! This crate resolves references directly against the [`Specification`]'s
//! pipeline and assertions rather than re-parsing the compiler's generated
//! SQL text — the post-join column set the pipeline compiler builds up is
//! cheap to re-derive here, and doing so keeps this crate from depending on
//! `attest_compiler` (the schema validator and the SQL compiler are
//! independent checks over the same inputs, not a pipeline stage of each
//! other).

mod error;

pub use error::ValidationError;

use attest_manifest::Manifest;
use attest_protocol::{ColumnRef, DatasetAlias, LogicalType};
use attest_spec::{Assertion, AssertionKind, Specification, StepAction};
use std::collections::HashMap;

const SUGGESTION_COUNT: usize = 3;

/// The post-join column universe, keyed by bare column name. A name that
/// resolves ambiguously (appears under more than one live dataset alias
/// without qualification) is intentionally absent here — the pipeline
/// compiler's `EXCLUDE`/collision check prevents that case from compiling
/// in the first place, so by the time validation runs the set is unique by
/// construction.
struct Schema {
    by_column: HashMap<String, LogicalType>,
    by_qualified: HashMap<(String, String), LogicalType>,
}

impl Schema {
    fn build(spec: &Specification, manifest: &Manifest) -> Result<Self, ValidationError> {
        let mut by_column = HashMap::new();
        let mut by_qualified = HashMap::new();

        let base = &spec.population.base_dataset;
        insert_dataset(manifest, base, &mut by_column, &mut by_qualified)?;

        for step in &spec.population.steps {
            if let StepAction::JoinLeft {
                right_dataset,
                right_keys,
                ..
            } = &step.action
            {
                insert_dataset_excluding(manifest, right_dataset, right_keys, &mut by_column, &mut by_qualified)?;
            }
        }

        Ok(Schema { by_column, by_qualified })
    }

    fn resolve(&self, field: &ColumnRef) -> Result<LogicalType, ValidationError> {
        if let Some((dataset, column)) = field.qualifier() {
            self.by_qualified
                .get(&(dataset.to_string(), column.to_string()))
                .copied()
                .ok_or_else(|| ValidationError::SchemaDrift {
                    field: column.to_string(),
                    dataset: dataset.to_string(),
                    suggestions: suggest(column, self.by_qualified.keys().map(|(_, c)| c.as_str())),
                })
        } else {
            self.by_column
                .get(field.as_str())
                .copied()
                .ok_or_else(|| ValidationError::SchemaDrift {
                    field: field.as_str().to_string(),
                    dataset: "<post-join output>".to_string(),
                    suggestions: suggest(field.as_str(), self.by_column.keys().map(String::as_str)),
                })
        }
    }
}

fn insert_dataset(
    manifest: &Manifest,
    alias: &DatasetAlias,
    by_column: &mut HashMap<String, LogicalType>,
    by_qualified: &mut HashMap<(String, String), LogicalType>,
) -> Result<(), ValidationError> {
    let columns = manifest
        .columns_of(alias)
        .map_err(|_| ValidationError::SchemaDrift {
            field: String::new(),
            dataset: alias.to_string(),
            suggestions: Vec::new(),
        })?;
    for (name, ty) in columns {
        by_column.insert(name.clone(), *ty);
        by_qualified.insert((alias.to_string(), name.clone()), *ty);
    }
    Ok(())
}

fn insert_dataset_excluding(
    manifest: &Manifest,
    alias: &DatasetAlias,
    excluded: &[String],
    by_column: &mut HashMap<String, LogicalType>,
    by_qualified: &mut HashMap<(String, String), LogicalType>,
) -> Result<(), ValidationError> {
    let columns = manifest
        .columns_of(alias)
        .map_err(|_| ValidationError::SchemaDrift {
            field: String::new(),
            dataset: alias.to_string(),
            suggestions: Vec::new(),
        })?;
    for (name, ty) in columns {
        by_qualified.insert((alias.to_string(), name.clone()), *ty);
        if !excluded.contains(name) {
            by_column.insert(name.clone(), *ty);
        }
    }
    Ok(())
}

fn suggest<'a>(target: &str, candidates: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .map(|c| (strsim::levenshtein(target, c), c))
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(SUGGESTION_COUNT)
        .map(|(_, c)| c.to_string())
        .collect()
}

fn check_not_string(field: &ColumnRef, ty: LogicalType, expected_use: &'static str) -> Result<(), ValidationError> {
    if ty == LogicalType::String {
        Err(ValidationError::TypeMismatch {
            field: field.as_str().to_string(),
            actual: ty,
            expected_use,
        })
    } else {
        Ok(())
    }
}

/// Validate a specification's field references against a manifest
/// (spec §4.8). Runs independently of and before the analytical engine's
/// own parse/plan pass.
pub fn validate(spec: &Specification, manifest: &Manifest) -> Result<(), ValidationError> {
    let schema = Schema::build(spec, manifest)?;

    for step in &spec.population.steps {
        match &step.action {
            StepAction::FilterComparison { field, .. } => {
                schema.resolve(field)?;
            }
            StepAction::FilterInList { field, .. } => {
                schema.resolve(field)?;
            }
            StepAction::FilterIsNull { field, .. } => {
                schema.resolve(field)?;
            }
            StepAction::JoinLeft { .. } => {}
        }
    }

    for assertion in &spec.assertions {
        validate_assertion(assertion, &schema)?;
    }

    Ok(())
}

fn validate_assertion(assertion: &Assertion, schema: &Schema) -> Result<(), ValidationError> {
    match &assertion.kind {
        AssertionKind::ValueMatch { field, .. } => {
            schema.resolve(field)?;
        }
        AssertionKind::ColumnComparison {
            left_field,
            right_field,
            ..
        } => {
            schema.resolve(left_field)?;
            schema.resolve(right_field)?;
        }
        AssertionKind::TemporalDateMath {
            base_date_field,
            target_date_field,
            ..
        } => {
            let base_ty = schema.resolve(base_date_field)?;
            let target_ty = schema.resolve(target_date_field)?;
            check_not_string(base_date_field, base_ty, "date arithmetic")?;
            check_not_string(target_date_field, target_ty, "date arithmetic")?;
        }
        AssertionKind::Aggregation {
            group_by_fields,
            metric_field,
            ..
        } => {
            for field in group_by_fields {
                schema.resolve(&ColumnRef::new(field.clone()))?;
            }
            let metric_ty = schema.resolve(metric_field)?;
            check_not_string(metric_field, metric_ty, "numeric aggregation")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_manifest::{ManifestEntry, SourceMetadata};
    use attest_protocol::{
        AggregationFunction, EvidenceConfig, Governance, Operator, ReviewerWorkflow, Scalar,
        TestingFrequency,
    };
    use attest_spec::{Population, PipelineStep};
    use chrono::Utc;

    fn governance() -> Governance {
        Governance {
            control_id: "CTRL-TEST".to_string(),
            version: "1.0.0".to_string(),
            owner_role: "Owner".to_string(),
            testing_frequency: TestingFrequency::Quarterly,
            regulatory_citations: vec![],
            risk_objective: "test".to_string(),
        }
    }

    fn evidence() -> EvidenceConfig {
        EvidenceConfig {
            retention_years: 1,
            reviewer_workflow: ReviewerWorkflow::AutoCloseIfPass,
            exception_routing_queue: "queue".to_string(),
        }
    }

    fn source() -> SourceMetadata {
        SourceMetadata {
            origin_system: "test".to_string(),
            extraction_instant: Utc::now(),
            schema_version: "1".to_string(),
        }
    }

    fn manifest(columns: Vec<(&str, LogicalType)>) -> Manifest {
        let entry = ManifestEntry::new(
            DatasetAlias::new("trades"),
            "/data/trades.parquet",
            "abc",
            10,
            columns.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
            source(),
        );
        Manifest::from_entries(vec![entry]).unwrap()
    }

    #[test]
    fn missing_column_reports_closest_matches() {
        let population = Population {
            base_dataset: DatasetAlias::new("trades"),
            steps: vec![PipelineStep {
                step_id: "s1".to_string(),
                action: StepAction::FilterComparison {
                    field: ColumnRef::new("trade_statuz"),
                    operator: Operator::Eq,
                    value: Scalar::String("SETTLED".to_string()),
                },
            }],
            sampling: None,
        };
        let assertion = Assertion {
            assertion_id: "a1".to_string(),
            description: "d".to_string(),
            materiality_threshold_percent: 0.0,
            kind: AssertionKind::ColumnComparison {
                left_field: ColumnRef::new("trade_date"),
                operator: Operator::Eq,
                right_field: ColumnRef::new("trade_date"),
            },
        };
        let spec = Specification::new(governance(), vec![], population, vec![assertion], evidence()).unwrap();
        let manifest = manifest(vec![
            ("trade_status", LogicalType::String),
            ("trade_date", LogicalType::Date),
        ]);

        let err = validate(&spec, &manifest).unwrap_err();
        match err {
            ValidationError::SchemaDrift { field, suggestions, .. } => {
                assert_eq!(field, "trade_statuz");
                assert!(suggestions.contains(&"trade_status".to_string()));
            }
            other => panic!("expected SchemaDrift, got {other:?}"),
        }
    }

    #[test]
    fn date_arithmetic_on_string_column_is_type_mismatch() {
        let population = Population {
            base_dataset: DatasetAlias::new("trades"),
            steps: vec![],
            sampling: None,
        };
        let assertion = Assertion {
            assertion_id: "a1".to_string(),
            description: "d".to_string(),
            materiality_threshold_percent: 0.0,
            kind: AssertionKind::TemporalDateMath {
                base_date_field: ColumnRef::new("trade_status"),
                operator: Operator::Lte,
                target_date_field: ColumnRef::new("trade_status"),
                offset_days: 1,
            },
        };
        let spec = Specification::new(governance(), vec![], population, vec![assertion], evidence()).unwrap();
        let manifest = manifest(vec![("trade_status", LogicalType::String)]);

        assert!(matches!(
            validate(&spec, &manifest),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn numeric_aggregation_on_string_metric_is_type_mismatch() {
        let population = Population {
            base_dataset: DatasetAlias::new("trades"),
            steps: vec![],
            sampling: None,
        };
        let assertion = Assertion {
            assertion_id: "a1".to_string(),
            description: "d".to_string(),
            materiality_threshold_percent: 0.0,
            kind: AssertionKind::Aggregation {
                group_by_fields: vec!["trade_date".to_string()],
                metric_field: ColumnRef::new("trade_status"),
                aggregation_function: AggregationFunction::Sum,
                operator: Operator::Gte,
                threshold: 1.0,
            },
        };
        let spec = Specification::new(governance(), vec![], population, vec![assertion], evidence()).unwrap();
        let manifest = manifest(vec![
            ("trade_status", LogicalType::String),
            ("trade_date", LogicalType::Date),
        ]);

        assert!(matches!(
            validate(&spec, &manifest),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn well_formed_specification_validates_cleanly() {
        let population = Population {
            base_dataset: DatasetAlias::new("trades"),
            steps: vec![],
            sampling: None,
        };
        let assertion = Assertion {
            assertion_id: "a1".to_string(),
            description: "d".to_string(),
            materiality_threshold_percent: 0.0,
            kind: AssertionKind::ColumnComparison {
                left_field: ColumnRef::new("trade_date"),
                operator: Operator::Eq,
                right_field: ColumnRef::new("trade_date"),
            },
        };
        let spec = Specification::new(governance(), vec![], population, vec![assertion], evidence()).unwrap();
        let manifest = manifest(vec![
            ("trade_status", LogicalType::String),
            ("trade_date", LogicalType::Date),
        ]);
        assert!(validate(&spec, &manifest).is_ok());
    }
}
