//! Pipeline compiler (spec §4.5): turns a [`Population`] into population
//! filter fragments, an ordered list of join CTEs, and the final alias the
//! assembler selects from.

use crate::error::CompileError;
use attest_manifest::Manifest;
use attest_protocol::Scalar;
use attest_spec::{Population, StepAction};
use attest_sql::{render_identifier, render_literal, render_qualified_identifier};
use std::collections::HashSet;

/// The table function used to read a dataset's backing file. The teacher's
/// DuckDB sink reads Parquet; every dataset in this workspace is evidence
/// extracted to columnar files, so `read_parquet` is the only convention
/// this compiler emits.
fn columnar_reader_fn() -> &'static str {
    "read_parquet"
}

/// One emitted `WITH` clause entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub alias: String,
    pub body: String,
}

impl CteDef {
    pub fn render(&self) -> String {
        format!("{} AS ({})", self.alias, self.body)
    }
}

/// Output of the pipeline compiler: everything the assembler needs to build
/// a `FROM`/`WHERE` clause, plus everything the schema validator needs to
/// resolve field references against the right dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelinePlan {
    pub ctes: Vec<CteDef>,
    pub population_filters: Vec<String>,
    pub final_alias: String,
}

/// Compile a population pipeline against a manifest (spec §4.5's algorithm).
pub fn compile_pipeline(population: &Population, manifest: &Manifest) -> Result<PipelinePlan, CompileError> {
    let base_path = manifest.path_of(&population.base_dataset)?;
    let mut ctes = vec![CteDef {
        alias: "base".to_string(),
        body: format!(
            "SELECT * FROM {}('{}')",
            columnar_reader_fn(),
            base_path.display()
        ),
    }];
    let mut current_alias = "base".to_string();
    let mut population_filters = Vec::new();

    // Tracks the non-key column names visible on the current rowset, so a
    // later JoinLeft can detect a collision against a column introduced by
    // an earlier join rather than just the base dataset.
    let mut visible_columns: HashSet<String> = manifest
        .columns_of(&population.base_dataset)?
        .iter()
        .map(|(name, _)| name.clone())
        .collect();

    for step in &population.steps {
        match &step.action {
            StepAction::FilterComparison { field, operator, value } => {
                population_filters.push(render_comparison_filter(field.as_str(), *operator, value)?);
            }
            StepAction::FilterInList { field, values } => {
                population_filters.push(render_in_list_filter(field.as_str(), values)?);
            }
            StepAction::FilterIsNull { field, is_null } => {
                let column = render_qualified_identifier(field.as_str())?;
                population_filters.push(if *is_null {
                    format!("{column} IS NULL")
                } else {
                    format!("{column} IS NOT NULL")
                });
            }
            StepAction::JoinLeft {
                left_dataset: _,
                right_dataset,
                left_keys,
                right_keys,
            } => {
                let right_path = manifest.path_of(right_dataset)?;
                let right_columns = manifest.columns_of(right_dataset)?;

                let on_clauses: Vec<String> = left_keys
                    .iter()
                    .zip(right_keys.iter())
                    .map(|(l, r)| {
                        let l = render_identifier(l)?;
                        let r = render_identifier(r)?;
                        Ok::<_, CompileError>(format!("{current_alias}.{l} = right.{r}"))
                    })
                    .collect::<Result<_, _>>()?;

                let right_key_set: HashSet<&str> = right_keys.iter().map(String::as_str).collect();
                for (name, _) in right_columns {
                    if right_key_set.contains(name.as_str()) {
                        continue;
                    }
                    if visible_columns.contains(name) {
                        return Err(CompileError::ColumnCollision {
                            step_id: step.step_id.clone(),
                            column: name.clone(),
                        });
                    }
                    visible_columns.insert(name.clone());
                }

                let exclude_list = right_keys
                    .iter()
                    .map(|k| render_identifier(k))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");

                let step_alias = render_identifier(&step.step_id)?;
                let body = format!(
                    "SELECT {current_alias}.*, right.* EXCLUDE ({exclude_list}) FROM {current_alias} LEFT JOIN {}('{}') AS right ON {}",
                    columnar_reader_fn(),
                    right_path.display(),
                    on_clauses.join(" AND "),
                );
                ctes.push(CteDef { alias: step_alias.clone(), body });
                current_alias = step_alias;
            }
        }
    }

    Ok(PipelinePlan {
        ctes,
        population_filters,
        final_alias: current_alias,
    })
}

fn render_comparison_filter(
    field: &str,
    operator: attest_protocol::Operator,
    value: &Scalar,
) -> Result<String, CompileError> {
    let column = render_qualified_identifier(field)?;
    if value.is_null() {
        return Ok(match operator {
            attest_protocol::Operator::Eq => format!("{column} IS NULL"),
            attest_protocol::Operator::Neq => format!("{column} IS NOT NULL"),
            _ => unreachable!("SpecInvalid guarantees only eq/neq reach here with a null value"),
        });
    }
    let literal = render_literal(value)?;
    Ok(format!("{column} {} {literal}", operator.sql_infix()))
}

fn render_in_list_filter(field: &str, values: &[Scalar]) -> Result<String, CompileError> {
    let column = render_qualified_identifier(field)?;
    let rendered = values
        .iter()
        .map(render_literal)
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!("{column} IN ({rendered})"))
}
