//! Query assembler (spec §4.7): combines the pipeline plan and the compiled
//! assertions into final SQL text, choosing row-level or aggregation shape.

use crate::assertion::CompiledAssertion;
use crate::error::CompileError;
use crate::pipeline::PipelinePlan;
use attest_spec::SamplingStrategy;

/// The assembled query plus the structured CTE metadata the schema
/// validator consumes to resolve field references.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub sql: String,
    pub cte_aliases: Vec<String>,
    pub final_alias: String,
    pub is_aggregation: bool,
    with_clause: String,
    population_filters: String,
    group_by_fields: Option<Vec<String>>,
}

impl QueryPlan {
    /// The row count query the engine runs before the main query (spec
    /// §4.9): population filters only, no exception predicates. In the
    /// aggregation shape this counts distinct group keys instead of rows.
    pub fn population_count_sql(&self) -> String {
        match &self.group_by_fields {
            Some(group_by) => format!(
                "WITH {}\nSELECT COUNT(*) FROM (SELECT DISTINCT {} FROM {} WHERE {})",
                self.with_clause,
                group_by.join(", "),
                self.final_alias,
                self.population_filters,
            ),
            None => format!(
                "WITH {}\nSELECT COUNT(*) FROM {} WHERE {}",
                self.with_clause, self.final_alias, self.population_filters,
            ),
        }
    }
}

pub fn assemble(
    pipeline: &PipelinePlan,
    assertions: Vec<CompiledAssertion>,
    sampling: Option<&SamplingStrategy>,
) -> Result<QueryPlan, CompileError> {
    let with_clause = pipeline
        .ctes
        .iter()
        .map(|c| c.render())
        .collect::<Vec<_>>()
        .join(",\n");

    let aggregation = assertions
        .iter()
        .find(|a| matches!(a, CompiledAssertion::Aggregation { .. }));

    let group_by_fields = match aggregation {
        Some(CompiledAssertion::Aggregation { group_by_fields, .. }) => Some(group_by_fields.clone()),
        _ => None,
    };

    let sql = if let Some(CompiledAssertion::Aggregation {
        group_by_fields,
        metric_field,
        aggregation_function,
        having_predicate,
    }) = aggregation
    {
        assemble_aggregation(
            pipeline,
            group_by_fields,
            metric_field,
            *aggregation_function,
            having_predicate,
            &with_clause,
        )
    } else {
        assemble_row_level(pipeline, &assertions, sampling, &with_clause)?
    };

    let population_filters = if pipeline.population_filters.is_empty() {
        "1=1".to_string()
    } else {
        pipeline.population_filters.join(" AND ")
    };

    Ok(QueryPlan {
        sql,
        cte_aliases: pipeline.ctes.iter().map(|c| c.alias.clone()).collect(),
        final_alias: pipeline.final_alias.clone(),
        is_aggregation: aggregation.is_some(),
        with_clause,
        population_filters,
        group_by_fields,
    })
}

fn assemble_row_level(
    pipeline: &PipelinePlan,
    assertions: &[CompiledAssertion],
    sampling: Option<&SamplingStrategy>,
    with_clause: &str,
) -> Result<String, CompileError> {
    let population_filters = if pipeline.population_filters.is_empty() {
        "1=1".to_string()
    } else {
        pipeline.population_filters.join(" AND ")
    };

    let exception_predicates = assertions
        .iter()
        .map(|a| match a {
            CompiledAssertion::RowLevel { exception_predicate } => exception_predicate.as_str(),
            CompiledAssertion::Aggregation { .. } => {
                unreachable!("row-level and aggregation assertions never coexist per spec construction")
            }
        })
        .collect::<Vec<_>>()
        .join(" OR ");

    let sampling_clause = sampling.map(render_sampling_clause).unwrap_or_default();

    Ok(format!(
        "WITH {with_clause}\nSELECT *\nFROM {}{sampling_clause}\nWHERE ({population_filters}) AND ({exception_predicates})",
        pipeline.final_alias,
    ))
}

fn assemble_aggregation(
    pipeline: &PipelinePlan,
    group_by_fields: &[String],
    metric_field: &str,
    aggregation_function: attest_protocol::AggregationFunction,
    having_predicate: &str,
    with_clause: &str,
) -> String {
    let population_filters = if pipeline.population_filters.is_empty() {
        "1=1".to_string()
    } else {
        pipeline.population_filters.join(" AND ")
    };

    let group_by = group_by_fields.join(", ");
    let agg_alias = format!(
        "{}_{}",
        aggregation_function.sql_name().to_lowercase(),
        metric_field.rsplit('.').next().unwrap_or(metric_field)
    );

    format!(
        "WITH {with_clause}\nSELECT {group_by},\n       COUNT(*) AS exception_count,\n       {}({metric_field}) AS {agg_alias}\nFROM {}\nWHERE {population_filters}\nGROUP BY {group_by}\nHAVING {having_predicate}",
        aggregation_function.sql_name(),
        pipeline.final_alias,
    )
}

fn render_sampling_clause(sampling: &SamplingStrategy) -> String {
    let amount = match (sampling.sample_size, sampling.sample_percentage) {
        (Some(n), None) => format!("{n} ROWS"),
        (None, Some(pct)) => format!("{pct}%"),
        _ => unreachable!("SpecInvalid guarantees exactly one of sample_size/sample_percentage"),
    };
    let repeatable = sampling
        .random_seed
        .map(|seed| format!(" REPEATABLE ({seed})"))
        .unwrap_or_default();
    format!(" TABLESAMPLE RESERVOIR({amount}){repeatable}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CteDef;
    use attest_spec::SamplingMethod;

    fn pipeline() -> PipelinePlan {
        PipelinePlan {
            ctes: vec![CteDef {
                alias: "base".to_string(),
                body: "SELECT * FROM read_parquet('/data/trades.parquet')".to_string(),
            }],
            population_filters: vec!["base.trade_status = 'SETTLED'".to_string()],
            final_alias: "base".to_string(),
        }
    }

    #[test]
    fn row_level_shape_combines_filters_and_exceptions() {
        let assertions = vec![CompiledAssertion::RowLevel {
            exception_predicate: "(base.flag) IS NOT TRUE".to_string(),
        }];
        let plan = assemble(&pipeline(), assertions, None).unwrap();
        assert!(plan.sql.contains("WHERE (base.trade_status = 'SETTLED') AND ((base.flag) IS NOT TRUE)"));
        assert!(!plan.is_aggregation);
    }

    #[test]
    fn sampling_clause_requires_repeatable_when_seeded() {
        let sampling = SamplingStrategy {
            method: SamplingMethod::Random,
            sample_size: Some(250),
            sample_percentage: None,
            random_seed: Some(42),
            justification: "quarterly walkthrough".to_string(),
        };
        let assertions = vec![CompiledAssertion::RowLevel {
            exception_predicate: "(base.flag) IS NOT TRUE".to_string(),
        }];
        let plan = assemble(&pipeline(), assertions, Some(&sampling)).unwrap();
        assert!(plan.sql.contains("TABLESAMPLE RESERVOIR(250 ROWS) REPEATABLE (42)"));
    }

    #[test]
    fn aggregation_shape_emits_having() {
        let assertions = vec![CompiledAssertion::Aggregation {
            group_by_fields: vec!["base.calculation_date".to_string()],
            metric_field: "base.current_balance".to_string(),
            aggregation_function: attest_protocol::AggregationFunction::Sum,
            having_predicate: "(SUM(base.current_balance) >= 50000000.0) IS NOT TRUE".to_string(),
        }];
        let plan = assemble(&pipeline(), assertions, None).unwrap();
        assert!(plan.sql.contains("GROUP BY base.calculation_date"));
        assert!(plan.sql.contains("HAVING (SUM(base.current_balance) >= 50000000.0) IS NOT TRUE"));
        assert!(plan.is_aggregation);
    }
}
