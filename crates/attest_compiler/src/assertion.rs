//! Assertion compiler (spec §4.6): each assertion becomes a boolean
//! expression `E`; the exception predicate is `(E) IS NOT TRUE`.

use crate::error::CompileError;
use attest_protocol::{Operator, Scalar};
use attest_spec::{Assertion, AssertionKind, ExpectedValue};
use attest_sql::{render_day_interval, render_literal, render_qualified_identifier};

/// A compiled assertion: the expression itself plus enough metadata for the
/// assembler to pick row-level vs. aggregation shape.
pub enum CompiledAssertion {
    RowLevel { exception_predicate: String },
    Aggregation {
        group_by_fields: Vec<String>,
        metric_field: String,
        aggregation_function: attest_protocol::AggregationFunction,
        having_predicate: String,
    },
}

/// Compile one assertion into its boolean expression and wrap it as
/// `(E) IS NOT TRUE` unless it is the aggregation shape, which is itself a
/// `HAVING` predicate (already final — the assembler does not re-wrap it).
pub fn compile_assertion(assertion: &Assertion) -> Result<CompiledAssertion, CompileError> {
    match &assertion.kind {
        AssertionKind::ValueMatch {
            field,
            operator,
            expected_value,
            ignore_case_and_space,
        } => {
            let expr = compile_value_match(field.as_str(), *operator, expected_value, *ignore_case_and_space)?;
            Ok(CompiledAssertion::RowLevel {
                exception_predicate: format!("({expr}) IS NOT TRUE"),
            })
        }
        AssertionKind::ColumnComparison {
            left_field,
            operator,
            right_field,
        } => {
            let left = render_qualified_identifier(left_field.as_str())?;
            let right = render_qualified_identifier(right_field.as_str())?;
            let expr = format!("{left} {} {right}", operator.sql_infix());
            Ok(CompiledAssertion::RowLevel {
                exception_predicate: format!("({expr}) IS NOT TRUE"),
            })
        }
        AssertionKind::TemporalDateMath {
            base_date_field,
            operator,
            target_date_field,
            offset_days,
        } => {
            let base = render_qualified_identifier(base_date_field.as_str())?;
            let target = render_qualified_identifier(target_date_field.as_str())?;
            let interval = render_day_interval(*offset_days);
            let expr = format!(
                "CAST({base} AS DATE) {} CAST({target} AS DATE) + {interval}",
                operator.sql_infix()
            );
            Ok(CompiledAssertion::RowLevel {
                exception_predicate: format!("({expr}) IS NOT TRUE"),
            })
        }
        AssertionKind::Aggregation {
            group_by_fields,
            metric_field,
            aggregation_function,
            operator,
            threshold,
        } => {
            let metric = render_qualified_identifier(metric_field.as_str())?;
            let group_by = group_by_fields
                .iter()
                .map(|f| render_qualified_identifier(f))
                .collect::<Result<Vec<_>, _>>()?;
            let expr = format!(
                "{}({metric}) {} {}",
                aggregation_function.sql_name(),
                operator.sql_infix(),
                render_threshold(*threshold),
            );
            Ok(CompiledAssertion::Aggregation {
                group_by_fields: group_by,
                metric_field: metric,
                aggregation_function: *aggregation_function,
                having_predicate: format!("({expr}) IS NOT TRUE"),
            })
        }
    }
}

fn compile_value_match(
    field: &str,
    operator: Operator,
    expected: &ExpectedValue,
    ignore_case_and_space: bool,
) -> Result<String, CompileError> {
    let column = render_qualified_identifier(field)?;

    if expected.is_null() {
        return Ok(match operator {
            Operator::Eq => format!("{column} IS NULL"),
            Operator::Neq => format!("{column} IS NOT NULL"),
            _ => unreachable!("SpecInvalid guarantees only eq/neq reach here with a null expected_value"),
        });
    }

    if let Some(values) = expected.as_list() {
        let rendered = values
            .iter()
            .map(render_literal)
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let verb = operator.sql_infix();
        return Ok(format!("{column} {verb} ({rendered})"));
    }

    let scalar = expected.as_scalar().expect("non-null, non-list ExpectedValue is a Scalar");
    let fold = ignore_case_and_space && matches!(scalar, Scalar::String(_));
    let lhs = if fold {
        format!("TRIM(UPPER(CAST({column} AS VARCHAR)))")
    } else {
        column
    };
    let rhs = if fold {
        let Scalar::String(s) = scalar else {
            unreachable!("fold is only set for Scalar::String")
        };
        render_literal(&Scalar::String(s.trim().to_uppercase()))?
    } else {
        render_literal(scalar)?
    };
    Ok(format!("{lhs} {} {rhs}", operator.sql_infix()))
}

fn render_threshold(threshold: f64) -> String {
    if threshold.fract() == 0.0 && threshold.is_finite() {
        format!("{threshold:.1}")
    } else {
        format!("{threshold}")
    }
}
