//! Assertions: the predicates a control's population must satisfy (spec §3
//! "Assertion").

use attest_protocol::{AggregationFunction, ColumnRef, Operator, Scalar};
use serde::{Deserialize, Serialize};

/// `expected_value: Scalar | [Scalar]` for `ValueMatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedValue {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl ExpectedValue {
    pub fn is_list(&self) -> bool {
        matches!(self, ExpectedValue::List(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExpectedValue::Scalar(Scalar::Null))
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            ExpectedValue::List(values) => Some(values.as_slice()),
            ExpectedValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ExpectedValue::Scalar(s) => Some(s),
            ExpectedValue::List(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "assertion_type", rename_all = "snake_case", deny_unknown_fields)]
pub enum AssertionKind {
    ValueMatch {
        field: ColumnRef,
        operator: Operator,
        expected_value: ExpectedValue,
        #[serde(default = "default_ignore_case_and_space")]
        ignore_case_and_space: bool,
    },
    ColumnComparison {
        left_field: ColumnRef,
        operator: Operator,
        right_field: ColumnRef,
    },
    TemporalDateMath {
        base_date_field: ColumnRef,
        operator: Operator,
        target_date_field: ColumnRef,
        offset_days: i64,
    },
    Aggregation {
        group_by_fields: Vec<String>,
        metric_field: ColumnRef,
        aggregation_function: AggregationFunction,
        operator: Operator,
        threshold: f64,
    },
}

impl AssertionKind {
    pub fn is_aggregation(&self) -> bool {
        matches!(self, AssertionKind::Aggregation { .. })
    }
}

fn default_ignore_case_and_space() -> bool {
    true
}

/// Every assertion carries an id, description, and materiality threshold in
/// addition to its discriminated kind (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assertion {
    pub assertion_id: String,
    pub description: String,
    pub materiality_threshold_percent: f64,
    pub kind: AssertionKind,
}

impl Assertion {
    pub fn is_aggregation(&self) -> bool {
        self.kind.is_aggregation()
    }
}
