//! The scalar value model (spec §3 "Scalar Value", §4.1 "Value Model").

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tagged scalar value. Null is a first-class variant, never a sentinel —
/// callers that need to compare against null must rewrite to `IS NULL` /
/// `IS NOT NULL` themselves (see `attest_sql`); nothing in this crate treats
/// `Scalar::Null` as equal to any other value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Null,
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// The scalar kind's name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Boolean(_) => "boolean",
            Scalar::Date(_) => "date",
            Scalar::Timestamp(_) => "timestamp",
            Scalar::Null => "null",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Boolean(b) => write!(f, "{b}"),
            Scalar::Date(d) => write!(f, "{d}"),
            Scalar::Timestamp(t) => write!(f, "{t}"),
            Scalar::Null => write!(f, "NULL"),
        }
    }
}

/// Comparison/membership operators. Spec §3 restricts which operators are
/// admissible for each assertion/filter kind; this enum is deliberately the
/// full union and admissibility is enforced at the call sites that know the
/// construct (`attest_spec`), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl Operator {
    /// The six ordered/equality operators usable in `FilterComparison` and
    /// as the base set for `ValueMatch`.
    pub const ORDERED: &'static [Operator] = &[
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
    ];

    pub fn is_ordered(self) -> bool {
        Self::ORDERED.contains(&self)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::Neq)
    }

    pub fn is_membership(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Canonical SQL infix form. `In`/`NotIn` render as `IN`/`NOT IN`, which
    /// callers splice a parenthesized list after.
    pub fn sql_infix(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Neq => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_infix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_operators_are_a_subset_of_all() {
        for op in Operator::ORDERED {
            assert!(op.is_ordered());
        }
        assert!(!Operator::In.is_ordered());
        assert!(!Operator::NotIn.is_ordered());
    }

    #[test]
    fn null_is_its_own_kind() {
        assert!(Scalar::Null.is_null());
        assert!(!Scalar::Integer(0).is_null());
    }

    #[test]
    fn sql_infix_forms() {
        assert_eq!(Operator::Eq.sql_infix(), "=");
        assert_eq!(Operator::In.sql_infix(), "IN");
        assert_eq!(Operator::NotIn.sql_infix(), "NOT IN");
    }
}
