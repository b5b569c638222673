//! Column references and dataset aliases (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable identifier mapping one-to-one to a Manifest entry. Unique within
/// a specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetAlias(String);

impl DatasetAlias {
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DatasetAlias {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DatasetAlias {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Either an unqualified field name or a `dataset_alias.name` qualified
/// reference (spec §3 "Column Reference").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnRef(String);

impl ColumnRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Splits a qualified reference into `(dataset_alias, column)`; returns
    /// `None` for unqualified references.
    pub fn qualifier(&self) -> Option<(&str, &str)> {
        self.0.split_once('.')
    }

    pub fn is_qualified(&self) -> bool {
        self.qualifier().is_some()
    }

    /// The bare column name: everything after the last `.` if qualified,
    /// otherwise the whole reference.
    pub fn column_name(&self) -> &str {
        match self.qualifier() {
            Some((_, col)) => col,
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ColumnRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_reference_splits() {
        let r = ColumnRef::new("trades.trade_date");
        assert_eq!(r.qualifier(), Some(("trades", "trade_date")));
        assert_eq!(r.column_name(), "trade_date");
        assert!(r.is_qualified());
    }

    #[test]
    fn unqualified_reference_has_no_qualifier() {
        let r = ColumnRef::new("trade_date");
        assert_eq!(r.qualifier(), None);
        assert_eq!(r.column_name(), "trade_date");
        assert!(!r.is_qualified());
    }
}
