//! `SpecInvalid` — the one error a Control Specification can raise during
//! construction (spec §4.2). Never reaches the compiler or engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A construction-time rejection of a candidate specification document.
///
/// `path` is the field-path that triggered the rejection, e.g.
/// `["population", "steps", "1", "right_keys"]`, following the same
/// nested-context idiom as the teacher's `SchemaViolation`
/// (`file_path` / `row` / `column` attached to a single error value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecInvalid {
    pub reason: String,
    pub path: Vec<String>,
}

impl SpecInvalid {
    pub fn new(reason: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            reason: reason.into(),
            path,
        }
    }

    pub fn at(reason: impl Into<String>, path: &[&str]) -> Self {
        Self::new(reason, path.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for SpecInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{} (at {})", self.reason, self.path.join("."))
        }
    }
}

impl std::error::Error for SpecInvalid {}
