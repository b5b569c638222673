//! The Control Specification itself and its construction-time invariants
//! (spec §3 "Control Specification", §4.2).

use crate::assertion::{Assertion, AssertionKind, ExpectedValue};
use crate::error::SpecInvalid;
use crate::pipeline::{Population, SamplingStrategy, StepAction};
use attest_protocol::{EvidenceConfig, Governance, OntologyBinding, Operator, Scalar};
use serde::{Deserialize, Serialize};

/// `{governance, ontology_bindings, population, assertions, evidence}`,
/// `extra_fields` forbidden. The only way to obtain one is
/// [`Specification::from_document`] or [`Specification::new`], both of
/// which run [`Specification::validate`] before returning — construction is
/// pure and idempotent, and an invalid document never produces a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Specification {
    pub governance: Governance,
    #[serde(default)]
    pub ontology_bindings: Vec<OntologyBinding>,
    pub population: Population,
    pub assertions: Vec<Assertion>,
    pub evidence: EvidenceConfig,
}

impl Specification {
    /// Construct and validate a specification from an already-typed value.
    pub fn new(
        governance: Governance,
        ontology_bindings: Vec<OntologyBinding>,
        population: Population,
        assertions: Vec<Assertion>,
        evidence: EvidenceConfig,
    ) -> Result<Self, SpecInvalid> {
        let spec = Specification {
            governance,
            ontology_bindings,
            population,
            assertions,
            evidence,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Construct and validate a specification from an untrusted JSON
    /// document. Unknown discriminator tags, absent required fields, and
    /// unknown keys are rejected by `serde` itself (the closed-schema
    /// guarantee is structural, not a post-hoc check); everything else in
    /// spec §4.2's list is enforced by [`Specification::validate`].
    pub fn from_document(doc: serde_json::Value) -> Result<Self, SpecInvalid> {
        let spec: Specification = serde_json::from_value(doc)
            .map_err(|e| SpecInvalid::new(e.to_string(), Vec::new()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Run every structural invariant in spec §4.2. Does not require a
    /// Manifest — dataset/manifest cross-checks belong to the compiler and
    /// schema validator, which are the components that actually see the
    /// Manifest.
    pub fn validate(&self) -> Result<(), SpecInvalid> {
        if self.assertions.is_empty() {
            return Err(SpecInvalid::at(
                "assertions must be non-empty",
                &["assertions"],
            ));
        }

        for (i, step) in self.population.steps.iter().enumerate() {
            let step_path = format!("population.steps.{i}");
            validate_step(&step.action, &step_path)?;
        }

        let mut aggregation_count = 0usize;
        let mut row_level_count = 0usize;
        for (i, assertion) in self.assertions.iter().enumerate() {
            let path = format!("assertions.{i}");
            validate_assertion(assertion, &path)?;
            if assertion.is_aggregation() {
                aggregation_count += 1;
            } else {
                row_level_count += 1;
            }
        }
        if aggregation_count > 1 {
            return Err(SpecInvalid::at(
                "at most one aggregation assertion is allowed per specification",
                &["assertions"],
            ));
        }
        if aggregation_count > 0 && row_level_count > 0 {
            return Err(SpecInvalid::at(
                "aggregation and row-level assertions cannot coexist in one specification",
                &["assertions"],
            ));
        }

        if let Some(sampling) = &self.population.sampling {
            validate_sampling(sampling, "population.sampling")?;
        }

        Ok(())
    }
}

fn validate_step(action: &StepAction, path: &str) -> Result<(), SpecInvalid> {
    match action {
        StepAction::FilterInList { values, .. } => {
            if values.is_empty() {
                return Err(SpecInvalid::new(
                    "FilterInList values must be non-empty",
                    vec![format!("{path}.values")],
                ));
            }
        }
        StepAction::JoinLeft {
            left_keys,
            right_keys,
            ..
        } => {
            if left_keys.len() != right_keys.len() {
                return Err(SpecInvalid::new(
                    "JoinLeft left_keys and right_keys must have the same length",
                    vec![format!("{path}.right_keys")],
                ));
            }
            if left_keys.is_empty() {
                return Err(SpecInvalid::new(
                    "JoinLeft requires at least one key pair",
                    vec![format!("{path}.left_keys")],
                ));
            }
        }
        StepAction::FilterComparison { operator, value, .. } => {
            if matches!(value, Scalar::Null) && !operator.is_equality() {
                return Err(SpecInvalid::new(
                    "FilterComparison with a null value requires the eq or neq operator",
                    vec![format!("{path}.value")],
                ));
            }
        }
        StepAction::FilterIsNull { .. } => {}
    }
    Ok(())
}

fn validate_assertion(assertion: &Assertion, path: &str) -> Result<(), SpecInvalid> {
    if !(0.0..=100.0).contains(&assertion.materiality_threshold_percent) {
        return Err(SpecInvalid::new(
            "materiality_threshold_percent must be within [0, 100]",
            vec![format!("{path}.materiality_threshold_percent")],
        ));
    }

    match &assertion.kind {
        AssertionKind::ValueMatch {
            operator,
            expected_value,
            ..
        } => validate_value_match(*operator, expected_value, path)?,
        AssertionKind::Aggregation {
            group_by_fields, ..
        } => {
            if group_by_fields.is_empty() {
                return Err(SpecInvalid::new(
                    "Aggregation group_by_fields must be non-empty",
                    vec![format!("{path}.kind.group_by_fields")],
                ));
            }
        }
        AssertionKind::ColumnComparison { .. } | AssertionKind::TemporalDateMath { .. } => {}
    }
    Ok(())
}

fn validate_value_match(
    operator: Operator,
    expected_value: &ExpectedValue,
    path: &str,
) -> Result<(), SpecInvalid> {
    let value_path = vec![format!("{path}.kind.expected_value")];

    if expected_value.is_null() {
        if !operator.is_equality() {
            return Err(SpecInvalid::new(
                "ValueMatch with a null expected_value requires the eq or neq operator",
                value_path,
            ));
        }
        return Ok(());
    }

    if expected_value.is_list() {
        if !operator.is_membership() {
            return Err(SpecInvalid::new(
                "ValueMatch cannot use an ordered or equality operator with a list expected_value; use in or not_in",
                value_path,
            ));
        }
        if expected_value.as_list().map(<[_]>::is_empty).unwrap_or(false) {
            return Err(SpecInvalid::new(
                "ValueMatch list expected_value must be non-empty",
                value_path,
            ));
        }
        return Ok(());
    }

    // Non-null scalar.
    if operator.is_membership() {
        return Err(SpecInvalid::new(
            "ValueMatch in/not_in operator requires a list expected_value",
            value_path,
        ));
    }

    Ok(())
}

fn validate_sampling(sampling: &SamplingStrategy, path: &str) -> Result<(), SpecInvalid> {
    match (sampling.sample_size, sampling.sample_percentage) {
        (Some(_), Some(_)) => Err(SpecInvalid::new(
            "sampling cannot specify both sample_size and sample_percentage",
            vec![path.to_string()],
        )),
        (None, None) => Err(SpecInvalid::new(
            "sampling must specify exactly one of sample_size or sample_percentage",
            vec![path.to_string()],
        )),
        (Some(size), None) => {
            if size == 0 {
                return Err(SpecInvalid::new(
                    "sample_size must be greater than zero",
                    vec![format!("{path}.sample_size")],
                ));
            }
            Ok(())
        }
        (None, Some(pct)) => {
            if !(pct > 0.0 && pct <= 100.0) {
                return Err(SpecInvalid::new(
                    "sample_percentage must be within (0, 100]",
                    vec![format!("{path}.sample_percentage")],
                ));
            }
            Ok(())
        }
    }
}
