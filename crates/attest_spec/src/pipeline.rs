//! Population pipeline: base dataset, steps, optional sampling (spec §3
//! "Pipeline Step", "Sampling Strategy").

use attest_protocol::{ColumnRef, DatasetAlias, Operator, Scalar};
use serde::{Deserialize, Serialize};

/// `(step_id, action)`. `step_id` is unique within a specification and
/// names the CTE the pipeline compiler emits for `JoinLeft` steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineStep {
    pub step_id: String,
    pub action: StepAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case", deny_unknown_fields)]
pub enum StepAction {
    FilterComparison {
        field: ColumnRef,
        operator: Operator,
        value: Scalar,
    },
    FilterInList {
        field: ColumnRef,
        values: Vec<Scalar>,
    },
    FilterIsNull {
        field: ColumnRef,
        is_null: bool,
    },
    JoinLeft {
        left_dataset: DatasetAlias,
        right_dataset: DatasetAlias,
        left_keys: Vec<String>,
        right_keys: Vec<String>,
    },
}

/// `method ∈ {random, stratified, systematic}` with exactly one of
/// `sample_size` / `sample_percentage` set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    Random,
    Stratified,
    Systematic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingStrategy {
    pub method: SamplingMethod,
    #[serde(default)]
    pub sample_size: Option<u64>,
    #[serde(default)]
    pub sample_percentage: Option<f64>,
    #[serde(default)]
    pub random_seed: Option<i64>,
    pub justification: String,
}

/// `{base_dataset, steps, sampling?}` (spec §3 "Control Specification").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Population {
    pub base_dataset: DatasetAlias,
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
    #[serde(default)]
    pub sampling: Option<SamplingStrategy>,
}
