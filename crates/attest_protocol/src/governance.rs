//! Governance metadata and the other closed enumerations carried by a
//! Control Specification (spec §6 "Input from the translator/orchestrator").

use serde::{Deserialize, Serialize};

/// How often the control is expected to be re-tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TestingFrequency {
    Continuous,
    Daily,
    Weekly,
    Quarterly,
    Annual,
}

/// How an exception is routed once an execution completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewerWorkflow {
    #[serde(rename = "Auto-Close_If_Pass")]
    AutoCloseIfPass,
    #[serde(rename = "Requires_Human_Signoff")]
    RequiresHumanSignoff,
    #[serde(rename = "Four_Eyes_Review")]
    FourEyesReview,
}

/// Governance block (spec §3 "Control Specification", §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Governance {
    pub control_id: String,
    pub version: String,
    pub owner_role: String,
    pub testing_frequency: TestingFrequency,
    pub regulatory_citations: Vec<String>,
    pub risk_objective: String,
}

/// Evidence-handling configuration (spec §3 "Control Specification", §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvidenceConfig {
    pub retention_years: u32,
    pub reviewer_workflow: ReviewerWorkflow,
    pub exception_routing_queue: String,
}

/// `(business_term, dataset_alias, technical_field, logical_type)` — spec §3
/// "Ontology Binding". Non-normative for execution; audit-trail only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OntologyBinding {
    pub business_term: String,
    pub dataset_alias: crate::DatasetAlias,
    pub technical_field: String,
    pub logical_type: LogicalType,
}

/// The closed set of logical column types a Manifest entry may declare
/// (spec §6 "Input from the ingestor").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    String,
    Numeric,
    Boolean,
    Date,
    Timestamp,
}

/// `SUM | COUNT | AVG | MIN | MAX` — spec §3 "Aggregation" assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationFunction {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl AggregationFunction {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggregationFunction::Sum => "SUM",
            AggregationFunction::Count => "COUNT",
            AggregationFunction::Avg => "AVG",
            AggregationFunction::Min => "MIN",
            AggregationFunction::Max => "MAX",
        }
    }
}
