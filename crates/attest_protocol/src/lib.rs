//! Canonical value, reference, governance, and report types shared across
//! the control-verification core.
//!
//! This is the crate every other crate in the workspace depends on — the
//! same role `casparian_protocol` plays for Casparian Flow: one place for
//! the enums and newtypes that must mean the same thing everywhere.

mod governance;
mod reference;
mod report;
mod value;

pub use governance::{
    AggregationFunction, EvidenceConfig, Governance, LogicalType, OntologyBinding,
    ReviewerWorkflow, TestingFrequency,
};
pub use reference::{ColumnRef, DatasetAlias};
pub use report::{ErrorKind, ExceptionRecord, ExecutionReport, Verdict};
pub use value::{Operator, Scalar};
