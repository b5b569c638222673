//! Control Specification model (spec §3, §4.2).
//!
//! A closed algebra of pipeline steps and assertions whose validity is
//! enforced at construction time. This is the sole input contract to the
//! compiler — nothing downstream re-validates a `Specification`.
//!
//! Grounded on the teacher's `casparian_schema::contract` module: a
//! construction-time-validated, serializable model with a path-bearing
//! rejection type (`SchemaViolation` there, [`SpecInvalid`] here).

mod assertion;
mod error;
mod pipeline;
mod spec;

pub use assertion::{Assertion, AssertionKind, ExpectedValue};
pub use error::SpecInvalid;
pub use pipeline::{PipelineStep, Population, SamplingMethod, SamplingStrategy, StepAction};
pub use spec::Specification;
