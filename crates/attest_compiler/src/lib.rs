//! Deterministic SQL compiler (spec §4.5–§4.7): turns a validated
//! [`Specification`] and [`Manifest`] into executable analytical SQL.
//!
//! Grounded on the teacher's `casparian_db::sql_guard` (the rendering
//! primitives this crate calls into via `attest_sql`) and
//! `casparian_schema::contract` (a construction-time-validated model feeding
//! a downstream compiler step). Nothing in this crate ever builds a SQL
//! fragment by hand — every literal, identifier, and interval passes
//! through `attest_sql`.

mod assembler;
mod assertion;
mod error;
mod pipeline;

pub use assembler::QueryPlan;
pub use error::CompileError;
pub use pipeline::{CteDef, PipelinePlan};

use assertion::{compile_assertion, CompiledAssertion};
use attest_manifest::Manifest;
use attest_spec::Specification;
use pipeline::compile_pipeline;

/// Compile a specification against a manifest into a single executable
/// query plan (spec §4.5–§4.7).
pub fn compile(spec: &Specification, manifest: &Manifest) -> Result<QueryPlan, CompileError> {
    if !manifest.contains(&spec.population.base_dataset) {
        return Err(CompileError::ManifestMissing(spec.population.base_dataset.clone()));
    }

    let pipeline_plan = compile_pipeline(&spec.population, manifest)?;

    let compiled: Vec<CompiledAssertion> = spec
        .assertions
        .iter()
        .map(compile_assertion)
        .collect::<Result<_, _>>()?;

    assembler::assemble(&pipeline_plan, compiled, spec.population.sampling.as_ref())
}
