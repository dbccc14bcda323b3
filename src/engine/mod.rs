//! Orchestration module
//!
//! Runs extract, transform and load for each configured resource.
//!
//! # Overview
//!
//! - `Pipeline` - runs any subset of the three phases
//! - `PhaseSet` / `RunOptions` - what a run does
//! - `PipelineReport` - one `ResourceOutcome` per resource and phase
//!
//! Phases run in order over all selected resources. A skipped phase hands a
//! placeholder downstream, which makes the next phase read the newest file
//! already on disk. A failed step blocks the later phases of its resource, and
//! a failed `ticket_fields` transform blocks the `tickets` transform.

mod pipeline;
mod types;

pub use pipeline::Pipeline;
pub use types::{
    Artifact, Phase, PhaseResult, PhaseSet, PipelineReport, ResourceOutcome, RunOptions,
};

#[cfg(test)]
mod tests;
