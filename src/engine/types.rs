//! Orchestrator types
//!
//! Phase selection, per-resource outcomes and the run report.

use crate::error::{Error, ErrorKind};
use crate::types::LoadMode;
use serde::Serialize;
use std::path::PathBuf;

/// One step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extract,
    Transform,
    Load,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Extract => f.write_str("extract"),
            Phase::Transform => f.write_str("transform"),
            Phase::Load => f.write_str("load"),
        }
    }
}

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSet {
    pub extract: bool,
    pub transform: bool,
    pub load: bool,
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self::all()
    }
}

impl PhaseSet {
    pub fn all() -> Self {
        Self {
            extract: true,
            transform: true,
            load: true,
        }
    }

    pub fn only(phase: Phase) -> Self {
        Self {
            extract: phase == Phase::Extract,
            transform: phase == Phase::Transform,
            load: phase == Phase::Load,
        }
    }

    /// Remove a phase
    #[must_use]
    pub fn without(mut self, phase: Phase) -> Self {
        match phase {
            Phase::Extract => self.extract = false,
            Phase::Transform => self.transform = false,
            Phase::Load => self.load = false,
        }
        self
    }

    pub fn contains(&self, phase: Phase) -> bool {
        match phase {
            Phase::Extract => self.extract,
            Phase::Transform => self.transform,
            Phase::Load => self.load,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.extract || self.transform || self.load)
    }
}

/// What a run should do
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub phases: PhaseSet,
    /// Load mode passed to the upserter
    pub mode: LoadMode,
    /// Restrict the run to these resources (all configured ones when `None`)
    pub resources: Option<Vec<String>>,
}

/// Input handed from one phase to the next
///
/// A skipped upstream phase yields a placeholder; the downstream phase then
/// picks the newest file already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Produced(PathBuf),
    Placeholder,
}

/// Result of one phase for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceOutcome {
    Succeeded {
        detail: String,
    },
    /// Nothing to do (e.g. the watermark already covers the stop time)
    Skipped {
        reason: String,
    },
    Failed {
        #[serde(serialize_with = "serialize_kind")]
        kind: ErrorKind,
        message: String,
    },
    /// Not attempted because a prerequisite failed
    Blocked {
        by: String,
    },
}

fn serialize_kind<S: serde::Serializer>(kind: &ErrorKind, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(kind)
}

impl ResourceOutcome {
    pub fn succeeded(detail: impl Into<String>) -> Self {
        Self::Succeeded {
            detail: detail.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn blocked(by: impl Into<String>) -> Self {
        Self::Blocked { by: by.into() }
    }

    /// Downstream phases may run
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Skipped { .. })
    }
}

impl std::fmt::Display for ResourceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded { detail } => write!(f, "ok ({detail})"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::Failed { kind, message } => write!(f, "FAILED [{kind}] {message}"),
            Self::Blocked { by } => write!(f, "blocked by {by}"),
        }
    }
}

/// Outcome of one (resource, phase) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseResult {
    pub resource: String,
    pub phase: Phase,
    pub outcome: ResourceOutcome,
}

/// Everything a run did, in execution order
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub results: Vec<PhaseResult>,
}

impl PipelineReport {
    pub fn push(&mut self, resource: &str, phase: Phase, outcome: ResourceOutcome) {
        self.results.push(PhaseResult {
            resource: resource.to_string(),
            phase,
            outcome,
        });
    }

    /// Outcome of a phase for a resource, if it ran in this report
    pub fn outcome(&self, resource: &str, phase: Phase) -> Option<&ResourceOutcome> {
        self.results
            .iter()
            .find(|r| r.resource == resource && r.phase == phase)
            .map(|r| &r.outcome)
    }

    /// Failed or blocked entries
    pub fn failures(&self) -> Vec<&PhaseResult> {
        self.results.iter().filter(|r| !r.outcome.is_ok()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }
}
