//! CLI commands and argument parsing

use crate::engine::{Phase, PhaseSet};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental help-desk ETL
#[derive(Parser, Debug)]
#[command(name = "zendesk-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run extract, transform and load
    Run(RunArgs),

    /// Show sync and load watermarks per resource
    Watermarks,

    /// List configured resources
    Resources,
}

/// Arguments of the `run` command
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Only extract raw records
    #[arg(long, conflicts_with_all = ["transform_only", "load_only"])]
    pub extract_only: bool,

    /// Only transform the newest raw files
    #[arg(long, conflicts_with = "load_only")]
    pub transform_only: bool,

    /// Only load the newest transformed files
    #[arg(long)]
    pub load_only: bool,

    #[arg(long)]
    pub skip_extract: bool,

    #[arg(long)]
    pub skip_transform: bool,

    #[arg(long)]
    pub skip_load: bool,

    /// Load only rows newer than the load watermark instead of replacing tables
    #[arg(long)]
    pub incremental: bool,

    /// Resources to process (comma-separated, empty = all)
    #[arg(long, value_delimiter = ',')]
    pub resources: Option<Vec<String>>,
}

impl RunArgs {
    /// Phases selected by the flags
    pub fn phases(&self) -> PhaseSet {
        let mut phases = if self.extract_only {
            PhaseSet::only(Phase::Extract)
        } else if self.transform_only {
            PhaseSet::only(Phase::Transform)
        } else if self.load_only {
            PhaseSet::only(Phase::Load)
        } else {
            PhaseSet::all()
        };
        for (skip, phase) in [
            (self.skip_extract, Phase::Extract),
            (self.skip_transform, Phase::Transform),
            (self.skip_load, Phase::Load),
        ] {
            if skip {
                phases = phases.without(phase);
            }
        }
        phases
    }

    /// Requested resources with blanks removed; `None` means all
    pub fn resource_names(&self) -> Option<Vec<String>> {
        self.resources.as_ref().map(|names| {
            names
                .iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|names| !names.is_empty())
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one document per line)
    Json,
    /// Human-readable output
    Pretty,
}
