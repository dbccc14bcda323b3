//! CLI module
//!
//! Command-line interface for the pipeline.
//!
//! # Commands
//!
//! - `run` - Extract, transform and load (phase subsets via flags)
//! - `watermarks` - Show sync and load watermarks per resource
//! - `resources` - List configured resources

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, RunArgs};
pub use runner::Runner;
