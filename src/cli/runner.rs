//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, RunArgs};
use crate::config::PipelineConfig;
use crate::engine::{Pipeline, PipelineReport, RunOptions};
use crate::error::Result;
use crate::state::{WatermarkKind, WatermarkStore};
use crate::timestamp::format_epoch;
use crate::types::LoadMode;
use serde_json::{json, Value};
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    ///
    /// Returns `Ok(false)` when a pipeline run finished with failed or blocked
    /// resources.
    pub async fn run(&self) -> Result<bool> {
        let config = self.load_config()?;
        match &self.cli.command {
            Commands::Run(args) => self.run_pipeline(config, args).await,
            Commands::Watermarks => {
                self.watermarks(&config).await?;
                Ok(true)
            }
            Commands::Resources => {
                self.resources(&config);
                Ok(true)
            }
        }
    }

    /// Config file (or defaults), then environment overrides, then validation
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.cli.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_env();
        config.validate()?;
        debug!("Using data dir {}", config.paths.data_dir.display());
        Ok(config)
    }

    async fn run_pipeline(&self, config: PipelineConfig, args: &RunArgs) -> Result<bool> {
        let options = RunOptions {
            phases: args.phases(),
            mode: LoadMode::from_flag(args.incremental),
            resources: args.resource_names(),
        };
        let report = Pipeline::new(config)?.run(&options).await?;
        self.print_report(&report);
        Ok(report.is_success())
    }

    async fn watermarks(&self, config: &PipelineConfig) -> Result<()> {
        let store = WatermarkStore::new(&config.paths.state_dir);
        let mut rows = Vec::with_capacity(config.resources.len());
        for resource in &config.resources {
            let sync = store.load(WatermarkKind::Sync, &resource.name).await?;
            let load = store
                .load(WatermarkKind::Load, resource.table_name())
                .await?;
            rows.push(json!({
                "resource": resource.name,
                "table": resource.table_name(),
                "sync": sync,
                "load": load,
            }));
        }

        match self.cli.format {
            OutputFormat::Json => self.output_message(&json!({
                "type": "WATERMARKS",
                "watermarks": rows
            })),
            OutputFormat::Pretty => {
                for row in &rows {
                    println!(
                        "{:<16} sync {:<22} load {}",
                        row["resource"].as_str().unwrap_or_default(),
                        describe_watermark(&row["sync"]),
                        describe_watermark(&row["load"])
                    );
                }
            }
        }
        Ok(())
    }

    fn resources(&self, config: &PipelineConfig) {
        match self.cli.format {
            OutputFormat::Json => self.output_message(&json!({
                "type": "RESOURCES",
                "resources": config.resources
            })),
            OutputFormat::Pretty => {
                for resource in &config.resources {
                    let endpoint = if resource.is_incremental() {
                        "incremental"
                    } else {
                        "simple"
                    };
                    println!(
                        "{:<16} {:<12} table={} key=({})",
                        resource.name,
                        endpoint,
                        resource.table_name(),
                        resource.primary_key.join(", ")
                    );
                }
            }
        }
    }

    fn print_report(&self, report: &PipelineReport) {
        match self.cli.format {
            OutputFormat::Json => self.output_message(&json!({
                "type": "REPORT",
                "success": report.is_success(),
                "results": report.results
            })),
            OutputFormat::Pretty => {
                for result in &report.results {
                    println!(
                        "{:<16} {:<10} {}",
                        result.resource,
                        result.phase.to_string(),
                        result.outcome
                    );
                }
                if report.is_success() {
                    println!("Pipeline finished successfully");
                } else {
                    println!(
                        "Pipeline finished with {} failed or blocked steps",
                        report.failures().len()
                    );
                }
            }
        }
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        println!("{}", serde_json::to_string(msg).unwrap_or_default());
    }
}

fn describe_watermark(value: &Value) -> String {
    match value.as_i64() {
        Some(ts) => format!("{ts} ({})", format_epoch(ts)),
        None => "-".to_string(),
    }
}
