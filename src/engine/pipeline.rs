//! Extract, transform and load orchestration

use super::types::{Artifact, Phase, PhaseSet, PipelineReport, ResourceOutcome, RunOptions};
use crate::config::{PipelineConfig, ResourceConfig};
use crate::database::DuckDbStore;
use crate::error::{Error, Result};
use crate::extract::sink::{
    latest_file, read_json, read_records, require_latest_file, timestamped_file_name,
    until_file_name, write_json, write_records,
};
use crate::extract::IncrementalFetcher;
use crate::state::{WatermarkKind, WatermarkStore};
use crate::timestamp::{format_epoch, start_of_week};
use crate::transform::{
    transform_records, FieldMap, Flattener, TransformContext, FIELD_MAP_PREFIX,
};
use crate::upsert::{BatchUpserter, LoadOptions};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Runs the pipeline phases over the configured resources
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    watermarks: WatermarkStore,
    fetcher: Option<IncrementalFetcher>,
    /// Fixed clock, used instead of the current time when set
    now: Option<DateTime<Utc>>,
}

impl Pipeline {
    /// Create a pipeline; the configuration is validated here
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let watermarks = WatermarkStore::new(&config.paths.state_dir);
        Ok(Self {
            config,
            watermarks,
            fetcher: None,
            now: None,
        })
    }

    /// Use an existing fetcher instead of building one from the API config
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: IncrementalFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Pin the clock used for stop times and file names
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Execute the selected phases
    ///
    /// Configuration problems are returned as errors before any I/O. Failures
    /// of individual resources are recorded in the report instead; the report
    /// is unsuccessful if anything failed or was blocked.
    pub async fn run(&self, options: &RunOptions) -> Result<PipelineReport> {
        if options.phases.is_empty() {
            return Err(Error::config("No phases selected"));
        }

        let selected = self.select(options.resources.as_deref())?;
        let built_fetcher;
        let fetcher = match (&self.fetcher, options.phases.extract) {
            (Some(fetcher), _) => Some(fetcher),
            (None, true) => {
                self.config.validate_for_extract()?;
                built_fetcher = IncrementalFetcher::from_config(&self.config)?;
                Some(&built_fetcher)
            }
            (None, false) => None,
        };

        let mut report = PipelineReport::default();
        let mut extracted: HashMap<String, Artifact> = HashMap::new();
        let mut transformed: HashMap<String, Artifact> = HashMap::new();
        let mut field_map: Option<FieldMap> = None;

        info!(
            "Starting run: {} ({} mode)",
            phase_list(options.phases),
            options.mode
        );

        // Extract
        for resource in &selected {
            if !options.phases.extract {
                extracted.insert(resource.name.clone(), Artifact::Placeholder);
                continue;
            }
            let Some(fetcher) = fetcher else { continue };
            match self.extract(fetcher, resource).await {
                Ok((artifact, outcome)) => {
                    extracted.insert(resource.name.clone(), artifact);
                    report.push(&resource.name, Phase::Extract, outcome);
                }
                Err(e) => {
                    error!("Extract of {} failed: {}", resource.name, e);
                    report.push(&resource.name, Phase::Extract, ResourceOutcome::failed(&e));
                }
            }
        }

        // Transform (prerequisites included and ordered first)
        let transform_set = if options.phases.transform {
            self.with_prerequisites(&selected)
        } else {
            Vec::new()
        };
        for resource in &transform_set {
            if let Some(by) = transform_blocker(resource, &report) {
                warn!("Transform of {} blocked by {}", resource.name, by);
                report.push(&resource.name, Phase::Transform, ResourceOutcome::blocked(by));
                continue;
            }
            let input = extracted
                .get(&resource.name)
                .cloned()
                .unwrap_or(Artifact::Placeholder);
            match self.transform(resource, &input, &mut field_map).await {
                Ok((artifact, outcome)) => {
                    transformed.insert(resource.name.clone(), artifact);
                    report.push(&resource.name, Phase::Transform, outcome);
                }
                Err(e) => {
                    error!("Transform of {} failed: {}", resource.name, e);
                    report.push(&resource.name, Phase::Transform, ResourceOutcome::failed(&e));
                }
            }
        }

        // Load
        if options.phases.load {
            for resource in &selected {
                let name = resource.name.as_str();
                let blocker = [Phase::Extract, Phase::Transform]
                    .into_iter()
                    .find(|phase| report.outcome(name, *phase).is_some_and(|o| !o.is_ok()));
                if let Some(phase) = blocker {
                    report.push(
                        name,
                        Phase::Load,
                        ResourceOutcome::blocked(format!("{name} {phase}")),
                    );
                    continue;
                }
                let input = transformed
                    .get(name)
                    .cloned()
                    .unwrap_or(Artifact::Placeholder);
                match self.load(resource, &input, options).await {
                    Ok(outcome) => report.push(name, Phase::Load, outcome),
                    Err(e) => {
                        error!("Load of {} failed: {}", name, e);
                        report.push(name, Phase::Load, ResourceOutcome::failed(&e));
                    }
                }
            }
        }

        if report.is_success() {
            info!("Run finished: {} steps succeeded", report.results.len());
        } else {
            warn!(
                "Run finished with {} failed or blocked steps",
                report.failures().len()
            );
        }
        Ok(report)
    }

    // ========================================================================
    // Resource Selection
    // ========================================================================

    /// Resolve requested names to configured resources, in configuration order
    fn select(&self, names: Option<&[String]>) -> Result<Vec<&ResourceConfig>> {
        let Some(names) = names else {
            return Ok(self.config.resources.iter().collect());
        };

        for name in names {
            if self.config.resource(name).is_none() {
                return Err(Error::invalid_value(
                    "resources",
                    format!("unknown resource '{name}'"),
                ));
            }
        }
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        Ok(self
            .config
            .resources
            .iter()
            .filter(|r| wanted.contains(r.name.as_str()))
            .collect())
    }

    /// Selected resources plus everything their transforms require
    fn with_prerequisites<'a>(&'a self, selected: &[&'a ResourceConfig]) -> Vec<&'a ResourceConfig> {
        let mut names: HashSet<&str> = selected.iter().map(|r| r.name.as_str()).collect();
        let mut pending: Vec<&str> = names.iter().copied().collect();
        while let Some(name) = pending.pop() {
            if let Some(resource) = self.config.resource(name) {
                for required in &resource.requires {
                    if names.insert(required.as_str()) {
                        pending.push(required.as_str());
                    }
                }
            }
        }

        // Configuration order, with each resource after its requirements
        let mut ordered: Vec<&ResourceConfig> = Vec::new();
        let mut placed: HashSet<&str> = HashSet::new();
        while ordered.len() < names.len() {
            let before = ordered.len();
            for resource in &self.config.resources {
                let name = resource.name.as_str();
                if names.contains(name)
                    && !placed.contains(name)
                    && resource.requires.iter().all(|r| placed.contains(r.as_str()))
                {
                    placed.insert(name);
                    ordered.push(resource);
                }
            }
            if ordered.len() == before {
                // Requirement cycle: place the rest in configuration order
                for resource in &self.config.resources {
                    if names.contains(resource.name.as_str()) && placed.insert(&resource.name) {
                        ordered.push(resource);
                    }
                }
            }
        }
        ordered
    }

    // ========================================================================
    // Phases
    // ========================================================================

    async fn extract(
        &self,
        fetcher: &IncrementalFetcher,
        resource: &ResourceConfig,
    ) -> Result<(Artifact, ResourceOutcome)> {
        let name = resource.name.as_str();
        let raw_dir = self.config.paths.raw_dir(name);
        let now = self.now();

        if !resource.is_incremental() {
            let outcome = fetcher.fetch_simple(name).await?;
            let file = timestamped_file_name(name, now.timestamp());
            let path = write_records(&raw_dir, &file, &outcome.records).await?;
            info!("Saved {} {} records to {}", outcome.records.len(), name, path.display());
            return Ok((
                Artifact::Produced(path),
                ResourceOutcome::succeeded(format!("{} records", outcome.records.len())),
            ));
        }

        let start = self
            .watermarks
            .load_or_zero(WatermarkKind::Sync, name)
            .await?;
        let stop = resource
            .stop_at_week_start
            .then(|| start_of_week(now).timestamp());

        if let Some(stop) = stop {
            if start >= stop {
                info!(
                    "{} already synced to {}, nothing to extract before {}",
                    name,
                    format_epoch(start),
                    format_epoch(stop)
                );
                return Ok((
                    Artifact::Placeholder,
                    ResourceOutcome::skipped(format!("synced up to {}", format_epoch(start))),
                ));
            }
        }
        if start == 0 {
            warn!("No sync watermark for {}, extracting full history", name);
        }

        if let Some(count_endpoint) = &resource.count_endpoint {
            match fetcher.fetch_count(count_endpoint).await {
                Ok(count) => info!("{} total: {}", name, count.value),
                Err(e) => warn!("Count probe for {} failed: {}", name, e),
            }
        }

        let outcome = fetcher
            .fetch_incremental(name, start, stop, resource.include.as_deref())
            .await?;

        let next_watermark = if outcome.end_of_stream {
            outcome.end_time
        } else if outcome.stopped_early {
            stop
        } else {
            None
        };

        let file = match next_watermark {
            Some(until) => until_file_name(name, until),
            None => timestamped_file_name(name, now.timestamp()),
        };
        let path = write_records(&raw_dir, &file, &outcome.records).await?;
        info!(
            "Saved {} {} records from {} pages to {}",
            outcome.records.len(),
            name,
            outcome.pages,
            path.display()
        );

        match next_watermark {
            Some(value) if value > start => {
                self.watermarks
                    .save(WatermarkKind::Sync, name, value)
                    .await?;
                info!("Sync watermark for {} set to {}", name, format_epoch(value));
            }
            Some(_) => {}
            None => warn!(
                "{} export ended without an end time, sync watermark unchanged",
                name
            ),
        }

        Ok((
            Artifact::Produced(path),
            ResourceOutcome::succeeded(format!(
                "{} records, {} pages",
                outcome.records.len(),
                outcome.pages
            )),
        ))
    }

    async fn transform(
        &self,
        resource: &ResourceConfig,
        input: &Artifact,
        field_map: &mut Option<FieldMap>,
    ) -> Result<(Artifact, ResourceOutcome)> {
        let name = resource.name.as_str();
        let raw_dir = self.config.paths.raw_dir(name);
        let source = resolve(input, &raw_dir, name).await?;
        let records = read_records(&source).await?;
        info!("Transforming {} {} records from {}", records.len(), name, source.display());

        let now = self.now();
        let mut ctx = TransformContext::new(now);
        let flattener = Flattener::for_resource(name);
        if flattener == Flattener::Tickets {
            match field_map.clone() {
                Some(map) => ctx = ctx.with_field_map(map),
                None => match self.latest_field_map().await? {
                    Some(map) => ctx = ctx.with_field_map(map),
                    None => warn!("No field map found, custom fields keyed by id"),
                },
            }
        }

        let output = transform_records(resource, records, &ctx);
        let out_dir = self.config.paths.transformed_dir(name);
        let path = write_records(
            &out_dir,
            &timestamped_file_name(name, now.timestamp()),
            &output.rows,
        )
        .await?;

        if let Some(map) = output.field_map {
            let map_path = write_json(
                &out_dir,
                &timestamped_file_name(FIELD_MAP_PREFIX, now.timestamp()),
                &map.to_value(),
            )
            .await?;
            info!("Saved field map with {} fields to {}", map.len(), map_path.display());
            *field_map = Some(map);
        }

        info!("Saved {} {} rows to {}", output.rows.len(), name, path.display());
        Ok((
            Artifact::Produced(path),
            ResourceOutcome::succeeded(format!(
                "{} rows, {} duplicates removed",
                output.rows.len(),
                output.duplicates_removed
            )),
        ))
    }

    async fn load(
        &self,
        resource: &ResourceConfig,
        input: &Artifact,
        options: &RunOptions,
    ) -> Result<ResourceOutcome> {
        let name = resource.name.as_str();
        let dir = self.config.paths.transformed_dir(name);
        let source = resolve(input, &dir, name).await?;
        let rows = read_records(&source).await?;

        let mut store = DuckDbStore::open(&self.config.paths.database)?;
        let load_options = LoadOptions::for_resource(resource, &self.config.load, options.mode);
        let report = BatchUpserter::new(self.watermarks.clone())
            .load(&mut store, rows, &load_options)
            .await?;

        Ok(ResourceOutcome::succeeded(format!(
            "{} of {} rows loaded into {}",
            report.rows_loaded, report.rows_received, report.table
        )))
    }

    /// Newest persisted field map of the ticket fields resource
    async fn latest_field_map(&self) -> Result<Option<FieldMap>> {
        let owner = self
            .config
            .resources
            .iter()
            .find(|r| Flattener::for_resource(&r.name) == Flattener::TicketFields)
            .map_or("ticket_fields", |r| r.name.as_str());
        let dir = self.config.paths.transformed_dir(owner);
        match latest_file(&dir, FIELD_MAP_PREFIX).await? {
            Some(path) => Ok(Some(FieldMap::from_value(read_json(&path).await?)?)),
            None => Ok(None),
        }
    }
}

/// Why a transform may not run, if it may not
fn transform_blocker(resource: &ResourceConfig, report: &PipelineReport) -> Option<String> {
    if let Some(outcome) = report.outcome(&resource.name, Phase::Extract) {
        if !outcome.is_ok() {
            return Some(format!("{} extract", resource.name));
        }
    }
    resource.requires.iter().find_map(|required| {
        match report.outcome(required, Phase::Transform) {
            Some(outcome) if !outcome.is_ok() => Some(format!("{required} transform")),
            _ => None,
        }
    })
}

/// Path produced upstream, or the newest matching file for a placeholder
async fn resolve(input: &Artifact, dir: &Path, prefix: &str) -> Result<PathBuf> {
    match input {
        Artifact::Produced(path) => Ok(path.clone()),
        Artifact::Placeholder => require_latest_file(dir, prefix).await,
    }
}

fn phase_list(phases: PhaseSet) -> String {
    [Phase::Extract, Phase::Transform, Phase::Load]
        .into_iter()
        .filter(|p| phases.contains(*p))
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" + ")
}
