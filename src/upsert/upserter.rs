//! Checkpointed batch upserter
//!
//! Loads flattened rows into a [`TableStore`] in bounded transactions and
//! advances the load watermark only once every batch has committed.

use super::types::{LoadOptions, LoadReport};
use crate::database::TableStore;
use crate::error::{Error, Result, ResultExt};
use crate::schema::{coerce_rows, Cell, ColumnSchema, ColumnType, SchemaInferrer, TableSchema};
use crate::state::{WatermarkKind, WatermarkStore};
use crate::timestamp::{format_epoch, parse_timestamp};
use crate::types::{LoadMode, Row, LOADED_AT_COLUMN};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Loads rows and maintains the per-table load watermark
#[derive(Debug, Clone)]
pub struct BatchUpserter {
    watermarks: WatermarkStore,
}

impl BatchUpserter {
    pub fn new(watermarks: WatermarkStore) -> Self {
        Self { watermarks }
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// Load `rows` into `options.table`
    ///
    /// A failing batch aborts the load with its own transaction rolled back;
    /// earlier batches stay committed and the load watermark is left untouched,
    /// so the next run re-covers them through the primary key.
    pub async fn load<S>(
        &self,
        store: &mut S,
        mut rows: Vec<Row>,
        options: &LoadOptions,
    ) -> Result<LoadReport>
    where
        S: TableStore + ?Sized,
    {
        if options.batch_size == 0 {
            return Err(Error::invalid_value(
                "load.batch_size",
                "must be greater than zero",
            ));
        }

        let table = options.table.as_str();
        let key = options.watermark_key();
        let previous = self.watermarks.load(WatermarkKind::Load, key).await?;
        let last = previous.unwrap_or(0);
        let loaded_at = Utc::now();

        let mut report = LoadReport {
            table: table.to_string(),
            rows_received: rows.len(),
            previous_watermark: previous,
            ..LoadReport::default()
        };

        info!(
            "Loading {} rows into '{}' ({} mode)",
            rows.len(),
            table,
            options.mode
        );
        if last > 0 {
            info!("Last load watermark for '{}': {}", key, format_epoch(last));
        } else {
            info!("No previous load for '{}', loading all rows", key);
        }

        let stamp = Value::String(loaded_at.to_rfc3339_opts(SecondsFormat::Micros, true));
        for row in &mut rows {
            row.insert(LOADED_AT_COLUMN.to_string(), stamp.clone());
        }

        let existing = store.table_schema(table)?;
        let mut max_updated: Option<i64> = None;

        if rows.is_empty() && existing.is_none() {
            debug!("No rows and no table '{}', nothing to create", table);
        } else {
            let plan = plan_table(&rows, existing.as_ref(), options);

            if options.mode == LoadMode::Incremental && last > 0 {
                let before = rows.len();
                rows.retain(|row| {
                    updated_at(row, options.updated_at_column.as_deref()).map_or(true, |ts| ts > last)
                });
                report.rows_filtered = before - rows.len();
                if report.rows_filtered > 0 {
                    info!(
                        "Filtered out {} rows of '{}' (already loaded)",
                        report.rows_filtered, table
                    );
                }
            }

            max_updated = rows
                .iter()
                .filter_map(|row| updated_at(row, options.updated_at_column.as_deref()))
                .max();

            // Every check runs before the table is touched
            let (cells, warnings) = coerce_rows(table, &plan.schema, &rows)?;
            report.warnings.extend(warnings);

            let columns = plan.schema.names();
            let primary_key =
                key_columns(&plan.schema, &options.primary_key, table, !rows.is_empty())?;
            let cells = collapse_duplicates(cells, &columns, &primary_key, &mut report);

            apply_plan(store, table, &plan, &options.primary_key, &mut report)?;

            let replace =
                existing.is_some() && options.mode == LoadMode::Full && options.replace_on_full;
            report.rows_loaded = write_batches(
                store,
                table,
                &columns,
                &primary_key,
                &cells,
                options.batch_size,
                replace,
                &mut report,
            )?;
        }

        report.saved_watermark = self
            .advance_watermark(key, last, report.rows_loaded, max_updated, loaded_at)
            .await?;

        info!("Loaded {} rows into '{}'", report.rows_loaded, table);
        Ok(report)
    }

    async fn advance_watermark(
        &self,
        key: &str,
        last: i64,
        rows_loaded: usize,
        max_updated: Option<i64>,
        loaded_at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let now = loaded_at.timestamp().max(last);
        let next = match max_updated {
            Some(max) if max > last => Some(max),
            None if rows_loaded > 0 => {
                warn!(
                    "No update timestamps among {} loaded rows of '{}', using current time",
                    rows_loaded, key
                );
                Some(now)
            }
            _ if rows_loaded == 0 && last == 0 => Some(now),
            _ => None,
        };

        if let Some(value) = next {
            self.watermarks
                .save(WatermarkKind::Load, key, value)
                .await?;
            info!("Saved load watermark for '{}': {}", key, format_epoch(value));
        }
        Ok(next)
    }
}

/// Table changes a load needs, computed without touching the store
#[derive(Debug)]
struct TablePlan {
    /// Schema rows are written with
    schema: TableSchema,
    /// The table does not exist yet
    create: bool,
    /// Columns to append to an existing table
    missing: Vec<ColumnSchema>,
}

fn plan_table(rows: &[Row], existing: Option<&TableSchema>, options: &LoadOptions) -> TablePlan {
    let inferred = SchemaInferrer::new()
        .with_text_fields(options.text_fields.iter().cloned())
        .with_sample_size(options.sample_size)
        .without_boolean_detection(identifier_columns(rows, &options.primary_key))
        .with_column_type(LOADED_AT_COLUMN, ColumnType::Timestamp)
        .infer(rows);
    if !inferred.boolean_fields.is_empty() {
        debug!(
            "Boolean columns of '{}': {:?}",
            options.table, inferred.boolean_fields
        );
    }

    let Some(existing) = existing else {
        return TablePlan {
            schema: inferred.schema,
            create: true,
            missing: Vec::new(),
        };
    };

    let missing = inferred.schema.missing_from(existing);
    // Existing column names and types win over the inferred ones
    let schema = TableSchema::new(
        inferred
            .schema
            .columns
            .into_iter()
            .map(|column| match existing.get(&column.name) {
                Some(current) => current.clone(),
                None => column,
            })
            .collect(),
    );
    TablePlan {
        schema,
        create: false,
        missing,
    }
}

/// Create the table or append its missing columns
fn apply_plan<S>(
    store: &mut S,
    table: &str,
    plan: &TablePlan,
    primary_key: &[String],
    report: &mut LoadReport,
) -> Result<()>
where
    S: TableStore + ?Sized,
{
    if plan.create {
        info!("Creating table '{}' with {} columns", table, plan.schema.len());
        store.create_table(table, &plan.schema, primary_key)?;
        report.created_table = true;
        return Ok(());
    }

    if !plan.missing.is_empty() {
        info!(
            "Adding {} columns to '{}': {}",
            plan.missing.len(),
            table,
            plan.missing
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        store.add_columns(table, &plan.missing)?;
        report.added_columns = plan.missing.iter().map(|c| c.name.clone()).collect();
    }
    Ok(())
}

/// Write `cells` in batches; with `replace`, the first batch empties the table
/// inside its own transaction
#[allow(clippy::too_many_arguments)]
fn write_batches<S>(
    store: &mut S,
    table: &str,
    columns: &[String],
    primary_key: &[String],
    cells: &[Vec<Cell>],
    batch_size: usize,
    replace: bool,
    report: &mut LoadReport,
) -> Result<usize>
where
    S: TableStore + ?Sized,
{
    if replace {
        info!("Replacing existing rows of '{}' (full load)", table);
        if cells.is_empty() {
            store
                .upsert_batch(table, columns, primary_key, &[], true)
                .with_context(|| format!("Failed to truncate '{table}'"))?;
            report.truncated = true;
            return Ok(0);
        }
    }

    let total_batches = cells.len().div_ceil(batch_size);
    let mut written = 0;

    for (idx, batch) in cells.chunks(batch_size).enumerate() {
        let truncate_first = replace && idx == 0;
        let committed = store
            .upsert_batch(table, columns, primary_key, batch, truncate_first)
            .with_context(|| {
                format!(
                    "Batch {} of {} failed for '{table}' after {written} rows",
                    idx + 1,
                    total_batches
                )
            })?;
        if truncate_first {
            report.truncated = true;
        }
        written += committed;
        report.batches += 1;
        debug!("Committed batch {}/{} for '{}'", idx + 1, total_batches, table);
    }

    Ok(written)
}

/// Parsed update time of a row in Unix seconds
fn updated_at(row: &Row, column: Option<&str>) -> Option<i64> {
    column
        .and_then(|c| row.get(c))
        .and_then(parse_timestamp)
        .map(|ts| ts.timestamp())
}

/// Key columns and `id`-like columns are never classified boolean
fn identifier_columns(rows: &[Row], primary_key: &[String]) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = primary_key.iter().cloned().collect();
    for row in rows {
        for key in row.keys() {
            let lower = key.to_ascii_lowercase();
            if lower == "id" || lower.ends_with("_id") {
                names.insert(key.clone());
            }
        }
    }
    names
}

/// Resolve the primary key against the write schema
fn key_columns(
    schema: &TableSchema,
    primary_key: &[String],
    table: &str,
    has_rows: bool,
) -> Result<Vec<String>> {
    let mut resolved = Vec::with_capacity(primary_key.len());
    for key in primary_key {
        match schema.get(key) {
            Some(column) => resolved.push(column.name.clone()),
            None if has_rows => {
                return Err(Error::store(format!(
                    "Primary key column '{key}' is missing from rows for '{table}'"
                )))
            }
            None => {}
        }
    }
    Ok(resolved)
}

/// Keep one row per primary key, the last one seen, at its first position
fn collapse_duplicates(
    cells: Vec<Vec<Cell>>,
    columns: &[String],
    primary_key: &[String],
    report: &mut LoadReport,
) -> Vec<Vec<Cell>> {
    if primary_key.is_empty() {
        return cells;
    }

    let positions: Vec<usize> = primary_key
        .iter()
        .filter_map(|k| columns.iter().position(|c| c == k))
        .collect();

    let mut index: HashMap<String, usize> = HashMap::with_capacity(cells.len());
    let mut out: Vec<Vec<Cell>> = Vec::with_capacity(cells.len());
    for row in cells {
        let key = positions
            .iter()
            .map(|&p| format!("{:?}", row[p]))
            .collect::<Vec<_>>()
            .join("\u{1f}");
        match index.get(&key) {
            Some(&slot) => {
                out[slot] = row;
                report.rows_collapsed += 1;
            }
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }

    if report.rows_collapsed > 0 {
        warn!(
            "Collapsed {} rows with duplicate primary keys in '{}'",
            report.rows_collapsed, report.table
        );
    }
    out
}
