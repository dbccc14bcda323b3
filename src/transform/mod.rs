//! Transform module
//!
//! Turns one extracted batch of raw records into load-ready rows: duplicates
//! are collapsed first, then each record is flattened into the resource's
//! column layout. The ticket fields transform also yields the field map the
//! tickets transform uses to label custom fields.

mod field_map;
mod flatten;

pub use field_map::{FieldMap, FIELD_MAP_PREFIX};
pub use flatten::{Flattener, TransformContext};

use crate::config::ResourceConfig;
use crate::dedup::deduplicate;
use crate::error::DataShapeWarning;
use crate::types::{Record, Row};
use tracing::info;

/// Rows produced for one resource
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub rows: Vec<Row>,
    /// Present for `ticket_fields`
    pub field_map: Option<FieldMap>,
    /// Records dropped as older duplicates
    pub duplicates_removed: usize,
    pub warnings: Vec<DataShapeWarning>,
}

/// Deduplicate and flatten the raw records of `resource`
pub fn transform_records(
    resource: &ResourceConfig,
    records: Vec<Record>,
    ctx: &TransformContext,
) -> TransformOutput {
    let received = records.len();
    let dedup = deduplicate(
        records,
        &resource.dedup_key,
        resource.updated_at_field.as_deref(),
    );
    if dedup.removed > 0 {
        info!(
            "Removed {} duplicate {} records ({} -> {})",
            dedup.removed,
            resource.name,
            received,
            dedup.records.len()
        );
    }

    let flattener = Flattener::for_resource(&resource.name);
    let (rows, flatten_warnings) = flattener.flatten(&dedup.records, ctx);
    let field_map =
        (flattener == Flattener::TicketFields).then(|| FieldMap::from_records(&dedup.records));

    let mut warnings = dedup.warnings;
    warnings.extend(flatten_warnings);

    TransformOutput {
        rows,
        field_map,
        duplicates_removed: dedup.removed,
        warnings,
    }
}
