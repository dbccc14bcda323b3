//! Per-resource flattening of raw records into rows

use super::field_map::FieldMap;
use crate::error::DataShapeWarning;
use crate::types::{Record, Row};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::warn;

/// Inputs shared by every flattener
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Stamped into `_transformed_at` where the resource carries it
    pub transformed_at: DateTime<Utc>,
    /// Custom field labels for tickets
    pub field_map: Option<FieldMap>,
}

impl TransformContext {
    pub fn new(transformed_at: DateTime<Utc>) -> Self {
        Self {
            transformed_at,
            field_map: None,
        }
    }

    #[must_use]
    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = Some(field_map);
        self
    }
}

/// Column layout of a resource's rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flattener {
    TicketFields,
    Organizations,
    Users,
    Tickets,
    /// Top-level fields copied as they are
    Generic,
}

impl Flattener {
    pub fn for_resource(name: &str) -> Self {
        match name {
            "ticket_fields" => Flattener::TicketFields,
            "organizations" => Flattener::Organizations,
            "users" => Flattener::Users,
            "tickets" => Flattener::Tickets,
            _ => Flattener::Generic,
        }
    }

    /// Flatten every record, in order
    pub fn flatten(
        self,
        records: &[Record],
        ctx: &TransformContext,
    ) -> (Vec<Row>, Vec<DataShapeWarning>) {
        let mut warnings = Vec::new();
        let rows = match self {
            Flattener::TicketFields => records.iter().map(ticket_field_row).collect(),
            Flattener::Organizations => records.iter().map(organization_row).collect(),
            Flattener::Users => {
                let stamp = ctx
                    .transformed_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true);
                records.iter().map(|r| user_row(r, &stamp)).collect()
            }
            Flattener::Tickets => {
                let mut unlabelled = 0;
                let rows = records
                    .iter()
                    .map(|r| ticket_row(r, ctx.field_map.as_ref(), &mut unlabelled))
                    .collect();
                if unlabelled > 0 {
                    let warning = DataShapeWarning::new(
                        "custom_fields",
                        format!("{unlabelled} custom field ids without a label, keyed by id"),
                    );
                    warn!("{}", warning);
                    warnings.push(warning);
                }
                rows
            }
            Flattener::Generic => records.to_vec(),
        };
        (rows, warnings)
    }
}

fn pick(record: &Record, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

fn ticket_field_row(field: &Record) -> Row {
    let mut row = Map::new();
    row.insert("id".into(), pick(field, "id"));
    for key in [
        "title",
        "type",
        "description",
        "created_at",
        "updated_at",
        "active",
        "required",
    ] {
        row.insert(key.into(), pick(field, key));
    }
    if let Some(options) = field.get("custom_field_options") {
        row.insert("custom_field_options".into(), options.clone());
    }
    row
}

fn organization_row(org: &Record) -> Row {
    let mut row = Map::new();
    row.insert("organization_id".into(), pick(org, "id"));
    for key in ["name", "domain_names", "created_at", "updated_at"] {
        row.insert(key.into(), pick(org, key));
    }
    row
}

fn user_row(user: &Record, transformed_at: &str) -> Row {
    let mut row = Map::new();
    row.insert("user_id".into(), pick(user, "id"));
    for key in [
        "name",
        "email",
        "role",
        "created_at",
        "updated_at",
        "active",
        "verified",
    ] {
        row.insert(key.into(), pick(user, key));
    }
    row.insert(
        "_transformed_at".into(),
        Value::String(transformed_at.to_string()),
    );
    row
}

fn ticket_row(ticket: &Record, field_map: Option<&FieldMap>, unlabelled: &mut usize) -> Row {
    let mut row = Map::new();
    row.insert("ticket_id".into(), pick(ticket, "id"));
    for key in [
        "subject",
        "description",
        "status",
        "priority",
        "created_at",
        "updated_at",
        "organization_id",
    ] {
        row.insert(key.into(), pick(ticket, key));
    }
    for role in ["requester", "assignee", "submitter"] {
        let flat_key = format!("{role}_id");
        row.insert(flat_key.clone(), person_id(ticket, role, &flat_key));
    }
    row.insert(
        "custom_fields".into(),
        custom_fields(ticket, field_map, unlabelled),
    );
    row
}

/// A sideloaded `{role}` object's id wins over the flat `{role}_id`
fn person_id(ticket: &Record, role: &str, flat_key: &str) -> Value {
    ticket
        .get(role)
        .and_then(Value::as_object)
        .and_then(|person| person.get("id"))
        .filter(|id| !id.is_null())
        .cloned()
        .unwrap_or_else(|| pick(ticket, flat_key))
}

/// Render `[{id, value}]` as `{label: value}`; NULL when there are none
fn custom_fields(ticket: &Record, field_map: Option<&FieldMap>, unlabelled: &mut usize) -> Value {
    let Some(fields) = ticket.get("custom_fields").and_then(Value::as_array) else {
        return Value::Null;
    };

    let mut rendered = Map::new();
    for field in fields.iter().filter_map(Value::as_object) {
        let Some(id) = field.get("id").filter(|id| !id.is_null()) else {
            continue;
        };
        let key = match field_map.and_then(|map| map.label(id)) {
            Some(label) => label.to_string(),
            None => {
                *unlabelled += 1;
                match id {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            }
        };
        rendered.insert(key, pick(field, "value"));
    }

    if rendered.is_empty() {
        Value::Null
    } else {
        Value::Object(rendered)
    }
}
