//! Tests for the orchestrator

use super::*;
use crate::config::PipelineConfig;
use crate::database::{DuckDbStore, TableStore};
use crate::error::{ErrorKind, Result};
use crate::extract::sink::{latest_file, read_records, write_json, write_records};
use crate::state::WatermarkKind;
use crate::types::{LoadMode, Record};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn config_in(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.data_dir = dir.path().join("data");
    config.paths.state_dir = dir.path().join("state");
    config.paths.database = dir.path().join("db").join("zendesk.duckdb");
    config
}

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn names(list: &[&str]) -> Option<Vec<String>> {
    Some(list.iter().map(|s| (*s).to_string()).collect())
}

async fn seed_raw(config: &PipelineConfig, resource: &str, file: &str, values: Vec<Value>) {
    write_records(&config.paths.raw_dir(resource), file, &records(values))
        .await
        .unwrap();
}

fn row_count(config: &PipelineConfig, table: &str) -> Result<u64> {
    DuckDbStore::open(&config.paths.database)?.row_count(table)
}

// ============================================================================
// Type Tests
// ============================================================================

#[test]
fn test_phase_set() {
    let all = PhaseSet::all();
    assert!(all.contains(Phase::Extract) && all.contains(Phase::Load));

    let only = PhaseSet::only(Phase::Load);
    assert!(!only.contains(Phase::Extract));
    assert!(only.contains(Phase::Load));

    let skipped = PhaseSet::all()
        .without(Phase::Extract)
        .without(Phase::Transform)
        .without(Phase::Load);
    assert!(skipped.is_empty());
}

#[test]
fn test_outcome_display_and_status() {
    let err = crate::error::Error::store("disk full");
    let failed = ResourceOutcome::failed(&err);
    assert!(!failed.is_ok());
    assert_eq!(failed.to_string(), "FAILED [store_error] Store error: disk full");

    assert!(ResourceOutcome::skipped("nothing new").is_ok());
    assert_eq!(
        ResourceOutcome::blocked("ticket_fields transform").to_string(),
        "blocked by ticket_fields transform"
    );

    let mut report = PipelineReport::default();
    report.push("users", Phase::Load, ResourceOutcome::succeeded("3 rows"));
    assert!(report.is_success());
    report.push("tickets", Phase::Load, failed);
    assert!(!report.is_success());
    assert_eq!(report.failures().len(), 1);
    assert!(report.outcome("users", Phase::Load).unwrap().is_ok());
    assert!(report.outcome("users", Phase::Extract).is_none());
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_resource_is_config_error() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(config_in(&dir)).unwrap();
    let options = RunOptions {
        phases: PhaseSet::only(Phase::Load),
        resources: names(&["widgets"]),
        ..RunOptions::default()
    };

    let err = pipeline.run(&options).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
}

#[tokio::test]
async fn test_extract_without_credentials_fails_before_io() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(config_in(&dir)).unwrap();

    let err = pipeline.run(&RunOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn test_transform_and_load_from_existing_files() {
    let dir = tempdir().unwrap();
    let config = config_in(&dir);
    seed_raw(
        &config,
        "organizations",
        "organizations_until_1704067200.json",
        vec![
            json!({"id": 1, "name": "Acme", "updated_at": "2024-01-01T00:00:00Z"}),
            json!({"id": 2, "name": "Globex", "updated_at": "2024-01-01T00:00:00Z"}),
            json!({"id": 1, "name": "Acme Inc", "updated_at": "2024-01-01T06:00:00Z"}),
        ],
    )
    .await;

    let pipeline = Pipeline::new(config.clone()).unwrap();
    let options = RunOptions {
        phases: PhaseSet::all().without(Phase::Extract),
        mode: LoadMode::Incremental,
        resources: names(&["organizations"]),
    };
    let report = pipeline.run(&options).await.unwrap();

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.results.len(), 2);
    assert_eq!(row_count(&config, "organizations").unwrap(), 2);

    let transformed = latest_file(&config.paths.transformed_dir("organizations"), "organizations")
        .await
        .unwrap()
        .unwrap();
    let rows = read_records(&transformed).await.unwrap();
    assert_eq!(rows[0]["organization_id"], 1);
    assert_eq!(rows[0]["name"], "Acme Inc");

    let watermark = pipeline
        .watermarks()
        .load(WatermarkKind::Load, "organizations")
        .await
        .unwrap();
    assert_eq!(watermark, Some(1_704_088_800));
}

#[tokio::test]
async fn test_tickets_transform_pulls_in_ticket_fields() {
    let dir = tempdir().unwrap();
    let config = config_in(&dir);
    seed_raw(
        &config,
        "ticket_fields",
        "ticket_fields_100.json",
        vec![json!({"id": 10, "title": "Product", "type": "text"})],
    )
    .await;
    seed_raw(
        &config,
        "tickets",
        "tickets_until_200.json",
        vec![json!({
            "id": 1,
            "subject": "Broken",
            "updated_at": "2024-01-01T00:00:00Z",
            "custom_fields": [{"id": 10, "value": "widget"}]
        })],
    )
    .await;

    let pipeline = Pipeline::new(config.clone()).unwrap();
    let options = RunOptions {
        phases: PhaseSet::only(Phase::Transform),
        resources: names(&["tickets"]),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert!(report.is_success(), "{report:?}");
    let order: Vec<&str> = report.results.iter().map(|r| r.resource.as_str()).collect();
    assert_eq!(order, vec!["ticket_fields", "tickets"]);

    let file = latest_file(&config.paths.transformed_dir("tickets"), "tickets")
        .await
        .unwrap()
        .unwrap();
    let rows = read_records(&file).await.unwrap();
    assert_eq!(rows[0]["custom_fields"], json!({"Product": "widget"}));

    let map = latest_file(&config.paths.transformed_dir("ticket_fields"), "field_map")
        .await
        .unwrap();
    assert!(map.is_some());
}

#[tokio::test]
async fn test_persisted_field_map_is_used_when_fields_not_rerun() {
    let dir = tempdir().unwrap();
    let mut config = config_in(&dir);
    config.resources.retain(|r| r.name != "ticket_fields");
    for resource in &mut config.resources {
        resource.requires.clear();
    }
    write_json(
        &config.paths.transformed_dir("ticket_fields"),
        "field_map_50.json",
        &json!({"10": "Region"}),
    )
    .await
    .unwrap();
    seed_raw(
        &config,
        "tickets",
        "tickets_until_200.json",
        vec![json!({"id": 1, "custom_fields": [{"id": 10, "value": "emea"}]})],
    )
    .await;

    let pipeline = Pipeline::new(config.clone()).unwrap();
    let options = RunOptions {
        phases: PhaseSet::only(Phase::Transform),
        resources: names(&["tickets"]),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();
    assert!(report.is_success(), "{report:?}");

    let file = latest_file(&config.paths.transformed_dir("tickets"), "tickets")
        .await
        .unwrap()
        .unwrap();
    let rows = read_records(&file).await.unwrap();
    assert_eq!(rows[0]["custom_fields"], json!({"Region": "emea"}));
}

#[tokio::test]
async fn test_failed_prerequisite_blocks_dependent_transform() {
    let dir = tempdir().unwrap();
    let config = config_in(&dir);
    // no ticket_fields raw file on disk
    seed_raw(
        &config,
        "tickets",
        "tickets_until_200.json",
        vec![json!({"id": 1, "subject": "x"})],
    )
    .await;
    seed_raw(
        &config,
        "users",
        "users_until_200.json",
        vec![json!({"id": 7, "name": "Ann"})],
    )
    .await;

    let pipeline = Pipeline::new(config.clone()).unwrap();
    let options = RunOptions {
        phases: PhaseSet::all().without(Phase::Extract),
        resources: names(&["users", "tickets"]),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.outcome("ticket_fields", Phase::Transform),
        Some(ResourceOutcome::Failed { kind: ErrorKind::StoreError, .. })
    ));
    assert_eq!(
        report.outcome("tickets", Phase::Transform),
        Some(&ResourceOutcome::blocked("ticket_fields transform"))
    );
    assert_eq!(
        report.outcome("tickets", Phase::Load),
        Some(&ResourceOutcome::blocked("tickets transform"))
    );
    // independent resources still complete
    assert!(report.outcome("users", Phase::Load).unwrap().is_ok());
    assert_eq!(row_count(&config, "users").unwrap(), 1);
}

#[tokio::test]
async fn test_load_only_without_files_fails() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(config_in(&dir)).unwrap();
    let options = RunOptions {
        phases: PhaseSet::only(Phase::Load),
        resources: names(&["users"]),
        ..RunOptions::default()
    };

    let report = pipeline.run(&options).await.unwrap();
    assert!(matches!(
        report.outcome("users", Phase::Load),
        Some(ResourceOutcome::Failed { kind: ErrorKind::StoreError, .. })
    ));
}
