//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: API export pages → raw files → transformed
//! files → DuckDB tables, with watermarks carried between runs.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zendesk_etl::config::PipelineConfig;
use zendesk_etl::database::{DuckDbStore, TableStore};
use zendesk_etl::engine::{Phase, PhaseSet, Pipeline, ResourceOutcome, RunOptions};
use zendesk_etl::state::WatermarkKind;
use zendesk_etl::{ErrorKind, LoadMode};

const JAN_2: i64 = 1_704_153_600;
const JAN_3: i64 = 1_704_240_000;
const JAN_4: i64 = 1_704_326_400;
/// Monday 2024-01-08 00:00:00 UTC
const WEEK_START: i64 = 1_704_672_000;

fn wednesday(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, hour, 0, 0).unwrap()
}

fn config_for(server: &MockServer, dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.api.base_url = Some(server.uri());
    config.api.email = Some("ops@acme.test".to_string());
    config.api.api_token = Some("secret".to_string());
    config.fetch.page_delay_ms = 0;
    config.fetch.default_retry_after_secs = 0;
    config.paths.data_dir = dir.path().join("data");
    config.paths.state_dir = dir.path().join("state");
    config.paths.database = dir.path().join("warehouse.duckdb");
    config
}

/// A final export page: `{resource: records, end_of_stream: true, end_time}`
fn export(resource: &str, records: Value, end_time: i64) -> ResponseTemplate {
    let mut body = json!({
        "end_of_stream": true,
        "end_time": end_time,
        "next_page": null
    });
    body[resource] = records;
    ResponseTemplate::new(200).set_body_json(body)
}

async fn mount_export(server: &MockServer, resource: &str, start: i64, body: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/incremental/{resource}.json")))
        .and(query_param("start_time", start.to_string()))
        .respond_with(body)
        .mount(server)
        .await;
}

async fn mount_catalogue(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ticket_fields.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ticket_fields": [{"id": 10, "title": "Product", "type": "text"}],
            "next_page": null
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tickets/count.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": {"value": 2, "refreshed_at": "2024-01-10T00:00:00Z"}
        })))
        .mount(server)
        .await;

    mount_export(
        server,
        "organizations",
        0,
        export(
            "organizations",
            json!([{"id": 1, "name": "Acme", "updated_at": "2024-01-02T00:00:00Z"}]),
            JAN_2,
        ),
    )
    .await;
    mount_export(server, "organizations", JAN_2, export("organizations", json!([]), JAN_2)).await;

    mount_export(
        server,
        "users",
        0,
        export(
            "users",
            json!([{"id": 7, "name": "Ann", "email": "ann@acme.test", "updated_at": "2024-01-02T00:00:00Z"}]),
            JAN_2,
        ),
    )
    .await;
    mount_export(server, "users", JAN_2, export("users", json!([]), JAN_2)).await;

    Mock::given(method("GET"))
        .and(path("/incremental/tickets.json"))
        .and(query_param("start_time", "0"))
        .and(query_param("include", "users"))
        .respond_with(export(
            "tickets",
            json!([
                {"id": 1, "subject": "First", "updated_at": "2024-01-02T00:00:00Z",
                 "custom_fields": [{"id": 10, "value": "widget"}]},
                {"id": 2, "subject": "Second", "updated_at": "2024-01-01T00:00:00Z",
                 "requester": {"id": 7}},
                {"id": 1, "subject": "First (edited)", "updated_at": "2024-01-02T12:00:00Z",
                 "custom_fields": [{"id": 10, "value": "gadget"}]}
            ]),
            JAN_3,
        ))
        .mount(server)
        .await;
    mount_export(
        server,
        "tickets",
        JAN_3,
        export(
            "tickets",
            json!([{"id": 1, "subject": "Renamed", "updated_at": "2024-01-04T00:00:00Z"}]),
            JAN_4,
        ),
    )
    .await;
}

fn strings(config: &PipelineConfig, sql: &str) -> Vec<String> {
    DuckDbStore::open(&config.paths.database)
        .unwrap()
        .query_strings(sql)
        .unwrap()
}

// ============================================================================
// End-to-End Runs
// ============================================================================

#[tokio::test]
async fn test_full_then_incremental_run() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;
    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);

    // First run: everything, full load
    let pipeline = Pipeline::new(config.clone()).unwrap().with_now(wednesday(9));
    let report = pipeline.run(&RunOptions::default()).await.unwrap();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.results.len(), 12);

    let watermarks = pipeline.watermarks();
    assert_eq!(
        watermarks.load(WatermarkKind::Sync, "tickets").await.unwrap(),
        Some(JAN_3)
    );
    assert_eq!(
        watermarks.load(WatermarkKind::Sync, "users").await.unwrap(),
        Some(JAN_2)
    );
    // simple endpoints keep no sync watermark
    assert_eq!(
        watermarks.load(WatermarkKind::Sync, "ticket_fields").await.unwrap(),
        None
    );
    assert_eq!(
        watermarks.load(WatermarkKind::Load, "tickets").await.unwrap(),
        Some(JAN_2 + 12 * 3600)
    );

    assert_eq!(
        strings(&config, "SELECT subject FROM tickets ORDER BY ticket_id"),
        vec!["First (edited)", "Second"]
    );
    assert_eq!(
        strings(&config, "SELECT custom_fields FROM tickets WHERE ticket_id = 1"),
        vec![r#"{"Product":"gadget"}"#]
    );
    assert_eq!(
        strings(&config, "SELECT CAST(requester_id AS VARCHAR) FROM tickets WHERE ticket_id = 2"),
        vec!["7"]
    );

    // Second run: incremental from the stored watermarks
    let pipeline = Pipeline::new(config.clone()).unwrap().with_now(wednesday(10));
    let options = RunOptions {
        mode: LoadMode::Incremental,
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();
    assert!(report.is_success(), "{report:?}");

    assert_eq!(
        strings(&config, "SELECT subject FROM tickets ORDER BY ticket_id"),
        vec!["Renamed", "Second"]
    );
    let store = DuckDbStore::open(&config.paths.database).unwrap();
    assert_eq!(store.row_count("tickets").unwrap(), 2);
    assert_eq!(store.row_count("organizations").unwrap(), 1);
    drop(store);

    let watermarks = pipeline.watermarks();
    assert_eq!(
        watermarks.load(WatermarkKind::Sync, "tickets").await.unwrap(),
        Some(JAN_4)
    );
    assert_eq!(
        watermarks.load(WatermarkKind::Load, "tickets").await.unwrap(),
        Some(JAN_4)
    );
    // nothing new for organizations: load watermark stays where it was
    assert_eq!(
        watermarks.load(WatermarkKind::Load, "organizations").await.unwrap(),
        Some(JAN_2)
    );
}

#[tokio::test]
async fn test_extract_skipped_when_synced_to_week_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/incremental/tickets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tickets": []})))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);
    let pipeline = Pipeline::new(config).unwrap().with_now(wednesday(9));
    pipeline
        .watermarks()
        .save(WatermarkKind::Sync, "tickets", WEEK_START)
        .await
        .unwrap();

    let options = RunOptions {
        phases: PhaseSet::only(Phase::Extract),
        resources: Some(vec!["tickets".to_string()]),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert!(report.is_success());
    assert!(matches!(
        report.outcome("tickets", Phase::Extract),
        Some(ResourceOutcome::Skipped { .. })
    ));
    assert_eq!(
        pipeline
            .watermarks()
            .load(WatermarkKind::Sync, "tickets")
            .await
            .unwrap(),
        Some(WEEK_START)
    );
}

#[tokio::test]
async fn test_stop_at_week_start_persists_stop_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/incremental/tickets.json"))
        .and(query_param("start_time", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": [{"id": 1, "subject": "old", "updated_at": "2024-01-05T00:00:00Z"}],
            "end_of_stream": false,
            "end_time": WEEK_START + 3600,
            "next_page": format!(
                "{}/incremental/tickets.json?start_time={}",
                server.uri(),
                WEEK_START + 3600
            )
        })))
        .expect(1)
        .mount(&server)
        .await;
    // the continuation lies past Monday and must not be requested
    Mock::given(method("GET"))
        .and(path("/incremental/tickets.json"))
        .and(query_param("start_time", (WEEK_START + 3600).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tickets": []})))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);
    let pipeline = Pipeline::new(config.clone()).unwrap().with_now(wednesday(9));
    let options = RunOptions {
        phases: PhaseSet::only(Phase::Extract),
        resources: Some(vec!["tickets".to_string()]),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();
    assert!(report.is_success(), "{report:?}");

    assert_eq!(
        pipeline
            .watermarks()
            .load(WatermarkKind::Sync, "tickets")
            .await
            .unwrap(),
        Some(WEEK_START)
    );
    let raw = config
        .paths
        .raw_dir("tickets")
        .join(format!("tickets_until_{WEEK_START}.json"));
    assert!(raw.exists(), "missing {}", raw.display());
}

#[tokio::test]
async fn test_upstream_failure_blocks_only_that_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/incremental/organizations.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    mount_export(
        &server,
        "users",
        0,
        export("users", json!([{"id": 7, "name": "Ann"}]), JAN_2),
    )
    .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server, &dir);
    let pipeline = Pipeline::new(config.clone()).unwrap().with_now(wednesday(9));
    let options = RunOptions {
        resources: Some(vec!["organizations".to_string(), "users".to_string()]),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.outcome("organizations", Phase::Extract),
        Some(ResourceOutcome::Failed { kind: ErrorKind::UpstreamFatal, .. })
    ));
    assert_eq!(
        report.outcome("organizations", Phase::Load),
        Some(&ResourceOutcome::blocked("organizations extract"))
    );
    assert!(report.outcome("users", Phase::Load).unwrap().is_ok());
    assert_eq!(
        pipeline
            .watermarks()
            .load(WatermarkKind::Sync, "organizations")
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        DuckDbStore::open(&config.paths.database)
            .unwrap()
            .row_count("users")
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_extract_requires_credentials() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let mut config = config_for(&server, &dir);
    config.api.api_token = None;

    let pipeline = Pipeline::new(config).unwrap();
    let err = pipeline.run(&RunOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    assert!(server.received_requests().await.unwrap().is_empty());
}
