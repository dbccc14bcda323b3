//! Tests for WatermarkStore

use super::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

// ============================================================================
// File Naming Tests
// ============================================================================

#[test]
fn test_file_names() {
    assert_eq!(
        WatermarkKind::Sync.file_name("tickets"),
        "last_sync_timestamp_tickets.txt"
    );
    assert_eq!(
        WatermarkKind::Load.file_name("ticket_fields"),
        "last_load_timestamp_ticket_fields.txt"
    );
    assert_eq!(
        WatermarkKind::parse_file_name("last_load_timestamp_ticket_fields.txt"),
        Some((WatermarkKind::Load, "ticket_fields".to_string()))
    );
    assert_eq!(WatermarkKind::parse_file_name("last_sync_timestamp_.txt"), None);
    assert_eq!(WatermarkKind::parse_file_name("notes.txt"), None);
}

// ============================================================================
// Load / Save Tests
// ============================================================================

#[tokio::test]
async fn test_missing_watermark_is_none() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path());

    assert_eq!(store.load(WatermarkKind::Sync, "tickets").await.unwrap(), None);
    assert_eq!(
        store.load_or_zero(WatermarkKind::Sync, "tickets").await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path().join("nested"));

    store
        .save(WatermarkKind::Sync, "tickets", 1_704_067_200)
        .await
        .unwrap();

    assert_eq!(
        store.load(WatermarkKind::Sync, "tickets").await.unwrap(),
        Some(1_704_067_200)
    );
    // kinds are independent
    assert_eq!(store.load(WatermarkKind::Load, "tickets").await.unwrap(), None);

    let raw = std::fs::read_to_string(store.path(WatermarkKind::Sync, "tickets")).unwrap();
    assert_eq!(raw, "1704067200");
}

#[tokio::test]
async fn test_save_overwrites() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path());

    store.save(WatermarkKind::Load, "users", 100).await.unwrap();
    store.save(WatermarkKind::Load, "users", 200).await.unwrap();

    assert_eq!(
        store.load(WatermarkKind::Load, "users").await.unwrap(),
        Some(200)
    );
    // no temp file left behind
    assert!(!dir.path().join("last_load_timestamp_users.tmp").exists());
}

#[tokio::test]
async fn test_empty_and_invalid_files_are_unset() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path());

    std::fs::write(store.path(WatermarkKind::Sync, "users"), "  \n").unwrap();
    std::fs::write(store.path(WatermarkKind::Sync, "tickets"), "yesterday").unwrap();

    assert_eq!(store.load(WatermarkKind::Sync, "users").await.unwrap(), None);
    assert_eq!(store.load(WatermarkKind::Sync, "tickets").await.unwrap(), None);
}

#[tokio::test]
async fn test_decimal_value_is_truncated() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path());

    std::fs::write(store.path(WatermarkKind::Load, "tickets"), "1704067200.75\n").unwrap();
    assert_eq!(
        store.load(WatermarkKind::Load, "tickets").await.unwrap(),
        Some(1_704_067_200)
    );
}

#[tokio::test]
async fn test_rejects_path_like_keys() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path());

    assert!(store.save(WatermarkKind::Sync, "../etc", 1).await.is_err());
    assert!(store.load(WatermarkKind::Sync, "a/b").await.is_err());
}

#[tokio::test]
async fn test_list() {
    let dir = tempdir().unwrap();
    let store = WatermarkStore::new(dir.path());

    assert!(WatermarkStore::new(dir.path().join("absent"))
        .list()
        .await
        .unwrap()
        .is_empty());

    store.save(WatermarkKind::Sync, "users", 5).await.unwrap();
    store.save(WatermarkKind::Load, "tickets", 7).await.unwrap();
    store.save(WatermarkKind::Sync, "tickets", 9).await.unwrap();
    std::fs::write(dir.path().join("README.txt"), "ignore me").unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(
        listed,
        vec![
            Watermark {
                kind: WatermarkKind::Load,
                key: "tickets".to_string(),
                value: 7
            },
            Watermark {
                kind: WatermarkKind::Sync,
                key: "tickets".to_string(),
                value: 9
            },
            Watermark {
                kind: WatermarkKind::Sync,
                key: "users".to_string(),
                value: 5
            },
        ]
    );
}
