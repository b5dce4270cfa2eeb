use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::Utc;
use serde_json::json;

use crate::snapshot::{DeviceSnapshot, PidEntry, PidMap, StatusMap};
use crate::store::{JsonFileStore, SnapshotStore, StoreError};

fn make_temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    path.push(format!("wican-tests-{name}-{uniq}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

fn sample_snapshot() -> DeviceSnapshot {
    let mut status = StatusMap::new();
    status.insert("device_id".to_string(), json!("d1"));
    status.insert("ecu_status".to_string(), json!("online"));

    DeviceSnapshot {
        device_id: "d1".to_string(),
        status,
        pid: PidMap::from([(
            "SOC_BMS".to_string(),
            PidEntry {
                class: "battery".to_string(),
                unit: "%".to_string(),
                value: Some(json!(40)),
            },
        )]),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn save_then_load_round_trips() {
    // Arrange
    let dir = make_temp_dir("round-trip");
    let mut store = JsonFileStore::for_device(&dir, "192.168.1.30");
    let snapshot = sample_snapshot();

    // Act
    store.save(&snapshot).await.expect("save");
    let loaded = store.load().await.expect("load");

    // Assert
    assert_eq!(loaded, Some(snapshot));

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn load_with_no_file_is_none() {
    // Arrange
    let dir = make_temp_dir("missing");
    let mut store = JsonFileStore::for_device(&dir, "wican.local");

    // Act
    let loaded = store.load().await.expect("load");

    // Assert
    assert_eq!(loaded, None);

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn corrupt_file_is_a_corrupt_error() {
    // Arrange
    let dir = make_temp_dir("corrupt");
    let path = dir.join("broken.json");
    fs::write(&path, b"{not json").expect("write corrupt blob");
    let mut store = JsonFileStore::at_path(&path);

    // Act
    let result = store.load().await;

    // Assert
    assert!(matches!(result, Err(StoreError::Corrupt(_))));

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn blob_missing_fields_is_a_corrupt_error() {
    // Arrange: structurally incomplete snapshot, no pid field
    let dir = make_temp_dir("partial");
    let path = dir.join("partial.json");
    let raw = json!({
        "device_id": "d1",
        "status": {"device_id": "d1"},
        "timestamp": "2026-01-10T08:00:00Z"
    });
    fs::write(&path, serde_json::to_vec(&raw).expect("encode")).expect("write blob");
    let mut store = JsonFileStore::at_path(&path);

    // Act
    let result = store.load().await;

    // Assert
    assert!(matches!(result, Err(StoreError::Corrupt(_))));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn store_path_is_a_slug_of_the_host() {
    let store = JsonFileStore::for_device("/var/lib/wican", "192.168.1.30");
    assert!(store.path().ends_with("wican-192_168_1_30.json"));

    let mdns = JsonFileStore::for_device("/var/lib/wican", "wican.local");
    assert!(mdns.path().ends_with("wican-wican_local.json"));
}
