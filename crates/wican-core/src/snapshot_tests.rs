use chrono::Utc;
use serde_json::json;

use crate::snapshot::{ecu_link_online, DeviceSnapshot, GatewayData, PidEntry, PidMap, StatusMap};

fn status(device_id: &str, ecu: &str) -> StatusMap {
    let mut status = StatusMap::new();
    status.insert("device_id".to_string(), json!(device_id));
    status.insert("ecu_status".to_string(), json!(ecu));
    status
}

fn entry(value: Option<i64>) -> PidEntry {
    PidEntry {
        class: "battery".to_string(),
        unit: "%".to_string(),
        value: value.map(|v| json!(v)),
    }
}

#[test]
fn from_live_requires_device_id() {
    // Arrange
    let with_id = GatewayData {
        status: status("d1", "online"),
        pid: PidMap::new(),
    };
    let without_id = GatewayData {
        status: StatusMap::new(),
        pid: PidMap::new(),
    };

    // Assert
    assert!(DeviceSnapshot::from_live(&with_id, Utc::now()).is_some());
    assert!(DeviceSnapshot::from_live(&without_id, Utc::now()).is_none());
}

#[test]
fn validity_rejects_empty_status() {
    let valid = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::new(),
        timestamp: Utc::now(),
    };
    let empty_status = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: StatusMap::new(),
        pid: PidMap::new(),
        timestamp: Utc::now(),
    };

    assert!(valid.is_valid());
    assert!(!empty_status.is_valid());
}

#[test]
fn backfill_keeps_previous_value_for_missing_reading() {
    // Arrange
    let mut candidate = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([("SOC".to_string(), entry(None))]),
        timestamp: Utc::now(),
    };
    let previous = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([("SOC".to_string(), entry(Some(50)))]),
        timestamp: Utc::now(),
    };

    // Act
    candidate.backfill_missing_values(&previous);

    // Assert
    assert_eq!(candidate.pid["SOC"].value, Some(json!(50)));
}

#[test]
fn backfill_never_overwrites_a_fresh_reading() {
    // Arrange
    let mut candidate = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([("SOC".to_string(), entry(Some(41)))]),
        timestamp: Utc::now(),
    };
    let previous = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([("SOC".to_string(), entry(Some(50)))]),
        timestamp: Utc::now(),
    };

    // Act
    candidate.backfill_missing_values(&previous);

    // Assert
    assert_eq!(candidate.pid["SOC"].value, Some(json!(41)));
}

#[test]
fn backfill_does_not_pull_dropped_keys_forward() {
    // Arrange: the refreshed config no longer exposes ODO
    let mut candidate = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([("SOC".to_string(), entry(Some(41)))]),
        timestamp: Utc::now(),
    };
    let previous = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([
            ("SOC".to_string(), entry(Some(50))),
            ("ODO".to_string(), entry(Some(120_000))),
        ]),
        timestamp: Utc::now(),
    };

    // Act
    candidate.backfill_missing_values(&previous);

    // Assert
    assert!(!candidate.pid.contains_key("ODO"));
}

#[test]
fn blob_missing_a_required_field_fails_to_parse() {
    // No pid field
    let raw = json!({
        "device_id": "d1",
        "status": {"device_id": "d1"},
        "timestamp": "2026-01-10T08:00:00Z"
    });

    let parsed: Result<DeviceSnapshot, _> = serde_json::from_value(raw);
    assert!(parsed.is_err());
}

#[test]
fn pid_entry_with_no_value_round_trips_as_none() {
    let raw = json!({"class": "battery", "unit": "%"});
    let parsed: PidEntry = serde_json::from_value(raw).expect("parse");
    assert_eq!(parsed.value, None);

    let raw_null = json!({"class": "battery", "unit": "%", "value": null});
    let parsed_null: PidEntry = serde_json::from_value(raw_null).expect("parse");
    assert_eq!(parsed_null.value, None);
}

#[test]
fn snapshot_round_trips_through_json() {
    // Arrange
    let snapshot = DeviceSnapshot {
        device_id: "d1".to_string(),
        status: status("d1", "online"),
        pid: PidMap::from([("SOC".to_string(), entry(Some(40)))]),
        timestamp: Utc::now(),
    };

    // Act
    let raw = serde_json::to_string(&snapshot).expect("serialize");
    let parsed: DeviceSnapshot = serde_json::from_str(&raw).expect("parse");

    // Assert
    assert_eq!(parsed, snapshot);
}

#[test]
fn ecu_link_reads_the_status_sub_field() {
    assert!(ecu_link_online(&status("d1", "online")));
    assert!(!ecu_link_online(&status("d1", "offline")));
    assert!(!ecu_link_online(&StatusMap::new()));
}
