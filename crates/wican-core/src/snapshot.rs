use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type StatusMap = BTreeMap<String, Value>;
pub type PidMap = BTreeMap<String, PidEntry>;

/// One CAN-derived parameter as reported by the gateway's car config:
/// measurement class, unit, and the current reading. `value: None` means
/// the gateway returned no reading for this key on the last fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidEntry {
    pub class: String,
    pub unit: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Result of one poll cycle, as served to presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayData {
    pub status: StatusMap,
    pub pid: PidMap,
}

impl GatewayData {
    pub fn device_id(&self) -> Option<&str> {
        self.status.get("device_id").and_then(Value::as_str)
    }

    pub fn ecu_link_online(&self) -> bool {
        ecu_link_online(&self.status)
    }
}

/// Whether the status payload reports an active link to the vehicle ECU.
/// Independent of gateway-to-host reachability.
pub fn ecu_link_online(status: &StatusMap) -> bool {
    status.get("ecu_status").and_then(Value::as_str) == Some("online")
}

/// Persisted copy of the last known good status and PID data. One slot per
/// configured device, used for offline and startup recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub status: StatusMap,
    pub pid: PidMap,
    pub timestamp: DateTime<Utc>,
}

impl DeviceSnapshot {
    /// Builds the persisted form of a live result. Returns `None` when the
    /// status payload carries no `device_id`; such data is never written.
    pub fn from_live(data: &GatewayData, timestamp: DateTime<Utc>) -> Option<Self> {
        let device_id = data.device_id()?.to_string();
        Some(Self {
            device_id,
            status: data.status.clone(),
            pid: data.pid.clone(),
            timestamp,
        })
    }

    /// Structural validity of a loaded blob. Field presence is enforced by
    /// deserialization already; an empty status means "no data", never
    /// "empty status".
    pub fn is_valid(&self) -> bool {
        !self.device_id.is_empty() && !self.status.is_empty()
    }

    /// Merge-on-write: keys present here whose reading is missing keep the
    /// previous snapshot's reading, so one transient read miss never erases
    /// a last known value in durable storage. Keys absent here are not
    /// pulled forward from the previous snapshot.
    pub fn backfill_missing_values(&mut self, previous: &DeviceSnapshot) {
        for (key, entry) in self.pid.iter_mut() {
            if entry.value.is_some() {
                continue;
            }
            if let Some(prev) = previous.pid.get(key) {
                if prev.value.is_some() {
                    entry.value = prev.value.clone();
                }
            }
        }
    }

    pub fn into_data(self) -> GatewayData {
        GatewayData {
            status: self.status,
            pid: self.pid,
        }
    }
}
