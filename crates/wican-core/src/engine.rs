use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::GatewayClient;
use crate::config::EngineConfig;
use crate::snapshot::{ecu_link_online, DeviceSnapshot, GatewayData, PidMap, StatusMap};
use crate::store::SnapshotStore;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Status fetch failed with nothing in memory and no valid snapshot on
    /// disk: the device has never been reachable. Callers should retry
    /// setup later instead of proceeding without data.
    #[error("device has never been reachable and no snapshot is cached")]
    NotReady,
}

/// Reading of a single PID through the accessor surface. A parameter with
/// no current value is distinct from a device with no data at all.
#[derive(Debug, Clone, PartialEq)]
pub enum PidReading {
    Present(Value),
    NoData,
    Unavailable,
}

/// Availability cache for one configured gateway.
///
/// While the device answers, polls serve live data and persist a recovery
/// snapshot (debounced, merge-on-write). While it does not, polls fall back
/// to the last good in-memory result, then to the persisted snapshot, and
/// only fail terminally when neither exists.
///
/// One engine instance per configured device. Exactly one poll cycle is in
/// flight at a time; the scheduler serializes calls and `&mut self`
/// enforces it, so no locking discipline is needed for the state here.
pub struct Engine<C: GatewayClient, S: SnapshotStore> {
    client: C,
    store: S,
    config: EngineConfig,
    data: Option<GatewayData>,
    ecu_online: bool,
    stale: bool,
    last_successful_update: Option<DateTime<Utc>>,
    last_persist: Option<Instant>,
}

impl<C: GatewayClient, S: SnapshotStore> Engine<C, S> {
    pub fn new(client: C, store: S, config: EngineConfig) -> Self {
        Self {
            client,
            store,
            config,
            data: None,
            ecu_online: false,
            stale: false,
            last_successful_update: None,
            last_persist: None,
        }
    }

    /// Runs one poll cycle and returns the data to serve.
    pub async fn poll(&mut self) -> Result<GatewayData, EngineError> {
        match self.fetch_status().await {
            Some(status) => self.live_cycle(status).await,
            None => self.fallback_cycle().await,
        }
    }

    async fn fetch_status(&mut self) -> Option<StatusMap> {
        match timeout(self.config.request_timeout, self.client.fetch_status()).await {
            Ok(Ok(status)) if !status.is_empty() => Some(status),
            Ok(Ok(_)) => {
                debug!("status fetch returned an empty payload");
                None
            }
            Ok(Err(err)) => {
                debug!("status fetch failed: {err}");
                None
            }
            Err(_) => {
                debug!("status fetch timed out");
                None
            }
        }
    }

    async fn live_cycle(&mut self, status: StatusMap) -> Result<GatewayData, EngineError> {
        self.ecu_online = true;

        // The PID fetch is skipped while the vehicle ECU link is down. The
        // status payload alone is still a live result, not a stale one.
        let pid = if ecu_link_online(&status) {
            self.fetch_pid().await
        } else {
            debug!("ecu link not established, serving status only");
            PidMap::new()
        };

        let data = GatewayData { status, pid };
        self.persist(&data).await;

        self.stale = false;
        self.last_successful_update = Some(Utc::now());
        self.data = Some(data.clone());
        Ok(data)
    }

    /// A transient PID failure after a status success degrades to an empty
    /// mapping; the fallback ladder is keyed on status failures only.
    async fn fetch_pid(&mut self) -> PidMap {
        match timeout(self.config.request_timeout, self.client.fetch_pid_data()).await {
            Ok(Ok(pid)) => pid,
            Ok(Err(err)) => {
                debug!("pid fetch failed: {err}");
                PidMap::new()
            }
            Err(_) => {
                debug!("pid fetch timed out");
                PidMap::new()
            }
        }
    }

    async fn fallback_cycle(&mut self) -> Result<GatewayData, EngineError> {
        if let Some(data) = &self.data {
            if !data.status.is_empty() {
                self.stale = true;
                return Ok(data.clone());
            }
        }

        let snapshot = match timeout(self.config.request_timeout, self.store.load()).await {
            Ok(Ok(Some(snapshot))) if snapshot.is_valid() => snapshot,
            Ok(Ok(Some(_))) => {
                warn!("persisted snapshot is structurally invalid, ignoring it");
                return Err(EngineError::NotReady);
            }
            Ok(Ok(None)) => return Err(EngineError::NotReady),
            Ok(Err(err)) => {
                warn!("failed to load snapshot: {err}");
                return Err(EngineError::NotReady);
            }
            Err(_) => {
                warn!("snapshot load timed out");
                return Err(EngineError::NotReady);
            }
        };

        info!(device_id = %snapshot.device_id, "device unreachable, serving persisted snapshot");
        self.stale = true;
        self.ecu_online = ecu_link_online(&snapshot.status);
        let data = snapshot.into_data();
        self.data = Some(data.clone());
        Ok(data)
    }

    /// Persists a live result. Debounced against the last successful write;
    /// merged against the stored blob so a missed reading never erases its
    /// last known value.
    async fn persist(&mut self, data: &GatewayData) {
        if let Some(last) = self.last_persist {
            if last.elapsed() < self.config.persist_min_interval {
                return;
            }
        }

        let Some(mut snapshot) = DeviceSnapshot::from_live(data, Utc::now()) else {
            warn!("status payload has no device_id, skipping snapshot write");
            return;
        };

        match timeout(self.config.request_timeout, self.store.load()).await {
            Ok(Ok(Some(previous))) => snapshot.backfill_missing_values(&previous),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => debug!("ignoring unreadable previous snapshot: {err}"),
            Err(_) => debug!("previous snapshot load timed out"),
        }

        match timeout(self.config.request_timeout, self.store.save(&snapshot)).await {
            Ok(Ok(())) => self.last_persist = Some(Instant::now()),
            Ok(Err(err)) => warn!("failed to persist snapshot: {err}"),
            Err(_) => warn!("snapshot write timed out"),
        }
    }

    /// Value of a status field, or `None` when no status is being served or
    /// the key is missing. Never panics on unknown keys.
    pub fn status_field(&self, key: &str) -> Option<&Value> {
        let data = self.data.as_ref()?;
        if data.status.is_empty() {
            return None;
        }
        data.status.get(key)
    }

    pub fn pid_value(&self, key: &str) -> PidReading {
        let Some(data) = self.data.as_ref().filter(|d| !d.status.is_empty()) else {
            return PidReading::Unavailable;
        };
        match data.pid.get(key).and_then(|entry| entry.value.clone()) {
            Some(value) => PidReading::Present(value),
            None => PidReading::NoData,
        }
    }

    /// True while any status is being served. Staleness is a degraded
    /// freshness signal, not an unavailability signal.
    pub fn is_available(&self) -> bool {
        self.data
            .as_ref()
            .map(|d| !d.status.is_empty())
            .unwrap_or(false)
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// True once any poll has observed a reachable device; a snapshot
    /// fallback derives it from the snapshot's ECU link state instead.
    pub fn ecu_online(&self) -> bool {
        self.ecu_online
    }

    /// Timestamp of the last live, non-fallback success.
    pub fn last_successful_update(&self) -> Option<DateTime<Utc>> {
        self.last_successful_update
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
