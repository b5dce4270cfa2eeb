use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::DeviceSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Persisted slot for the last known good snapshot of one device. Load
/// failures degrade to "no snapshot" at the call site; save failures never
/// fail a poll cycle.
#[async_trait]
pub trait SnapshotStore: Send {
    async fn load(&mut self) -> Result<Option<DeviceSnapshot>, StoreError>;
    async fn save(&mut self, snapshot: &DeviceSnapshot) -> Result<(), StoreError>;
}

/// One JSON file per configured device under the state directory. The slot
/// is owned exclusively by that device's engine; no concurrent writers.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn for_device(state_dir: impl AsRef<Path>, host: &str) -> Self {
        let path = state_dir
            .as_ref()
            .join(format!("wican-{}.json", device_slug(host)));
        Self { path }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&mut self) -> Result<Option<DeviceSnapshot>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };

        let snapshot =
            serde_json::from_slice(&raw).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        Ok(Some(snapshot))
    }

    async fn save(&mut self, snapshot: &DeviceSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
        }
        let raw = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        fs::write(&self.path, raw).map_err(|err| StoreError::Io(err.to_string()))
    }
}

/// Filesystem-safe slug of the configured host. The slug keys the file,
/// not the entity identifiers; those come from the device_id in the blob.
fn device_slug(host: &str) -> String {
    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
