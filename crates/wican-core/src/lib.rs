pub mod client;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod snapshot;
pub mod store;
pub mod transform;

#[cfg(test)]
mod snapshot_tests;
#[cfg(test)]
mod store_tests;

pub use client::{ClientError, GatewayClient, HttpGatewayClient};
pub use config::EngineConfig;
pub use descriptor::{measurement_class, unique_id, MeasurementClass, StatusDescriptor, STATUS_FIELDS};
pub use engine::{Engine, EngineError, PidReading};
pub use snapshot::{DeviceSnapshot, GatewayData, PidEntry, PidMap, StatusMap};
pub use store::{JsonFileStore, SnapshotStore, StoreError};
pub use transform::Transform;
