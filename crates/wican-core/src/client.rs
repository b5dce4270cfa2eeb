use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::snapshot::{PidEntry, PidMap, StatusMap};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("timeout")]
    Timeout,
    #[error("bad response: {0}")]
    BadResponse(String),
}

/// Read-only view of the gateway HTTP API. All errors are transient; the
/// engine absorbs them through its fallback ladder and never re-raises
/// them past its own boundary.
#[async_trait]
pub trait GatewayClient: Send {
    /// Flat mapping of connectivity/config facts. Includes `device_id`.
    async fn fetch_status(&mut self) -> Result<StatusMap, ClientError>;
    /// Parameter table keyed by PID name.
    async fn fetch_pid_data(&mut self) -> Result<PidMap, ClientError>;
}

pub struct HttpGatewayClient {
    host: String,
    http: reqwest::Client,
}

impl HttpGatewayClient {
    /// `host` is the gateway's IP address or mDNS name. The client is built
    /// once with a bounded request timeout and reused across polls.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value, ClientError> {
        let url = format!("http://{}{}", self.host, endpoint);
        let response = self.http.get(&url).send().await.map_err(|err| {
            if err.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::Unreachable(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::BadResponse(format!("{url} answered {status}")));
        }

        response
            .json()
            .await
            .map_err(|err| ClientError::BadResponse(format!("{url}: {err}")))
    }

    /// Setup-time check: the device answers and its protocol is set to
    /// `auto_pid`, the only mode that exposes the PID endpoints.
    pub async fn probe(&self) -> bool {
        match self.get_json("/check_status").await {
            Ok(body) => body.get("protocol").and_then(Value::as_str) == Some("auto_pid"),
            Err(err) => {
                debug!("probe of {} failed: {err}", self.host);
                false
            }
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn fetch_status(&mut self) -> Result<StatusMap, ClientError> {
        let body = self.get_json("/check_status").await?;
        match body {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ClientError::BadResponse(format!(
                "check_status returned {other}"
            ))),
        }
    }

    async fn fetch_pid_data(&mut self) -> Result<PidMap, ClientError> {
        let values = self.get_json("/autopid_data").await?;
        let meta = self.get_json("/load_car_config").await?;
        merge_pid_tables(&meta, &values)
    }
}

/// Combines the car-config metadata (class and unit per parameter) with the
/// current values payload. The key set comes from the metadata; a key with
/// no current value yields `value: None`.
pub fn merge_pid_tables(meta: &Value, values: &Value) -> Result<PidMap, ClientError> {
    let Value::Object(meta) = meta else {
        return Err(ClientError::BadResponse(
            "car config is not an object".to_string(),
        ));
    };

    let mut pid = BTreeMap::new();
    for (key, entry) in meta {
        let class = entry
            .get("class")
            .and_then(Value::as_str)
            .unwrap_or("none")
            .to_string();
        let unit = entry
            .get("unit")
            .and_then(Value::as_str)
            .unwrap_or("none")
            .to_string();
        let value = values.get(key).filter(|v| !v.is_null()).cloned();
        pid.insert(key.clone(), PidEntry { class, unit, value });
    }

    Ok(pid)
}
