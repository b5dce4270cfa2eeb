use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed interval between poll cycles, driven by the caller.
    pub poll_interval: Duration,
    /// Bound on every device and store call within a cycle.
    pub request_timeout: Duration,
    /// Minimum spacing between snapshot writes. Debounce affects durable
    /// storage only, never the in-memory path.
    pub persist_min_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
            persist_min_interval: Duration::from_secs(30),
        }
    }
}
