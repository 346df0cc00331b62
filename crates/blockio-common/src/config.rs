//! Configuration for the blockio client
//!
//! All fields are read-only after init.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the metadata cache
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetaCacheConfig {
    /// Maximum leader-discovery attempts before giving up
    pub get_leader_retry: u32,
    /// Sleep between discovery attempts (microseconds)
    pub rpc_retry_interval_us: u64,
    /// Per-call timeout for the "get leader" probe (milliseconds)
    pub get_leader_rpc_timeout_ms: u64,
}

impl Default for MetaCacheConfig {
    fn default() -> Self {
        Self {
            get_leader_retry: 5,
            rpc_retry_interval_us: 100_000,
            get_leader_rpc_timeout_ms: 500,
        }
    }
}

impl MetaCacheConfig {
    /// Sleep between discovery attempts
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_micros(self.rpc_retry_interval_us)
    }

    /// Per-call probe timeout
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.get_leader_rpc_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetaCacheConfig::default();
        assert_eq!(config.get_leader_retry, 5);
        assert_eq!(config.retry_interval(), Duration::from_millis(100));
        assert_eq!(config.probe_timeout(), Duration::from_millis(500));
    }
}
