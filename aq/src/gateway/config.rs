//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Caller-facing wait and ticket-expiry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Default time a caller waits for its response (0 = wait forever)
    #[serde(rename = "wait-timeout-ms")]
    pub wait_timeout_ms: u64,

    /// Detached tickets older than this are dropped by the sweeper
    #[serde(rename = "max-ticket-age-ms")]
    pub max_ticket_age_ms: u64,

    /// How often the sweeper runs
    #[serde(rename = "cleanup-interval-ms")]
    pub cleanup_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 120_000,
            max_ticket_age_ms: 60_000,
            cleanup_interval_ms: 5_000,
        }
    }
}

impl GatewayConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }

    pub fn max_ticket_age(&self) -> Duration {
        Duration::from_millis(self.max_ticket_age_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.max_ticket_age(), Duration::from_secs(60));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_wait_means_unbounded() {
        let config = GatewayConfig {
            wait_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.wait_timeout(), None);
    }
}
