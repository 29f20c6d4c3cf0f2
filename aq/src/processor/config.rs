//! Processor configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Upper bound on a single handler run in milliseconds (0 = unbounded)
    #[serde(rename = "handler-timeout-ms")]
    pub handler_timeout_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: 30_000,
        }
    }
}

impl ProcessorConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_disables_timeout() {
        let config = ProcessorConfig { handler_timeout_ms: 0 };
        assert_eq!(config.handler_timeout(), None);
        assert_eq!(
            ProcessorConfig::default().handler_timeout(),
            Some(Duration::from_secs(30))
        );
    }
}
