//! Limiter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sliding-window limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Max admissions per window (0 rejects everything)
    #[serde(rename = "max-requests")]
    pub max_requests: u32,

    /// Window length in milliseconds
    #[serde(rename = "window-ms")]
    pub window_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 2,
            window_ms: 10_000,
        }
    }
}

impl LimiterConfig {
    /// Build from a `Duration`; sub-millisecond remainders round up so a
    /// non-zero window never becomes zero
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let partial = u128::from(window.subsec_nanos() % 1_000_000 != 0);
        let window_ms = u64::try_from(window.as_millis() + partial).unwrap_or(u64::MAX);
        Self { max_requests, window_ms }
    }

    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}
