//! Queue configuration

use serde::{Deserialize, Serialize};

/// Request queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Max requests waiting to be processed
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}
