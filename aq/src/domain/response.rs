//! ApiResponse - the value a caller receives for an admitted request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of processing a queued request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub processed_at: DateTime<Utc>,
}

impl ApiResponse {
    /// Successful response carrying the handler's result
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            processed_at: Utc::now(),
        }
    }

    /// Failed response with a human-readable reason
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            processed_at: Utc::now(),
        }
    }
}
