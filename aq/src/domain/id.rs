//! Request ID generation
//!
//! IDs are UUID v7 strings, so lexical order follows creation order.

use serde::{Deserialize, Serialize};

/// Opaque identifier for an admitted request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh, time-ordered ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Wrap an existing ID string (e.g. one handed back by a client)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short form for log lines and terminal output
    pub fn short(&self) -> &str {
        // v7 keeps the timestamp up front, the tail is the random part.
        // Client-supplied IDs may be non-ASCII, so cut on a char boundary.
        let start = self.0.char_indices().rev().nth(7).map_or(0, |(i, _)| i);
        &self.0[start..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}
