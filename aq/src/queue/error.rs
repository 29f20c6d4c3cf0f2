//! Queue error types

use thiserror::Error;

use crate::domain::QueuedRequest;

/// Why an enqueue was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("Queue is closed")]
    Closed,
}

/// Refused enqueue; hands the request back so its slot can still be answered
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct EnqueueError {
    pub kind: QueueError,
    pub request: QueuedRequest,
}

impl EnqueueError {
    pub fn into_request(self) -> QueuedRequest {
        self.request
    }
}
