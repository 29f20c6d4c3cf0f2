//! Gateway error types

use std::time::Duration;

use thiserror::Error;

use crate::domain::RequestId;
use crate::queue::QueueError;

/// Errors a caller of the gateway can see
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    #[error("Request queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Service is shutting down")]
    QueueClosed,

    #[error("Timed out after {0:?} waiting for a response")]
    Timeout(Duration),

    #[error("Request not found: {0}")]
    NotFound(RequestId),

    #[error("Request {0} was dropped without a response")]
    Abandoned(RequestId),
}

impl GatewayError {
    /// Whether retrying the same call later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimitExceeded { .. } | GatewayError::QueueFull { .. } | GatewayError::Timeout(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<QueueError> for GatewayError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full { capacity } => GatewayError::QueueFull { capacity },
            QueueError::Closed => GatewayError::QueueClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_conversion() {
        assert_eq!(
            GatewayError::from(QueueError::Full { capacity: 3 }),
            GatewayError::QueueFull { capacity: 3 }
        );
        assert_eq!(GatewayError::from(QueueError::Closed), GatewayError::QueueClosed);
    }

    #[test]
    fn test_retryable() {
        let limited = GatewayError::RateLimitExceeded {
            retry_after: Duration::from_secs(2),
        };
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));
        assert!(!GatewayError::QueueClosed.is_retryable());
        assert_eq!(GatewayError::QueueClosed.retry_after(), None);
    }

    #[test]
    fn test_messages() {
        let err = GatewayError::NotFound(RequestId::from("abc"));
        assert_eq!(err.to_string(), "Request not found: abc");
    }
}
