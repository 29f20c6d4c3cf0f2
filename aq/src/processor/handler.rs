//! Request handler trait and the built-in echo handler

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, eyre};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::QueuedRequest;

/// The unit of work run for each dequeued request
///
/// An `Err` (or a panic) becomes a failed `ApiResponse`; it never stops the
/// processor.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: &QueuedRequest) -> Result<Value>;
}

/// Waits `delay`, then echoes the payload back.
///
/// With `fail_every = Some(n)`, every n-th call fails instead.
#[derive(Debug, Default)]
pub struct EchoHandler {
    delay: Duration,
    fail_every: Option<u64>,
    calls: AtomicU64,
}

impl EchoHandler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_every: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: &QueuedRequest) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(request_id = %request.id, call, "EchoHandler::handle: called");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_every.map(|n| call % n == 0).unwrap_or(false) {
            debug!(request_id = %request.id, call, "EchoHandler::handle: injected failure");
            return Err(eyre!("injected failure on call {}", call));
        }

        let processed = match &request.payload {
            Value::String(s) => format!("Processed: {}", s),
            other => format!("Processed: {}", other),
        };

        Ok(json!({
            "request_id": request.id,
            "original_data": request.payload,
            "queued_at": request.enqueued_at,
            "processed_data": processed,
        }))
    }
}
