//! Gateway - admission, queueing and response delivery behind one handle

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{ApiResponse, QueuedRequest, RequestId};
use crate::limiter::{Admission, SlidingWindowLimiter};
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::processor::{ProcessorHandle, ProcessorSummary, RequestHandler, RequestProcessor};
use crate::queue::RequestQueue;

use super::config::GatewayConfig;
use super::error::GatewayError;
use super::tickets::{Sweeper, SweeperHandle, TicketBook};

/// Health and load snapshot
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub queue_length: usize,
    pub queue_capacity: usize,
    pub accepting: bool,
    pub can_admit: bool,
    pub retry_after_ms: u64,
    pub in_window: usize,
    pub outstanding_tickets: usize,
    pub metrics: MetricsSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Pending response for an admitted request
///
/// Awaiting it waits without a timeout; [`wait`](Self::wait) bounds the wait.
/// Giving up does not cancel the request, the processor still runs it.
#[derive(Debug)]
pub struct Submission {
    id: RequestId,
    position: usize,
    rx: oneshot::Receiver<ApiResponse>,
}

impl Submission {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// 1-based queue position at the time of admission
    pub fn position(&self) -> usize {
        self.position
    }

    pub async fn wait(self, timeout: Option<Duration>) -> Result<ApiResponse, GatewayError> {
        debug!(request_id = %self.id, ?timeout, "Submission::wait: called");
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(limit)),
            },
            None => self.await,
        }
    }
}

impl Future for Submission {
    type Output = Result<ApiResponse, GatewayError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(response)) => Poll::Ready(Ok(response)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(GatewayError::Abandoned(self.id.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Summary returned by [`Gateway::shutdown`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    pub processor: ProcessorSummary,
    pub metrics: MetricsSnapshot,
}

/// Front door: rate limiter, queue, processor and ticket sweeper wired together
pub struct Gateway {
    config: GatewayConfig,
    limiter: Arc<SlidingWindowLimiter>,
    queue: Arc<RequestQueue>,
    tickets: Arc<TicketBook>,
    metrics: Arc<GatewayMetrics>,
    /// Held across the limiter check and the enqueue; counts admissions
    admission: Mutex<u64>,
    processor: Mutex<Option<ProcessorHandle>>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl Gateway {
    /// Validate `config`, build every component and spawn the background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: &Config, handler: Arc<dyn RequestHandler>) -> eyre::Result<Self> {
        debug!("Gateway::start: called");
        config.validate()?;

        let limiter = Arc::new(SlidingWindowLimiter::new(config.limiter.clone()));
        let queue = Arc::new(RequestQueue::new(&config.queue));
        let tickets = Arc::new(TicketBook::new());
        let metrics = Arc::new(GatewayMetrics::new());

        let processor = RequestProcessor::new(
            config.processor.clone(),
            Arc::clone(&queue),
            handler,
            Arc::clone(&metrics),
        )
        .spawn();

        let sweeper = Sweeper::new(
            Arc::clone(&tickets),
            Arc::clone(&metrics),
            config.gateway.max_ticket_age(),
            config.gateway.cleanup_interval(),
        )
        .spawn();

        info!(
            max_requests = config.limiter.max_requests,
            window = ?config.limiter.window(),
            capacity = config.queue.capacity,
            "Gateway started"
        );

        Ok(Self {
            config: config.gateway.clone(),
            limiter,
            queue,
            tickets,
            metrics,
            admission: Mutex::new(0),
            processor: Mutex::new(Some(processor)),
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// Raw admission check against the limiter; records the admission on success
    pub fn try_admit(&self) -> bool {
        let admitted = self.limiter.try_admit();
        if admitted {
            self.metrics.record_admitted();
        } else {
            self.metrics.record_rejected();
        }
        admitted
    }

    /// Admit, queue, and hand back the pending response
    pub fn submit(&self, payload: Value) -> Result<Submission, GatewayError> {
        let (request, rx) = QueuedRequest::new(payload);
        let id = request.id.clone();
        debug!(request_id = %id, "Gateway::submit: called");

        let position = self.admit_and_enqueue(request)?;
        Ok(Submission { id, position, rx })
    }

    /// Like [`submit`](Self::submit), but park the response under a ticket
    /// to be collected with [`wait_for`](Self::wait_for)
    pub fn submit_detached(&self, payload: Value) -> Result<RequestId, GatewayError> {
        let submission = self.submit(payload)?;
        let id = submission.id.clone();
        self.tickets.issue(id.clone(), submission.rx);
        Ok(id)
    }

    /// Wait for a detached request. `None` uses the configured wait timeout.
    pub async fn wait_for(&self, id: &RequestId, timeout: Option<Duration>) -> Result<ApiResponse, GatewayError> {
        let timeout = timeout.or_else(|| self.config.wait_timeout());
        self.tickets.redeem(id, timeout).await
    }

    /// Default caller wait from configuration
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.config.wait_timeout()
    }

    pub fn retry_after(&self) -> Duration {
        self.limiter.retry_after()
    }

    pub fn status(&self) -> GatewayStatus {
        let retry_after = self.limiter.retry_after();
        GatewayStatus {
            queue_length: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            accepting: !self.queue.is_closed(),
            can_admit: retry_after.is_zero() && !self.queue.is_full(),
            retry_after_ms: retry_after.as_millis() as u64,
            in_window: self.limiter.in_window(),
            outstanding_tickets: self.tickets.len(),
            metrics: self.metrics.snapshot(),
            timestamp: Utc::now(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.queue.pending_ids()
    }

    /// Stop the sweeper and the processor. Queued requests are answered
    /// with a failure; later submissions fail with `QueueClosed`.
    pub async fn shutdown(&self) -> eyre::Result<ShutdownReport> {
        info!("Gateway shutting down");
        self.queue.shutdown();

        let sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await?;
        }

        let processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner).take();
        let summary = match processor {
            Some(processor) => processor.stop().await?,
            None => {
                debug!("Gateway::shutdown: already stopped");
                ProcessorSummary::default()
            }
        };

        Ok(ShutdownReport {
            processor: summary,
            metrics: self.metrics.snapshot(),
        })
    }

    fn admit_and_enqueue(&self, mut request: QueuedRequest) -> Result<usize, GatewayError> {
        // Admission order and queue order must agree, so the limiter check
        // and the enqueue happen under one lock
        let mut admitted = self.admission.lock().unwrap_or_else(PoisonError::into_inner);

        // Cheap pre-checks so a closed or full queue does not burn window slots
        if self.queue.is_closed() {
            debug!(request_id = %request.id, "Gateway::admit_and_enqueue: queue closed");
            return Err(GatewayError::QueueClosed);
        }
        if self.queue.is_full() {
            debug!(request_id = %request.id, "Gateway::admit_and_enqueue: queue full");
            self.metrics.record_enqueue_failed();
            return Err(GatewayError::QueueFull {
                capacity: self.queue.capacity(),
            });
        }

        if let Admission::Rejected { retry_after } = self.limiter.check() {
            debug!(request_id = %request.id, ?retry_after, "Gateway::admit_and_enqueue: rate limited");
            self.metrics.record_rejected();
            return Err(GatewayError::RateLimitExceeded { retry_after });
        }
        self.metrics.record_admitted();
        *admitted += 1;
        request.seq = *admitted;

        // Only shutdown can still get in between; the window slot is spent
        match self.queue.enqueue(request) {
            Ok(position) => {
                debug!(seq = *admitted, position, "Gateway::admit_and_enqueue: queued");
                Ok(position)
            }
            Err(err) => {
                warn!(request_id = %err.request.id, error = %err.kind, "Admitted request could not be queued");
                self.metrics.record_enqueue_failed();
                Err(err.kind.into())
            }
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        // Lets the processor drain and exit if shutdown() was never awaited
        self.queue.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::LimiterConfig;
    use crate::processor::EchoHandler;
    use serde_json::json;

    fn config(max_requests: u32, window: Duration) -> Config {
        Config {
            limiter: LimiterConfig::new(max_requests, window),
            ..Default::default()
        }
    }

    fn echo() -> Arc<dyn RequestHandler> {
        Arc::new(EchoHandler::new(Duration::ZERO))
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let mut zero_interval = config(5, Duration::from_secs(60));
        zero_interval.gateway.cleanup_interval_ms = 0;
        assert!(Gateway::start(&zero_interval, echo()).is_err());

        let mut zero_capacity = config(5, Duration::from_secs(60));
        zero_capacity.queue.capacity = 0;
        assert!(Gateway::start(&zero_capacity, echo()).is_err());

        assert!(Gateway::start(&config(5, Duration::ZERO), echo()).is_err());
    }

    #[tokio::test]
    async fn test_only_admissions_advance_sequence() {
        let gateway = Gateway::start(&config(2, Duration::from_secs(60)), echo()).unwrap();

        gateway.submit(json!(1)).unwrap();
        gateway.submit(json!(2)).unwrap();
        assert!(gateway.submit(json!(3)).is_err());
        assert_eq!(*gateway.admission.lock().unwrap(), 2);

        gateway.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_and_await() {
        let gateway = Gateway::start(&config(5, Duration::from_secs(60)), echo()).unwrap();

        let submission = gateway.submit(json!("hello")).unwrap();
        assert_eq!(submission.position(), 1);
        let id = submission.id().clone();

        let response = submission.await.unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap()["request_id"], json!(id.as_str()));

        gateway.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_submission_reports_retry_after() {
        let gateway = Gateway::start(&config(1, Duration::from_secs(60)), echo()).unwrap();

        gateway.submit(json!(1)).unwrap();
        match gateway.submit(json!(2)) {
            Err(GatewayError::RateLimitExceeded { retry_after }) => {
                assert!(retry_after > Duration::from_secs(59));
                assert!(retry_after <= Duration::from_secs(61));
            }
            other => panic!("expected rate limit, got {:?}", other.map(|s| s.id().clone())),
        }

        let metrics = gateway.metrics();
        assert_eq!(metrics.admitted, 1);
        assert_eq!(metrics.rejected, 1);
        gateway.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_try_admit_shares_window_with_submit() {
        let gateway = Gateway::start(&config(2, Duration::from_secs(60)), echo()).unwrap();
        assert!(gateway.try_admit());
        gateway.submit(json!(1)).unwrap();
        assert!(!gateway.try_admit());
        assert!(matches!(
            gateway.submit(json!(2)),
            Err(GatewayError::RateLimitExceeded { .. })
        ));
        gateway.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let gateway = Gateway::start(&config(5, Duration::from_secs(60)), echo()).unwrap();
        gateway.shutdown().await.unwrap();

        assert!(matches!(gateway.submit(json!(1)), Err(GatewayError::QueueClosed)));
        assert!(!gateway.status().accepting);
        // No window slot spent on a closed queue
        assert_eq!(gateway.metrics().admitted, 0);

        // Second shutdown is harmless
        gateway.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_detached_ticket_round_trip() {
        let gateway = Gateway::start(&config(5, Duration::from_secs(60)), echo()).unwrap();

        let id = gateway.submit_detached(json!("later")).unwrap();
        let response = gateway.wait_for(&id, Some(Duration::from_secs(5))).await.unwrap();
        assert!(response.success);

        assert_eq!(
            gateway.wait_for(&id, Some(Duration::from_millis(10))).await,
            Err(GatewayError::NotFound(id))
        );
        gateway.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let gateway = Gateway::start(&config(1, Duration::from_secs(60)), echo()).unwrap();
        let status = gateway.status();
        assert!(status.can_admit);
        assert_eq!(status.retry_after_ms, 0);
        assert_eq!(status.queue_capacity, 100);

        gateway.submit(json!(1)).unwrap().await.unwrap();
        let status = gateway.status();
        assert!(!status.can_admit);
        assert!(status.retry_after_ms > 0);
        assert_eq!(status.in_window, 1);
        assert_eq!(status.metrics.processed, 1);

        gateway.shutdown().await.unwrap();
    }
}
