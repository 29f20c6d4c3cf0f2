//! RequestProcessor - the single consumer of the request queue

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{ApiResponse, Fulfillment, QueuedRequest};
use crate::metrics::GatewayMetrics;
use crate::queue::RequestQueue;

use super::config::ProcessorConfig;
use super::handler::RequestHandler;

/// Message given to requests still queued when the processor stops
pub const SHUTDOWN_MESSAGE: &str = "Service is shutting down";

/// Counts reported by a stopped processor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorSummary {
    pub processed: u64,
    pub failed: u64,
    pub drained: u64,
}

/// Drains the queue one request at a time through a [`RequestHandler`]
pub struct RequestProcessor {
    config: ProcessorConfig,
    queue: Arc<RequestQueue>,
    handler: Arc<dyn RequestHandler>,
    metrics: Arc<GatewayMetrics>,
}

impl RequestProcessor {
    pub fn new(
        config: ProcessorConfig,
        queue: Arc<RequestQueue>,
        handler: Arc<dyn RequestHandler>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        debug!(?config, "RequestProcessor::new: called");
        Self {
            config,
            queue,
            handler,
            metrics,
        }
    }

    /// Spawn the processing loop on the current runtime
    pub fn spawn(self) -> ProcessorHandle {
        let queue = Arc::clone(&self.queue);
        let join = tokio::spawn(self.run());
        ProcessorHandle { queue, join }
    }

    /// Run until the queue is shut down, then fail whatever is left in it
    pub async fn run(self) -> ProcessorSummary {
        info!("Request processor started");
        let mut summary = ProcessorSummary::default();

        while let Some(mut request) = self.queue.dequeue().await {
            let response = self.process(&request).await;
            if response.success {
                summary.processed += 1;
                self.metrics.record_processed();
            } else {
                summary.failed += 1;
                self.metrics.record_failed();
            }
            self.deliver(&mut request, response);
        }

        for mut request in self.queue.drain() {
            debug!(request_id = %request.id, "RequestProcessor::run: failing queued request at shutdown");
            summary.drained += 1;
            self.metrics.record_drained();
            self.deliver(&mut request, ApiResponse::failure(SHUTDOWN_MESSAGE));
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            drained = summary.drained,
            "Request processor stopped"
        );
        summary
    }

    /// Run the handler for one request and turn any outcome into a response
    async fn process(&self, request: &QueuedRequest) -> ApiResponse {
        debug!(request_id = %request.id, "RequestProcessor::process: called");
        let work = AssertUnwindSafe(self.handler.handle(request)).catch_unwind();

        let outcome = match self.config.handler_timeout() {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(request_id = %request.id, ?limit, "Handler timed out");
                    return ApiResponse::failure(format!("Processing failed: handler timed out after {:?}", limit));
                }
            },
            None => work.await,
        };

        match outcome {
            Ok(Ok(data)) => {
                info!(request_id = %request.id, "Processed request");
                ApiResponse::success("Request processed successfully", data)
            }
            Ok(Err(e)) => {
                warn!(request_id = %request.id, error = %e, "Handler failed");
                ApiResponse::failure(format!("Processing failed: {}", e))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(request_id = %request.id, %reason, "Handler panicked");
                ApiResponse::failure(format!("Processing failed: handler panicked: {}", reason))
            }
        }
    }

    fn deliver(&self, request: &mut QueuedRequest, response: ApiResponse) {
        match request.complete(response) {
            Fulfillment::Delivered => {}
            Fulfillment::Abandoned => {
                debug!(request_id = %request.id, "RequestProcessor::deliver: caller stopped waiting");
                self.metrics.record_abandoned();
            }
            Fulfillment::AlreadyFulfilled => {
                error!(request_id = %request.id, "Request was already completed");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owner of a running processor task
#[derive(Debug)]
pub struct ProcessorHandle {
    queue: Arc<RequestQueue>,
    join: JoinHandle<ProcessorSummary>,
}

impl ProcessorHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Shut the queue down and wait for the processor to finish.
    ///
    /// The in-flight request completes normally; queued ones are failed.
    pub async fn stop(self) -> eyre::Result<ProcessorSummary> {
        debug!("ProcessorHandle::stop: called");
        self.queue.shutdown();
        let summary = self.join.await?;
        Ok(summary)
    }
}
