//! admitq - sliding-window admission gate with a FIFO request queue
//!
//! Incoming work passes a sliding-window rate limiter. Admitted requests are
//! queued in arrival order and executed one at a time by a background
//! processor, which answers each request's completion slot exactly once.
//!
//! # Core Concepts
//!
//! - **Sliding window**: at most `max-requests` admissions in any trailing window
//! - **FIFO queue**: admitted work is processed in admission order, one consumer
//! - **Completion slot**: every admitted request gets exactly one `ApiResponse`
//! - **Contained failures**: handler errors and panics become failed responses
//!
//! # Modules
//!
//! - [`limiter`] - Sliding-window admission control
//! - [`queue`] - Bounded FIFO of admitted requests
//! - [`processor`] - Background consumer and the handler trait
//! - [`gateway`] - Facade wiring the three together, plus detached tickets
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod limiter;
pub mod metrics;
pub mod processor;
pub mod queue;

// Re-export commonly used types
pub use config::Config;
pub use domain::{ApiResponse, CompletionSlot, Fulfillment, QueuedRequest, RequestId};
pub use gateway::{Gateway, GatewayConfig, GatewayError, GatewayStatus, ShutdownReport, Submission};
pub use limiter::{Admission, LimiterConfig, SlidingWindowLimiter};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use processor::{EchoHandler, ProcessorConfig, ProcessorHandle, ProcessorSummary, RequestHandler, RequestProcessor};
pub use queue::{EnqueueError, QueueConfig, QueueError, RequestQueue};
