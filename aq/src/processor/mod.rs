//! Background request processor
//!
//! A single long-lived task takes requests off the queue, runs them through a
//! [`RequestHandler`], and answers each request's completion slot exactly once.

mod config;
mod core;
mod handler;

pub use config::ProcessorConfig;
pub use core::{ProcessorHandle, ProcessorSummary, RequestProcessor, SHUTDOWN_MESSAGE};
pub use handler::{EchoHandler, RequestHandler};
