//! Request queue
//!
//! Holds admitted requests in arrival order until the processor takes them.

mod config;
mod core;
mod error;

pub use config::QueueConfig;
pub use core::RequestQueue;
pub use error::{EnqueueError, QueueError};
