//! Sliding-window admission control
//!
//! Counts admissions inside a trailing time window and rejects new work once
//! the window is full.

mod config;
mod core;

pub use config::LimiterConfig;
pub use core::{Admission, SlidingWindowLimiter};
