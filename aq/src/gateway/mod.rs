//! Gateway facade
//!
//! `submit` runs the limiter, queues admitted work for the background
//! processor, and returns a [`Submission`] that resolves to the request's
//! [`ApiResponse`](crate::domain::ApiResponse). Detached submissions park the
//! response under a ticket that a sweeper expires if nobody collects it.

mod config;
mod core;
mod error;
mod tickets;

pub use config::GatewayConfig;
pub use core::{Gateway, GatewayStatus, ShutdownReport, Submission};
pub use error::GatewayError;
pub use tickets::{Sweeper, SweeperHandle, TicketBook};
