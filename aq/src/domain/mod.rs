//! Domain types shared by the limiter, queue, processor and gateway

mod id;
mod request;
mod response;

pub use id::RequestId;
pub use request::{CompletionSlot, Fulfillment, QueuedRequest};
pub use response::ApiResponse;
