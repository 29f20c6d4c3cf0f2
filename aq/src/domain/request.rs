//! QueuedRequest and its single-assignment completion slot

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use super::id::RequestId;
use super::response::ApiResponse;

/// Result of fulfilling a completion slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fulfillment {
    /// The waiting caller received the response
    Delivered,

    /// Nobody is listening any more (caller timed out or dropped the handle).
    /// The slot is still spent.
    Abandoned,

    /// The slot was already fulfilled; the response was discarded
    AlreadyFulfilled,
}

/// Write side of a one-shot response channel
///
/// Fulfilled at most once. Later attempts are reported, not panicked on.
#[derive(Debug)]
pub struct CompletionSlot {
    tx: Option<oneshot::Sender<ApiResponse>>,
}

impl CompletionSlot {
    /// Create a slot and the receiver the caller awaits
    pub fn channel() -> (Self, oneshot::Receiver<ApiResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn fulfill(&mut self, response: ApiResponse) -> Fulfillment {
        match self.tx.take() {
            Some(tx) => match tx.send(response) {
                Ok(()) => Fulfillment::Delivered,
                Err(_) => {
                    debug!("CompletionSlot::fulfill: receiver dropped");
                    Fulfillment::Abandoned
                }
            },
            None => {
                debug!("CompletionSlot::fulfill: already fulfilled");
                Fulfillment::AlreadyFulfilled
            }
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.tx.is_none()
    }

    /// True when the slot is unfulfilled but its receiver is gone
    pub fn is_abandoned(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.is_closed()).unwrap_or(false)
    }
}

/// An admitted unit of work waiting in (or taken from) the queue
#[derive(Debug)]
pub struct QueuedRequest {
    pub id: RequestId,
    /// Admission order, assigned by the gateway (0 until admitted)
    pub seq: u64,
    pub enqueued_at: DateTime<Utc>,
    pub payload: Value,
    slot: CompletionSlot,
}

impl QueuedRequest {
    /// Create a request with a fresh ID; returns the receiver for its response
    pub fn new(payload: Value) -> (Self, oneshot::Receiver<ApiResponse>) {
        Self::with_id(RequestId::generate(), payload)
    }

    pub fn with_id(id: RequestId, payload: Value) -> (Self, oneshot::Receiver<ApiResponse>) {
        let (slot, rx) = CompletionSlot::channel();
        let request = Self {
            id,
            seq: 0,
            enqueued_at: Utc::now(),
            payload,
            slot,
        };
        (request, rx)
    }

    /// Fulfill this request's slot
    pub fn complete(&mut self, response: ApiResponse) -> Fulfillment {
        debug!(request_id = %self.id, success = response.success, "QueuedRequest::complete: called");
        self.slot.fulfill(response)
    }

    pub fn is_completed(&self) -> bool {
        self.slot.is_fulfilled()
    }

    pub fn is_abandoned(&self) -> bool {
        self.slot.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_slot_delivers_once() {
        let (mut slot, rx) = CompletionSlot::channel();
        assert!(!slot.is_fulfilled());

        assert_eq!(slot.fulfill(ApiResponse::failure("first")), Fulfillment::Delivered);
        assert!(slot.is_fulfilled());
        assert_eq!(
            slot.fulfill(ApiResponse::failure("second")),
            Fulfillment::AlreadyFulfilled
        );

        let response = rx.await.unwrap();
        assert_eq!(response.message, "first");
    }

    #[test]
    fn test_slot_reports_abandoned_receiver() {
        let (mut slot, rx) = CompletionSlot::channel();
        drop(rx);
        assert!(slot.is_abandoned());
        assert_eq!(slot.fulfill(ApiResponse::failure("late")), Fulfillment::Abandoned);
        assert!(slot.is_fulfilled());
        assert!(!slot.is_abandoned());
    }

    #[tokio::test]
    async fn test_queued_request_complete() {
        let (mut request, rx) = QueuedRequest::new(json!("hello"));
        assert!(!request.is_completed());

        let outcome = request.complete(ApiResponse::success("ok", json!(1)));
        assert_eq!(outcome, Fulfillment::Delivered);
        assert!(request.is_completed());
        assert_eq!(rx.await.unwrap().data, Some(json!(1)));
    }

    #[test]
    fn test_with_id_keeps_given_id() {
        let (request, _rx) = QueuedRequest::with_id(RequestId::from("fixed"), json!(null));
        assert_eq!(request.id.as_str(), "fixed");
    }
}
