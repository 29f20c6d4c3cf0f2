//! FIFO request queue with suspend-until-ready dequeue

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::domain::{QueuedRequest, RequestId};

use super::config::QueueConfig;
use super::error::{EnqueueError, QueueError};

/// Internal state protected by mutex
#[derive(Debug, Default)]
struct QueueInner {
    /// Waiting requests, head first
    items: VecDeque<QueuedRequest>,

    /// Set once by shutdown, never cleared
    closed: bool,

    peak_depth: usize,
}

/// Bounded FIFO of admitted requests.
///
/// Any number of producers may enqueue concurrently; one consumer dequeues.
/// The consumer parks on a `Notify` while the queue is empty.
#[derive(Debug)]
pub struct RequestQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new(config: &QueueConfig) -> Self {
        debug!(?config, "RequestQueue::new: called");
        Self::with_capacity(config.capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
        }
    }

    /// Append to the tail; returns the 1-based position in the queue
    pub fn enqueue(&self, request: QueuedRequest) -> Result<usize, EnqueueError> {
        debug!(request_id = %request.id, "RequestQueue::enqueue: called");
        let mut inner = self.lock();

        if inner.closed {
            debug!(request_id = %request.id, "RequestQueue::enqueue: closed, refusing");
            return Err(EnqueueError {
                kind: QueueError::Closed,
                request,
            });
        }

        if inner.items.len() >= self.capacity {
            debug!(request_id = %request.id, capacity = self.capacity, "RequestQueue::enqueue: full, refusing");
            return Err(EnqueueError {
                kind: QueueError::Full {
                    capacity: self.capacity,
                },
                request,
            });
        }

        inner.items.push_back(request);
        let position = inner.items.len();
        inner.peak_depth = inner.peak_depth.max(position);
        drop(inner);

        // Stores a permit if the consumer is not parked yet
        self.notify.notify_one();
        Ok(position)
    }

    /// Take the head, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is shut down, even if items remain;
    /// use [`drain`](Self::drain) to collect those.
    pub async fn dequeue(&self) -> Option<QueuedRequest> {
        loop {
            // Register interest before checking so a concurrent enqueue or
            // shutdown between the check and the await is not missed
            let notified = self.notify.notified();
            {
                let mut inner = self.lock();
                if inner.closed {
                    debug!("RequestQueue::dequeue: closed");
                    return None;
                }
                if let Some(request) = inner.items.pop_front() {
                    debug!(request_id = %request.id, remaining = inner.items.len(), "RequestQueue::dequeue: took head");
                    return Some(request);
                }
            }
            notified.await;
        }
    }

    /// Take the head without waiting
    pub fn try_dequeue(&self) -> Option<QueuedRequest> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        inner.items.pop_front()
    }

    /// Close the queue and wake every waiter. Idempotent.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.closed {
            debug!("RequestQueue::shutdown: already closed");
            return;
        }
        inner.closed = true;
        let remaining = inner.items.len();
        drop(inner);

        info!(remaining, "Request queue shut down");
        self.notify.notify_waiters();
    }

    /// Remove every remaining request, in FIFO order
    pub fn drain(&self) -> Vec<QueuedRequest> {
        let mut inner = self.lock();
        let drained: Vec<_> = inner.items.drain(..).collect();
        debug!(count = drained.len(), "RequestQueue::drain: called");
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().items.len() >= self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn peak_depth(&self) -> usize {
        self.lock().peak_depth
    }

    /// Snapshot of queued IDs, head first
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.lock().items.iter().map(|r| r.id.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
