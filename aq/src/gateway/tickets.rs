//! Detached tickets and the sweeper that expires them
//!
//! A ticket keeps the response receiver of a request submitted with
//! `submit_detached`, so the caller can come back for it by ID later.
//! Tickets nobody collects are removed once they pass the max age.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::domain::{ApiResponse, RequestId};
use crate::metrics::GatewayMetrics;

use super::error::GatewayError;

#[derive(Debug)]
struct Ticket {
    rx: oneshot::Receiver<ApiResponse>,
    issued_at: Instant,
}

/// Outstanding detached requests by ID
#[derive(Debug, Default)]
pub struct TicketBook {
    tickets: Mutex<HashMap<RequestId, Ticket>>,
}

impl TicketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, id: RequestId, rx: oneshot::Receiver<ApiResponse>) {
        debug!(request_id = %id, "TicketBook::issue: called");
        self.lock().insert(
            id,
            Ticket {
                rx,
                issued_at: Instant::now(),
            },
        );
    }

    /// Wait for the response of ticket `id`.
    ///
    /// A completed wait consumes the ticket. A wait that ends without a
    /// result, by timing out or by the caller dropping the future, puts it
    /// back so the caller can poll again. While one caller is waiting,
    /// others get `NotFound`.
    pub async fn redeem(&self, id: &RequestId, timeout: Option<Duration>) -> Result<ApiResponse, GatewayError> {
        debug!(request_id = %id, ?timeout, "TicketBook::redeem: called");
        let ticket = self
            .lock()
            .remove(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        let mut checkout = Checkout {
            book: self,
            id: id.clone(),
            ticket: Some(ticket),
        };

        let received = {
            let Some(ticket) = checkout.ticket.as_mut() else {
                return Err(GatewayError::NotFound(id.clone()));
            };
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut ticket.rx).await {
                    Ok(received) => received,
                    Err(_) => {
                        debug!(request_id = %id, "TicketBook::redeem: timed out, keeping ticket");
                        return Err(GatewayError::Timeout(limit));
                    }
                },
                None => (&mut ticket.rx).await,
            }
        };

        // Got a result: the ticket is spent
        checkout.ticket = None;
        received.map_err(|_| GatewayError::Abandoned(id.clone()))
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop tickets issued more than `max_age` before `now`; returns how many
    pub fn sweep(&self, max_age: Duration, now: Instant) -> usize {
        let mut tickets = self.lock();
        let before = tickets.len();
        tickets.retain(|_, ticket| now.saturating_duration_since(ticket.issued_at) <= max_age);
        before - tickets.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Ticket>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A ticket taken out for a wait; returned to the book on drop unless spent
struct Checkout<'a> {
    book: &'a TicketBook,
    id: RequestId,
    ticket: Option<Ticket>,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            debug!(request_id = %self.id, "Checkout::drop: returning ticket");
            self.book.lock().insert(self.id.clone(), ticket);
        }
    }
}

/// Periodically expires old tickets
pub struct Sweeper {
    tickets: Arc<TicketBook>,
    metrics: Arc<GatewayMetrics>,
    max_age: Duration,
    interval: Duration,
}

impl Sweeper {
    pub fn new(tickets: Arc<TicketBook>, metrics: Arc<GatewayMetrics>, max_age: Duration, interval: Duration) -> Self {
        info!(?max_age, ?interval, "Ticket sweeper initialized");
        Self {
            tickets,
            metrics,
            max_age,
            interval,
        }
    }

    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let join = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown_tx, join }
    }

    /// Sweep every interval until a shutdown signal arrives (or its sender is dropped)
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!("Ticket sweeper started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = self.tickets.sweep(self.max_age, Instant::now());
                    if removed > 0 {
                        info!(removed, max_age = ?self.max_age, "Expired uncollected tickets");
                        self.metrics.record_expired(removed as u64);
                    } else {
                        debug!("Sweeper::run: nothing expired");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Ticket sweeper stopping");
                    break;
                }
            }
        }
    }
}

/// Owner of a running sweeper task
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) -> eyre::Result<()> {
        debug!("SweeperHandle::stop: called");
        // A full buffer means a stop is already pending
        let _ = self.shutdown_tx.try_send(());
        self.join.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueuedRequest;
    use serde_json::json;

    #[tokio::test]
    async fn test_redeem_unknown_is_not_found() {
        let book = TicketBook::new();
        let id = RequestId::from("missing");
        assert_eq!(
            book.redeem(&id, Some(Duration::from_millis(10))).await,
            Err(GatewayError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn test_redeem_consumes_completed_ticket() {
        let book = TicketBook::new();
        let (mut request, rx) = QueuedRequest::new(json!("x"));
        book.issue(request.id.clone(), rx);

        request.complete(ApiResponse::success("done", json!(1)));
        let response = book.redeem(&request.id, None).await.unwrap();
        assert!(response.success);
        assert!(!book.contains(&request.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_redeem_keeps_ticket() {
        let book = TicketBook::new();
        let (mut request, rx) = QueuedRequest::new(json!("x"));
        book.issue(request.id.clone(), rx);

        let result = book.redeem(&request.id, Some(Duration::from_secs(1))).await;
        assert_eq!(result, Err(GatewayError::Timeout(Duration::from_secs(1))));
        assert!(book.contains(&request.id));

        request.complete(ApiResponse::failure("late"));
        let response = book.redeem(&request.id, Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(response.message, "late");
        assert!(book.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_redeem_keeps_ticket() {
        let book = TicketBook::new();
        let (mut request, rx) = QueuedRequest::new(json!("x"));
        book.issue(request.id.clone(), rx);

        // Caller gives up from the outside, the inner wait is unbounded
        let cancelled = tokio::time::timeout(Duration::from_millis(20), book.redeem(&request.id, None)).await;
        assert!(cancelled.is_err());
        assert!(book.contains(&request.id));
        assert!(!request.is_abandoned());

        request.complete(ApiResponse::success("done", json!(1)));
        let response = book.redeem(&request.id, Some(Duration::from_secs(1))).await.unwrap();
        assert!(response.success);
        assert!(book.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_slot_is_abandoned() {
        let book = TicketBook::new();
        let (request, rx) = QueuedRequest::new(json!("x"));
        let id = request.id.clone();
        book.issue(id.clone(), rx);
        drop(request);

        assert_eq!(book.redeem(&id, None).await, Err(GatewayError::Abandoned(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_old_tickets() {
        let book = TicketBook::new();
        let (old, old_rx) = QueuedRequest::new(json!(1));
        book.issue(old.id.clone(), old_rx);

        tokio::time::advance(Duration::from_secs(30)).await;
        let (fresh, fresh_rx) = QueuedRequest::new(json!(2));
        book.issue(fresh.id.clone(), fresh_rx);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(book.sweep(Duration::from_secs(60), Instant::now()), 1);
        assert!(!book.contains(&old.id));
        assert!(book.contains(&fresh.id));
        assert!(old.is_abandoned());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_expires_and_stops() {
        let book = Arc::new(TicketBook::new());
        let metrics = Arc::new(GatewayMetrics::new());
        let (_request, rx) = QueuedRequest::new(json!(1));
        book.issue(RequestId::from("stale"), rx);

        let handle = Sweeper::new(
            Arc::clone(&book),
            Arc::clone(&metrics),
            Duration::from_secs(10),
            Duration::from_secs(5),
        )
        .spawn();

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(book.is_empty());
        assert_eq!(metrics.snapshot().expired, 1);

        handle.stop().await.unwrap();
    }
}
