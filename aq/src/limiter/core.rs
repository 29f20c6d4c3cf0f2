//! Sliding-window limiter implementation

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::config::LimiterConfig;

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Recorded in the window, may proceed
    Admitted,

    /// Window is full, try again later
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Admits at most `max_requests` within any trailing window.
///
/// A timestamp `t` is live at `now` while `now - window <= t`. Pruning is
/// lazy and happens under the same lock as the check and the record, so two
/// callers can never both claim the last free slot.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    config: LimiterConfig,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        debug!(?config, "SlidingWindowLimiter::new: called");
        let window = config.window();
        Self {
            config,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Admit now if the window has room
    pub fn try_admit(&self) -> bool {
        self.check().is_admitted()
    }

    pub fn try_admit_at(&self, now: Instant) -> bool {
        self.check_at(now).is_admitted()
    }

    /// Admit now, or say how long until a slot frees up
    pub fn check(&self) -> Admission {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Admission {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);

        if timestamps.len() < self.config.max_requests as usize {
            timestamps.push_back(now);
            debug!(in_window = timestamps.len(), "SlidingWindowLimiter::check_at: admitted");
            return Admission::Admitted;
        }

        let retry_after = self.retry_after_locked(&timestamps, now);
        debug!(?retry_after, "SlidingWindowLimiter::check_at: rejected");
        Admission::Rejected { retry_after }
    }

    /// Time until the next admission could succeed; zero if one would now
    pub fn retry_after(&self) -> Duration {
        self.retry_after_at(Instant::now())
    }

    pub fn retry_after_at(&self, now: Instant) -> Duration {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);
        if timestamps.len() < self.config.max_requests as usize {
            return Duration::ZERO;
        }
        self.retry_after_locked(&timestamps, now)
    }

    /// Number of live admissions in the current window
    pub fn in_window(&self) -> usize {
        self.in_window_at(Instant::now())
    }

    pub fn in_window_at(&self, now: Instant) -> usize {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);
        timestamps.len()
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        // An instant earlier than `window` after the clock origin has nothing to prune
        let Some(window_start) = now.checked_sub(self.window) else {
            return;
        };
        while timestamps.front().map(|t| *t < window_start).unwrap_or(false) {
            timestamps.pop_front();
        }
    }

    fn retry_after_locked(&self, timestamps: &VecDeque<Instant>, now: Instant) -> Duration {
        match timestamps.front() {
            // The oldest entry leaves the window once strictly more than `window` has passed
            Some(oldest) => (*oldest + self.window + Duration::from_millis(1)).saturating_duration_since(now),
            None => self.window,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // The deque is valid after any panic mid-operation
        self.timestamps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
