//! # Throttling Backoff
//!
//! Any worker that sees the status API throttle the poller raises the shared
//! [`BackoffState`]. The cycle loop consumes the flag exactly once after each
//! dispatch barrier and picks the next pause through [`PausePolicy`], so
//! throttling seen in one cycle lengthens only the pause that follows it.

use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct BackoffState {
    blocked: Mutex<bool>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that upstream throttling was detected. Idempotent.
    pub fn raise(&self) {
        *self.blocked.lock() = true;
    }

    /// Return whether throttling was seen since the last call and clear it.
    pub fn consume_and_reset(&self) -> bool {
        std::mem::take(&mut *self.blocked.lock())
    }

    pub fn is_raised(&self) -> bool {
        *self.blocked.lock()
    }
}

/// Chooses the inter-cycle pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PausePolicy {
    pub baseline: Duration,
    pub extended: Duration,
}

impl PausePolicy {
    pub fn new(baseline: Duration, extended: Duration) -> Self {
        Self { baseline, extended }
    }

    pub fn next_pause(&self, was_blocked: bool) -> Duration {
        if was_blocked {
            self.extended
        } else {
            self.baseline
        }
    }
}
