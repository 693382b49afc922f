//! Coalescing delayed action.
//!
//! Scheduling a value cancels whatever was pending and restarts the quiet
//! window. The value only comes out once the window passes with no newer
//! schedule.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Replace any pending value and restart the window from `now`.
    /// Returns `true` if a pending value was cancelled.
    pub fn schedule(&mut self, now: Instant, value: T) -> bool {
        self.pending.replace((now + self.window, value)).is_some()
    }

    /// Take the pending value if its window has elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.deadline().is_some_and(|deadline| now >= deadline) {
            self.flush()
        } else {
            None
        }
    }

    /// Take the pending value regardless of the window.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(_, v)| v)
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
