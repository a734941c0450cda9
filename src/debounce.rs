//! Debounced dispatch with an injected clock.
//!
//! The caller feeds events with the current [`Instant`] and polls for the
//! trailing edge; nothing here owns a timer, so the same logic serves the
//! interactive session and tests.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debounce<T> {
    wait: Duration,
    leading: bool,
    /// End of the current quiet window.
    deadline: Option<Instant>,
    pending: Option<T>,
}

impl<T> Debounce<T> {
    /// `leading = true` fires the first event of a burst immediately and
    /// swallows the rest of the burst; `false` fires the last event once the
    /// burst has been quiet for `wait`.
    pub fn new(wait: Duration, leading: bool) -> Self {
        Self {
            wait,
            leading,
            deadline: None,
            pending: None,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Records an event; returns it when it should be dispatched right away.
    pub fn call(&mut self, now: Instant, value: T) -> Option<T> {
        let window_open = self.deadline.is_some_and(|deadline| now < deadline);
        self.deadline = Some(now + self.wait);

        if self.leading {
            if window_open {
                None
            } else {
                Some(value)
            }
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Returns the trailing event once its quiet window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.pending.take()
    }

    /// When [`Debounce::poll`] may next yield something.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and(self.deadline)
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}
