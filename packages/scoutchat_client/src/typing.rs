//! Typing indicator
//!
//! One shared deadline for the whole room, not per-typist state. Each typing
//! event pushes the deadline out; the indicator clears on its own once the
//! window passes with no further events.

use std::time::{Duration, Instant};

pub struct TypingIndicator {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl TypingIndicator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Record a typing event, restarting the visibility window.
    pub fn observe(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn is_typing(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now < d)
    }
}
