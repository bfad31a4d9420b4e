use std::time::{Duration, Instant};

/// A single-shot timer polled from the event loop.
///
/// Scheduling while armed replaces the previous deadline, so a burst of
/// events collapses into one firing `delay` after the last of them.
#[derive(Debug, Clone)]
pub struct CancellableTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl CancellableTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
