//! Logical clock of a machine instance.

use std::time::{Duration, Instant};

/// Ringlet counter plus the time spent in the current state.
///
/// Schedulers call [`Clock::update`] with the start time of each ringlet;
/// entering a new state restarts the state timer at that time.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    ringlets: u64,
    state_entered_at: Instant,
    now: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock {
    pub fn new(now: Instant) -> Self {
        Self {
            ringlets: 0,
            state_entered_at: now,
            now,
        }
    }

    /// Set the start time of the next ringlet.
    pub fn update(&mut self, now: Instant) {
        self.now = now.max(self.now);
    }

    /// Record that a ringlet finished; restarts the state timer when the
    /// ringlet moved the machine into a new state.
    pub(crate) fn tick(&mut self, entered_new_state: bool) {
        self.ringlets += 1;
        if entered_new_state {
            self.state_entered_at = self.now;
        }
    }

    pub(crate) fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Number of ringlets executed so far.
    pub fn ringlets(&self) -> u64 {
        self.ringlets
    }

    /// Time between entering the current state and the start of the
    /// current ringlet.
    pub fn state_elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.state_entered_at)
    }

    pub fn now(&self) -> Instant {
        self.now
    }
}
