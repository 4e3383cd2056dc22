//! Deadlines, cancellation and run reports.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation token checked at the top of every scheduler cycle.
///
/// A ringlet in progress is never interrupted.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous stop request so the scheduler can run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Wait until `deadline`: sleep until `spin_threshold` before it, then spin.
///
/// Returns how late the call was when the deadline had already passed.
pub fn wait_until(deadline: Instant, spin_threshold: Duration) -> Option<Duration> {
    let now = Instant::now();
    if now > deadline {
        return Some(now - deadline);
    }
    let remaining = deadline - now;
    if remaining > spin_threshold {
        std::thread::sleep(remaining - spin_threshold);
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
    None
}

/// Why a scheduler stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop signal was raised.
    Stopped,
    /// Every machine finished and left the schedule.
    Finished,
    /// Every remaining machine is finished, suspended or waiting to be
    /// invoked.
    Idle,
    /// The configured number of cycles ran.
    CycleLimit,
}

/// Summary of a scheduler run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub cycles: u64,
    pub reason: StopReason,
    /// Slots that started after their deadline.
    pub late_starts: u64,
    /// Slots whose ringlet ran past the end of the slot.
    pub overruns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_reaches_deadline() {
        let deadline = Instant::now() + Duration::from_millis(3);

        let late = wait_until(deadline, Duration::from_micros(200));

        assert!(late.is_none());
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn wait_until_reports_lateness() {
        let deadline = Instant::now();
        std::thread::sleep(Duration::from_millis(2));

        let late = wait_until(deadline, Duration::from_micros(200));

        assert!(late.unwrap() >= Duration::from_millis(2));
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let clone = signal.clone();

        clone.stop();
        assert!(signal.is_stopped());

        signal.reset();
        assert!(!clone.is_stopped());
    }
}
