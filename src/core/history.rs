//! Transition trace of a machine instance.
//!
//! Machines built with tracing enabled record every state change made by a
//! ringlet. The trace is bounded: once `capacity` entries are held, the
//! oldest entry is discarded.

use super::state::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single state change.
///
/// # Example
///
/// ```rust
/// use llfsm::core::StateTransition;
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: 3,
///     to: 0,
///     timestamp: Utc::now(),
///     ringlet: 1,
/// };
/// assert_eq!(transition.to, 0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state the ringlet executed
    pub from: StateId,
    /// The state the machine moved to
    pub to: StateId,
    /// When the change happened
    pub timestamp: DateTime<Utc>,
    /// Ringlet counter value of the ringlet that caused the change
    pub ringlet: u64,
}

/// Ordered, bounded history of state changes.
///
/// # Example
///
/// ```rust
/// use llfsm::core::{StateHistory, StateTransition};
/// use chrono::Utc;
///
/// let mut history = StateHistory::with_capacity(16);
/// history.record(StateTransition { from: 2, to: 0, timestamp: Utc::now(), ringlet: 1 });
/// history.record(StateTransition { from: 0, to: 1, timestamp: Utc::now(), ringlet: 2 });
///
/// assert_eq!(history.get_path(), vec![2, 0, 1]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    capacity: usize,
    transitions: VecDeque<StateTransition>,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl StateHistory {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create an empty history that keeps at most `capacity` transitions.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
        }
    }

    /// Record a transition, evicting the oldest entry when full.
    pub fn record(&mut self, transition: StateTransition) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Get the path of states traversed.
    ///
    /// Returns the `from` state of the oldest retained transition followed by
    /// the `to` state of every transition.
    pub fn get_path(&self) -> Vec<StateId> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.front() {
            path.push(first.from);
        }
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    /// Wall-clock time between the first and last retained transition.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// All retained transitions, oldest first.
    pub fn transitions(&self) -> impl ExactSizeIterator<Item = &StateTransition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: StateId, to: StateId, ringlet: u64) -> StateTransition {
        StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            ringlet,
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = StateHistory::default();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let mut history = StateHistory::default();
        history.record(transition(4, 0, 1));
        history.record(transition(0, 1, 2));
        history.record(transition(1, 0, 3));

        assert_eq!(history.get_path(), vec![4, 0, 1, 0]);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut history = StateHistory::with_capacity(2);
        history.record(transition(4, 0, 1));
        history.record(transition(0, 1, 2));
        history.record(transition(1, 2, 3));

        assert_eq!(history.len(), 2);
        assert_eq!(history.get_path(), vec![0, 1, 2]);
        assert_eq!(history.transitions().next().map(|t| t.ringlet), Some(2));
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let mut history = StateHistory::default();
        history.record(transition(0, 1, 1));
        std::thread::sleep(Duration::from_millis(10));
        history.record(transition(1, 2, 2));

        assert!(history.duration().unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn single_transition_has_duration_zero() {
        let mut history = StateHistory::default();
        history.record(transition(0, 1, 1));

        assert_eq!(history.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = StateHistory::with_capacity(8);
        history.record(transition(0, 1, 1));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.get_path(), history.get_path());
    }
}
