//! Mutable bookkeeping of a single machine instance.

use super::context::{FsmContext, MachineData};
use crate::core::{RunStatus, StateHistory, StateId, StateTransition};
use chrono::Utc;

/// Per-instance run data read and written by the ringlet.
///
/// `current_state` and `previous_state` only change through
/// [`RunData::resolve`], which the instance calls once per ringlet with the
/// id the ringlet returned.
pub struct RunData<D: MachineData> {
    pub initial_state: StateId,
    pub current_state: StateId,
    pub previous_state: StateId,
    pub suspend_state: StateId,
    /// State to return to on resume; set when suspending, cleared on restart.
    pub suspended_state: Option<StateId>,
    pub context: FsmContext<D>,
    accepting: Vec<bool>,
    fired_transition: bool,
    history: Option<StateHistory>,
}

impl<D: MachineData> RunData<D> {
    pub(crate) fn new(
        initial_state: StateId,
        previous_state: StateId,
        suspend_state: StateId,
        accepting: Vec<bool>,
        context: FsmContext<D>,
        history: Option<StateHistory>,
    ) -> Self {
        Self {
            initial_state,
            current_state: initial_state,
            previous_state,
            suspend_state,
            suspended_state: None,
            context,
            accepting,
            fired_transition: false,
            history,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.context.status
    }

    /// In an accepting state that has executed at least once.
    pub fn is_finished(&self) -> bool {
        self.current_state == self.previous_state
            && self.current_state != self.suspend_state
            && self.accepting.get(self.current_state).copied().unwrap_or(false)
    }

    pub fn is_suspended(&self) -> bool {
        self.current_state == self.suspend_state
    }

    pub fn history(&self) -> Option<&StateHistory> {
        self.history.as_ref()
    }

    /// Called by the ringlet when a transition guard matched, including a
    /// transition back into the same state.
    pub(crate) fn mark_transition(&mut self) {
        self.fired_transition = true;
    }

    /// Apply the outcome of a ringlet and settle the run status.
    pub fn resolve(&mut self, next: StateId) {
        let fired = std::mem::take(&mut self.fired_transition);
        self.previous_state = self.current_state;
        self.current_state = next;
        match self.context.status {
            RunStatus::Suspending => self.suspend(),
            RunStatus::Resuming => self.resume(),
            RunStatus::Restarting => self.restart(),
            _ => {
                let transitioned = fired || self.changed();
                self.context.status = if self.suspended_state.is_some() && self.is_suspended() {
                    RunStatus::Suspended { transitioned }
                } else {
                    RunStatus::Executing { transitioned }
                };
            }
        }
        if self.is_finished() {
            self.context.status = RunStatus::Finished;
        }
        let entered = self.context.status.transitioned();
        self.context.clock.tick(entered);
        if entered {
            self.record();
        }
    }

    /// Move to the suspend state, remembering where to resume.
    pub fn suspend(&mut self) {
        if self.suspended_state.is_none() {
            self.suspended_state = Some(self.current_state);
            self.current_state = self.suspend_state;
        }
        self.context.status = RunStatus::Suspended {
            transitioned: self.changed(),
        };
    }

    /// Return to the state the machine was suspended in.
    pub fn resume(&mut self) {
        let Some(suspended) = self.suspended_state.take() else {
            self.context.status = RunStatus::Executing {
                transitioned: self.changed(),
            };
            return;
        };
        self.current_state = suspended;
        self.context.status = RunStatus::Resumed {
            transitioned: self.changed(),
        };
    }

    /// Move back to the initial state.
    pub fn restart(&mut self) {
        self.current_state = self.initial_state;
        self.suspended_state = None;
        self.context.status = RunStatus::Restarted {
            transitioned: self.changed(),
        };
    }

    fn changed(&self) -> bool {
        self.current_state != self.previous_state
    }

    fn record(&mut self) {
        let ringlet = self.context.clock.ringlets();
        let (from, to) = (self.previous_state, self.current_state);
        if let Some(history) = self.history.as_mut() {
            history.record(StateTransition {
                from,
                to,
                timestamp: Utc::now(),
                ringlet,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::testing::Counter;

    // States: 0 = Work, 1 = Done (accepting), 2 = __Initial, 3 = __Previous, 4 = __Suspend
    fn data() -> RunData<Counter> {
        RunData::new(
            2,
            3,
            4,
            vec![false, true, false, true, true],
            FsmContext::new(()),
            Some(StateHistory::default()),
        )
    }

    #[test]
    fn plain_transition_sets_executing() {
        let mut data = data();
        data.resolve(0);

        assert_eq!(data.current_state, 0);
        assert_eq!(data.previous_state, 2);
        assert_eq!(data.status(), RunStatus::Executing { transitioned: true });

        data.resolve(0);
        assert_eq!(data.status(), RunStatus::Executing { transitioned: false });
    }

    #[test]
    fn self_transition_counts_as_transitioned() {
        let mut data = data();
        data.resolve(0);
        data.mark_transition();
        data.resolve(0);

        assert_eq!(data.status(), RunStatus::Executing { transitioned: true });
    }

    #[test]
    fn suspend_remembers_next_state() {
        let mut data = data();
        data.resolve(0);
        data.context.suspend();
        data.resolve(0);

        assert_eq!(data.current_state, 4);
        assert_eq!(data.suspended_state, Some(0));
        assert_eq!(data.status(), RunStatus::Suspended { transitioned: true });
        assert!(data.is_suspended());

        data.resolve(4);
        assert_eq!(data.status(), RunStatus::Suspended { transitioned: false });
    }

    #[test]
    fn suspending_twice_keeps_suspended_state() {
        let mut data = data();
        data.resolve(0);
        data.context.suspend();
        data.resolve(0);
        data.context.suspend();
        data.resolve(4);

        assert_eq!(data.suspended_state, Some(0));
        assert_eq!(data.current_state, 4);
        assert_eq!(data.status(), RunStatus::Suspended { transitioned: false });
    }

    #[test]
    fn resume_returns_to_suspended_state() {
        let mut data = data();
        data.resolve(0);
        data.context.suspend();
        data.resolve(0);
        data.context.resume();
        data.resolve(4);

        assert_eq!(data.current_state, 0);
        assert_eq!(data.suspended_state, None);
        assert_eq!(data.status(), RunStatus::Resumed { transitioned: true });
    }

    #[test]
    fn resume_without_suspension_is_executing() {
        let mut data = data();
        data.resolve(0);
        data.context.resume();
        data.resolve(0);

        assert_eq!(data.current_state, 0);
        assert_eq!(data.status(), RunStatus::Executing { transitioned: false });
    }

    #[test]
    fn restart_clears_suspension() {
        let mut data = data();
        data.resolve(0);
        data.context.suspend();
        data.resolve(0);
        data.context.restart();
        data.resolve(4);

        assert_eq!(data.current_state, 2);
        assert_eq!(data.suspended_state, None);
        assert_eq!(data.status(), RunStatus::Restarted { transitioned: true });
    }

    #[test]
    fn accepting_state_finishes_after_one_ringlet() {
        let mut data = data();
        data.resolve(0);
        data.resolve(1);
        assert!(!data.is_finished());
        assert_eq!(data.status(), RunStatus::Executing { transitioned: true });

        data.resolve(1);
        assert!(data.is_finished());
        assert_eq!(data.status(), RunStatus::Finished);
    }

    #[test]
    fn history_records_state_changes() {
        let mut data = data();
        data.resolve(0);
        data.resolve(0);
        data.resolve(1);

        assert_eq!(data.history().unwrap().get_path(), vec![2, 0, 1]);
    }
}
