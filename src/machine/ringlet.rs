//! The per-cycle execution algorithm of a logic-labelled machine.

use super::context::{FsmContext, MachineData};
use super::run_data::RunData;
use crate::core::{RunStatus, State, StateId};

/// Executes one ringlet of the current state.
///
/// A ringlet fires, in order:
/// 1. `on_resume` on the suspend state and then the current state when the
///    machine was just resumed,
/// 2. `on_entry` when the previous ringlet moved into this state,
/// 3. `on_exit` of the first transition whose guard holds, or `internal`
///    when none does,
/// 4. `on_suspend` on the current state and then the suspend state when a
///    suspension is pending.
///
/// The returned id is handed to [`RunData::resolve`].
pub struct Ringlet;

impl Ringlet {
    pub fn execute<D: MachineData>(states: &[State<D>], data: &mut RunData<D>) -> StateId {
        let current = data.current_state;
        let suspend = data.suspend_state;
        let state = &states[current];
        let status = data.status();

        if matches!(status, RunStatus::Resumed { .. }) {
            if current != suspend {
                Self::fire(states, data, suspend, |s, ctx| s.behaviour.on_resume(ctx));
            }
            Self::fire(states, data, current, |s, ctx| s.behaviour.on_resume(ctx));
        }

        if status.transitioned() {
            Self::fire(states, data, current, |s, ctx| s.behaviour.on_entry(ctx));
        }

        // Guards see the context after onEntry.
        let target = state
            .transitions
            .iter()
            .find(|t| t.can_transition(&data.context))
            .map(|t| t.target);

        let next = match target {
            Some(target) => {
                data.mark_transition();
                Self::fire(states, data, current, |s, ctx| s.behaviour.on_exit(ctx));
                target
            }
            None => {
                Self::fire(states, data, current, |s, ctx| s.behaviour.internal(ctx));
                current
            }
        };

        if data.status() == RunStatus::Suspending {
            Self::fire(states, data, current, |s, ctx| s.behaviour.on_suspend(ctx));
            if current != suspend {
                Self::fire(states, data, suspend, |s, ctx| s.behaviour.on_suspend(ctx));
            }
        }

        next
    }

    fn fire<D, F>(states: &[State<D>], data: &mut RunData<D>, id: StateId, callback: F)
    where
        D: MachineData,
        F: FnOnce(&State<D>, &mut FsmContext<D>),
    {
        data.context.active_state = id;
        callback(&states[id], &mut data.context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CallbackState, Guard, Transition};
    use crate::machine::testing::Counter;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn logging(name: &'static str) -> CallbackState<Counter> {
        CallbackState::<Counter>::new()
            .on_entry(move |ctx| ctx.vars.log.push(format!("{name}.entry")))
            .internal(move |ctx| ctx.vars.log.push(format!("{name}.internal")))
            .on_exit(move |ctx| ctx.vars.log.push(format!("{name}.exit")))
            .on_suspend(move |ctx| ctx.vars.log.push(format!("{name}.suspend")))
            .on_resume(move |ctx| ctx.vars.log.push(format!("{name}.resume")))
    }

    fn state(id: StateId, name: &'static str, transitions: Vec<Transition<Counter>>) -> State<Counter> {
        State {
            id,
            name: name.to_string(),
            transitions,
            environment_uses: BTreeSet::new(),
            behaviour: Arc::new(logging(name)),
        }
    }

    // 0 = Work, 1 = Idle, 2 = Sleep (suspend), 3 = __Initial, 4 = __Previous
    fn model(work: Vec<Transition<Counter>>) -> Vec<State<Counter>> {
        vec![
            state(0, "Work", work),
            state(1, "Idle", Vec::new()),
            state(2, "Sleep", Vec::new()),
            State::pseudo(3, "__Initial", vec![Transition::always(0)]),
            State::pseudo(4, "__Previous", Vec::new()),
        ]
    }

    fn run_data() -> RunData<Counter> {
        RunData::new(
            3,
            4,
            2,
            vec![false, true, true, false, true],
            FsmContext::new(()),
            None,
        )
    }

    fn step(states: &[State<Counter>], data: &mut RunData<Counter>) {
        let next = Ringlet::execute(states, data);
        data.resolve(next);
    }

    #[test]
    fn first_matching_transition_wins() {
        let states = model(vec![
            Transition::new(2, Guard::never()),
            Transition::always(1),
            Transition::always(2),
        ]);
        let mut data = run_data();
        step(&states, &mut data);

        let next = Ringlet::execute(&states, &mut data);

        assert_eq!(next, 1);
        assert_eq!(data.context.vars.log, vec!["Work.entry", "Work.exit"]);
    }

    #[test]
    fn no_match_runs_internal() {
        let states = model(vec![Transition::new(1, Guard::never())]);
        let mut data = run_data();
        step(&states, &mut data);
        step(&states, &mut data);
        step(&states, &mut data);

        assert_eq!(data.current_state, 0);
        assert_eq!(
            data.context.vars.log,
            vec!["Work.entry", "Work.internal", "Work.internal"]
        );
    }

    #[test]
    fn self_transition_fires_exit_and_entry() {
        let states = model(vec![Transition::always(0)]);
        let mut data = run_data();
        step(&states, &mut data);
        step(&states, &mut data);
        step(&states, &mut data);

        assert_eq!(
            data.context.vars.log,
            vec!["Work.entry", "Work.exit", "Work.entry", "Work.exit"]
        );
    }

    #[test]
    fn suspend_fires_current_then_suspend_state() {
        let states = model(vec![Transition::new(1, Guard::never())]);
        let mut data = run_data();
        step(&states, &mut data);
        data.context.vars.log.clear();

        data.context.suspend();
        step(&states, &mut data);

        assert_eq!(
            data.context.vars.log,
            vec!["Work.internal", "Work.suspend", "Sleep.suspend"]
        );
        assert_eq!(data.current_state, 2);
    }

    #[test]
    fn resume_fires_suspend_state_first() {
        let states = model(vec![Transition::new(1, Guard::never())]);
        let mut data = run_data();
        step(&states, &mut data);
        data.context.suspend();
        step(&states, &mut data);
        data.context.vars.log.clear();

        data.context.resume();
        step(&states, &mut data);
        step(&states, &mut data);

        assert_eq!(
            data.context.vars.log,
            vec![
                "Sleep.internal",
                "Sleep.resume",
                "Work.resume",
                "Work.entry",
                "Work.internal",
            ]
        );
    }

    #[test]
    fn initial_pseudo_state_enters_declared_initial() {
        let states = model(vec![Transition::new(1, Guard::never())]);
        let mut data = run_data();

        step(&states, &mut data);

        assert_eq!(data.current_state, 0);
        assert_eq!(data.previous_state, 3);
        assert!(data.context.vars.log.is_empty());
    }
}
