//! Property-based tests for the ringlet, run status and gateway stacks.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use llfsm::builder::{MachineBuilder, StateBuilder};
use llfsm::core::RunStatus;
use llfsm::gateway::StackGateway;
use llfsm::machine::{Executable, FiniteStateMachine, MachineData};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

struct Plain;

impl MachineData for Plain {
    type Vars = u32;
    type Environment = ();
    type Parameters = ();
    type Result = u32;
}

type S = StateBuilder<Plain>;

/// A source state with one guarded transition per entry of `guards`, each
/// leading to its own target state.
fn fan_out(guards: &[bool]) -> FiniteStateMachine<Plain> {
    let mut source = S::new("Source").internal(|ctx| ctx.vars += 1);
    for (index, &open) in guards.iter().enumerate() {
        source = source.transition(format!("Target{index}"), move |_| open);
    }
    let mut builder = MachineBuilder::<Plain>::new("FanOut").initial("Source").state(source);
    for index in 0..guards.len() {
        builder = builder.state(S::new(format!("Target{index}")));
    }
    builder.build().unwrap()
}

fn single_state(name: &str) -> FiniteStateMachine<Plain> {
    MachineBuilder::<Plain>::new(name)
        .initial("Only")
        .state(S::new("Only"))
        .build()
        .unwrap()
}

prop_compose! {
    fn arbitrary_status()(index in 0..12usize) -> RunStatus {
        RunStatus::all()[index]
    }
}

proptest! {
    #[test]
    fn first_matching_transition_wins(guards in prop::collection::vec(any::<bool>(), 1..8)) {
        let mut fsm = fan_out(&guards).instance(());

        fsm.next();
        fsm.next();

        match guards.iter().position(|&open| open) {
            Some(first) => {
                prop_assert_eq!(fsm.current_state_name(), format!("Target{first}"));
                prop_assert_eq!(fsm.context().vars, 0);
            }
            None => {
                prop_assert_eq!(fsm.current_state_name(), "Source");
                prop_assert_eq!(fsm.context().vars, 1);
            }
        }
    }

    #[test]
    fn transitioned_only_for_settled_statuses(status in arbitrary_status()) {
        let expected = match status {
            RunStatus::Executing { transitioned }
            | RunStatus::Suspended { transitioned }
            | RunStatus::Resumed { transitioned }
            | RunStatus::Restarted { transitioned } => transitioned,
            RunStatus::Suspending
            | RunStatus::Resuming
            | RunStatus::Restarting
            | RunStatus::Finished => false,
        };
        prop_assert_eq!(status.transitioned(), expected);
    }

    #[test]
    fn call_then_finish_restores_depth(initial in 0..16usize, limit in 16..64usize) {
        let gateway = Arc::new(StackGateway::new(limit));
        let callee = gateway.register(Arc::new(single_state("Callee")));
        let caller = gateway.id_of("Caller");
        for _ in 0..initial {
            gateway.call(callee, json!(null), caller);
        }

        gateway.call(callee, json!(null), caller);
        gateway.finish(caller);

        prop_assert_eq!(gateway.depth(caller), initial);
    }

    #[test]
    fn finish_on_empty_stack_is_noop(repeats in 1..10usize) {
        let gateway = Arc::new(StackGateway::default());
        let callee = gateway.register(Arc::new(single_state("Callee")));

        for _ in 0..repeats {
            gateway.finish(callee);
        }

        prop_assert_eq!(gateway.depth(callee), 0);
        prop_assert!(!gateway.has_pending_calls());
    }

    #[test]
    fn calls_up_to_the_limit_succeed(limit in 1..32usize) {
        let gateway = Arc::new(StackGateway::new(limit));
        let callee = gateway.register(Arc::new(single_state("Callee")));
        let caller = gateway.id_of("Caller");

        for _ in 0..=limit {
            gateway.call(callee, json!(null), caller);
        }

        prop_assert_eq!(gateway.depth(caller), limit + 1);
    }
}
