//! Guarded edges between states.

use super::guard::Guard;
use super::state::StateId;
use crate::machine::{FsmContext, MachineData};

/// A transition labelled with a boolean guard.
///
/// Owned by its source state. The ringlet evaluates the transitions of a
/// state in declaration order and takes the first whose guard holds.
pub struct Transition<D: MachineData> {
    pub target: StateId,
    pub guard: Guard<FsmContext<D>>,
}

impl<D: MachineData> Transition<D> {
    pub fn new(target: StateId, guard: Guard<FsmContext<D>>) -> Self {
        Self { target, guard }
    }

    /// An unconditional transition.
    pub fn always(target: StateId) -> Self {
        Self::new(target, Guard::always())
    }

    /// Can this transition be taken from the given context? (pure)
    pub fn can_transition(&self, context: &FsmContext<D>) -> bool {
        self.guard.check(context)
    }
}

impl<D: MachineData> std::fmt::Debug for Transition<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::testing::Counter;

    #[test]
    fn always_transition_is_taken() {
        let transition = Transition::<Counter>::always(3);
        let context = FsmContext::<Counter>::new(Default::default());

        assert_eq!(transition.target, 3);
        assert!(transition.can_transition(&context));
    }

    #[test]
    fn guard_reads_machine_variables() {
        let transition =
            Transition::<Counter>::new(1, Guard::new(|ctx: &FsmContext<Counter>| ctx.vars.count > 2));
        let mut context = FsmContext::<Counter>::new(Default::default());

        assert!(!transition.can_transition(&context));
        context.vars.count = 3;
        assert!(transition.can_transition(&context));
    }
}
