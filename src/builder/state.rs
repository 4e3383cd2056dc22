//! Builder for a single state and its outgoing transitions.

use crate::core::{CallbackState, Guard, StateBehaviour};
use crate::machine::{FsmContext, MachineData};
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builder for constructing a state with a fluent API.
///
/// Transitions name their target state; names are resolved to ids when the
/// enclosing [`MachineBuilder`](super::MachineBuilder) builds.
pub struct StateBuilder<D: MachineData> {
    pub(crate) name: String,
    pub(crate) transitions: Vec<(String, Guard<FsmContext<D>>)>,
    pub(crate) uses: BTreeSet<String>,
    callbacks: CallbackState<D>,
    behaviour: Option<Arc<dyn StateBehaviour<D>>>,
}

impl<D: MachineData> StateBuilder<D> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transitions: Vec::new(),
            uses: BTreeSet::new(),
            callbacks: CallbackState::new(),
            behaviour: None,
        }
    }

    pub fn on_entry<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_entry(f);
        self
    }

    pub fn internal<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.internal(f);
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_exit(f);
        self
    }

    pub fn on_suspend<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_suspend(f);
        self
    }

    pub fn on_resume<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_resume(f);
        self
    }

    /// Give every instance a fresh state-local value.
    pub fn local<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.local(init);
        self
    }

    /// Use a hand-written behaviour instead of closures. Closures set on
    /// this builder are ignored.
    pub fn behaviour(mut self, behaviour: impl StateBehaviour<D> + 'static) -> Self {
        self.behaviour = Some(Arc::new(behaviour));
        self
    }

    /// Add a transition to `target` labelled with `predicate`.
    ///
    /// Transitions are evaluated in the order they are added.
    pub fn transition<F>(self, target: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&FsmContext<D>) -> bool + Send + Sync + 'static,
    {
        self.guard(target, Guard::new(predicate))
    }

    pub fn guard(mut self, target: impl Into<String>, guard: Guard<FsmContext<D>>) -> Self {
        self.transitions.push((target.into(), guard));
        self
    }

    /// Add an unconditional transition.
    pub fn always(self, target: impl Into<String>) -> Self {
        self.guard(target, Guard::always())
    }

    /// Declare that this state reads or writes the named environment
    /// variable.
    pub fn uses(mut self, variable: impl Into<String>) -> Self {
        self.uses.insert(variable.into());
        self
    }

    pub(crate) fn into_behaviour(self) -> Arc<dyn StateBehaviour<D>> {
        match self.behaviour {
            Some(behaviour) => behaviour,
            None => Arc::new(self.callbacks),
        }
    }
}
