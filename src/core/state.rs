//! States of a logic-labelled finite state machine.
//!
//! A `State` is an immutable node of the machine model: a dense id, a name,
//! its outgoing transitions, the environment variables it uses, and the
//! behaviour whose callbacks the ringlet fires.

use super::transition::Transition;
use crate::machine::{FsmContext, MachineData};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Dense, zero-based index into a machine's states. Ids equal array
/// positions.
pub type StateId = usize;

/// Name of the pseudo-state every machine starts in.
pub const INITIAL_PSEUDO_STATE: &str = "__Initial";

/// Name of the pseudo-state used as the previous state before the first
/// ringlet.
pub const PREVIOUS_PSEUDO_STATE: &str = "__Previous";

/// Name of the suspend state synthesized when a model declares none.
pub const SUSPEND_PSEUDO_STATE: &str = "__Suspend";

/// Names reserved for synthesized pseudo-states.
pub const RESERVED_STATE_NAMES: [&str; 3] = [
    INITIAL_PSEUDO_STATE,
    PREVIOUS_PSEUDO_STATE,
    SUSPEND_PSEUDO_STATE,
];

/// The callbacks a state exposes to the ringlet.
///
/// Every callback defaults to doing nothing, so implementations only
/// override what they need.
///
/// # Example
///
/// ```rust
/// use llfsm::core::StateBehaviour;
/// use llfsm::machine::{FsmContext, MachineData};
///
/// struct Blinker;
///
/// impl MachineData for Blinker {
///     type Vars = bool;
///     type Environment = ();
///     type Parameters = ();
///     type Result = ();
/// }
///
/// struct Toggle;
///
/// impl StateBehaviour<Blinker> for Toggle {
///     fn on_entry(&self, ctx: &mut FsmContext<Blinker>) {
///         ctx.vars = !ctx.vars;
///     }
/// }
/// ```
pub trait StateBehaviour<D: MachineData>: Send + Sync {
    fn on_entry(&self, _ctx: &mut FsmContext<D>) {}

    /// Periodic action, fired when no transition is taken.
    fn internal(&self, _ctx: &mut FsmContext<D>) {}

    fn on_exit(&self, _ctx: &mut FsmContext<D>) {}

    fn on_suspend(&self, _ctx: &mut FsmContext<D>) {}

    fn on_resume(&self, _ctx: &mut FsmContext<D>) {}

    /// Create the state-local context stored with each machine instance.
    ///
    /// Callbacks reach it through [`FsmContext::local_mut`].
    fn initial_local(&self) -> Box<dyn Any + Send> {
        Box::new(())
    }
}

/// Behaviour of synthesized pseudo-states.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyState;

impl<D: MachineData> StateBehaviour<D> for EmptyState {}

type Callback<D> = Box<dyn Fn(&mut FsmContext<D>) + Send + Sync>;
type LocalFactory = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// A state behaviour assembled from closures.
pub struct CallbackState<D: MachineData> {
    pub(crate) on_entry: Option<Callback<D>>,
    pub(crate) internal: Option<Callback<D>>,
    pub(crate) on_exit: Option<Callback<D>>,
    pub(crate) on_suspend: Option<Callback<D>>,
    pub(crate) on_resume: Option<Callback<D>>,
    pub(crate) local: Option<LocalFactory>,
}

impl<D: MachineData> Default for CallbackState<D> {
    fn default() -> Self {
        Self {
            on_entry: None,
            internal: None,
            on_exit: None,
            on_suspend: None,
            on_resume: None,
            local: None,
        }
    }
}

impl<D: MachineData> CallbackState<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_entry<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.on_entry = Some(Box::new(f));
        self
    }

    pub fn internal<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.internal = Some(Box::new(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.on_exit = Some(Box::new(f));
        self
    }

    pub fn on_suspend<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.on_suspend = Some(Box::new(f));
        self
    }

    pub fn on_resume<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FsmContext<D>) + Send + Sync + 'static,
    {
        self.on_resume = Some(Box::new(f));
        self
    }

    /// Give each machine instance a fresh state-local value of type `T`.
    pub fn local<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.local = Some(Box::new(move || Box::new(init())));
        self
    }
}

fn fire<D: MachineData>(callback: &Option<Callback<D>>, ctx: &mut FsmContext<D>) {
    if let Some(callback) = callback {
        callback(ctx);
    }
}

impl<D: MachineData> StateBehaviour<D> for CallbackState<D> {
    fn on_entry(&self, ctx: &mut FsmContext<D>) {
        fire(&self.on_entry, ctx);
    }

    fn internal(&self, ctx: &mut FsmContext<D>) {
        fire(&self.internal, ctx);
    }

    fn on_exit(&self, ctx: &mut FsmContext<D>) {
        fire(&self.on_exit, ctx);
    }

    fn on_suspend(&self, ctx: &mut FsmContext<D>) {
        fire(&self.on_suspend, ctx);
    }

    fn on_resume(&self, ctx: &mut FsmContext<D>) {
        fire(&self.on_resume, ctx);
    }

    fn initial_local(&self) -> Box<dyn Any + Send> {
        match &self.local {
            Some(init) => init(),
            None => Box::new(()),
        }
    }
}

/// Immutable node of a machine model.
pub struct State<D: MachineData> {
    pub id: StateId,
    pub name: String,
    pub transitions: Vec<Transition<D>>,
    /// Names of the environment variables this state reads or writes.
    pub environment_uses: BTreeSet<String>,
    pub behaviour: Arc<dyn StateBehaviour<D>>,
}

impl<D: MachineData> State<D> {
    /// A synthesized pseudo-state with no callbacks.
    pub(crate) fn pseudo(id: StateId, name: &str, transitions: Vec<Transition<D>>) -> Self {
        Self {
            id,
            name: name.to_string(),
            transitions,
            environment_uses: BTreeSet::new(),
            behaviour: Arc::new(EmptyState),
        }
    }

    /// A state without outgoing transitions is an accepting state.
    pub fn is_accepting(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn is_pseudo(&self) -> bool {
        RESERVED_STATE_NAMES.contains(&self.name.as_str())
    }
}

impl<D: MachineData> fmt::Debug for State<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("transitions", &self.transitions)
            .field("environment_uses", &self.environment_uses)
            .finish_non_exhaustive()
    }
}
