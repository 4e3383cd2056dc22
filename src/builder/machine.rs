//! Builder for constructing machine models.

use crate::builder::error::BuildError;
use crate::builder::state::StateBuilder;
use crate::core::{
    State, StateId, Transition, INITIAL_PSEUDO_STATE, PREVIOUS_PSEUDO_STATE, RESERVED_STATE_NAMES,
    SUSPEND_PSEUDO_STATE,
};
use crate::environment::{EnvironmentHandlers, EnvironmentVariable};
use crate::gateway::Dependency;
use crate::machine::{FiniteStateMachine, MachineData, MachineModel};
use std::collections::HashMap;

/// Builder for constructing a machine model with a fluent API.
///
/// # Example
///
/// ```rust
/// use llfsm::builder::{MachineBuilder, StateBuilder};
/// use llfsm::machine::MachineData;
///
/// struct Toggle;
///
/// impl MachineData for Toggle {
///     type Vars = u32;
///     type Environment = ();
///     type Parameters = ();
///     type Result = ();
/// }
///
/// let machine = MachineBuilder::<Toggle>::new("Toggle")
///     .initial("On")
///     .state(StateBuilder::<Toggle>::new("On").on_entry(|ctx| ctx.vars += 1).always("Off"))
///     .state(StateBuilder::<Toggle>::new("Off").always("On"))
///     .build()
///     .unwrap();
///
/// // On, Off, then the synthesized __Initial, __Previous and __Suspend.
/// assert_eq!(machine.model().states().len(), 5);
/// ```
pub struct MachineBuilder<D: MachineData> {
    name: String,
    initial: Option<String>,
    suspend: Option<String>,
    states: Vec<StateBuilder<D>>,
    variables: Vec<Box<dyn EnvironmentVariable<D::Environment>>>,
    dependencies: Vec<Dependency>,
    history: Option<usize>,
}

impl<D: MachineData> MachineBuilder<D> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: None,
            suspend: None,
            states: Vec::new(),
            variables: Vec::new(),
            dependencies: Vec::new(),
            history: None,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, name: impl Into<String>) -> Self {
        self.initial = Some(name.into());
        self
    }

    /// Use a declared state as the suspend state. Without one, a
    /// `__Suspend` pseudo-state is synthesized.
    pub fn suspend_state(mut self, name: impl Into<String>) -> Self {
        self.suspend = Some(name.into());
        self
    }

    /// Add a state. State ids follow the order states are added.
    pub fn state(mut self, state: StateBuilder<D>) -> Self {
        self.states.push(state);
        self
    }

    pub fn variable(mut self, variable: impl EnvironmentVariable<D::Environment> + 'static) -> Self {
        self.variables.push(Box::new(variable));
        self
    }

    /// Declare a machine that this machine calls or invokes.
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Record up to `capacity` state changes per instance.
    pub fn trace(mut self, capacity: usize) -> Self {
        self.history = Some(capacity);
        self
    }

    /// Build the machine.
    /// Returns an error if the model is incomplete or inconsistent.
    pub fn build(self) -> Result<FiniteStateMachine<D>, BuildError> {
        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }
        let initial_name = self.initial.ok_or(BuildError::MissingInitialState)?;

        let mut ids: HashMap<String, StateId> = HashMap::new();
        for (id, state) in self.states.iter().enumerate() {
            if RESERVED_STATE_NAMES.contains(&state.name.as_str()) {
                return Err(BuildError::ReservedStateName(state.name.clone()));
            }
            if ids.insert(state.name.clone(), id).is_some() {
                return Err(BuildError::DuplicateState(state.name.clone()));
            }
        }
        let initial = *ids
            .get(&initial_name)
            .ok_or(BuildError::UnknownInitialState(initial_name))?;
        let declared_suspend = match self.suspend {
            Some(name) => Some(*ids.get(&name).ok_or(BuildError::UnknownSuspendState(name))?),
            None => None,
        };

        let mut handlers = EnvironmentHandlers::default();
        for variable in self.variables {
            let name = variable.name().to_string();
            if !handlers.insert(variable) {
                return Err(BuildError::DuplicateVariable(name));
            }
        }

        let mut states = Vec::with_capacity(self.states.len() + 3);
        let mut state_variables = Vec::with_capacity(self.states.len() + 3);
        for (id, mut builder) in self.states.into_iter().enumerate() {
            let transitions = std::mem::take(&mut builder.transitions)
                .into_iter()
                .map(|(target, guard)| match ids.get(&target) {
                    Some(&target) => Ok(Transition::new(target, guard)),
                    None => Err(BuildError::UnknownTarget {
                        state: builder.name.clone(),
                        target,
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let uses = builder
                .uses
                .iter()
                .map(|variable| {
                    handlers.index_of(variable).ok_or_else(|| BuildError::UnknownVariable {
                        state: builder.name.clone(),
                        variable: variable.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let name = std::mem::take(&mut builder.name);
            let environment_uses = std::mem::take(&mut builder.uses);
            state_variables.push(uses);
            states.push(State {
                id,
                name,
                transitions,
                environment_uses,
                behaviour: builder.into_behaviour(),
            });
        }

        let initial_state = states.len();
        states.push(State::pseudo(
            initial_state,
            INITIAL_PSEUDO_STATE,
            vec![Transition::always(initial)],
        ));
        let previous_state = states.len();
        states.push(State::pseudo(previous_state, PREVIOUS_PSEUDO_STATE, Vec::new()));
        let suspend_state = match declared_suspend {
            Some(id) => id,
            None => {
                let id = states.len();
                states.push(State::pseudo(id, SUSPEND_PSEUDO_STATE, Vec::new()));
                id
            }
        };
        state_variables.resize_with(states.len(), Vec::new);

        Ok(FiniteStateMachine::new(MachineModel {
            name: self.name,
            states,
            handlers,
            state_variables,
            initial_state,
            previous_state,
            suspend_state,
            dependencies: self.dependencies,
            history_capacity: self.history,
        }))
    }
}
