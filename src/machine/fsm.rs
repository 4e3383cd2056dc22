//! Machine models and their running instances.

use super::context::{FsmContext, MachineData};
use super::executable::{Executable, MachineFactory};
use super::ringlet::Ringlet;
use super::run_data::RunData;
use crate::core::{RunStatus, State, StateHistory, StateId};
use crate::environment::EnvironmentHandlers;
use crate::gateway::{Dependency, Invoker};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Immutable description of a machine, produced by
/// [`MachineBuilder`](crate::builder::MachineBuilder).
///
/// `states[i].id == i` for every state. The pseudo-states follow the
/// declared states.
pub struct MachineModel<D: MachineData> {
    pub(crate) name: String,
    pub(crate) states: Vec<State<D>>,
    pub(crate) handlers: EnvironmentHandlers<D::Environment>,
    /// Environment variable indices used by each state.
    pub(crate) state_variables: Vec<Vec<usize>>,
    pub(crate) initial_state: StateId,
    pub(crate) previous_state: StateId,
    pub(crate) suspend_state: StateId,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) history_capacity: Option<usize>,
}

impl<D: MachineData> MachineModel<D> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[State<D>] {
        &self.states
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    pub fn suspend_state(&self) -> StateId {
        self.suspend_state
    }

    fn accepting(&self) -> Vec<bool> {
        self.states.iter().map(State::is_accepting).collect()
    }
}

impl<D: MachineData> fmt::Debug for MachineModel<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineModel")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("handlers", &self.handlers)
            .field("suspend_state", &self.suspend_state)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// A shareable machine model that creates instances on demand.
pub struct FiniteStateMachine<D: MachineData> {
    model: Arc<MachineModel<D>>,
}

impl<D: MachineData> Clone for FiniteStateMachine<D> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
        }
    }
}

impl<D: MachineData> FiniteStateMachine<D> {
    pub(crate) fn new(model: MachineModel<D>) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub fn model(&self) -> &MachineModel<D> {
        &self.model
    }

    /// A fresh instance with the given parameters.
    pub fn instance(&self, parameters: D::Parameters) -> MachineInstance<D> {
        MachineInstance::new(Arc::clone(&self.model), parameters)
    }

    /// A fresh instance with default parameters, boxed for a scheduler.
    pub fn boxed(&self) -> Box<dyn Executable> {
        Box::new(self.instance(D::Parameters::default()))
    }
}

impl<D: MachineData> fmt::Debug for FiniteStateMachine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FiniteStateMachine").field(&self.model).finish()
    }
}

impl<D: MachineData> MachineFactory for FiniteStateMachine<D> {
    fn name(&self) -> &str {
        &self.model.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.model.dependencies
    }

    fn instantiate(&self, parameters: Option<&Value>) -> Result<Box<dyn Executable>, serde_json::Error> {
        let parameters = match parameters {
            Some(value) => D::Parameters::deserialize(value)?,
            None => D::Parameters::default(),
        };
        Ok(Box::new(self.instance(parameters)))
    }
}

/// One running instance of a machine model.
pub struct MachineInstance<D: MachineData> {
    model: Arc<MachineModel<D>>,
    data: RunData<D>,
}

impl<D: MachineData> MachineInstance<D> {
    fn new(model: Arc<MachineModel<D>>, parameters: D::Parameters) -> Self {
        let mut context = FsmContext::new(parameters);
        context.locals = model
            .states
            .iter()
            .map(|s| s.behaviour.initial_local())
            .collect();
        let history = model.history_capacity.map(StateHistory::with_capacity);
        let data = RunData::new(
            model.initial_state,
            model.previous_state,
            model.suspend_state,
            model.accepting(),
            context,
            history,
        );
        Self { model, data }
    }

    pub fn model(&self) -> &MachineModel<D> {
        &self.model
    }

    pub fn run_data(&self) -> &RunData<D> {
        &self.data
    }

    pub fn context(&self) -> &FsmContext<D> {
        &self.data.context
    }

    pub fn context_mut(&mut self) -> &mut FsmContext<D> {
        &mut self.data.context
    }

    pub fn current_state(&self) -> StateId {
        self.data.current_state
    }

    pub fn history(&self) -> Option<&StateHistory> {
        self.data.history()
    }
}

impl<D: MachineData> Executable for MachineInstance<D> {
    fn name(&self) -> &str {
        &self.model.name
    }

    fn is_finished(&self) -> bool {
        self.data.is_finished()
    }

    fn is_suspended(&self) -> bool {
        self.data.is_suspended()
    }

    fn next(&mut self) {
        tracing::trace!(
            machine = %self.model.name,
            state = %self.current_state_name(),
            status = self.data.status().name(),
            "executing ringlet"
        );
        let next = Ringlet::execute(&self.model.states, &mut self.data);
        self.data.resolve(next);
    }

    fn take_snapshot(&mut self) {
        let uses = &self.model.state_variables[self.data.current_state];
        self.model
            .handlers
            .take_snapshot(uses, &mut self.data.context.environment);
    }

    fn save_snapshot(&mut self) {
        let uses = &self.model.state_variables[self.data.previous_state];
        self.model
            .handlers
            .save_snapshot(uses, &self.data.context.environment);
    }

    fn setup(&mut self) {
        self.data.context.clock.reset(Instant::now());
    }

    fn tear_down(&mut self) {
        tracing::debug!(
            machine = %self.model.name,
            state = %self.current_state_name(),
            ringlets = self.data.context.clock.ringlets(),
            "machine torn down"
        );
    }

    fn update_clock(&mut self, now: Instant) {
        self.data.context.clock.update(now);
    }

    fn status(&self) -> RunStatus {
        self.data.status()
    }

    fn current_state_name(&self) -> &str {
        &self.model.states[self.data.current_state].name
    }

    fn suspend(&mut self) {
        self.data.context.suspend();
    }

    fn resume(&mut self) {
        self.data.context.resume();
    }

    fn restart(&mut self) {
        self.data.context.restart();
    }

    fn result(&self) -> Option<Value> {
        let result = self.data.context.result.as_ref()?;
        serde_json::to_value(result).ok()
    }

    fn attach(&mut self, invoker: Invoker) {
        self.data.context.invoker = Some(invoker);
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.model.dependencies
    }
}

impl<D: MachineData> fmt::Debug for MachineInstance<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineInstance")
            .field("name", &self.model.name)
            .field("current_state", &self.current_state_name())
            .field("status", &self.data.status())
            .finish()
    }
}
