//! The context handed to state callbacks and transition guards.

use super::clock::Clock;
use crate::core::{RunStatus, StateId};
use crate::gateway::{Invoker, PartialPromise, Promise};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::time::Duration;

/// The strongly-typed data of one machine family.
///
/// # Example
///
/// ```rust
/// use llfsm::machine::MachineData;
/// use serde::Deserialize;
///
/// #[derive(Default)]
/// struct Vars {
///     total: u64,
/// }
///
/// #[derive(Default, Deserialize)]
/// struct Params {
///     limit: u64,
/// }
///
/// struct Summer;
///
/// impl MachineData for Summer {
///     type Vars = Vars;
///     type Environment = ();
///     type Parameters = Params;
///     type Result = u64;
/// }
/// ```
pub trait MachineData: Send + Sync + 'static {
    /// Machine-local variables.
    type Vars: Default + Send + 'static;

    /// Snapshot of the environment-backed variables.
    type Environment: Default + Send + 'static;

    /// Parameters of a parameterised machine.
    type Parameters: DeserializeOwned + Default + Send + 'static;

    /// Result delivered to the caller when the machine finishes.
    type Result: Serialize + Send + 'static;
}

/// Mutable per-instance context seen by callbacks and guards.
pub struct FsmContext<D: MachineData> {
    pub vars: D::Vars,
    pub environment: D::Environment,
    pub parameters: D::Parameters,
    pub result: Option<D::Result>,
    pub(crate) status: RunStatus,
    pub(crate) clock: Clock,
    pub(crate) locals: Vec<Box<dyn Any + Send>>,
    pub(crate) active_state: StateId,
    pub(crate) invoker: Option<Invoker>,
}

impl<D: MachineData> FsmContext<D> {
    pub fn new(parameters: D::Parameters) -> Self {
        Self {
            vars: D::Vars::default(),
            environment: D::Environment::default(),
            parameters,
            result: None,
            status: RunStatus::INITIAL,
            clock: Clock::default(),
            locals: Vec::new(),
            active_state: 0,
            invoker: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Request that the machine moves to its suspend state after this
    /// ringlet.
    pub fn suspend(&mut self) {
        self.status = RunStatus::Suspending;
    }

    /// Request that the machine returns to its suspended state after this
    /// ringlet.
    pub fn resume(&mut self) {
        self.status = RunStatus::Resuming;
    }

    /// Request that the machine moves back to its initial state after this
    /// ringlet.
    pub fn restart(&mut self) {
        self.status = RunStatus::Restarting;
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Has the machine spent longer than `duration` in its current state?
    pub fn after(&self, duration: Duration) -> bool {
        self.clock.state_elapsed() > duration
    }

    pub fn after_ms(&self, millis: u64) -> bool {
        self.after(Duration::from_millis(millis))
    }

    /// State-local value of the state whose callback is running.
    pub fn local<T: Any>(&self) -> Option<&T> {
        self.locals.get(self.active_state)?.downcast_ref()
    }

    pub fn local_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.locals.get_mut(self.active_state)?.downcast_mut()
    }

    /// Handle to the gateway, present once a scheduler owns this machine.
    pub fn invoker(&self) -> Option<&Invoker> {
        self.invoker.as_ref()
    }

    /// Synchronously call the parameterised machine named `machine`.
    ///
    /// The callee runs in this machine's slot until it finishes.
    pub fn call<R, P>(&self, machine: &str, parameters: &P) -> Promise<R>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        crate::gateway::attached(&self.invoker).call(machine, parameters)
    }

    /// Asynchronously invoke the parameterised machine named `machine`.
    pub fn invoke<R, P>(&self, machine: &str, parameters: &P) -> Promise<R>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        crate::gateway::attached(&self.invoker).invoke(machine, parameters)
    }

    /// Invoke a machine whose intermediate results are observable.
    pub fn invoke_partial<P, R, A>(&self, machine: &str, parameters: &A) -> PartialPromise<P, R>
    where
        P: DeserializeOwned,
        R: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        crate::gateway::attached(&self.invoker).invoke_partial(machine, parameters)
    }

    /// Recursively call this machine with new parameters.
    pub fn call_self<R, P>(&self, parameters: &P) -> Promise<R>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        crate::gateway::attached(&self.invoker).call_self(parameters)
    }

    /// Refresh a promise from the gateway.
    pub fn poll<R: DeserializeOwned>(&self, promise: &mut Promise<R>) -> bool {
        promise.refresh(crate::gateway::attached(&self.invoker).gateway());
        promise.is_fulfilled()
    }

    /// Refresh a partial promise from the gateway.
    pub fn poll_partial<P: DeserializeOwned, R: DeserializeOwned>(
        &self,
        promise: &mut PartialPromise<P, R>,
    ) -> bool {
        promise.refresh(crate::gateway::attached(&self.invoker).gateway());
        promise.is_fulfilled()
    }
}

impl<D: MachineData> Default for FsmContext<D> {
    fn default() -> Self {
        Self::new(D::Parameters::default())
    }
}
