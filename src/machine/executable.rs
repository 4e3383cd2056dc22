//! The contract between schedulers and machine instances.

use crate::core::RunStatus;
use crate::gateway::{Dependency, Invoker};
use serde_json::Value;
use std::time::Instant;

/// A running machine instance as seen by schedulers, the gateway and test
/// harnesses.
///
/// Every method operates on the instance's own run data; there is no
/// separate context argument.
pub trait Executable: Send {
    fn name(&self) -> &str;

    fn is_finished(&self) -> bool;

    fn is_suspended(&self) -> bool;

    /// Execute one ringlet.
    fn next(&mut self);

    /// Read the environment variables used by the current state.
    fn take_snapshot(&mut self);

    /// Write the environment variables used by the state that just ran.
    fn save_snapshot(&mut self);

    /// Called once before the first ringlet.
    fn setup(&mut self) {}

    /// Called once after the instance leaves its scheduler or stack.
    fn tear_down(&mut self) {}

    /// Set the start time of the next ringlet.
    fn update_clock(&mut self, now: Instant);

    fn status(&self) -> RunStatus;

    fn current_state_name(&self) -> &str;

    /// Request a suspension, resolved by the next ringlet.
    fn suspend(&mut self);

    fn resume(&mut self);

    fn restart(&mut self);

    /// Current result value, if any.
    fn result(&self) -> Option<Value>;

    /// Connect the instance to a gateway so callbacks can call other
    /// machines.
    fn attach(&mut self, invoker: Invoker);

    fn dependencies(&self) -> &[Dependency] {
        &[]
    }

    /// Externally backed machines report `true` once their backing code is
    /// gone; schedulers drop them without executing.
    fn is_unloaded(&self) -> bool {
        false
    }
}

/// Creates fresh instances of a machine, optionally parameterised.
pub trait MachineFactory: Send + Sync {
    fn name(&self) -> &str;

    fn dependencies(&self) -> &[Dependency];

    /// Instantiate with `parameters`, or with default parameters when
    /// `None`.
    fn instantiate(&self, parameters: Option<&Value>) -> Result<Box<dyn Executable>, serde_json::Error>;
}
