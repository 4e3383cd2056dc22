//! Running machine instances.
//!
//! A [`FiniteStateMachine`] is a shared, immutable model. Each
//! [`MachineInstance`] owns its [`RunData`]: the current, previous and
//! suspend states, the run status, and the typed [`FsmContext`] that
//! callbacks and guards see. Schedulers drive instances through the
//! [`Executable`] trait, one [`Ringlet`] at a time.

mod clock;
mod context;
mod executable;
mod fsm;
mod ringlet;
mod run_data;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::Clock;
pub use context::{FsmContext, MachineData};
pub use executable::{Executable, MachineFactory};
pub use fsm::{FiniteStateMachine, MachineInstance, MachineModel};
pub use ringlet::Ringlet;
pub use run_data::RunData;
