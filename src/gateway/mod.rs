//! Calls and invocations of parameterised machines.
//!
//! A machine *calls* a parameterised machine when it wants to wait for the
//! result: the callee is pushed onto the caller's stack and executes in the
//! caller's scheduling slot until it finishes. A machine *invokes* a
//! parameterised machine to run it concurrently in the callee's own slot.
//! Both return a [`Promise`] that the caller refreshes each ringlet.
//!
//! Protocol violations, such as invoking a machine that is already running
//! or calling past the stack limit, are fatal.

mod dependency;
mod error;
mod promise;
mod stack;

pub use dependency::{CallMethod, Dependency, FsmId};
pub use error::{fatal, GatewayError};
pub use promise::{PartialPromise, Promise};
pub use stack::{Invoker, PromiseData, SharedExecutable, StackGateway, DEFAULT_STACK_LIMIT};

/// The invoker of a machine context, or a fatal error when the machine is
/// not scheduled.
pub(crate) fn attached(invoker: &Option<Invoker>) -> &Invoker {
    invoker
        .as_ref()
        .unwrap_or_else(|| fatal(GatewayError::Detached))
}
