//! Invocation-discipline violations.

use super::dependency::FsmId;
use thiserror::Error;
use uuid::Uuid;

/// A broken call/invoke protocol. Every variant is a programming or model
/// error and terminates the process through [`fatal`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("machine '{machine}' is already running")]
    AlreadyRunning { machine: String },

    #[error("stack overflow: '{caller}' is {depth} calls deep (limit {limit})")]
    StackOverflow {
        caller: String,
        depth: usize,
        limit: usize,
    },

    #[error("'{machine}' is invoked but has no slot in the schedule")]
    Unscheduled { machine: String },

    #[error("no parameterised machine named '{0}'")]
    UnknownMachine(String),

    #[error("no machine with id {0}")]
    UnknownId(FsmId),

    #[error("'{machine}' depends on '{dependency}', which is not part of the arrangement")]
    MissingDependency { machine: String, dependency: String },

    #[error("invalid parameters for '{machine}': {source}")]
    InvalidParameters {
        machine: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("result of call {call_id} has an unexpected shape: {source}")]
    InvalidResult {
        call_id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("machine is not attached to a gateway")]
    Detached,
}

/// Report a protocol violation and stop.
///
/// Release builds abort on panic, so this terminates the process.
pub fn fatal(error: GatewayError) -> ! {
    tracing::error!(%error, "fatal gateway violation");
    panic!("{error}");
}
