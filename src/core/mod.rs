//! Core model types of a logic-labelled finite state machine.
//!
//! This module contains the immutable description of a machine:
//! - States and their callbacks via the `StateBehaviour` trait
//! - Guarded transitions labelled with pure predicates
//! - The `RunStatus` lifecycle enum
//! - A bounded transition trace

mod guard;
mod history;
mod state;
mod status;
mod transition;

pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::{
    CallbackState, EmptyState, State, StateBehaviour, StateId, INITIAL_PSEUDO_STATE,
    PREVIOUS_PSEUDO_STATE, RESERVED_STATE_NAMES, SUSPEND_PSEUDO_STATE,
};
pub use status::RunStatus;
pub use transition::Transition;
