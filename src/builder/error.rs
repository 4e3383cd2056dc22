//! Build errors for machine models.

use thiserror::Error;

/// Errors that can occur when building a machine model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(name) before .build()")]
    MissingInitialState,

    #[error("No states defined. Add at least one state")]
    NoStates,

    #[error("State '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("State name '{0}' is reserved for pseudo-states")]
    ReservedStateName(String),

    #[error("Initial state '{0}' is not declared")]
    UnknownInitialState(String),

    #[error("Suspend state '{0}' is not declared")]
    UnknownSuspendState(String),

    #[error("Transition from '{state}' targets undeclared state '{target}'")]
    UnknownTarget { state: String, target: String },

    #[error("State '{state}' uses undeclared environment variable '{variable}'")]
    UnknownVariable { state: String, variable: String },

    #[error("Environment variable '{0}' is declared more than once")]
    DuplicateVariable(String),
}
