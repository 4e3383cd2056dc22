//! Builder API for machine models.
//!
//! States and transitions are declared with fluent builders and resolved
//! once, at build time, into the dense state arrays that instances execute.

pub mod error;
pub mod machine;
pub mod state;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use state::StateBuilder;
