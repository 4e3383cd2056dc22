//! llfsm: logic-labelled finite state machines
//!
//! A logic-labelled finite state machine (LLFSM) moves between states when a
//! boolean guard over its context holds, rather than when an input symbol
//! arrives. Each scheduling step executes one *ringlet* of a machine: resume
//! and entry callbacks when due, then the first transition whose guard
//! holds, or the state's internal action when none does.
//!
//! # Core Concepts
//!
//! - **Model**: immutable states and guarded transitions, declared with
//!   [`MachineBuilder`] and [`StateBuilder`]
//! - **Ringlet**: one deterministic execution step driven by the
//!   [`RunStatus`] lifecycle
//! - **Schedulers**: cooperative round-robin and multi-threaded
//!   time-triggered, both with per-group environment snapshots
//! - **Gateway**: synchronous calls and asynchronous invocations of
//!   parameterised machines, tracked on per-machine stacks
//!
//! # Example
//!
//! ```rust
//! use llfsm::{Arrangement, Executable, MachineBuilder, MachineData, RoundRobinScheduler, Schedule, StackGateway, StateBuilder};
//! use std::sync::Arc;
//!
//! struct PingPong;
//!
//! impl MachineData for PingPong {
//!     type Vars = u32;
//!     type Environment = ();
//!     type Parameters = ();
//!     type Result = ();
//! }
//!
//! let machine = MachineBuilder::<PingPong>::new("PingPong")
//!     .initial("Ping")
//!     .state(StateBuilder::<PingPong>::new("Ping").on_entry(|ctx| ctx.vars += 1).always("Pong"))
//!     .state(StateBuilder::<PingPong>::new("Pong").always("Ping"))
//!     .build()
//!     .unwrap();
//!
//! let mut scheduler = RoundRobinScheduler::new(
//!     Arrangement::new().machine(machine.boxed()),
//!     &Schedule::sequential(["PingPong"]),
//!     Arc::new(StackGateway::default()),
//! )
//! .unwrap();
//!
//! for _ in 0..4 {
//!     scheduler.cycle();
//! }
//! let fsm = scheduler.machine("PingPong").unwrap();
//! assert_eq!(fsm.lock().current_state_name(), "Pong");
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod environment;
pub mod gateway;
pub mod machine;
pub mod runtime;
pub mod schedule;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, StateBuilder};
pub use config::{RuntimeConfig, SchedulerKind};
pub use core::{Guard, RunStatus, State, StateHistory, StateId, StateTransition};
pub use gateway::{Dependency, FsmId, PartialPromise, Promise, StackGateway};
pub use machine::{Executable, FiniteStateMachine, FsmContext, MachineData};
pub use runtime::Runtime;
pub use schedule::{
    Arrangement, RoundRobinScheduler, RunReport, Schedule, StopReason, StopSignal,
    TimeTriggeredScheduler,
};
