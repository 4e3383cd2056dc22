//! Scheduling machines.
//!
//! A [`Schedule`] lists groups of slots. The [`RoundRobinScheduler`] runs
//! every group on the calling thread, one ringlet per slot per cycle. The
//! [`TimeTriggeredScheduler`] gives each group its own thread and starts
//! each slot at a fixed offset into a shared cycle.
//!
//! Both schedulers validate the schedule against the [`Arrangement`] before
//! running, execute the top of a machine's gateway stack in place of the
//! machine itself, and stop on the shared [`StopSignal`].

mod dispatch;
mod error;
mod model;
mod round_robin;
mod table;
mod time_triggered;
mod timing;
mod validation;

pub use dispatch::{DispatchParseError, DispatchTable, Timeslot};
pub use error::SchedulerError;
pub use model::{Arrangement, GroupInformation, Schedule, SlotInformation};
pub use round_robin::RoundRobinScheduler;
pub use time_triggered::TimeTriggeredScheduler;
pub use timing::{wait_until, RunReport, StopReason, StopSignal};
pub use validation::{validate, ScheduleError};
