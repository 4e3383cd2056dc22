use super::validation::ScheduleError;
use thiserror::Error;

/// Errors raised while constructing or controlling a scheduler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid schedule ({} problems, first: {})", .0.len(), first(.0))]
    InvalidSchedule(Vec<ScheduleError>),

    #[error("machine '{0}' is part of the arrangement more than once")]
    DuplicateMachine(String),

    #[error("no scheduled machine named '{0}'")]
    UnknownMachine(String),
}

fn first(errors: &[ScheduleError]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}
