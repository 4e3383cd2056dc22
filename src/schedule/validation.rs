//! Schedule validation.
//!
//! Every check runs, and all violations are reported together.

use super::model::Schedule;
use crate::config::SchedulerKind;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A single problem with a schedule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Schedule has no groups")]
    NoGroups,

    #[error("Group {group} has no slots")]
    EmptyGroup { group: usize },

    #[error("Group {group} slot {slot} runs unknown machine '{fsm}'")]
    UnknownMachine { group: usize, slot: usize, fsm: String },

    #[error("Group {group} mixes timed and untimed slots")]
    MixedTiming { group: usize },

    #[error("Group {group} has no timing but the scheduler is time-triggered")]
    UntimedGroup { group: usize },

    #[error("Group {group}: slot for '{second}' starts before the slot for '{first}' ends")]
    OverlappingSlots {
        group: usize,
        first: String,
        second: String,
    },

    #[error("Machine '{fsm}' appears in groups {first} and {second}")]
    SharedMachine {
        fsm: String,
        first: usize,
        second: usize,
    },
}

type Checked = Validation<(), NonEmptyVec<ScheduleError>>;

/// Validate `schedule` against the machines in `known` for the given
/// scheduler kind.
///
/// # Example
///
/// ```rust
/// use llfsm::config::SchedulerKind;
/// use llfsm::schedule::{validate, Schedule};
/// use std::collections::BTreeSet;
///
/// let known = BTreeSet::from(["Ping", "Pong"]);
///
/// assert!(validate(&Schedule::sequential(["Ping", "Pong"]), &known, SchedulerKind::RoundRobin).is_success());
/// assert!(validate(&Schedule::sequential(["Ping", "Pang"]), &known, SchedulerKind::RoundRobin).is_failure());
/// ```
pub fn validate(schedule: &Schedule, known: &BTreeSet<&str>, kind: SchedulerKind) -> Checked {
    let mut checks: Vec<Checked> = vec![check_not_empty(schedule)];

    for (index, group) in schedule.groups.iter().enumerate() {
        checks.push(if group.slots.is_empty() {
            Validation::fail(ScheduleError::EmptyGroup { group: index })
        } else {
            Validation::success(())
        });
        for (slot_index, slot) in group.slots.iter().enumerate() {
            checks.push(if known.contains(slot.fsm.as_str()) {
                Validation::success(())
            } else {
                Validation::fail(ScheduleError::UnknownMachine {
                    group: index,
                    slot: slot_index,
                    fsm: slot.fsm.clone(),
                })
            });
        }
        checks.push(if group.is_mixed() {
            Validation::fail(ScheduleError::MixedTiming { group: index })
        } else {
            Validation::success(())
        });
    }

    if kind == SchedulerKind::TimeTriggered {
        checks.extend(time_triggered_checks(schedule));
    }

    Validation::all_vec(checks).map(|_| ())
}

fn check_not_empty(schedule: &Schedule) -> Checked {
    if schedule.groups.is_empty() {
        Validation::fail(ScheduleError::NoGroups)
    } else {
        Validation::success(())
    }
}

fn time_triggered_checks(schedule: &Schedule) -> Vec<Checked> {
    let mut checks = Vec::new();
    let mut owners: HashMap<&str, usize> = HashMap::new();

    for (index, group) in schedule.groups.iter().enumerate() {
        let untimed = !group.slots.is_empty() && group.slots.iter().all(|slot| !slot.is_timed());
        if untimed {
            checks.push(Validation::fail(ScheduleError::UntimedGroup { group: index }));
        }

        let mut timed: Vec<(Duration, Duration, &str)> = group
            .slots
            .iter()
            .filter_map(|slot| Some((slot.start_time?, slot.end_time()?, slot.fsm.as_str())))
            .collect();
        timed.sort_by_key(|(start, _, _)| *start);
        for pair in timed.windows(2) {
            let (_, first_end, first) = pair[0];
            let (second_start, _, second) = pair[1];
            if second_start < first_end {
                checks.push(Validation::fail(ScheduleError::OverlappingSlots {
                    group: index,
                    first: first.to_string(),
                    second: second.to_string(),
                }));
            }
        }

        for slot in &group.slots {
            match owners.get(slot.fsm.as_str()) {
                Some(&first) if first != index => {
                    checks.push(Validation::fail(ScheduleError::SharedMachine {
                        fsm: slot.fsm.clone(),
                        first,
                        second: index,
                    }));
                }
                Some(_) => {}
                None => {
                    owners.insert(slot.fsm.as_str(), index);
                }
            }
        }
    }
    checks
}
