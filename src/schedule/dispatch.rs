//! Dispatch tables for the time-triggered scheduler.
//!
//! The text format has one section per thread, separated by blank lines.
//! Each row of a section is `start,duration,machine` with times in
//! microseconds:
//!
//! ```text
//! 0,20000,Sensor
//! 20000,10000,Controller
//!
//! 0,5000,Logger
//! ```

use super::model::{GroupInformation, Schedule, SlotInformation};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchParseError {
    #[error("line {line}: expected 'start,duration,machine', found '{row}'")]
    MalformedRow { line: usize, row: String },

    #[error("line {line}: '{value}' is not a whole number of microseconds")]
    InvalidTime { line: usize, value: String },

    #[error("dispatch table has no timeslots")]
    Empty,
}

/// A machine's slot in a thread's cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeslot {
    pub fsm: String,
    pub start_time: Duration,
    pub duration: Duration,
}

impl Timeslot {
    pub fn end_time(&self) -> Duration {
        self.start_time + self.duration
    }
}

/// Per-thread timeslots, each thread sorted by start time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchTable {
    threads: Vec<Vec<Timeslot>>,
}

impl DispatchTable {
    /// Parse the plain-text dispatch table format.
    ///
    /// # Example
    ///
    /// ```rust
    /// use llfsm::schedule::DispatchTable;
    /// use std::time::Duration;
    ///
    /// let table = DispatchTable::parse("0,20000,Ping\n20000,10000,Pong\n\n0,500,Log\n").unwrap();
    ///
    /// assert_eq!(table.number_of_threads(), 2);
    /// assert_eq!(table.threads()[0][1].start_time, Duration::from_millis(20));
    /// ```
    pub fn parse(text: &str) -> Result<Self, DispatchParseError> {
        let mut threads: Vec<Vec<Timeslot>> = Vec::new();
        let mut section: Vec<Timeslot> = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            let row = line.trim();
            if row.is_empty() {
                if !section.is_empty() {
                    threads.push(std::mem::take(&mut section));
                }
                continue;
            }
            let fields: Vec<&str> = row
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .collect();
            let [start, duration, fsm] = fields[..] else {
                return Err(DispatchParseError::MalformedRow {
                    line: line_number,
                    row: row.to_string(),
                });
            };
            section.push(Timeslot {
                fsm: fsm.to_string(),
                start_time: parse_micros(line_number, start)?,
                duration: parse_micros(line_number, duration)?,
            });
        }
        if !section.is_empty() {
            threads.push(section);
        }
        if threads.is_empty() {
            return Err(DispatchParseError::Empty);
        }
        Ok(Self::from_threads(threads))
    }

    /// The timed groups of `schedule`. Untimed slots are dropped.
    pub fn from_schedule(schedule: &Schedule) -> Self {
        let threads = schedule
            .groups
            .iter()
            .map(|group| {
                group
                    .slots
                    .iter()
                    .filter_map(|slot| {
                        Some(Timeslot {
                            fsm: slot.fsm.clone(),
                            start_time: slot.start_time?,
                            duration: slot.duration?,
                        })
                    })
                    .collect()
            })
            .collect();
        Self::from_threads(threads)
    }

    fn from_threads(mut threads: Vec<Vec<Timeslot>>) -> Self {
        for thread in &mut threads {
            thread.sort_by_key(|slot| slot.start_time);
        }
        Self { threads }
    }

    pub fn number_of_threads(&self) -> usize {
        self.threads.len()
    }

    pub fn threads(&self) -> &[Vec<Timeslot>] {
        &self.threads
    }

    /// The timeslot of `fsm`, if scheduled.
    pub fn find_timeslot(&self, fsm: &str) -> Option<&Timeslot> {
        self.threads.iter().flatten().find(|slot| slot.fsm == fsm)
    }

    pub fn into_schedule(self) -> Schedule {
        Schedule::new(
            self.threads
                .into_iter()
                .map(|thread| {
                    GroupInformation::new(
                        thread
                            .into_iter()
                            .map(|slot| SlotInformation::timed(slot.fsm, slot.start_time, slot.duration))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

fn parse_micros(line: usize, value: &str) -> Result<Duration, DispatchParseError> {
    value
        .parse::<u64>()
        .map(Duration::from_micros)
        .map_err(|_| DispatchParseError::InvalidTime {
            line,
            value: value.to_string(),
        })
}
