//! Schedules and the machines they run.

use crate::machine::{Executable, MachineFactory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One slot of a group: the machine to run and, for time-triggered
/// schedules, when and for how long.
///
/// Times are serialized in microseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInformation {
    pub fsm: String,
    #[serde(rename = "start_time_us", default, with = "micros", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Duration>,
    #[serde(rename = "duration_us", default, with = "micros", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl SlotInformation {
    pub fn untimed(fsm: impl Into<String>) -> Self {
        Self {
            fsm: fsm.into(),
            start_time: None,
            duration: None,
        }
    }

    pub fn timed(fsm: impl Into<String>, start_time: Duration, duration: Duration) -> Self {
        Self {
            fsm: fsm.into(),
            start_time: Some(start_time),
            duration: Some(duration),
        }
    }

    pub fn is_timed(&self) -> bool {
        self.start_time.is_some() && self.duration.is_some()
    }

    /// End of the slot relative to the cycle start.
    pub fn end_time(&self) -> Option<Duration> {
        Some(self.start_time? + self.duration?)
    }
}

/// Slots executed in order by one thread.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInformation {
    pub slots: Vec<SlotInformation>,
}

impl GroupInformation {
    pub fn new(slots: Vec<SlotInformation>) -> Self {
        Self { slots }
    }

    pub fn is_timed(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(SlotInformation::is_timed)
    }

    pub fn is_mixed(&self) -> bool {
        self.slots.iter().any(SlotInformation::is_timed)
            && self.slots.iter().any(|slot| !slot.is_timed())
    }
}

/// Ordered groups of slots; one thread per group when time-triggered.
///
/// # Example
///
/// ```rust
/// use llfsm::schedule::Schedule;
/// use std::time::Duration;
///
/// let schedule = Schedule::from_json_str(r#"{
///     "groups": [
///         { "slots": [
///             { "fsm": "Sensor", "start_time_us": 0, "duration_us": 500 },
///             { "fsm": "Motor", "start_time_us": 500, "duration_us": 250 }
///         ] }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(schedule.groups[0].slots[1].start_time, Some(Duration::from_micros(500)));
/// assert_eq!(schedule.cycle_length(), Some(Duration::from_micros(750)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub groups: Vec<GroupInformation>,
}

impl Schedule {
    pub fn new(groups: Vec<GroupInformation>) -> Self {
        Self { groups }
    }

    /// One group holding one untimed slot per machine.
    pub fn sequential<I, S>(machines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![GroupInformation::new(
            machines
                .into_iter()
                .map(|fsm| SlotInformation::untimed(fsm))
                .collect(),
        )])
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn machine_names(&self) -> BTreeSet<&str> {
        self.groups
            .iter()
            .flat_map(|group| group.slots.iter())
            .map(|slot| slot.fsm.as_str())
            .collect()
    }

    /// Latest slot end over all groups, if any slot is timed.
    pub fn cycle_length(&self) -> Option<Duration> {
        self.groups
            .iter()
            .flat_map(|group| group.slots.iter())
            .filter_map(SlotInformation::end_time)
            .max()
    }
}

mod micros {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        value
            .map(|duration| u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_micros))
    }
}

/// The machines available to a schedule.
///
/// Controllable machines run from their own instance. Parameterised
/// machines run only while called or invoked; root parameterised machines
/// are invoked with their start parameters when scheduling begins.
#[derive(Default)]
pub struct Arrangement {
    pub(crate) machines: Vec<Box<dyn Executable>>,
    pub(crate) parameterised: Vec<Arc<dyn MachineFactory>>,
    pub(crate) roots: Vec<(Arc<dyn MachineFactory>, Value)>,
}

impl Arrangement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn machine(mut self, machine: Box<dyn Executable>) -> Self {
        self.machines.push(machine);
        self
    }

    pub fn parameterised(mut self, factory: impl MachineFactory + 'static) -> Self {
        self.parameterised.push(Arc::new(factory));
        self
    }

    pub fn root(mut self, factory: impl MachineFactory + 'static, parameters: Value) -> Self {
        self.roots.push((Arc::new(factory), parameters));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.machines
            .iter()
            .map(|machine| machine.name())
            .chain(self.parameterised.iter().map(|factory| factory.name()))
            .chain(self.roots.iter().map(|(factory, _)| factory.name()))
            .collect()
    }
}

impl fmt::Debug for Arrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arrangement")
            .field("machines", &self.machines.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field(
                "parameterised",
                &self.parameterised.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("roots", &self.roots.iter().map(|(r, _)| r.name()).collect::<Vec<_>>())
            .finish()
    }
}
