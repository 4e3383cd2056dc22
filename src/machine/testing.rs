//! Machine data shared by unit tests.

use super::context::MachineData;

pub(crate) struct Counter;

#[derive(Clone, Debug, Default)]
pub(crate) struct CounterVars {
    pub count: u32,
    pub log: Vec<String>,
}

impl MachineData for Counter {
    type Vars = CounterVars;
    type Environment = ();
    type Parameters = ();
    type Result = u32;
}
