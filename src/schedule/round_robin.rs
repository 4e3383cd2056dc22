//! Cooperative single-threaded scheduling.

use super::error::SchedulerError;
use super::model::{Arrangement, Schedule};
use super::table::{MachineTable, Resolved, Source};
use super::timing::{RunReport, StopReason, StopSignal};
use crate::config::SchedulerKind;
use crate::gateway::{FsmId, SharedExecutable, StackGateway};
use crate::machine::Executable;
use std::sync::Arc;
use std::time::Instant;

/// Executes one ringlet per slot, group after group, in declared order.
///
/// Each group reads the environment once before its first slot and writes
/// it once after its last slot, so every machine of a group sees the same
/// snapshot within a cycle.
///
/// # Example
///
/// ```rust
/// use llfsm::builder::{MachineBuilder, StateBuilder};
/// use llfsm::machine::MachineData;
/// use llfsm::schedule::{Arrangement, RoundRobinScheduler, Schedule, StopReason};
/// use llfsm::gateway::StackGateway;
/// use std::sync::Arc;
///
/// struct Blink;
///
/// impl MachineData for Blink {
///     type Vars = ();
///     type Environment = ();
///     type Parameters = ();
///     type Result = ();
/// }
///
/// let blink = MachineBuilder::<Blink>::new("Blink")
///     .initial("On")
///     .state(StateBuilder::<Blink>::new("On").always("Off"))
///     .state(StateBuilder::<Blink>::new("Off"))
///     .build()
///     .unwrap();
///
/// let mut scheduler = RoundRobinScheduler::new(
///     Arrangement::new().machine(blink.boxed()),
///     &Schedule::sequential(["Blink"]),
///     Arc::new(StackGateway::default()),
/// )
/// .unwrap();
///
/// let report = scheduler.run();
///
/// assert_eq!(report.reason, StopReason::Finished);
/// assert_eq!(report.cycles, 3);
/// ```
pub struct RoundRobinScheduler {
    table: MachineTable,
    groups: Vec<Vec<FsmId>>,
    stop: StopSignal,
    max_cycles: Option<u64>,
}

impl RoundRobinScheduler {
    pub fn new(
        arrangement: Arrangement,
        schedule: &Schedule,
        gateway: Arc<StackGateway>,
    ) -> Result<Self, SchedulerError> {
        let table = MachineTable::install(arrangement, schedule, SchedulerKind::RoundRobin, &gateway)?;
        let groups = schedule
            .groups
            .iter()
            .map(|group| {
                group
                    .slots
                    .iter()
                    .map(|slot| table.id(&slot.fsm))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            table,
            groups,
            stop: StopSignal::new(),
            max_cycles: None,
        })
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn gateway(&self) -> &Arc<StackGateway> {
        self.table.gateway()
    }

    /// The instance currently executed for `name`.
    pub fn machine(&self, name: &str) -> Option<SharedExecutable> {
        self.table.instance(name)
    }

    /// Execute one pass over every group. Returns `false` once nothing is
    /// left to run: every slot is finished, suspended, or waiting for an
    /// invocation.
    pub fn cycle(&mut self) -> bool {
        let mut runnable = false;
        let mut retired: Vec<FsmId> = Vec::new();

        for group in &self.groups {
            let mut instances: Vec<(FsmId, Resolved)> = Vec::new();
            for &id in group {
                if instances.iter().any(|(seen, _)| *seen == id) {
                    continue;
                }
                if let Some(resolved) = self.table.resolve(id) {
                    resolved.fsm.lock().take_snapshot();
                    instances.push((id, resolved));
                }
            }

            for &id in group {
                let Some((_, resolved)) = instances.iter().find(|(seen, _)| *seen == id) else {
                    continue;
                };
                if retired.contains(&id) {
                    continue;
                }
                // A call or finish earlier in this pass replaced the instance.
                match self.table.resolve(id) {
                    Some(current) if current.same_instance(resolved) => {}
                    _ => {
                        runnable = true;
                        continue;
                    }
                }

                let mut fsm = resolved.fsm.lock();
                if fsm.is_unloaded() {
                    tracing::debug!(machine = fsm.name(), "dropping unloaded machine");
                    drop(fsm);
                    self.table.complete(id, resolved);
                    if resolved.source == Source::Base {
                        retired.push(id);
                    }
                    continue;
                }
                fsm.update_clock(Instant::now());
                fsm.next();
                if fsm.is_finished() {
                    drop(fsm);
                    if resolved.source == Source::Stack {
                        self.table.gateway().finish(id);
                        runnable = true;
                    } else {
                        retired.push(id);
                    }
                } else if !fsm.is_suspended() {
                    runnable = true;
                }
            }

            for (_, resolved) in &instances {
                resolved.fsm.lock().save_snapshot();
            }
        }

        for id in &retired {
            if let Some(resolved) = self.table.resolve(*id) {
                if resolved.source == Source::Base {
                    self.table.complete(*id, &resolved);
                }
            }
        }
        if !retired.is_empty() {
            for group in &mut self.groups {
                group.retain(|id| !retired.contains(id));
            }
        }
        runnable
    }

    /// Run cycles until the stop signal is raised, the cycle limit is
    /// reached, or nothing is left to run.
    pub fn run(&mut self) -> RunReport {
        tracing::debug!(groups = self.groups.len(), "round-robin scheduler started");
        let mut cycles = 0;
        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            if self.max_cycles.is_some_and(|limit| cycles >= limit) {
                break StopReason::CycleLimit;
            }
            let runnable = self.cycle();
            cycles += 1;
            if !runnable {
                break if self.table.is_empty() {
                    StopReason::Finished
                } else {
                    StopReason::Idle
                };
            }
        };
        tracing::debug!(cycles, ?reason, "round-robin scheduler stopped");
        RunReport {
            cycles,
            reason,
            late_starts: 0,
            overruns: 0,
        }
    }

    /// Ask `name` to move to its suspend state on its next ringlet.
    pub fn suspend(&self, name: &str) -> Result<(), SchedulerError> {
        self.control(name, |fsm| fsm.suspend())
    }

    pub fn resume(&self, name: &str) -> Result<(), SchedulerError> {
        self.control(name, |fsm| fsm.resume())
    }

    pub fn restart(&self, name: &str) -> Result<(), SchedulerError> {
        self.control(name, |fsm| fsm.restart())
    }

    fn control<F>(&self, name: &str, request: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut dyn Executable),
    {
        let fsm = self
            .table
            .instance(name)
            .ok_or_else(|| SchedulerError::UnknownMachine(name.to_string()))?;
        let mut fsm = fsm.lock();
        request(&mut **fsm);
        Ok(())
    }
}
