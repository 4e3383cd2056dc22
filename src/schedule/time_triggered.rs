//! Time-triggered scheduling: one thread per group, slots at fixed offsets
//! into a shared cycle.

use super::dispatch::DispatchTable;
use super::error::SchedulerError;
use super::model::{Arrangement, Schedule};
use super::table::{MachineTable, Source};
use super::timing::{wait_until, RunReport, StopReason, StopSignal};
use crate::config::{RuntimeConfig, SchedulerKind};
use crate::gateway::{FsmId, SharedExecutable, StackGateway};
use crate::machine::Executable;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct TimedSlot {
    id: FsmId,
    fsm: String,
    start_time: Duration,
    duration: Duration,
}

/// State shared by the worker threads of one run.
struct Cycle {
    barrier: Barrier,
    start: Mutex<Instant>,
    halt: Mutex<Option<StopReason>>,
    busy: AtomicBool,
    /// A slot of some group panicked.
    failed: AtomicBool,
    cycles: AtomicU64,
    late_starts: AtomicU64,
    overruns: AtomicU64,
}

impl Cycle {
    fn new(threads: usize) -> Self {
        Self {
            barrier: Barrier::new(threads),
            start: Mutex::new(Instant::now()),
            halt: Mutex::new(None),
            busy: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            late_starts: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        }
    }
}

/// Runs each group of a timed schedule on its own thread.
///
/// Every cycle starts at a shared instant, `now + jitter_margin`. Within a
/// group, each slot waits until `cycle start + start_time`, executes one
/// ringlet, then waits until the end of the slot before writing its
/// environment snapshot. Starting late or running past the end of a slot is
/// logged and counted but never stops the scheduler.
///
/// A panic in one group halts every group at the next cycle boundary and is
/// then raised again from [`run`](Self::run).
pub struct TimeTriggeredScheduler {
    table: MachineTable,
    threads: Vec<Vec<TimedSlot>>,
    stop: StopSignal,
    jitter_margin: Duration,
    spin_threshold: Duration,
    max_cycles: Option<u64>,
}

impl TimeTriggeredScheduler {
    pub fn new(
        arrangement: Arrangement,
        schedule: &Schedule,
        gateway: Arc<StackGateway>,
    ) -> Result<Self, SchedulerError> {
        let table = MachineTable::install(arrangement, schedule, SchedulerKind::TimeTriggered, &gateway)?;
        let dispatch = DispatchTable::from_schedule(schedule);
        let mut threads = Vec::with_capacity(dispatch.number_of_threads());
        for thread in dispatch.threads() {
            let mut slots = Vec::with_capacity(thread.len());
            for slot in thread {
                slots.push(TimedSlot {
                    id: table.id(&slot.fsm)?,
                    fsm: slot.fsm.clone(),
                    start_time: slot.start_time,
                    duration: slot.duration,
                });
            }
            threads.push(slots);
        }
        let config = RuntimeConfig::default();
        Ok(Self {
            table,
            threads,
            stop: StopSignal::new(),
            jitter_margin: config.jitter_margin(),
            spin_threshold: config.spin_threshold(),
            max_cycles: None,
        })
    }

    /// Take timing and cycle limits from `config`.
    pub fn with_config(mut self, config: &RuntimeConfig) -> Self {
        self.jitter_margin = config.jitter_margin();
        self.spin_threshold = config.spin_threshold();
        self.max_cycles = config.max_cycles;
        self
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

    pub fn machine(&self, name: &str) -> Option<SharedExecutable> {
        self.table.instance(name)
    }

    /// Execute a single cycle on all threads. Returns `false` once nothing
    /// is left to run.
    pub fn cycle(&mut self) -> bool {
        self.execute(Some(1)).reason == StopReason::CycleLimit
    }

    /// Run cycles until the stop signal is raised, the cycle limit is
    /// reached, or nothing is left to run.
    pub fn run(&mut self) -> RunReport {
        self.execute(self.max_cycles)
    }

    fn execute(&self, max_cycles: Option<u64>) -> RunReport {
        tracing::debug!(threads = self.threads.len(), "time-triggered scheduler started");
        let cycle = Cycle::new(self.threads.len());
        let failure = thread::scope(|scope| {
            let workers: Vec<_> = self
                .threads
                .iter()
                .map(|slots| {
                    let cycle = &cycle;
                    scope.spawn(move || self.worker(slots, cycle, max_cycles))
                })
                .collect();
            workers
                .into_iter()
                .filter_map(|worker| worker.join().and_then(|outcome| outcome).err())
                .next()
        });
        if let Some(payload) = failure {
            panic::resume_unwind(payload);
        }

        let report = RunReport {
            cycles: cycle.cycles.load(Ordering::SeqCst),
            reason: (*cycle.halt.lock()).unwrap_or(StopReason::Stopped),
            late_starts: cycle.late_starts.load(Ordering::SeqCst),
            overruns: cycle.overruns.load(Ordering::SeqCst),
        };
        tracing::debug!(
            cycles = report.cycles,
            reason = ?report.reason,
            late_starts = report.late_starts,
            overruns = report.overruns,
            "time-triggered scheduler stopped"
        );
        report
    }

    /// Run the slots of one group every cycle. A panicking slot ends the
    /// group's work, but the worker keeps meeting the barrier until the
    /// halt is published so the other groups are released.
    fn worker(&self, slots: &[TimedSlot], cycle: &Cycle, max_cycles: Option<u64>) -> thread::Result<()> {
        let mut failure = None;
        loop {
            if cycle.barrier.wait().is_leader() {
                self.begin_cycle(cycle, max_cycles);
            }
            cycle.barrier.wait();
            if cycle.halt.lock().is_some() {
                return failure.map_or(Ok(()), Err);
            }
            if failure.is_some() {
                continue;
            }
            let start = *cycle.start.lock();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                for slot in slots {
                    self.run_slot(slot, start, cycle);
                }
            }));
            if let Err(payload) = outcome {
                tracing::error!("time-triggered group panicked, halting all groups");
                cycle.failed.store(true, Ordering::SeqCst);
                failure = Some(payload);
            }
        }
    }

    /// Decide whether another cycle runs and, if so, when it starts.
    fn begin_cycle(&self, cycle: &Cycle, max_cycles: Option<u64>) {
        let completed = cycle.cycles.load(Ordering::SeqCst);
        let busy = cycle.busy.swap(false, Ordering::SeqCst);
        let reason = if self.stop.is_stopped() || cycle.failed.load(Ordering::SeqCst) {
            Some(StopReason::Stopped)
        } else if completed > 0 && !busy {
            Some(if self.table.is_empty() {
                StopReason::Finished
            } else {
                StopReason::Idle
            })
        } else if max_cycles.is_some_and(|limit| completed >= limit) {
            Some(StopReason::CycleLimit)
        } else {
            None
        };
        match reason {
            Some(reason) => *cycle.halt.lock() = Some(reason),
            None => {
                cycle.cycles.fetch_add(1, Ordering::SeqCst);
                *cycle.start.lock() = Instant::now() + self.jitter_margin;
            }
        }
    }

    fn run_slot(&self, slot: &TimedSlot, cycle_start: Instant, cycle: &Cycle) {
        let deadline = cycle_start + slot.start_time;
        if let Some(late) = wait_until(deadline, self.spin_threshold) {
            tracing::warn!(
                machine = %slot.fsm,
                late_us = late.as_micros() as u64,
                "slot started late"
            );
            cycle.late_starts.fetch_add(1, Ordering::SeqCst);
        }

        let Some(resolved) = self.table.resolve(slot.id) else {
            return;
        };
        let finished = {
            let mut fsm = resolved.fsm.lock();
            fsm.take_snapshot();
            fsm.update_clock(Instant::now());
            if fsm.is_unloaded() {
                tracing::debug!(machine = fsm.name(), "dropping unloaded machine");
                drop(fsm);
                self.table.complete(slot.id, &resolved);
                return;
            }
            fsm.next();
            if !fsm.is_finished() && !fsm.is_suspended() {
                cycle.busy.store(true, Ordering::SeqCst);
            }
            fsm.is_finished()
        };
        if finished && resolved.source == Source::Stack {
            self.table.gateway().finish(slot.id);
            cycle.busy.store(true, Ordering::SeqCst);
        }

        if let Some(overrun) = wait_until(deadline + slot.duration, self.spin_threshold) {
            tracing::warn!(
                machine = %slot.fsm,
                overrun_us = overrun.as_micros() as u64,
                "slot overran its budget"
            );
            cycle.overruns.fetch_add(1, Ordering::SeqCst);
        }
        resolved.fsm.lock().save_snapshot();

        if finished && resolved.source == Source::Base {
            self.table.complete(slot.id, &resolved);
        }
    }
}
