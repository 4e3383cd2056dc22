//! The runtime context shared by everything a run needs.

use crate::config::{RuntimeConfig, SchedulerKind};
use crate::gateway::StackGateway;
use crate::schedule::{
    Arrangement, RoundRobinScheduler, RunReport, Schedule, SchedulerError, StopSignal,
    TimeTriggeredScheduler,
};
use std::sync::Arc;

/// Owns the gateway and stop signal for the lifetime of a process and runs
/// arrangements with the configured scheduler.
///
/// # Example
///
/// ```rust
/// use llfsm::builder::{MachineBuilder, StateBuilder};
/// use llfsm::config::RuntimeConfig;
/// use llfsm::machine::MachineData;
/// use llfsm::runtime::Runtime;
/// use llfsm::schedule::{Arrangement, Schedule, StopReason};
///
/// struct Ticker;
///
/// impl MachineData for Ticker {
///     type Vars = u32;
///     type Environment = ();
///     type Parameters = ();
///     type Result = ();
/// }
///
/// let ticker = MachineBuilder::<Ticker>::new("Ticker")
///     .initial("Tick")
///     .state(StateBuilder::<Ticker>::new("Tick").internal(|ctx| ctx.vars += 1).transition("Tick", |_| false))
///     .build()
///     .unwrap();
///
/// let config = RuntimeConfig {
///     max_cycles: Some(5),
///     ..RuntimeConfig::default()
/// };
/// let runtime = Runtime::new(config);
///
/// let report = runtime
///     .run(Arrangement::new().machine(ticker.boxed()), &Schedule::sequential(["Ticker"]))
///     .unwrap();
///
/// assert_eq!(report.reason, StopReason::CycleLimit);
/// assert_eq!(report.cycles, 5);
/// ```
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    gateway: Arc<StackGateway>,
    stop: StopSignal,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let gateway = Arc::new(StackGateway::new(config.stack_limit));
        Self {
            config,
            gateway,
            stop: StopSignal::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<StackGateway> {
        &self.gateway
    }

    /// Raise this signal from any thread to end the current run at the next
    /// cycle boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Validate `schedule` and run `arrangement` until it stops.
    ///
    /// Each run starts from an empty gateway, so calls left on a stack by an
    /// earlier run are dropped.
    pub fn run(&self, arrangement: Arrangement, schedule: &Schedule) -> Result<RunReport, SchedulerError> {
        tracing::info!(
            scheduler = ?self.config.scheduler,
            groups = schedule.groups.len(),
            "starting run"
        );
        self.gateway.reset();
        let gateway = Arc::clone(&self.gateway);
        let report = match self.config.scheduler {
            SchedulerKind::RoundRobin => RoundRobinScheduler::new(arrangement, schedule, gateway)?
                .with_stop_signal(self.stop.clone())
                .with_max_cycles(self.config.max_cycles)
                .run(),
            SchedulerKind::TimeTriggered => TimeTriggeredScheduler::new(arrangement, schedule, gateway)?
                .with_config(&self.config)
                .with_stop_signal(self.stop.clone())
                .run(),
        };
        tracing::info!(cycles = report.cycles, reason = ?report.reason, "run complete");
        Ok(report)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder};
    use crate::machine::testing::Counter;
    use crate::schedule::{ScheduleError, StopReason};

    fn idle() -> Arrangement {
        let machine = MachineBuilder::<Counter>::new("Idle")
            .initial("Wait")
            .state(StateBuilder::<Counter>::new("Wait").transition("Wait", |_| false))
            .build()
            .unwrap();
        Arrangement::new().machine(machine.boxed())
    }

    #[test]
    fn gateway_uses_configured_stack_limit() {
        let runtime = Runtime::new(RuntimeConfig {
            stack_limit: 16,
            ..RuntimeConfig::default()
        });

        assert_eq!(runtime.gateway().stack_limit(), 16);
    }

    #[test]
    fn stopped_runtime_returns_immediately() {
        let runtime = Runtime::default();
        runtime.stop_signal().stop();

        let report = runtime.run(idle(), &Schedule::sequential(["Idle"])).unwrap();

        assert_eq!(report.reason, StopReason::Stopped);
        assert_eq!(report.cycles, 0);
    }

    #[test]
    fn later_runs_start_with_empty_stacks() {
        let root = MachineBuilder::<Counter>::new("Root")
            .initial("Spin")
            .state(StateBuilder::<Counter>::new("Spin").transition("Spin", |_| false))
            .build()
            .unwrap();
        let runtime = Runtime::new(RuntimeConfig {
            max_cycles: Some(2),
            ..RuntimeConfig::default()
        });
        let schedule = Schedule::sequential(["Root"]);

        let first = runtime
            .run(Arrangement::new().root(root.clone(), serde_json::Value::Null), &schedule)
            .unwrap();
        let root_id = runtime.gateway().id_of("Root");
        assert_eq!(runtime.gateway().depth(root_id), 1);

        let second = runtime
            .run(Arrangement::new().root(root, serde_json::Value::Null), &schedule)
            .unwrap();

        assert_eq!(first.reason, StopReason::CycleLimit);
        assert_eq!(second.reason, StopReason::CycleLimit);
        assert_eq!(runtime.gateway().depth(root_id), 1);
    }

    #[test]
    fn time_triggered_runtime_rejects_untimed_schedule() {
        let runtime = Runtime::new(RuntimeConfig {
            scheduler: SchedulerKind::TimeTriggered,
            ..RuntimeConfig::default()
        });

        let result = runtime.run(idle(), &Schedule::sequential(["Idle"]));

        assert_eq!(
            result,
            Err(SchedulerError::InvalidSchedule(vec![ScheduleError::UntimedGroup { group: 0 }]))
        );
    }
}
