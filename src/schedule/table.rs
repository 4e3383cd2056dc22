//! The machines a scheduler drives, indexed by gateway id.

use super::error::SchedulerError;
use super::model::{Arrangement, Schedule};
use super::validation::validate;
use crate::config::SchedulerKind;
use crate::gateway::{FsmId, Invoker, SharedExecutable, StackGateway};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use stillwater::validation::Validation;

/// Where the instance executed by a slot came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Source {
    /// A controllable machine owned by the scheduler.
    Base,
    /// The running top of the machine's gateway stack.
    Stack,
}

/// The instance a slot executes this cycle.
#[derive(Clone)]
pub(crate) struct Resolved {
    pub(crate) fsm: SharedExecutable,
    pub(crate) source: Source,
}

impl Resolved {
    pub(crate) fn same_instance(&self, other: &Resolved) -> bool {
        Arc::ptr_eq(&self.fsm, &other.fsm)
    }
}

pub(crate) struct MachineTable {
    gateway: Arc<StackGateway>,
    ids: HashMap<String, FsmId>,
    base: Mutex<HashMap<FsmId, SharedExecutable>>,
}

impl MachineTable {
    /// Validate `schedule`, then register every machine of `arrangement`
    /// with the gateway and start the root parameterised machines.
    ///
    /// Only machines with a slot in `schedule` can be invoked.
    pub(crate) fn install(
        arrangement: Arrangement,
        schedule: &Schedule,
        kind: SchedulerKind,
        gateway: &Arc<StackGateway>,
    ) -> Result<Self, SchedulerError> {
        check_unique(&arrangement)?;
        if let Validation::Failure(errors) = validate(schedule, &arrangement.names(), kind) {
            return Err(SchedulerError::InvalidSchedule(errors.iter().cloned().collect()));
        }

        let Arrangement {
            machines,
            parameterised,
            roots,
        } = arrangement;
        let mut ids = HashMap::new();

        for factory in parameterised.iter().chain(roots.iter().map(|(factory, _)| factory)) {
            let id = gateway.register(Arc::clone(factory));
            ids.insert(factory.name().to_string(), id);
        }

        let mut base = HashMap::new();
        for mut machine in machines {
            let id = gateway.id_of(machine.name());
            machine.attach(Invoker::new(Arc::clone(gateway), id, id));
            machine.setup();
            ids.insert(machine.name().to_string(), id);
            base.insert(id, Arc::new(Mutex::new(machine)));
        }

        for name in schedule.machine_names() {
            if let Some(&id) = ids.get(name) {
                gateway.mark_scheduled(id);
            }
        }

        for fsm in base.values() {
            let fsm = fsm.lock();
            gateway.check_dependencies(fsm.name(), fsm.dependencies());
        }
        for factory in parameterised.iter().chain(roots.iter().map(|(factory, _)| factory)) {
            gateway.check_dependencies(factory.name(), factory.dependencies());
        }

        for (factory, parameters) in roots {
            let id = ids[factory.name()];
            gateway.invoke(id, parameters, id);
        }

        tracing::debug!(
            machines = base.len(),
            parameterised = ids.len() - base.len(),
            "installed arrangement"
        );
        Ok(Self {
            gateway: Arc::clone(gateway),
            ids,
            base: Mutex::new(base),
        })
    }

    pub(crate) fn gateway(&self) -> &Arc<StackGateway> {
        &self.gateway
    }

    pub(crate) fn id(&self, name: &str) -> Result<FsmId, SchedulerError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| SchedulerError::UnknownMachine(name.to_string()))
    }

    /// The running top of `id`'s stack, else its base instance. `None` for
    /// a parameterised machine that is not running and for a base machine
    /// that has been retired.
    pub(crate) fn resolve(&self, id: FsmId) -> Option<Resolved> {
        if let Some(fsm) = self.gateway.top(id) {
            return Some(Resolved {
                fsm,
                source: Source::Stack,
            });
        }
        self.base.lock().get(&id).map(|fsm| Resolved {
            fsm: Arc::clone(fsm),
            source: Source::Base,
        })
    }

    /// Complete the instance a slot just executed: pop it off its stack, or
    /// tear down and drop a base machine.
    pub(crate) fn complete(&self, id: FsmId, resolved: &Resolved) {
        match resolved.source {
            Source::Stack => self.gateway.finish(id),
            Source::Base => {
                let removed = self.base.lock().remove(&id);
                if let Some(fsm) = removed {
                    let mut fsm = fsm.lock();
                    tracing::debug!(machine = fsm.name(), "machine left the schedule");
                    fsm.tear_down();
                }
            }
        }
    }

    /// No base machine remains and no call is in flight.
    pub(crate) fn is_empty(&self) -> bool {
        self.base.lock().is_empty() && !self.gateway.has_pending_calls()
    }

    pub(crate) fn instance(&self, name: &str) -> Option<SharedExecutable> {
        let id = self.ids.get(name)?;
        self.resolve(*id).map(|resolved| resolved.fsm)
    }
}

fn check_unique(arrangement: &Arrangement) -> Result<(), SchedulerError> {
    let mut seen = BTreeSet::new();
    let names = arrangement
        .machines
        .iter()
        .map(|machine| machine.name())
        .chain(arrangement.parameterised.iter().map(|factory| factory.name()))
        .chain(arrangement.roots.iter().map(|(factory, _)| factory.name()));
    for name in names {
        if !seen.insert(name) {
            return Err(SchedulerError::DuplicateMachine(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder};
    use crate::machine::testing::Counter;
    use crate::machine::FiniteStateMachine;

    fn looping(name: &str) -> FiniteStateMachine<Counter> {
        MachineBuilder::<Counter>::new(name)
            .initial("Loop")
            .state(StateBuilder::<Counter>::new("Loop").transition("Loop", |_| false))
            .build()
            .unwrap()
    }

    #[test]
    fn install_registers_base_and_parameterised_machines() {
        let gateway = Arc::new(StackGateway::default());
        let arrangement = Arrangement::new()
            .machine(looping("Base").boxed())
            .parameterised(looping("Helper"));

        let table = MachineTable::install(
            arrangement,
            &Schedule::sequential(["Base", "Helper"]),
            SchedulerKind::RoundRobin,
            &gateway,
        )
        .unwrap();

        let base = table.id("Base").unwrap();
        let helper = table.id("Helper").unwrap();
        assert_eq!(table.resolve(base).map(|r| r.source), Some(Source::Base));
        assert!(table.resolve(helper).is_none());
        assert!(gateway.is_registered("Helper"));
        assert_eq!(table.id("Ghost"), Err(SchedulerError::UnknownMachine("Ghost".into())));
    }

    #[test]
    fn roots_start_on_their_own_stack() {
        let gateway = Arc::new(StackGateway::default());
        let arrangement = Arrangement::new().root(looping("Root"), serde_json::Value::Null);

        let table = MachineTable::install(
            arrangement,
            &Schedule::sequential(["Root"]),
            SchedulerKind::RoundRobin,
            &gateway,
        )
        .unwrap();

        let root = table.id("Root").unwrap();
        let resolved = table.resolve(root).unwrap();
        assert_eq!(resolved.source, Source::Stack);

        table.complete(root, &resolved);
        assert!(table.resolve(root).is_none());
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "'Root' is invoked but has no slot in the schedule")]
    fn roots_without_a_slot_are_fatal() {
        let gateway = Arc::new(StackGateway::default());
        let arrangement = Arrangement::new()
            .machine(looping("Base").boxed())
            .root(looping("Root"), serde_json::Value::Null);

        let _ = MachineTable::install(
            arrangement,
            &Schedule::sequential(["Base"]),
            SchedulerKind::RoundRobin,
            &gateway,
        );
    }

    #[test]
    fn completing_a_base_machine_retires_it() {
        let gateway = Arc::new(StackGateway::default());
        let table = MachineTable::install(
            Arrangement::new().machine(looping("Base").boxed()),
            &Schedule::sequential(["Base"]),
            SchedulerKind::RoundRobin,
            &gateway,
        )
        .unwrap();
        let id = table.id("Base").unwrap();
        let resolved = table.resolve(id).unwrap();

        table.complete(id, &resolved);

        assert!(table.resolve(id).is_none());
        assert!(table.instance("Base").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let gateway = Arc::new(StackGateway::default());
        let arrangement = Arrangement::new()
            .machine(looping("Twin").boxed())
            .parameterised(looping("Twin"));

        let result = MachineTable::install(
            arrangement,
            &Schedule::sequential(["Twin"]),
            SchedulerKind::RoundRobin,
            &gateway,
        );

        assert_eq!(result.err(), Some(SchedulerError::DuplicateMachine("Twin".into())));
    }

    #[test]
    fn invalid_schedule_is_rejected_before_install() {
        let gateway = Arc::new(StackGateway::default());

        let result = MachineTable::install(
            Arrangement::new().machine(looping("Base").boxed()),
            &Schedule::sequential(["Base", "Ghost"]),
            SchedulerKind::RoundRobin,
            &gateway,
        );

        assert!(matches!(result, Err(SchedulerError::InvalidSchedule(errors)) if errors.len() == 1));
        assert!(gateway.name_of(0).is_none());
    }
}
