//! Per-machine call stacks of in-flight invocations.

use super::dependency::{CallMethod, Dependency, FsmId};
use super::error::{fatal, GatewayError};
use super::promise::{PartialPromise, Promise};
use crate::machine::{Executable, MachineFactory};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Default maximum depth of a caller's stack.
pub const DEFAULT_STACK_LIMIT: usize = 8192;

/// A machine instance shared between the gateway and a scheduler.
pub type SharedExecutable = Arc<Mutex<Box<dyn Executable>>>;

/// One entry of a gateway stack.
pub struct PromiseData {
    pub call_id: Uuid,
    pub fsm: SharedExecutable,
    /// Only the top entry of a stack is running.
    pub running: bool,
    pub has_finished: bool,
    pub result: Option<Value>,
}

impl fmt::Debug for PromiseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseData")
            .field("call_id", &self.call_id)
            .field("running", &self.running)
            .field("has_finished", &self.has_finished)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct GatewayState {
    ids: HashMap<String, FsmId>,
    names: Vec<String>,
    factories: HashMap<FsmId, Arc<dyn MachineFactory>>,
    stacks: HashMap<FsmId, Vec<PromiseData>>,
    fulfilled: HashMap<Uuid, Option<Value>>,
    /// Machines with a slot in the installed schedule.
    scheduled: HashSet<FsmId>,
}

impl GatewayState {
    fn id_of(&mut self, name: &str) -> FsmId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    fn name(&self, id: FsmId) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| fatal(GatewayError::UnknownId(id)))
    }

    fn depth(&self, id: FsmId) -> usize {
        self.stacks.get(&id).map_or(0, Vec::len)
    }
}

/// Tracks synchronous calls and asynchronous invocations of parameterised
/// machines.
///
/// Each machine id owns a LIFO stack of [`PromiseData`]. A scheduler slot
/// for machine `id` executes the top of `id`'s stack when one exists.
/// `invoke` pushes onto the callee's own stack; `call` pushes onto the
/// caller's stack so the callee runs in the caller's slot. `finish` pops.
///
/// The gateway lock is never held while a machine executes.
pub struct StackGateway {
    state: Mutex<GatewayState>,
    stack_limit: usize,
}

impl Default for StackGateway {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_LIMIT)
    }
}

impl StackGateway {
    pub fn new(stack_limit: usize) -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            stack_limit,
        }
    }

    pub fn stack_limit(&self) -> usize {
        self.stack_limit
    }

    /// The id of `name`, assigned on first lookup.
    pub fn id_of(&self, name: &str) -> FsmId {
        self.state.lock().id_of(name)
    }

    pub fn name_of(&self, id: FsmId) -> Option<String> {
        self.state.lock().names.get(id).cloned()
    }

    /// Make a parameterised machine callable.
    pub fn register(&self, factory: Arc<dyn MachineFactory>) -> FsmId {
        let mut state = self.state.lock();
        let id = state.id_of(factory.name());
        tracing::debug!(machine = factory.name(), id, "registered parameterised machine");
        state.factories.insert(id, factory);
        id
    }

    pub fn is_registered(&self, name: &str) -> bool {
        let state = self.state.lock();
        state
            .ids
            .get(name)
            .is_some_and(|id| state.factories.contains_key(id))
    }

    /// Record that `id` has a slot of its own, so it can be invoked.
    pub fn mark_scheduled(&self, id: FsmId) {
        self.state.lock().scheduled.insert(id);
    }

    pub fn is_scheduled(&self, id: FsmId) -> bool {
        self.state.lock().scheduled.contains(&id)
    }

    /// Drop every registration, stack and undelivered result. Ids stay
    /// assigned.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.factories.clear();
        state.stacks.clear();
        state.fulfilled.clear();
        state.scheduled.clear();
    }

    /// Stop if any dependency of `machine` is not a registered parameterised
    /// machine, or is invoked asynchronously without a slot to run in.
    pub fn check_dependencies(&self, machine: &str, dependencies: &[Dependency]) {
        for dependency in dependencies {
            if !self.is_registered(&dependency.name) {
                fatal(GatewayError::MissingDependency {
                    machine: machine.to_string(),
                    dependency: dependency.name.clone(),
                });
            }
            let asynchronous = dependency.call_method == CallMethod::Asynchronous;
            if asynchronous && !self.is_scheduled(self.id_of(&dependency.name)) {
                fatal(GatewayError::Unscheduled {
                    machine: dependency.name.clone(),
                });
            }
        }
    }

    /// Start machine `id` on its own stack. The caller continues without
    /// waiting.
    pub fn invoke(self: &Arc<Self>, id: FsmId, parameters: Value, caller: FsmId) -> Uuid {
        let mut state = self.state.lock();
        if !state.scheduled.contains(&id) {
            fatal(GatewayError::Unscheduled {
                machine: state.name(id),
            });
        }
        if state.depth(id) > 0 {
            fatal(GatewayError::AlreadyRunning {
                machine: state.name(id),
            });
        }
        let call_id = self.push(&mut state, id, id, parameters);
        tracing::debug!(
            machine = %state.name(id),
            caller = %state.name(caller),
            %call_id,
            "invoked"
        );
        call_id
    }

    /// Run machine `id` on `caller`'s stack until it finishes.
    pub fn call(self: &Arc<Self>, id: FsmId, parameters: Value, caller: FsmId) -> Uuid {
        let mut state = self.state.lock();
        let depth = state.depth(caller);
        if depth > self.stack_limit {
            fatal(GatewayError::StackOverflow {
                caller: state.name(caller),
                depth,
                limit: self.stack_limit,
            });
        }
        let call_id = self.push(&mut state, caller, id, parameters);
        tracing::debug!(
            machine = %state.name(id),
            caller = %state.name(caller),
            depth = depth + 1,
            %call_id,
            "called"
        );
        call_id
    }

    /// Call machine `id` recursively from its own stack.
    pub fn call_self(self: &Arc<Self>, id: FsmId, parameters: Value) -> Uuid {
        self.call(id, parameters, id)
    }

    fn push(self: &Arc<Self>, state: &mut GatewayState, owner: FsmId, machine: FsmId, parameters: Value) -> Uuid {
        let factory = match state.factories.get(&machine) {
            Some(factory) => Arc::clone(factory),
            None => fatal(GatewayError::UnknownMachine(state.name(machine))),
        };
        let mut fsm = factory.instantiate(Some(&parameters)).unwrap_or_else(|source| {
            fatal(GatewayError::InvalidParameters {
                machine: factory.name().to_string(),
                source,
            })
        });
        fsm.attach(Invoker::new(Arc::clone(self), owner, machine));
        fsm.setup();

        let call_id = Uuid::new_v4();
        let stack = state.stacks.entry(owner).or_default();
        if let Some(top) = stack.last_mut() {
            top.running = false;
        }
        stack.push(PromiseData {
            call_id,
            fsm: Arc::new(Mutex::new(fsm)),
            running: true,
            has_finished: false,
            result: None,
        });
        call_id
    }

    /// Pop the top of `id`'s stack and deliver its result. Does nothing when
    /// the stack is empty.
    pub fn finish(&self, id: FsmId) {
        let entry = {
            let mut state = self.state.lock();
            let Some(stack) = state.stacks.get_mut(&id) else {
                return;
            };
            let entry = stack.pop();
            if let Some(top) = stack.last_mut() {
                top.running = true;
            }
            entry
        };
        let Some(mut entry) = entry else {
            return;
        };
        {
            let mut fsm = entry.fsm.lock();
            entry.result = fsm.result();
            fsm.tear_down();
        }
        entry.has_finished = true;
        tracing::debug!(stack = id, call_id = %entry.call_id, "call finished");
        self.state
            .lock()
            .fulfilled
            .insert(entry.call_id, entry.result.take());
    }

    /// The running instance on top of `id`'s stack.
    pub fn top(&self, id: FsmId) -> Option<SharedExecutable> {
        let state = self.state.lock();
        state
            .stacks
            .get(&id)?
            .last()
            .filter(|entry| entry.running)
            .map(|entry| Arc::clone(&entry.fsm))
    }

    pub fn depth(&self, id: FsmId) -> usize {
        self.state.lock().depth(id)
    }

    /// `true` while any stack holds an entry.
    pub fn has_pending_calls(&self) -> bool {
        self.state.lock().stacks.values().any(|stack| !stack.is_empty())
    }

    pub(crate) fn take_fulfilled(&self, call_id: Uuid) -> Option<Option<Value>> {
        self.state.lock().fulfilled.remove(&call_id)
    }

    /// Current result of a running callee. Skips a callee that is
    /// executing on another thread.
    pub(crate) fn partial_result(&self, call_id: Uuid) -> Option<Value> {
        let fsm = {
            let state = self.state.lock();
            state
                .stacks
                .values()
                .flatten()
                .find(|entry| entry.call_id == call_id)
                .map(|entry| Arc::clone(&entry.fsm))?
        };
        let fsm = fsm.try_lock()?;
        fsm.result()
    }

    fn resolve(&self, machine: &str) -> FsmId {
        let state = self.state.lock();
        match state.ids.get(machine) {
            Some(&id) if state.factories.contains_key(&id) => id,
            _ => fatal(GatewayError::UnknownMachine(machine.to_string())),
        }
    }
}

impl fmt::Debug for StackGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StackGateway")
            .field("machines", &state.names)
            .field("stacks", &state.stacks)
            .field("stack_limit", &self.stack_limit)
            .finish()
    }
}

/// Handle through which a scheduled machine calls other machines.
///
/// `caller` is the stack the machine executes on; `machine` is its own id,
/// used by `call_self`.
#[derive(Clone)]
pub struct Invoker {
    gateway: Arc<StackGateway>,
    caller: FsmId,
    machine: FsmId,
}

impl Invoker {
    pub fn new(gateway: Arc<StackGateway>, caller: FsmId, machine: FsmId) -> Self {
        Self {
            gateway,
            caller,
            machine,
        }
    }

    pub fn gateway(&self) -> &StackGateway {
        &self.gateway
    }

    pub fn caller(&self) -> FsmId {
        self.caller
    }

    pub fn call<R, P>(&self, machine: &str, parameters: &P) -> Promise<R>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let id = self.gateway.resolve(machine);
        let parameters = encode(machine, parameters);
        Promise::pending(self.gateway.call(id, parameters, self.caller))
    }

    pub fn invoke<R, P>(&self, machine: &str, parameters: &P) -> Promise<R>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let id = self.gateway.resolve(machine);
        let parameters = encode(machine, parameters);
        Promise::pending(self.gateway.invoke(id, parameters, self.caller))
    }

    pub fn invoke_partial<P, R, A>(&self, machine: &str, parameters: &A) -> PartialPromise<P, R>
    where
        P: DeserializeOwned,
        R: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        let id = self.gateway.resolve(machine);
        let parameters = encode(machine, parameters);
        PartialPromise::pending(self.gateway.invoke(id, parameters, self.caller))
    }

    pub fn call_self<R, P>(&self, parameters: &P) -> Promise<R>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let machine = self.gateway.state.lock().name(self.machine);
        let parameters = encode(&machine, parameters);
        Promise::pending(self.gateway.call(self.machine, parameters, self.caller))
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("caller", &self.caller)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

fn encode<P: Serialize + ?Sized>(machine: &str, parameters: &P) -> Value {
    serde_json::to_value(parameters).unwrap_or_else(|source| {
        fatal(GatewayError::InvalidParameters {
            machine: machine.to_string(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder};
    use crate::machine::{FiniteStateMachine, MachineData};
    use serde::Deserialize;
    use serde_json::json;

    struct Adder;

    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct Operands {
        a: i64,
        b: i64,
    }

    impl MachineData for Adder {
        type Vars = ();
        type Environment = ();
        type Parameters = Operands;
        type Result = i64;
    }

    fn adder() -> FiniteStateMachine<Adder> {
        MachineBuilder::<Adder>::new("Adder")
            .initial("Add")
            .state(
                StateBuilder::<Adder>::new("Add")
                    .on_entry(|ctx| ctx.result = Some(ctx.parameters.a + ctx.parameters.b))
                    .always("Done"),
            )
            .state(StateBuilder::<Adder>::new("Done"))
            .build()
            .unwrap()
    }

    fn gateway(limit: usize) -> (Arc<StackGateway>, FsmId) {
        let gateway = Arc::new(StackGateway::new(limit));
        let id = gateway.register(Arc::new(adder()));
        gateway.mark_scheduled(id);
        (gateway, id)
    }

    fn run_to_completion(gateway: &StackGateway, stack: FsmId) {
        let fsm = gateway.top(stack).unwrap();
        let mut fsm = fsm.lock();
        while !fsm.is_finished() {
            fsm.next();
        }
    }

    #[test]
    fn ids_are_assigned_monotonically() {
        let gateway = StackGateway::default();

        assert_eq!(gateway.id_of("A"), 0);
        assert_eq!(gateway.id_of("B"), 1);
        assert_eq!(gateway.id_of("A"), 0);
        assert_eq!(gateway.name_of(1).as_deref(), Some("B"));
        assert_eq!(gateway.stack_limit(), DEFAULT_STACK_LIMIT);
    }

    #[test]
    fn call_then_finish_restores_depth() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");

        let call_id = gateway.call(adder, json!({"a": 2, "b": 3}), caller);
        assert_eq!(gateway.depth(caller), 1);
        assert_eq!(gateway.depth(adder), 0);

        run_to_completion(&gateway, caller);
        gateway.finish(caller);

        assert_eq!(gateway.depth(caller), 0);
        assert_eq!(gateway.take_fulfilled(call_id), Some(Some(json!(5))));
    }

    #[test]
    fn finish_on_empty_stack_is_noop() {
        let (gateway, adder) = gateway(8);

        gateway.finish(adder);
        gateway.finish(99);

        assert_eq!(gateway.depth(adder), 0);
        assert!(!gateway.has_pending_calls());
    }

    #[test]
    fn invoke_pushes_onto_callee_stack() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");

        gateway.invoke(adder, json!({"a": 1, "b": 1}), caller);

        assert_eq!(gateway.depth(adder), 1);
        assert_eq!(gateway.depth(caller), 0);
        assert!(gateway.top(adder).is_some());
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn invoking_a_running_machine_is_fatal() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");

        gateway.invoke(adder, json!({}), caller);
        gateway.invoke(adder, json!({}), caller);
    }

    #[test]
    fn only_top_entry_runs() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");
        gateway.call(adder, json!({}), caller);
        let first = gateway.top(caller).unwrap();

        gateway.call(adder, json!({}), caller);
        let second = gateway.top(caller).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        gateway.finish(caller);
        assert!(Arc::ptr_eq(&gateway.top(caller).unwrap(), &first));
    }

    #[test]
    fn call_at_stack_limit_succeeds() {
        let (gateway, adder) = gateway(2);
        let caller = gateway.id_of("Caller");

        for _ in 0..3 {
            gateway.call(adder, json!({}), caller);
        }

        assert_eq!(gateway.depth(caller), 3);
    }

    #[test]
    #[should_panic(expected = "stack overflow")]
    fn call_past_stack_limit_is_fatal() {
        let (gateway, adder) = gateway(2);
        let caller = gateway.id_of("Caller");

        for _ in 0..4 {
            gateway.call(adder, json!({}), caller);
        }
    }

    #[test]
    #[should_panic(expected = "invalid parameters")]
    fn malformed_parameters_are_fatal() {
        let (gateway, adder) = gateway(8);

        gateway.invoke(adder, json!({"a": "two"}), adder);
    }

    #[test]
    fn invoker_promise_is_fulfilled_after_finish() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");
        let invoker = Invoker::new(Arc::clone(&gateway), caller, caller);

        let mut promise: Promise<i64> = invoker.call("Adder", &json!({"a": 4, "b": 5}));
        promise.refresh(&gateway);
        assert!(!promise.is_fulfilled());

        run_to_completion(&gateway, caller);
        gateway.finish(caller);
        promise.refresh(&gateway);

        assert!(promise.is_fulfilled());
        assert_eq!(promise.result(), Some(&9));
        assert_eq!(gateway.depth(adder), 0);
    }

    #[test]
    fn partial_promise_sees_intermediate_result() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");
        let invoker = Invoker::new(Arc::clone(&gateway), caller, caller);

        let mut promise: PartialPromise<i64, i64> = invoker.invoke_partial("Adder", &json!({"a": 1, "b": 2}));
        {
            let fsm = gateway.top(adder).unwrap();
            let mut fsm = fsm.lock();
            fsm.next();
            fsm.next();
        }
        promise.refresh(&gateway);

        assert!(!promise.is_fulfilled());
        assert!(promise.has_partial_result());
        assert_eq!(promise.partial_result(), Some(&3));
    }

    #[test]
    #[should_panic(expected = "'Adder' is invoked but has no slot in the schedule")]
    fn invoking_an_unscheduled_machine_is_fatal() {
        let gateway = Arc::new(StackGateway::default());
        let adder = gateway.register(Arc::new(adder()));
        let caller = gateway.id_of("Caller");

        gateway.invoke(adder, json!({}), caller);
    }

    #[test]
    #[should_panic(expected = "'Adder' is invoked but has no slot in the schedule")]
    fn asynchronous_dependency_needs_a_slot() {
        let gateway = StackGateway::default();
        gateway.register(Arc::new(adder()));

        gateway.check_dependencies("Caller", &[Dependency::asynchronous("Adder")]);
    }

    #[test]
    fn synchronous_dependency_needs_no_slot() {
        let gateway = StackGateway::default();
        gateway.register(Arc::new(adder()));

        gateway.check_dependencies("Caller", &[Dependency::synchronous("Adder")]);
    }

    #[test]
    fn reset_drops_stacks_and_registrations() {
        let (gateway, adder) = gateway(8);
        let caller = gateway.id_of("Caller");
        gateway.invoke(adder, json!({}), caller);

        gateway.reset();

        assert_eq!(gateway.depth(adder), 0);
        assert!(!gateway.has_pending_calls());
        assert!(!gateway.is_registered("Adder"));
        assert!(!gateway.is_scheduled(adder));
        assert_eq!(gateway.id_of("Adder"), adder);
    }

    #[test]
    #[should_panic(expected = "no parameterised machine named 'Missing'")]
    fn calling_unknown_machine_is_fatal() {
        let (gateway, _) = gateway(8);
        let invoker = Invoker::new(Arc::clone(&gateway), 0, 0);

        let _promise: Promise<i64> = invoker.call("Missing", &());
    }

    #[test]
    #[should_panic(expected = "not part of the arrangement")]
    fn missing_dependency_is_fatal() {
        let (gateway, _) = gateway(8);

        gateway.check_dependencies("Caller", &[Dependency::synchronous("Adder"), Dependency::asynchronous("Ghost")]);
    }
}
