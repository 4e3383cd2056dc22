//! Environment-backed variables and snapshot handling.
//!
//! Sensors, actuators, external and global variables connect a machine to
//! the outside world. They are only touched during the snapshot phases of a
//! schedule: `take_snapshot` reads every readable variable used by the
//! state about to run, `save_snapshot` writes every writable variable used
//! by the state that just ran.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a variable is connected to the outside world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Read-only input.
    Sensor,
    /// Write-only output.
    Actuator,
    /// Read/write variable shared with other processes.
    ExternalVariable,
    /// Read/write variable shared between machines of one arrangement.
    GlobalVariable,
}

impl VariableKind {
    pub fn is_readable(&self) -> bool {
        !matches!(self, VariableKind::Actuator)
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, VariableKind::Sensor)
    }
}

/// A single environment variable mapped onto a field of the machine's
/// environment snapshot `E`.
pub trait EnvironmentVariable<E>: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> VariableKind;

    /// Read the outside value into the snapshot.
    fn take(&self, environment: &mut E);

    /// Write the snapshot value to the outside.
    fn save(&self, environment: &E);
}

/// A variable backed by an in-process shared value.
///
/// Cloning the `Arc` handed to the constructor lets tests and demos observe
/// actuators and drive sensors.
///
/// # Example
///
/// ```rust
/// use llfsm::environment::{EnvironmentVariable, InMemoryVariable};
/// use parking_lot::Mutex;
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Env {
///     speed: i32,
/// }
///
/// let shared = Arc::new(Mutex::new(7));
/// let sensor = InMemoryVariable::sensor("speed", shared.clone(), |e: &Env| &e.speed, |e: &mut Env| &mut e.speed);
///
/// let mut env = Env::default();
/// sensor.take(&mut env);
/// assert_eq!(env.speed, 7);
/// ```
pub struct InMemoryVariable<E, T> {
    name: String,
    kind: VariableKind,
    value: Arc<Mutex<T>>,
    get: fn(&E) -> &T,
    get_mut: fn(&mut E) -> &mut T,
}

impl<E, T> InMemoryVariable<E, T> {
    pub fn new(
        name: impl Into<String>,
        kind: VariableKind,
        value: Arc<Mutex<T>>,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            get,
            get_mut,
        }
    }

    pub fn sensor(
        name: impl Into<String>,
        value: Arc<Mutex<T>>,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self::new(name, VariableKind::Sensor, value, get, get_mut)
    }

    pub fn actuator(
        name: impl Into<String>,
        value: Arc<Mutex<T>>,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self::new(name, VariableKind::Actuator, value, get, get_mut)
    }

    pub fn external(
        name: impl Into<String>,
        value: Arc<Mutex<T>>,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self::new(name, VariableKind::ExternalVariable, value, get, get_mut)
    }
}

impl<E, T> EnvironmentVariable<E> for InMemoryVariable<E, T>
where
    T: Clone + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> VariableKind {
        self.kind
    }

    fn take(&self, environment: &mut E) {
        *(self.get_mut)(environment) = self.value.lock().clone();
    }

    fn save(&self, environment: &E) {
        *self.value.lock() = (self.get)(environment).clone();
    }
}

/// All environment variables of one machine model, indexed by position.
pub struct EnvironmentHandlers<E> {
    variables: Vec<Box<dyn EnvironmentVariable<E>>>,
    by_name: HashMap<String, usize>,
}

impl<E> Default for EnvironmentHandlers<E> {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<E> EnvironmentHandlers<E> {
    /// Register a variable. Returns `false` if the name is already taken.
    pub fn insert(&mut self, variable: Box<dyn EnvironmentVariable<E>>) -> bool {
        if self.by_name.contains_key(variable.name()) {
            return false;
        }
        self.by_name
            .insert(variable.name().to_string(), self.variables.len());
        self.variables.push(variable);
        true
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Read every readable variable among `uses` into `environment`.
    pub fn take_snapshot(&self, uses: &[usize], environment: &mut E) {
        for variable in uses.iter().filter_map(|&i| self.variables.get(i)) {
            if variable.kind().is_readable() {
                variable.take(environment);
            }
        }
    }

    /// Write every writable variable among `uses` from `environment`.
    pub fn save_snapshot(&self, uses: &[usize], environment: &E) {
        for variable in uses.iter().filter_map(|&i| self.variables.get(i)) {
            if variable.kind().is_writable() {
                variable.save(environment);
            }
        }
    }
}

impl<E> fmt::Debug for EnvironmentHandlers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.variables.iter().map(|v| (v.name(), v.kind())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Env {
        distance: u32,
        motor: i32,
        shared: u8,
    }

    fn handlers() -> (
        EnvironmentHandlers<Env>,
        Arc<Mutex<u32>>,
        Arc<Mutex<i32>>,
        Arc<Mutex<u8>>,
    ) {
        let distance = Arc::new(Mutex::new(42));
        let motor = Arc::new(Mutex::new(0));
        let shared = Arc::new(Mutex::new(1));
        let mut handlers = EnvironmentHandlers::default();
        handlers.insert(Box::new(InMemoryVariable::sensor(
            "distance",
            distance.clone(),
            |e: &Env| &e.distance,
            |e: &mut Env| &mut e.distance,
        )));
        handlers.insert(Box::new(InMemoryVariable::actuator(
            "motor",
            motor.clone(),
            |e: &Env| &e.motor,
            |e: &mut Env| &mut e.motor,
        )));
        handlers.insert(Box::new(InMemoryVariable::external(
            "shared",
            shared.clone(),
            |e: &Env| &e.shared,
            |e: &mut Env| &mut e.shared,
        )));
        (handlers, distance, motor, shared)
    }

    #[test]
    fn take_reads_only_readable_variables() {
        let (handlers, _, motor, _) = handlers();
        *motor.lock() = 99;
        let mut env = Env::default();

        handlers.take_snapshot(&[0, 1, 2], &mut env);

        assert_eq!(env.distance, 42);
        assert_eq!(env.motor, 0);
        assert_eq!(env.shared, 1);
    }

    #[test]
    fn save_writes_only_writable_variables() {
        let (handlers, distance, motor, shared) = handlers();
        let env = Env {
            distance: 5,
            motor: -3,
            shared: 9,
        };

        handlers.save_snapshot(&[0, 1, 2], &env);

        assert_eq!(*distance.lock(), 42);
        assert_eq!(*motor.lock(), -3);
        assert_eq!(*shared.lock(), 9);
    }

    #[test]
    fn snapshots_respect_state_uses() {
        let (handlers, _, _, shared) = handlers();
        let mut env = Env::default();

        handlers.take_snapshot(&[0], &mut env);
        env.shared = 200;
        handlers.save_snapshot(&[0, 1], &env);

        assert_eq!(env.distance, 42);
        assert_eq!(*shared.lock(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (mut handlers, distance, _, _) = handlers();
        let inserted = handlers.insert(Box::new(InMemoryVariable::sensor(
            "distance",
            distance,
            |e: &Env| &e.distance,
            |e: &mut Env| &mut e.distance,
        )));

        assert!(!inserted);
        assert_eq!(handlers.len(), 3);
        assert_eq!(handlers.index_of("motor"), Some(1));
    }

    #[test]
    fn kinds_define_access() {
        assert!(VariableKind::Sensor.is_readable());
        assert!(!VariableKind::Sensor.is_writable());
        assert!(!VariableKind::Actuator.is_readable());
        assert!(VariableKind::Actuator.is_writable());
        assert!(VariableKind::GlobalVariable.is_readable());
        assert!(VariableKind::GlobalVariable.is_writable());
    }
}
