//! Descriptions of callable sub-machines.

use serde::{Deserialize, Serialize};

/// Stable machine id assigned by the gateway, starting at 0.
pub type FsmId = usize;

/// Whether the caller waits for the callee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMethod {
    /// The callee runs in the caller's slot until it finishes.
    Synchronous,
    /// The callee runs in its own slot while the caller continues.
    Asynchronous,
}

/// A parameterised machine that another machine calls or invokes.
///
/// # Example
///
/// ```rust
/// use llfsm::gateway::{CallMethod, Dependency};
///
/// let sum = Dependency::synchronous("Sum")
///     .parameter("a", "i64")
///     .parameter("b", "i64");
///
/// assert_eq!(sum.call_method, CallMethod::Synchronous);
/// assert_eq!(sum.parameter_names().collect::<Vec<_>>(), ["a", "b"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Parameter names and type names, in declaration order.
    pub parameters: Vec<(String, String)>,
    pub call_method: CallMethod,
}

impl Dependency {
    pub fn new(name: impl Into<String>, call_method: CallMethod) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            call_method,
        }
    }

    pub fn synchronous(name: impl Into<String>) -> Self {
        Self::new(name, CallMethod::Synchronous)
    }

    pub fn asynchronous(name: impl Into<String>) -> Self {
        Self::new(name, CallMethod::Asynchronous)
    }

    /// Declare a parameter. Declaring a name again replaces its type but
    /// keeps its position.
    pub fn parameter(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let (name, type_name) = (name.into(), type_name.into());
        match self.parameters.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = type_name,
            None => self.parameters.push((name, type_name)),
        }
        self
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|(name, _)| name.as_str())
    }

    pub fn parameter_type(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, type_name)| type_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_keep_declaration_order() {
        let dependency = Dependency::asynchronous("Motor")
            .parameter("speed", "f64")
            .parameter("direction", "i8")
            .parameter("acceleration", "f64");

        assert_eq!(
            dependency.parameter_names().collect::<Vec<_>>(),
            ["speed", "direction", "acceleration"]
        );
    }

    #[test]
    fn redeclared_parameter_keeps_its_position() {
        let dependency = Dependency::synchronous("Sum")
            .parameter("b", "i32")
            .parameter("a", "i64")
            .parameter("b", "i64");

        assert_eq!(dependency.parameter_names().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(dependency.parameter_type("b"), Some("i64"));
        assert_eq!(dependency.parameter_type("c"), None);
    }
}
