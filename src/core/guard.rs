//! Guard predicates for controlling state transitions.
//!
//! Guards are pure boolean functions over the context of the current
//! ringlet. They label the transitions of a logic-labelled finite state
//! machine: a transition is taken when its guard evaluates to `true`.

use std::fmt;

/// Pure predicate that determines if a transition can be taken.
///
/// Guards are evaluated once per ringlet, in declaration order, against the
/// machine's context. They must not mutate anything; the context is handed
/// to them by shared reference.
///
/// # Example
///
/// ```rust
/// use llfsm::core::Guard;
///
/// let positive = Guard::new(|value: &i32| *value > 0);
///
/// assert!(positive.check(&3));
/// assert!(!positive.check(&-1));
/// assert!(Guard::always().check(&0));
/// ```
pub struct Guard<C: ?Sized> {
    predicate: Box<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C: ?Sized> Guard<C> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// A guard that is always satisfied.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// A guard that is never satisfied.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// Evaluate the guard against a context.
    pub fn check(&self, context: &C) -> bool {
        (self.predicate)(context)
    }
}

impl<C: ?Sized> fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sensors {
        distance: u32,
        obstacle: bool,
    }

    #[test]
    fn guard_allows_matching_contexts() {
        let guard = Guard::new(|s: &Sensors| s.obstacle);

        assert!(guard.check(&Sensors {
            distance: 0,
            obstacle: true
        }));
        assert!(!guard.check(&Sensors {
            distance: 0,
            obstacle: false
        }));
    }

    #[test]
    fn guard_is_deterministic() {
        let sensors = Sensors {
            distance: 12,
            obstacle: false,
        };
        let guard = Guard::new(|s: &Sensors| s.distance > 10);

        assert_eq!(guard.check(&sensors), guard.check(&sensors));
    }

    #[test]
    fn constant_guards() {
        let sensors = Sensors {
            distance: 1,
            obstacle: true,
        };

        assert!(Guard::<Sensors>::always().check(&sensors));
        assert!(!Guard::<Sensors>::never().check(&sensors));
    }

    #[test]
    fn guard_can_use_complex_predicates() {
        let guard = Guard::new(|s: &Sensors| s.obstacle && s.distance < 5);

        assert!(guard.check(&Sensors {
            distance: 2,
            obstacle: true
        }));
        assert!(!guard.check(&Sensors {
            distance: 7,
            obstacle: true
        }));
    }
}
