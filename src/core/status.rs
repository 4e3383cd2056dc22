//! Lifecycle status of a running machine instance.
//!
//! Exactly one `RunStatus` exists per running machine. It is the sole
//! driver of which callbacks the ringlet fires. Requests made through
//! `suspend`/`resume`/`restart` only move the status into one of the
//! one-shot `Suspending`, `Resuming` or `Restarting` values; the run data
//! resolves those after the ringlet completes.

use serde::{Deserialize, Serialize};

/// Logical state that a single finite state machine may exist in.
///
/// `transitioned` is true iff the previous ringlet changed the current
/// state, including the pseudo-transitions caused by suspending, resuming
/// and restarting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Normal operation: not suspended and not finished.
    Executing { transitioned: bool },

    /// A suspension was requested and will be applied after this ringlet.
    Suspending,

    /// The machine sits in its suspend state.
    Suspended { transitioned: bool },

    /// A resume was requested and will be applied after this ringlet.
    Resuming,

    /// The machine has just returned to the state it was suspended in.
    Resumed { transitioned: bool },

    /// A restart was requested and will be applied after this ringlet.
    Restarting,

    /// The machine has just moved back to its initial state.
    Restarted { transitioned: bool },

    /// The machine is in an accepting state and has executed it at least
    /// once. Terminal.
    Finished,
}

impl RunStatus {
    /// Status of a freshly created machine instance.
    pub const INITIAL: RunStatus = RunStatus::Executing { transitioned: true };

    /// Every possible status, including both values of `transitioned`.
    pub fn all() -> [RunStatus; 12] {
        [
            RunStatus::Executing {
                transitioned: false,
            },
            RunStatus::Executing { transitioned: true },
            RunStatus::Finished,
            RunStatus::Restarted {
                transitioned: false,
            },
            RunStatus::Restarted { transitioned: true },
            RunStatus::Restarting,
            RunStatus::Resumed {
                transitioned: false,
            },
            RunStatus::Resumed { transitioned: true },
            RunStatus::Resuming,
            RunStatus::Suspended {
                transitioned: false,
            },
            RunStatus::Suspended { transitioned: true },
            RunStatus::Suspending,
        ]
    }

    /// Whether the last ringlet changed the current state.
    ///
    /// Always false for the one-shot request values and for `Finished`.
    pub fn transitioned(&self) -> bool {
        match *self {
            RunStatus::Executing { transitioned }
            | RunStatus::Suspended { transitioned }
            | RunStatus::Resumed { transitioned }
            | RunStatus::Restarted { transitioned } => transitioned,
            RunStatus::Suspending
            | RunStatus::Resuming
            | RunStatus::Restarting
            | RunStatus::Finished => false,
        }
    }

    /// Whether this is one of the pending request values that must be
    /// resolved once the current ringlet completes.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RunStatus::Suspending | RunStatus::Resuming | RunStatus::Restarting
        )
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, RunStatus::Suspended { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Finished)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Executing { .. } => "executing",
            RunStatus::Suspending => "suspending",
            RunStatus::Suspended { .. } => "suspended",
            RunStatus::Resuming => "resuming",
            RunStatus::Resumed { .. } => "resumed",
            RunStatus::Restarting => "restarting",
            RunStatus::Restarted { .. } => "restarted",
            RunStatus::Finished => "finished",
        }
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::INITIAL
    }
}
