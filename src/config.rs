//! Runtime configuration.
//!
//! Configuration is read once, when a [`Runtime`](crate::runtime::Runtime)
//! is constructed.

use crate::gateway::DEFAULT_STACK_LIMIT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Which scheduler executes the arrangement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Single-threaded, cooperative, one ringlet per slot per cycle.
    #[default]
    RoundRobin,
    /// One thread per group, each slot started at a fixed offset into the
    /// cycle.
    TimeTriggered,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("stack_limit must be at least 1")]
    ZeroStackLimit,
}

/// Settings consumed by [`Runtime::new`](crate::runtime::Runtime::new).
///
/// # Example
///
/// ```rust
/// use llfsm::config::{RuntimeConfig, SchedulerKind};
///
/// let config = RuntimeConfig::from_json_str(r#"{"scheduler": "time_triggered", "stack_limit": 64}"#).unwrap();
///
/// assert_eq!(config.scheduler, SchedulerKind::TimeTriggered);
/// assert_eq!(config.stack_limit, 64);
/// assert_eq!(config.jitter_margin_us, 100);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerKind,
    /// Maximum depth of a caller's stack before a call is fatal.
    pub stack_limit: usize,
    /// Delay between computing a time-triggered cycle start and the cycle
    /// start itself.
    pub jitter_margin_us: u64,
    /// Time-triggered waits spin for the last part of each wait.
    pub spin_threshold_us: u64,
    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::default(),
            stack_limit: DEFAULT_STACK_LIMIT,
            jitter_margin_us: 100,
            spin_threshold_us: 200,
            max_cycles: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_limit == 0 {
            return Err(ConfigError::ZeroStackLimit);
        }
        Ok(())
    }

    pub fn jitter_margin(&self) -> Duration {
        Duration::from_micros(self.jitter_margin_us)
    }

    pub fn spin_threshold(&self) -> Duration {
        Duration::from_micros(self.spin_threshold_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RuntimeConfig::default();

        assert_eq!(config.scheduler, SchedulerKind::RoundRobin);
        assert_eq!(config.stack_limit, 8192);
        assert_eq!(config.jitter_margin(), Duration::from_micros(100));
        assert_eq!(config.spin_threshold(), Duration::from_micros(200));
        assert_eq!(config.max_cycles, None);
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();

        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{"scheduler": "fastest"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{"stack_limit": 0}"#),
            Err(ConfigError::ZeroStackLimit)
        ));
    }
}
