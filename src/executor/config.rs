//! Engine configuration
//!
//! Passed explicitly to the planner and the execution context; there is no
//! process-wide mutable state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Evaluation order of the branches of a parallel step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParallelStrategy {
    /// Drain branch 1, then branch 2, ...
    #[default]
    Sequential,
    /// Take one row from each live branch in turn
    Interleaved,
}

impl ParallelStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParallelStrategy::Sequential => "sequential",
            ParallelStrategy::Interleaved => "interleaved",
        }
    }
}

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cap on rows held in memory by one sort, distinct or aggregation
    #[serde(default = "default_max_heap_elements")]
    pub max_heap_elements_per_operation: usize,

    /// Deadline for statements that carry no timeout of their own
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    #[serde(default)]
    pub parallel_strategy: ParallelStrategy,

    /// Whether `FROM index:<name>` is allowed
    #[serde(default = "default_true")]
    pub allow_manual_index_target: bool,

    /// Record per-step row counts and timings
    #[serde(default)]
    pub profiling: bool,

    /// Filters whose disjunctive normal form exceeds this many branches are
    /// evaluated by a full scan
    #[serde(default = "default_max_dnf_branches")]
    pub max_dnf_branches: usize,
}

fn default_max_heap_elements() -> usize {
    500_000
}

fn default_true() -> bool {
    true
}

fn default_max_dnf_branches() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_heap_elements_per_operation: default_max_heap_elements(),
            default_timeout_ms: None,
            parallel_strategy: ParallelStrategy::default(),
            allow_manual_index_target: true,
            profiling: false,
            max_dnf_branches: default_max_dnf_branches(),
        }
    }
}

impl EngineConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// Checks value ranges; returns a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.max_heap_elements_per_operation == 0 {
            return Err("max_heap_elements_per_operation must be greater than 0".into());
        }
        if self.max_dnf_branches == 0 {
            return Err("max_dnf_branches must be greater than 0".into());
        }
        if self.default_timeout_ms == Some(0) {
            return Err("default_timeout_ms must be greater than 0 when set".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_heap_elements_per_operation, 500_000);
        assert_eq!(config.default_timeout(), None);
        assert_eq!(config.parallel_strategy, ParallelStrategy::Sequential);
        assert!(config.allow_manual_index_target);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_timeout_ms": 250, "parallel_strategy": "interleaved"}"#)
                .unwrap();
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.parallel_strategy, ParallelStrategy::Interleaved);
        assert_eq!(config.max_dnf_branches, 64);
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = EngineConfig {
            max_heap_elements_per_operation: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
