//! Scheduler configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SchedError, SchedResult};
use crate::registry;

pub const DEFAULT_MAX_MEMORY: u64 = 1000;

fn default_max_memory() -> u64 {
    DEFAULT_MAX_MEMORY
}

fn default_registry_capacity() -> usize {
    registry::DEFAULT_CAPACITY
}

fn default_name() -> String {
    "scheduler".to_string()
}

/// Scheduler parameters.
///
/// Can be built in code or read from a YAML file:
///
/// ```yaml
/// base_quantum: 20
/// num_levels: 4
/// vary_quanta: true
/// chain_weighting: false
/// max_memory: 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time slice (in time units) given at the base priority level.
    pub base_quantum: u64,
    /// Number of priority levels, must not exceed `base_quantum`.
    pub num_levels: usize,
    /// Give shorter slices to higher priority levels.
    #[serde(default)]
    pub vary_quanta: bool,
    /// Multiply the slice by the length of the dependency chain gated by the job.
    #[serde(default)]
    pub chain_weighting: bool,
    /// Total memory available to running jobs (default: 1000).
    #[serde(default = "default_max_memory")]
    pub max_memory: u64,
    /// Initial capacity of the job registry (default: 16).
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
    /// Name used as log target.
    #[serde(default = "default_name")]
    pub name: String,
    /// Whether to record the trace log (default: false).
    #[serde(default)]
    pub trace: bool,
}

impl SchedulerConfig {
    pub fn new(base_quantum: u64, num_levels: usize) -> Self {
        Self {
            base_quantum,
            num_levels,
            vary_quanta: false,
            chain_weighting: false,
            max_memory: DEFAULT_MAX_MEMORY,
            registry_capacity: registry::DEFAULT_CAPACITY,
            name: default_name(),
            trace: false,
        }
    }

    pub fn with_vary_quanta(mut self, enabled: bool) -> Self {
        self.vary_quanta = enabled;
        self
    }

    pub fn with_chain_weighting(mut self, enabled: bool) -> Self {
        self.chain_weighting = enabled;
        self
    }

    pub fn with_max_memory(mut self, max_memory: u64) -> Self {
        self.max_memory = max_memory;
        self
    }

    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Reads config from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SchedResult<Self> {
        let config: SchedulerConfig = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SchedResult<()> {
        if self.base_quantum == 0 {
            return Err(SchedError::InvalidArgument("base quantum must be positive".to_string()));
        }
        if self.num_levels == 0 {
            return Err(SchedError::InvalidArgument("number of priority levels must be positive".to_string()));
        }
        if self.num_levels as u64 > self.base_quantum {
            return Err(SchedError::InvalidArgument(format!(
                "number of priority levels ({}) exceeds base quantum ({})",
                self.num_levels, self.base_quantum
            )));
        }
        if self.max_memory == 0 {
            return Err(SchedError::InvalidArgument("max memory must be positive".to_string()));
        }
        if self.registry_capacity == 0 {
            return Err(SchedError::InvalidArgument("registry capacity must be positive".to_string()));
        }
        Ok(())
    }

    /// Time slice granted at the given level before chain weighting is applied.
    ///
    /// With varying quanta the slice shrinks linearly towards the highest level.
    pub fn quantum(&self, priority: usize) -> u64 {
        if self.vary_quanta {
            self.base_quantum - (self.base_quantum / self.num_levels as u64) * priority as u64
        } else {
            self.base_quantum
        }
    }
}
