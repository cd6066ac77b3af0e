//! Explorer Configuration
//!
//! Core knobs are read once when the explorer is built; search knobs drive
//! the depth-first search around it.

use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default cut-off for a single transition
pub const DEFAULT_MAX_TRANSITION_LENGTH: usize = 5000;

/// Order in which generators offer their choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "seed", rename_all = "snake_case")]
pub enum Randomization {
    /// Natural order
    #[default]
    Disabled,
    /// Permuted with a fixed seed (reproducible)
    FixedSeed(u64),
    /// Permuted with a seed taken from the clock (logged at start)
    TimeSeed,
}

/// Settings the exploration engine itself consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Choice order policy
    pub randomization: Randomization,
    /// Instructions after which a transition is cut (`None` = unbounded)
    pub max_transition_length: Option<usize>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            randomization: Randomization::Disabled,
            max_transition_length: Some(DEFAULT_MAX_TRANSITION_LENGTH),
        }
    }
}

impl CoreConfig {
    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transition_length == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_transition_length",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Settings of the depth-first search driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of transitions on a path (`None` = unbounded)
    pub depth_limit: Option<usize>,
    /// Stop at the first property violation
    pub stop_on_first_error: bool,
    /// Report deadlocks as violations
    pub report_deadlocks: bool,
    /// Keep a storage memento for every visited state
    pub retain_visited_states: bool,
    /// Stop after this many distinct states (`None` = unbounded)
    pub max_states: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth_limit: None,
            stop_on_first_error: true,
            report_deadlocks: true,
            retain_visited_states: false,
            max_states: None,
        }
    }
}

impl SearchConfig {
    /// Reject values the search cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "depth_limit",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_states == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_states",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Core and search settings together
///
/// # Example
///
/// ```rust
/// use krepis_mc::domain::config::{ExplorerConfig, Randomization};
///
/// let config = ExplorerConfig::default()
///     .with_seed(42)
///     .with_depth_limit(100);
///
/// assert_eq!(config.core.randomization, Randomization::FixedSeed(42));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Engine settings
    pub core: CoreConfig,
    /// Search settings
    pub search: SearchConfig,
}

impl ExplorerConfig {
    /// Permute choices with a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.core.randomization = Randomization::FixedSeed(seed);
        self
    }

    /// Choice order policy
    pub fn with_randomization(mut self, randomization: Randomization) -> Self {
        self.core.randomization = randomization;
        self
    }

    /// Cut transitions after `n` instructions
    pub fn with_max_transition_length(mut self, n: Option<usize>) -> Self {
        self.core.max_transition_length = n;
        self
    }

    /// Bound path length
    pub fn with_depth_limit(mut self, depth: usize) -> Self {
        self.search.depth_limit = Some(depth);
        self
    }

    /// Bound the number of distinct states
    pub fn with_max_states(mut self, n: usize) -> Self {
        self.search.max_states = Some(n);
        self
    }

    /// Keep exploring after a violation
    pub fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.search.stop_on_first_error = stop;
        self
    }

    /// Report deadlocks as violations
    pub fn with_report_deadlocks(mut self, report: bool) -> Self {
        self.search.report_deadlocks = report;
        self
    }

    /// Keep storage mementos of visited states
    pub fn with_retained_states(mut self, retain: bool) -> Self {
        self.search.retain_visited_states = retain;
        self
    }

    /// Validate both parts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core.validate()?;
        self.search.validate()
    }
}
