//! Explored state: kernel contents, per-transition bookkeeping, trail

pub mod kernel;
pub mod system_state;
pub mod transition;

pub use kernel::{KernelMemento, KernelState};
pub use system_state::{Registration, SystemState, SystemStateMemento};
pub use transition::{ChoiceRecord, ChoiceTrace, Step, Trail, Transition};

use serde::Serialize;
use std::fmt;

/// Identifier of a distinct visited state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StateId(pub usize);

impl StateId {
    /// Create a new state identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}
