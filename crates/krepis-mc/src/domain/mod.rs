//! Domain Layer - The Exploration Engine
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Choice Module                 State Module                 │
//! │  ├─ ChoiceGenerator            ├─ KernelState               │
//! │  ├─ CgArena (handles)          ├─ SystemState               │
//! │  └─ ChoiceValue                └─ Transition / Trail        │
//! │                                                             │
//! │  Threads Module                Memento Module               │
//! │  ├─ ThreadInfo / ThreadList    ├─ Restorable                │
//! │  ├─ Scheduler (state machine)  └─ Backtracker               │
//! │  └─ WaitForGraph                                            │
//! │                                                             │
//! │  VM Module                     Search Module                │
//! │  ├─ Explorer (forward/back)    ├─ StateSet                  │
//! │  ├─ ExecutionContext           ├─ SearchContext             │
//! │  └─ Interpreter (boundary)     └─ DepthFirstSearch          │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows top-down while exploring (explorer → system state →
//! generators → thread state machine) and bottom-up while backtracking
//! (the backtracker reinstalls kernel and system mementos).

pub mod choice;
pub mod config;
pub mod error;
pub mod heap;
pub mod memento;
pub mod search;
pub mod state;
pub mod threads;
pub mod vm;

pub use choice::{CgArena, CgHandle, ChoiceGenerator, ChoiceKind, ChoiceValue, SchedulingReason};
pub use config::{CoreConfig, ExplorerConfig, Randomization, SearchConfig};
pub use error::{ConfigError, ExplorerError, ExplorerResult, InternalError};
pub use heap::{Heap, Monitor, ObjRef};
pub use memento::{Backtracker, Restorable};
pub use search::{CancelToken, DepthFirstSearch, SearchContext, SearchOutcome, SearchReport, StateSet};
pub use state::{KernelState, Registration, StateId, SystemState, Trail, Transition};
pub use threads::{Frame, Scheduler, ThreadId, ThreadInfo, ThreadState};
pub use vm::{Continuation, ExecutionContext, Explorer, Interpreter};

use std::sync::Arc;

/// Factory for explorers and searches
///
/// Collects the configuration, an optional shared state table and an
/// optional cancellation token, then assembles the pieces.
///
/// ```rust
/// use krepis_mc::adapters::script::scenarios;
/// use krepis_mc::domain::ExplorerBuilder;
///
/// let program = scenarios::by_name("racy-counter").unwrap();
/// let report = ExplorerBuilder::new()
///     .seed(7)
///     .depth_limit(200)
///     .run(program)
///     .unwrap();
/// assert!(report.has_violations());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExplorerBuilder {
    config: ExplorerConfig,
    states: Option<Arc<StateSet>>,
    cancel: Option<CancelToken>,
}

impl ExplorerBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete configuration
    pub fn config(mut self, config: ExplorerConfig) -> Self {
        self.config = config;
        self
    }

    /// Randomize choice order with a fixed seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config = self.config.with_seed(seed);
        self
    }

    /// Choice order policy
    pub fn randomization(mut self, randomization: Randomization) -> Self {
        self.config = self.config.with_randomization(randomization);
        self
    }

    /// Cut transitions after `n` instructions
    pub fn max_transition_length(mut self, n: Option<usize>) -> Self {
        self.config = self.config.with_max_transition_length(n);
        self
    }

    /// Stop expanding below this depth
    pub fn depth_limit(mut self, depth: usize) -> Self {
        self.config = self.config.with_depth_limit(depth);
        self
    }

    /// Stop after this many distinct states
    pub fn max_states(mut self, n: usize) -> Self {
        self.config = self.config.with_max_states(n);
        self
    }

    /// Keep searching after a violation
    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.config = self.config.with_stop_on_first_error(stop);
        self
    }

    /// Share a visited-state table with other explorers
    pub fn shared_states(mut self, states: Arc<StateSet>) -> Self {
        self.states = Some(states);
        self
    }

    /// Observe an external cancellation token
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configuration collected so far
    pub fn explorer_config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Assemble an explorer for `interpreter`
    pub fn build<I: Interpreter>(self, interpreter: I) -> ExplorerResult<Explorer<I>> {
        self.config.validate()?;
        let search = SearchContext::with_cancel_token(
            self.config.core.randomization,
            self.cancel.unwrap_or_default(),
        );
        Explorer::new(
            interpreter,
            self.config.core.clone(),
            search,
            self.states.unwrap_or_default(),
            self.config.search.retain_visited_states,
        )
    }

    /// Assemble a depth-first search for `interpreter`
    pub fn build_search<I: Interpreter>(self, interpreter: I) -> ExplorerResult<DepthFirstSearch<I>> {
        let search = self.config.search.clone();
        Ok(DepthFirstSearch::new(self.build(interpreter)?, search))
    }

    /// Build and run a depth-first search
    pub fn run<I: Interpreter>(self, interpreter: I) -> ExplorerResult<SearchReport> {
        self.build_search(interpreter)?.run()
    }
}
