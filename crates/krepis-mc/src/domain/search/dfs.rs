//! Depth-first search over an [`Explorer`]
//!
//! ```text
//! loop:
//!   forward()  ── false ──► backtrack() ── false ──► done
//!   fault / deadlock      → record violation (stop if configured)
//!   expand if new state, not terminal, below the depth limit
//!   otherwise backtrack()
//! ```

use super::report::{SearchOutcome, SearchReport, SearchStats, Violation, ViolationKind};
use crate::domain::config::SearchConfig;
use crate::domain::error::{ExplorerError, ExplorerResult};
use crate::domain::vm::{Explorer, Interpreter};
use std::time::Instant;
use tracing::{debug, info};

/// Stateful depth-first search
pub struct DepthFirstSearch<I: Interpreter> {
    explorer: Explorer<I>,
    config: SearchConfig,
}

impl<I: Interpreter> DepthFirstSearch<I> {
    /// Search driven by `config`
    pub fn new(explorer: Explorer<I>, config: SearchConfig) -> Self {
        Self { explorer, config }
    }

    /// Underlying explorer
    pub fn explorer(&self) -> &Explorer<I> {
        &self.explorer
    }

    /// Modifiable explorer
    pub fn explorer_mut(&mut self) -> &mut Explorer<I> {
        &mut self.explorer
    }

    /// Take the explorer back
    pub fn into_explorer(self) -> Explorer<I> {
        self.explorer
    }

    /// Explore until exhaustion, a limit or the first violation
    ///
    /// Program faults are violations, not errors; only engine faults and
    /// invalid configuration return `Err`.
    pub fn run(&mut self) -> ExplorerResult<SearchReport> {
        self.config.validate()?;
        let program = self.explorer.interpreter().name().to_string();
        let seed = self.explorer.search_context().seed();
        info!(%program, ?seed, depth_limit = ?self.config.depth_limit, "search started");

        let started = Instant::now();
        let mut violations = Vec::new();
        let mut end_states = 0;
        let mut depth_pruned = 0;

        let outcome = loop {
            if self.explorer.search_context().is_cancelled() {
                self.explorer.abandon();
                break SearchOutcome::Cancelled;
            }
            if let Some(max) = self.config.max_states {
                if self.explorer.states().len() >= max {
                    break SearchOutcome::StateLimitReached;
                }
            }

            match self.explorer.forward() {
                Ok(true) => {}
                Ok(false) => {
                    if self.explorer.backtrack() {
                        continue;
                    }
                    break SearchOutcome::Completed;
                }
                Err(ExplorerError::Cancelled) => {
                    self.explorer.abandon();
                    break SearchOutcome::Cancelled;
                }
                Err(err) => return Err(err),
            }

            if let Some(violation) = self.check_violation() {
                debug!(depth = violation.depth, summary = %violation.summary(), "violation");
                violations.push(violation);
                if self.config.stop_on_first_error {
                    break SearchOutcome::ErrorFound;
                }
            }

            let ex = &self.explorer;
            let end = ex.is_end_state();
            if end {
                end_states += 1;
            }
            let below_limit = self.config.depth_limit.map_or(true, |d| ex.depth() < d);
            if !below_limit {
                depth_pruned += 1;
            }
            let expand = ex.is_new_state() && !end && !ex.is_deadlocked() && below_limit;
            if !expand && !self.explorer.backtrack() {
                break SearchOutcome::Completed;
            }
        };

        let report = SearchReport {
            program,
            seed,
            outcome,
            violations,
            stats: SearchStats {
                explorer: self.explorer.stats(),
                visited_states: self.explorer.states().len(),
                end_states,
                depth_pruned,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
        };
        info!(
            outcome = %report.outcome,
            states = report.stats.visited_states,
            transitions = report.stats.explorer.transitions,
            violations = report.violations.len(),
            "search finished"
        );
        Ok(report)
    }

    fn check_violation(&self) -> Option<Violation> {
        let ex = &self.explorer;
        let kind = if let Some(t) = ex.trail().last().filter(|t| t.fault.is_some()) {
            ViolationKind::UncaughtException {
                thread: t.thread,
                message: t.fault.clone().unwrap_or_default(),
            }
        } else if self.config.report_deadlocks && ex.is_deadlocked() {
            ViolationKind::Deadlock {
                info: ex.deadlock_info(),
            }
        } else {
            return None;
        };
        Some(Violation {
            kind,
            depth: ex.depth(),
            trail: ex.trail().to_vec(),
            choice_trace: ex.choice_trace(),
        })
    }
}
