//! Swarm runner: several seeded searches in parallel
//!
//! Every worker runs its own [`DepthFirstSearch`] on an OS thread with a
//! different randomization seed. All workers share one [`StateSet`], so a
//! state explored by one worker is pruned by the others. The first worker
//! that finds a violation cancels the rest when the search is configured
//! to stop at the first error.

use crate::domain::config::ExplorerConfig;
use crate::domain::error::{ExplorerError, ExplorerResult};
use crate::domain::search::{CancelToken, SearchReport, StateSet};
use crate::domain::vm::Interpreter;
use crate::domain::ExplorerBuilder;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

/// Result of a swarm run
#[derive(Debug, Clone, Serialize)]
pub struct SwarmReport {
    /// Per-worker reports, in worker order
    pub reports: Vec<SearchReport>,
    /// Distinct states visited by all workers together
    pub visited_states: usize,
}

impl SwarmReport {
    /// Whether any worker found a violation
    pub fn has_violations(&self) -> bool {
        self.reports.iter().any(SearchReport::has_violations)
    }

    /// First report (by worker index) with a violation
    pub fn first_violation(&self) -> Option<&SearchReport> {
        self.reports.iter().find(|r| r.has_violations())
    }
}

/// Parallel seeded searches over one program
#[derive(Debug, Clone)]
pub struct Swarm {
    config: ExplorerConfig,
    workers: usize,
    base_seed: u64,
    cancel: CancelToken,
}

impl Swarm {
    /// `workers` searches seeded `base_seed, base_seed + 1, ...`
    pub fn new(config: ExplorerConfig, workers: usize, base_seed: u64) -> Self {
        Self {
            config,
            workers: workers.max(1),
            base_seed,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops every worker
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all workers to completion
    ///
    /// `factory` builds one interpreter per worker. The first engine fault
    /// of any worker is returned after all workers stopped.
    pub fn run<I, F>(&self, factory: F) -> ExplorerResult<SwarmReport>
    where
        I: Interpreter,
        F: Fn() -> I + Sync,
    {
        self.config.validate()?;
        let states = Arc::new(StateSet::new());
        let results: Mutex<Vec<(usize, ExplorerResult<SearchReport>)>> = Mutex::new(Vec::with_capacity(self.workers));
        info!(workers = self.workers, base_seed = self.base_seed, "swarm started");

        thread::scope(|scope| {
            for worker in 0..self.workers {
                let states = Arc::clone(&states);
                let cancel = self.cancel.clone();
                let results = &results;
                let factory = &factory;
                let seed = self.base_seed.wrapping_add(worker as u64);
                let builder = ExplorerBuilder::new()
                    .config(self.config.clone())
                    .seed(seed)
                    .shared_states(states)
                    .cancel_token(cancel.clone());
                let stop_on_error = self.config.search.stop_on_first_error;

                scope.spawn(move || {
                    let outcome = builder.run(factory());
                    match &outcome {
                        Ok(report) if report.has_violations() && stop_on_error => cancel.cancel(),
                        Ok(_) => {}
                        Err(err) => {
                            warn!(worker, error = %err, "swarm worker failed");
                            cancel.cancel();
                        }
                    }
                    results.lock().push((worker, outcome));
                });
            }
        });

        let mut results = results.into_inner();
        results.sort_by_key(|(worker, _)| *worker);
        let mut reports = Vec::with_capacity(results.len());
        let mut failure: Option<ExplorerError> = None;
        for (_, outcome) in results {
            match outcome {
                Ok(report) => reports.push(report),
                Err(err) if failure.is_none() => failure = Some(err),
                Err(_) => {}
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let report = SwarmReport {
            reports,
            visited_states: states.len(),
        };
        info!(
            visited_states = report.visited_states,
            violations = report.has_violations(),
            "swarm finished"
        );
        Ok(report)
    }
}
