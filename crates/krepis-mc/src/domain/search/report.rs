//! Search results

use crate::domain::state::{ChoiceTrace, Transition};
use crate::domain::threads::{DeadlockInfo, ThreadId};
use crate::domain::vm::ExplorerStats;
use serde::Serialize;
use std::fmt;

/// Why a search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Every reachable state was explored
    Completed,
    /// Stopped at the first violation
    ErrorFound,
    /// `max_states` distinct states were visited
    StateLimitReached,
    /// Cancelled through the token
    Cancelled,
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::ErrorFound => "error found",
            Self::StateLimitReached => "state limit reached",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What went wrong on a path
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// The program raised an exception nobody caught
    UncaughtException {
        /// Faulting thread
        thread: ThreadId,
        /// Exception text
        message: String,
    },
    /// No thread can make progress
    Deadlock {
        /// Wait-for diagnosis
        info: DeadlockInfo,
    },
}

/// A violation with the path that leads to it
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// What happened
    #[serde(flatten)]
    pub kind: ViolationKind,
    /// Path length
    pub depth: usize,
    /// Transitions from the initial state
    pub trail: Vec<Transition>,
    /// Raw choices for replay
    pub choice_trace: ChoiceTrace,
}

impl Violation {
    /// Short description
    pub fn summary(&self) -> String {
        match &self.kind {
            ViolationKind::UncaughtException { message, .. } => message.clone(),
            ViolationKind::Deadlock { info } => {
                let stuck: Vec<String> = info.stuck.iter().map(|s| s.thread.to_string()).collect();
                format!("deadlock ({} cycles, stuck: {})", info.cycles.len(), stuck.join(", "))
            }
        }
    }
}

/// Counters of a finished search
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SearchStats {
    /// Engine counters
    #[serde(flatten)]
    pub explorer: ExplorerStats,
    /// Distinct states in the (possibly shared) state table
    pub visited_states: usize,
    /// Paths that ended normally or with a fault
    pub end_states: usize,
    /// Paths cut by the depth limit
    pub depth_pruned: usize,
    /// Wall-clock time in milliseconds
    pub elapsed_ms: u64,
}

/// Result of one search
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Program name
    pub program: String,
    /// Randomization seed, if any
    pub seed: Option<u64>,
    /// Why the search stopped
    pub outcome: SearchOutcome,
    /// Violations found
    pub violations: Vec<Violation>,
    /// Counters
    pub stats: SearchStats,
}

impl SearchReport {
    /// Whether any violation was found
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// First violation found
    pub fn first_violation(&self) -> Option<&Violation> {
        self.violations.first()
    }

    /// Whether a deadlock was found
    pub fn found_deadlock(&self) -> bool {
        self.violations
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::Deadlock { .. }))
    }
}

impl fmt::Display for SearchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program:      {}", self.program)?;
        if let Some(seed) = self.seed {
            writeln!(f, "seed:         {seed}")?;
        }
        writeln!(f, "outcome:      {}", self.outcome)?;
        writeln!(f, "states:       {}", self.stats.visited_states)?;
        writeln!(f, "transitions:  {}", self.stats.explorer.transitions)?;
        writeln!(f, "end states:   {}", self.stats.end_states)?;
        writeln!(f, "max depth:    {}", self.stats.explorer.max_depth)?;
        writeln!(f, "elapsed:      {} ms", self.stats.elapsed_ms)?;
        for (i, v) in self.violations.iter().enumerate() {
            writeln!(f, "violation #{}: {} (depth {})", i + 1, v.summary(), v.depth)?;
            for (n, t) in v.trail.iter().enumerate() {
                let choices: Vec<String> = t
                    .choices
                    .iter()
                    .map(|c| format!("{}={}", c.id, c.value))
                    .collect();
                write!(f, "  #{n:<3} {} [{}] {} steps", t.thread, choices.join(" "), t.step_count())?;
                if !t.output.is_empty() {
                    write!(f, " out={:?}", t.output)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
