//! Explorer: the forward/backtrack driver
//!
//! # Algorithm
//!
//! ```text
//! forward():
//!   snapshot SystemState
//!   initialize_next_transition()      ── false ──► restore snapshot, Ok(false)
//!   push checkpoint (kernel, snapshot, trail len, arena len)
//!   run scheduled thread until break_transition()
//!   fingerprint → StateSet → is_new_state
//!   append Transition to the trail
//!
//! backtrack():
//!   pop checkpoint ── empty ──► false (exhausted)
//!   restore kernel + SystemState, truncate trail and arena
//! ```
//!
//! The SystemState snapshot is taken *before* the pending generator chain
//! is advanced, so restoring it puts the chain back in `next_cg` while the
//! generators themselves (kept in the arena) remember how far they got.
//! The next `forward()` from there takes the next combination.

use super::context::ExecutionContext;
use super::interpreter::Interpreter;
use crate::domain::choice::{CgArena, ChoiceGenerator, ChoiceValue, SchedulingReason};
use crate::domain::config::CoreConfig;
use crate::domain::error::{ExplorerError, ExplorerResult, InternalError};
use crate::domain::memento::{BacktrackStats, Backtracker, Checkpoint, Restorable};
use crate::domain::search::{SearchContext, StateSet};
use crate::domain::state::{
    ChoiceRecord, ChoiceTrace, KernelMemento, KernelState, StateId, Step, SystemState, SystemStateMemento,
    Trail, Transition,
};
use crate::domain::threads::{diagnose, DeadlockInfo, Scheduler, ThreadId, ThreadState};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters of one explorer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExplorerStats {
    /// Transitions executed
    pub transitions: usize,
    /// Instructions executed
    pub steps: usize,
    /// Transitions that reached a state not seen before
    pub new_states: usize,
    /// Transitions that reached a known state
    pub revisited_states: usize,
    /// Transitions whose state was ignored
    pub ignored_states: usize,
    /// Successful backtracks
    pub backtracks: usize,
    /// Longest path
    pub max_depth: usize,
}

/// Result of replaying a choice trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    /// Transitions replayed
    pub transitions: usize,
    /// Fingerprint of the state reached
    pub fingerprint: u64,
    /// Whether the reached state is an end state
    pub end_state: bool,
    /// Whether the reached state is a deadlock
    pub deadlocked: bool,
    /// Fault that ended the replayed path
    pub fault: Option<String>,
}

#[derive(Debug)]
struct InitialSnapshot {
    kernel: KernelMemento,
    system: SystemStateMemento,
    arena: CgArena,
    state_id: StateId,
}

/// Exploration engine over one program
///
/// Single-threaded; several explorers may share one [`StateSet`].
pub struct Explorer<I: Interpreter> {
    interpreter: I,
    config: CoreConfig,
    search: SearchContext,
    kernel: KernelState,
    system: SystemState,
    arena: CgArena,
    trail: Trail,
    backtracker: Backtracker,
    states: Arc<StateSet>,
    retain_states: bool,
    initial: InitialSnapshot,
    state_id: Option<StateId>,
    is_new_state: bool,
    stats: ExplorerStats,
}

impl<I: Interpreter> Explorer<I> {
    /// Build the initial state and register the root decision
    pub fn new(
        mut interpreter: I,
        config: CoreConfig,
        search: SearchContext,
        states: Arc<StateSet>,
        retain_states: bool,
    ) -> ExplorerResult<Self> {
        config.validate()?;

        let mut kernel = KernelState::new();
        let main = interpreter.initialize(&mut kernel)?;
        kernel.thread_mut(main)?.set_state(ThreadState::Running)?;

        let mut system = SystemState::new();
        let mut arena = CgArena::new();
        let root = Scheduler::root_point(main);
        system.set_mandatory_next_choice_generator(&mut arena, root.generator, None)?;

        let fingerprint = fingerprint_of(&kernel, &system, &arena)?;
        let (state_id, _) = if retain_states {
            states.add_retained(fingerprint, || kernel.storage_memento())
        } else {
            states.add(fingerprint)
        };
        debug!(program = interpreter.name(), %main, state = %state_id, "explorer initialized");

        let initial = InitialSnapshot {
            kernel: kernel.storage_memento(),
            system: system.storage_memento(),
            arena: arena.clone(),
            state_id,
        };

        Ok(Self {
            interpreter,
            config,
            search,
            kernel,
            system,
            arena,
            trail: Trail::new(),
            backtracker: Backtracker::new(),
            states,
            retain_states,
            initial,
            state_id: Some(state_id),
            is_new_state: true,
            stats: ExplorerStats::default(),
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Driver Operations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Execute the next unexplored transition from the current state
    ///
    /// Returns `Ok(false)` when every choice of the pending decision has
    /// been explored (or nothing is pending); the state is left untouched.
    pub fn forward(&mut self) -> ExplorerResult<bool> {
        if self.search.is_cancelled() {
            return Err(ExplorerError::Cancelled);
        }
        self.run_transition(|system, arena| system.initialize_next_transition(arena))
    }

    /// Return to the state before the most recent transition
    ///
    /// Returns `false` once the checkpoint stack is empty.
    pub fn backtrack(&mut self) -> bool {
        match self
            .backtracker
            .backtrack(&mut self.kernel, &mut self.system, &mut self.trail, &mut self.arena)
        {
            Some(state_id) => {
                self.state_id = state_id;
                self.is_new_state = false;
                self.stats.backtracks += 1;
                debug!(depth = self.depth(), state = ?state_id, "backtracked");
                true
            }
            None => false,
        }
    }

    /// Whether the last transition reached a state not seen before
    pub fn is_new_state(&self) -> bool {
        self.is_new_state
    }

    /// Whether the current path is over: the program faulted or every
    /// non-daemon thread terminated
    pub fn is_end_state(&self) -> bool {
        self.last_fault().is_some() || self.kernel.threads.all_non_daemon_terminated()
    }

    /// Live threads remain but none can run and nothing is pending
    pub fn is_deadlocked(&self) -> bool {
        !self.is_end_state()
            && self.system.next_cg().is_none()
            && self.kernel.threads.has_alive()
            && self.kernel.runnable_threads().is_empty()
    }

    /// Wait-for cycles and stuck threads of the current state
    pub fn deadlock_info(&self) -> DeadlockInfo {
        diagnose(&self.kernel)
    }

    /// Fault recorded by the most recent transition
    pub fn last_fault(&self) -> Option<&str> {
        self.trail.last().and_then(|t| t.fault.as_deref())
    }

    /// Rewind to the initial state, dropping all checkpoints unrestored
    pub fn reset(&mut self) {
        self.backtracker.discard_all();
        self.kernel.restore(&self.initial.kernel);
        self.system.restore(&self.initial.system);
        self.arena = self.initial.arena.clone();
        self.trail = Trail::new();
        self.state_id = Some(self.initial.state_id);
        self.is_new_state = true;
    }

    /// Stop the current search; a later search starts from scratch
    pub fn abandon(&mut self) {
        let dropped = self.backtracker.depth();
        self.reset();
        debug!(dropped, "search abandoned");
    }

    /// Re-execute a recorded choice trace from the initial state
    ///
    /// Each entry holds the raw indices of one transition's generator
    /// chain, outermost first.
    pub fn replay(&mut self, trace: &[Vec<usize>]) -> ExplorerResult<ReplayOutcome> {
        self.reset();
        for (i, indices) in trace.iter().enumerate() {
            let replayed = self.run_transition(|system, arena| system.initialize_replay(arena, indices))?;
            if !replayed {
                return Err(InternalError::ReplayDivergence {
                    transition: i,
                    reason: format!("no pending decision matches indices {indices:?}"),
                }
                .into());
            }
        }
        Ok(ReplayOutcome {
            transitions: trace.len(),
            fingerprint: self.fingerprint()?,
            end_state: self.is_end_state(),
            deadlocked: self.is_deadlocked(),
            fault: self.last_fault().map(str::to_string),
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Transitions on the current path
    pub fn depth(&self) -> usize {
        self.backtracker.depth()
    }

    /// Current state id (`None` after an ignored transition)
    pub fn state_id(&self) -> Option<StateId> {
        self.state_id
    }

    /// Decision of the innermost current generator
    pub fn current_choice(&self) -> ExplorerResult<ChoiceValue> {
        Ok(self.system.current_choice(&self.arena)?)
    }

    /// Path from the initial state
    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    /// Replayable form of the current path
    pub fn choice_trace(&self) -> ChoiceTrace {
        self.trail.choice_trace()
    }

    /// Fingerprint of the current state
    pub fn fingerprint(&self) -> ExplorerResult<u64> {
        Ok(fingerprint_of(&self.kernel, &self.system, &self.arena)?)
    }

    /// Kernel contents
    pub fn kernel(&self) -> &KernelState {
        &self.kernel
    }

    /// Per-transition bookkeeping
    pub fn system(&self) -> &SystemState {
        &self.system
    }

    /// Generator arena
    pub fn arena(&self) -> &CgArena {
        &self.arena
    }

    /// Visited-state table
    pub fn states(&self) -> &Arc<StateSet> {
        &self.states
    }

    /// Session context (seed, cancellation)
    pub fn search_context(&self) -> &SearchContext {
        &self.search
    }

    /// Engine configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Program under test
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Counters
    pub fn stats(&self) -> ExplorerStats {
        self.stats
    }

    /// Checkpoint stack counters
    pub fn backtrack_stats(&self) -> BacktrackStats {
        self.backtracker.stats()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Transition Execution
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn run_transition<F>(&mut self, initialize: F) -> ExplorerResult<bool>
    where
        F: FnOnce(&mut SystemState, &mut CgArena) -> Result<bool, InternalError>,
    {
        let snapshot = self.system.backtrack_memento();
        if !initialize(&mut self.system, &mut self.arena)? {
            self.system.restore(&snapshot);
            return Ok(false);
        }
        self.backtracker.push(Checkpoint::capture(
            &self.kernel,
            snapshot,
            &self.trail,
            self.arena.len(),
            self.state_id,
        ));

        let mut transition = self.execute_transition()?;
        self.match_state()?;
        transition.state_id = self.state_id;

        self.stats.transitions += 1;
        self.stats.steps += transition.step_count();
        self.stats.max_depth = self.stats.max_depth.max(self.depth());
        debug!(
            thread = %transition.thread,
            steps = transition.step_count(),
            depth = self.depth(),
            state = ?self.state_id,
            new = self.is_new_state,
            "transition executed"
        );
        self.trail.push(transition);
        Ok(true)
    }

    fn execute_transition(&mut self) -> ExplorerResult<Transition> {
        let selecting = self.system.current_chain(&self.arena)?.len();
        let thread = self.system.scheduled_thread(&self.arena)?;

        let mut steps = Vec::new();
        let mut output = String::new();
        let mut fault = None;
        // a cut transition resumes at an instruction that never ran, so
        // its scheduling point must not be skipped
        let mut first_step = match self.system.cur_cg() {
            Some(cur) => !self.arena.get(cur)?.is_break(),
            None => true,
        };

        while self.kernel.is_thread_runnable(thread) {
            if let Some(max) = self.config.max_transition_length {
                if steps.len() >= max {
                    trace!(%thread, max, "transition cut at maximum length");
                    let cut = ChoiceGenerator::break_point(thread, SchedulingReason::MaxTransitionLength)
                        .with_creator(thread);
                    self.system.set_break_generator(&mut self.arena, cut, self.state_id);
                    break;
                }
            }

            let pc = self.kernel.thread(thread)?.pc()?;
            let result = {
                let mut ctx = ExecutionContext::new(
                    &mut self.kernel,
                    &mut self.system,
                    &mut self.arena,
                    &mut self.search,
                    &mut output,
                    self.state_id,
                    thread,
                    first_step,
                );
                self.interpreter.execute_one_instruction(&mut ctx)
            };
            steps.push(Step { thread, pc });

            match result {
                Ok(Some(next)) => self.kernel.thread_mut(thread)?.top_frame_mut()?.pc = next,
                Ok(None) => {
                    self.terminate(thread)?;
                    break;
                }
                Err(err) if err.is_program_fault() => {
                    debug!(%thread, pc, error = %err, "program fault");
                    fault = Some(err.to_string());
                    break;
                }
                Err(err) => return Err(err),
            }

            first_step = false;
            if self.system.break_transition() {
                break;
            }
        }

        if self.system.is_gc_needed() {
            let released = self.kernel.threads.release_terminated();
            trace!(?released, "terminated threads released");
            self.system.clear_gc_needed();
        }

        let chain = self.system.current_chain(&self.arena)?;
        let mut records = chain
            .iter()
            .map(|h| self.arena.get(*h).and_then(ChoiceRecord::capture))
            .collect::<Result<Vec<_>, _>>()?;
        let folded = records.split_off(selecting.min(records.len()));

        Ok(Transition {
            thread,
            choices: records,
            folded,
            steps,
            output,
            fault,
            state_id: None,
        })
    }

    fn terminate(&mut self, thread: ThreadId) -> ExplorerResult<()> {
        let point = Scheduler::new(&mut self.kernel).terminate(thread)?;
        if let Some(point) = point {
            let mut generator = point.generator;
            self.search.randomize(&mut generator);
            self.system
                .set_mandatory_next_choice_generator(&mut self.arena, generator, self.state_id)?;
        }
        self.system.set_gc_needed();
        trace!(%thread, "thread terminated");
        Ok(())
    }

    fn match_state(&mut self) -> ExplorerResult<()> {
        if self.system.is_ignored() {
            self.state_id = None;
            self.is_new_state = false;
            self.stats.ignored_states += 1;
            return Ok(());
        }
        let fingerprint = self.fingerprint()?;
        let (id, is_new) = if self.retain_states {
            let kernel = &self.kernel;
            self.states.add_retained(fingerprint, || kernel.storage_memento())
        } else {
            self.states.add(fingerprint)
        };
        self.state_id = Some(id);
        self.is_new_state = is_new || self.system.is_forced();
        if is_new {
            self.stats.new_states += 1;
        } else {
            self.stats.revisited_states += 1;
        }
        Ok(())
    }
}

fn fingerprint_of(kernel: &KernelState, system: &SystemState, arena: &CgArena) -> Result<u64, InternalError> {
    let mut hasher = DefaultHasher::new();
    kernel.hash(&mut hasher);
    system.hash_pending(arena, &mut hasher)?;
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::heap::ObjRef;
    use crate::domain::threads::Frame;

    /// Two threads, each incrementing a shared counter after a yield
    struct Counter {
        shared: ObjRef,
    }

    impl Interpreter for Counter {
        fn initialize(&mut self, kernel: &mut KernelState) -> Result<ThreadId, ExplorerError> {
            self.shared = kernel.heap.allocate("Counter", 1);
            let main_obj = kernel.heap.allocate("Thread", 0);
            let main = kernel.threads.create("main", false, main_obj, Frame::new(0, 0));
            let worker_obj = kernel.heap.allocate("Thread", 0);
            kernel.threads.create("worker", false, worker_obj, Frame::new(10, 0));
            Ok(main)
        }

        fn execute_one_instruction(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Option<usize>, ExplorerError> {
            let pc = ctx.frame()?.pc;
            match pc {
                0 => {
                    ctx.start_thread(ThreadId(1))?;
                    Ok(Some(10))
                }
                10 => Ok(Some(ctx.shared_access(self.shared)?.next_pc(pc))),
                11 => {
                    let v = ctx.heap().field(self.shared, 0)?;
                    ctx.heap_mut().set_field(self.shared, 0, v + 1)?;
                    Ok(Some(12))
                }
                _ => Ok(None),
            }
        }
    }

    fn explorer() -> Explorer<Counter> {
        Explorer::new(
            Counter { shared: ObjRef(0) },
            CoreConfig::default(),
            SearchContext::default(),
            Arc::new(StateSet::new()),
            false,
        )
        .unwrap()
    }

    fn count_paths(ex: &mut Explorer<Counter>) -> usize {
        let mut ends = 0;
        loop {
            if ex.forward().unwrap() {
                if ex.is_end_state() {
                    ends += 1;
                    assert!(ex.backtrack());
                }
            } else if !ex.backtrack() {
                return ends;
            }
        }
    }

    #[test]
    fn test_forward_then_backtrack_restores_fingerprint() {
        let mut ex = explorer();
        let before = ex.fingerprint().unwrap();
        assert!(ex.forward().unwrap());
        assert_eq!(ex.depth(), 1);
        assert_eq!(ex.trail().len(), 1);
        assert!(ex.backtrack());
        assert_eq!(ex.fingerprint().unwrap(), before);
        assert!(ex.trail().is_empty());
    }

    #[test]
    fn test_root_is_exhausted_after_one_transition() {
        let mut ex = explorer();
        assert!(ex.forward().unwrap());
        assert!(ex.backtrack());
        assert!(!ex.forward().unwrap());
        assert!(!ex.backtrack());
    }

    #[test]
    fn test_search_reaches_end_states() {
        let mut ex = explorer();
        assert!(count_paths(&mut ex) >= 2);
        assert!(!ex.backtrack());
    }

    #[test]
    fn test_replay_reproduces_final_state() {
        let mut ex = explorer();
        while ex.forward().unwrap() && !ex.is_end_state() {}
        assert!(ex.is_end_state());
        let fingerprint = ex.fingerprint().unwrap();
        let trace = ex.choice_trace();

        let outcome = ex.replay(&trace).unwrap();
        assert_eq!(outcome.fingerprint, fingerprint);
        assert!(outcome.end_state);
        assert_eq!(outcome.transitions, trace.len());
    }

    #[test]
    fn test_replay_rejects_foreign_trace() {
        let mut ex = explorer();
        let err = ex.replay(&[vec![0], vec![0, 0, 0]]).unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Internal(InternalError::ReplayDivergence { transition: 1, .. })
        ));
    }

    #[test]
    fn test_abandon_allows_fresh_search() {
        let mut ex = explorer();
        let initial = ex.fingerprint().unwrap();
        ex.forward().unwrap();
        ex.forward().unwrap();
        ex.abandon();
        assert_eq!(ex.depth(), 0);
        assert_eq!(ex.fingerprint().unwrap(), initial);
        assert_eq!(ex.backtrack_stats().discarded, 2);
        assert!(ex.forward().unwrap());
    }

    #[test]
    fn test_cancelled_forward() {
        let mut ex = explorer();
        ex.search_context().cancel_token().cancel();
        assert!(matches!(ex.forward(), Err(ExplorerError::Cancelled)));
    }

    #[test]
    fn test_max_transition_length_cuts_transition() {
        let mut ex = Explorer::new(
            Counter { shared: ObjRef(0) },
            CoreConfig {
                max_transition_length: Some(1),
                ..CoreConfig::default()
            },
            SearchContext::default(),
            Arc::new(StateSet::new()),
            false,
        )
        .unwrap();
        assert!(ex.forward().unwrap());
        assert!(ex.forward().unwrap());
        assert_eq!(ex.trail().last().unwrap().step_count(), 1);
        let next = ex.arena().get(ex.system().next_cg().unwrap()).unwrap();
        assert_eq!(next.scheduling_reason(), Some(SchedulingReason::MaxTransitionLength));
        assert!(ex.forward().unwrap());
        assert_eq!(ex.trail().last().unwrap().thread, ThreadId(0));
    }
}
