//! Backtracker: the checkpoint stack
//!
//! `forward()` pushes one checkpoint per transition; `backtrack()` pops it
//! and reinstalls every snapshot it holds. Strict LIFO: the only way to
//! reach an older state is to pop everything above it.
//!
//! # Memory Layout
//!
//! ```text
//! stack:  Vec<Checkpoint>   one entry per transition on the current path
//!         ├─ kernel        Arc pointers into the persistent kernel state
//!         ├─ system        plain-value copy of SystemState
//!         ├─ trail_len     trail length to truncate back to
//!         └─ arena_len     generator arena length to truncate back to
//! ```

use crate::domain::choice::CgArena;
use crate::domain::memento::Restorable;
use crate::domain::state::{KernelMemento, KernelState, StateId, SystemState, SystemStateMemento, Trail};
use tracing::trace;

/// Everything needed to rewind one transition
#[derive(Debug, Clone)]
pub struct Checkpoint {
    kernel: KernelMemento,
    system: SystemStateMemento,
    trail_len: usize,
    arena_len: usize,
    state_id: Option<StateId>,
}

impl Checkpoint {
    /// Capture the kernel now; `system` was captured by the caller before
    /// it materialized the next transition
    pub fn capture(
        kernel: &KernelState,
        system: SystemStateMemento,
        trail: &Trail,
        arena_len: usize,
        state_id: Option<StateId>,
    ) -> Self {
        Self {
            kernel: kernel.backtrack_memento(),
            system,
            trail_len: trail.len(),
            arena_len,
            state_id,
        }
    }

    /// State the checkpoint was taken in
    pub fn state_id(&self) -> Option<StateId> {
        self.state_id
    }
}

/// Statistics for the checkpoint stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacktrackStats {
    /// Checkpoints pushed
    pub pushed: usize,
    /// Checkpoints popped and restored
    pub restored: usize,
    /// Checkpoints dropped without restoring
    pub discarded: usize,
    /// Deepest stack seen
    pub max_depth: usize,
}

/// LIFO stack of checkpoints
#[derive(Debug, Default)]
pub struct Backtracker {
    stack: Vec<Checkpoint>,
    stats: BacktrackStats,
}

impl Backtracker {
    /// Empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Current depth (= transitions on the path)
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether nothing can be popped
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Statistics
    pub fn stats(&self) -> BacktrackStats {
        self.stats
    }

    /// Push a checkpoint
    pub fn push(&mut self, checkpoint: Checkpoint) {
        self.stack.push(checkpoint);
        self.stats.pushed += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.stack.len());
    }

    /// Pop the most recent checkpoint and reinstall it
    ///
    /// Returns the state id the checkpoint was taken in, or `None` when the
    /// stack is empty (search exhausted).
    pub fn backtrack(
        &mut self,
        kernel: &mut KernelState,
        system: &mut SystemState,
        trail: &mut Trail,
        arena: &mut CgArena,
    ) -> Option<Option<StateId>> {
        let checkpoint = self.stack.pop()?;
        kernel.restore(&checkpoint.kernel);
        system.restore(&checkpoint.system);
        trail.truncate(checkpoint.trail_len);
        arena.truncate(checkpoint.arena_len);
        self.stats.restored += 1;
        trace!(depth = self.stack.len(), "checkpoint restored");
        Some(checkpoint.state_id)
    }

    /// Drop every checkpoint without restoring anything
    pub fn discard_all(&mut self) -> usize {
        let n = self.stack.len();
        self.stack.clear();
        self.stats.discarded += n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::choice::{ChoiceGenerator, SchedulingReason};
    use crate::domain::threads::{Frame, ThreadId, ThreadState};

    struct World {
        kernel: KernelState,
        system: SystemState,
        trail: Trail,
        arena: CgArena,
    }

    fn world() -> World {
        let mut kernel = KernelState::new();
        let obj = kernel.heap.allocate("Thread", 0);
        kernel.threads.create("main", false, obj, Frame::new(0, 0));
        World {
            kernel,
            system: SystemState::new(),
            trail: Trail::new(),
            arena: CgArena::new(),
        }
    }

    fn checkpoint(w: &World) -> Checkpoint {
        Checkpoint::capture(&w.kernel, w.system.backtrack_memento(), &w.trail, w.arena.len(), Some(StateId(0)))
    }

    #[test]
    fn test_empty_stack_reports_exhaustion() {
        let mut w = world();
        let mut bt = Backtracker::new();
        assert!(bt
            .backtrack(&mut w.kernel, &mut w.system, &mut w.trail, &mut w.arena)
            .is_none());
    }

    #[test]
    fn test_round_trip_restores_everything() {
        let mut w = world();
        let mut bt = Backtracker::new();
        let before = w.kernel.fingerprint();
        bt.push(checkpoint(&w));

        w.kernel
            .thread_mut(ThreadId(0))
            .unwrap()
            .set_state(ThreadState::Running)
            .unwrap();
        w.system.set_next_choice_generator(
            &mut w.arena,
            ChoiceGenerator::threads(vec![ThreadId(0)], SchedulingReason::Root, true),
            None,
        );

        let restored = bt.backtrack(&mut w.kernel, &mut w.system, &mut w.trail, &mut w.arena);
        assert_eq!(restored, Some(Some(StateId(0))));
        assert_eq!(w.kernel.fingerprint(), before);
        assert_eq!(w.system, SystemState::new());
        assert!(w.arena.is_empty());
        assert_eq!(bt.stats().restored, 1);
    }

    #[test]
    fn test_lifo_order() {
        let mut w = world();
        let mut bt = Backtracker::new();
        bt.push(Checkpoint::capture(&w.kernel, w.system.clone(), &w.trail, 0, Some(StateId(1))));
        bt.push(Checkpoint::capture(&w.kernel, w.system.clone(), &w.trail, 0, Some(StateId(2))));
        assert_eq!(bt.depth(), 2);

        let first = bt.backtrack(&mut w.kernel, &mut w.system, &mut w.trail, &mut w.arena);
        let second = bt.backtrack(&mut w.kernel, &mut w.system, &mut w.trail, &mut w.arena);
        assert_eq!(first, Some(Some(StateId(2))));
        assert_eq!(second, Some(Some(StateId(1))));
        assert_eq!(bt.stats().max_depth, 2);
    }

    #[test]
    fn test_discard_all() {
        let w = world();
        let mut bt = Backtracker::new();
        bt.push(checkpoint(&w));
        bt.push(checkpoint(&w));
        assert_eq!(bt.discard_all(), 2);
        assert!(bt.is_empty());
        assert_eq!(bt.stats().discarded, 2);
        assert_eq!(bt.stats().restored, 0);
    }
}
