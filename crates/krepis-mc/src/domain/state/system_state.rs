//! SystemState: per-transition bookkeeping
//!
//! Owns the current and pending choice generators, the atomic-section
//! counter and the per-transition hint flags.
//!
//! # Registration Rules
//!
//! ```text
//! registered cg              pending next_cg?   result
//! ─────────────────────────  ────────────────   ─────────────────────────────
//! step ignored               any                rejected
//! scheduling, atomic > 0     any                rejected (suppressed)
//! 1 choice, not scheduling   no                 folded into cur_cg chain
//! otherwise                  no                 next_cg, prev = cur_cg
//! otherwise                  yes                next_cg, cascaded on pending
//! ```
//!
//! Folding ignores the atomic level: a folded generator is not a
//! scheduling point, so it cannot interleave anything.

use super::StateId;
use crate::domain::choice::{CgArena, CgHandle, ChoiceGenerator, ChoiceValue};
use crate::domain::error::InternalError;
use crate::domain::memento::Restorable;
use crate::domain::threads::ThreadId;
use std::hash::Hasher;
use tracing::{debug, trace, warn};

/// Outcome of registering a non-mandatory generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Pending for the next transition; the current one must end
    Pending(CgHandle),
    /// Single choice folded into the running transition
    Folded(CgHandle),
    /// Not registered (ignored step or suppressed by an atomic section)
    Rejected,
}

impl Registration {
    /// Whether the generator was stored in either way
    pub fn is_registered(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Per-transition engine state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemState {
    cur_cg: Option<CgHandle>,
    next_cg: Option<CgHandle>,
    atomic_level: u32,
    is_ignored: bool,
    is_forced: bool,
    is_interesting: bool,
    is_boring: bool,
    retain_hints: bool,
    gc_needed: bool,
    break_requested: bool,
}

/// Snapshot of a [`SystemState`] (all fields are plain values)
pub type SystemStateMemento = SystemState;

impl SystemState {
    /// State before the first transition
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator(s) deciding the running transition
    pub fn cur_cg(&self) -> Option<CgHandle> {
        self.cur_cg
    }

    /// Generator(s) registered for the next transition
    pub fn next_cg(&self) -> Option<CgHandle> {
        self.next_cg
    }

    /// Nesting depth of atomic sections
    pub fn atomic_level(&self) -> u32 {
        self.atomic_level
    }

    /// Inside at least one atomic section
    pub fn is_atomic(&self) -> bool {
        self.atomic_level > 0
    }

    /// Step marked as not worth exploring further
    pub fn is_ignored(&self) -> bool {
        self.is_ignored
    }

    /// Resulting state must be treated as new
    pub fn is_forced(&self) -> bool {
        self.is_forced
    }

    /// Search hint: prefer this state
    pub fn is_interesting(&self) -> bool {
        self.is_interesting
    }

    /// Search hint: deprioritize this state
    pub fn is_boring(&self) -> bool {
        self.is_boring
    }

    /// Terminated threads should be released after this transition
    pub fn is_gc_needed(&self) -> bool {
        self.gc_needed
    }

    /// Whether the running transition has to end after the current step
    pub fn break_transition(&self) -> bool {
        self.break_requested || self.is_ignored
    }

    /// Mark the step as ignored; ends the transition
    pub fn set_ignored(&mut self, ignored: bool) {
        self.is_ignored = ignored;
    }

    /// Force the resulting state to count as new
    pub fn set_forced(&mut self, forced: bool) {
        self.is_forced = forced;
    }

    /// Search hint
    pub fn set_interesting(&mut self, interesting: bool) {
        self.is_interesting = interesting;
    }

    /// Search hint
    pub fn set_boring(&mut self, boring: bool) {
        self.is_boring = boring;
    }

    /// Keep the hint flags across the next transition start
    pub fn retain_hints(&mut self, retain: bool) {
        self.retain_hints = retain;
    }

    /// Request release of terminated threads
    pub fn set_gc_needed(&mut self) {
        self.gc_needed = true;
    }

    pub(crate) fn clear_gc_needed(&mut self) {
        self.gc_needed = false;
    }

    /// Enter an atomic section
    pub fn enter_atomic(&mut self) {
        self.atomic_level += 1;
    }

    /// Leave an atomic section
    pub fn exit_atomic(&mut self) -> Result<(), InternalError> {
        self.atomic_level = self
            .atomic_level
            .checked_sub(1)
            .ok_or_else(|| InternalError::Other("unbalanced atomic section exit".into()))?;
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Registration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    /// Register a pending decision (or fold a trivial one)
    pub fn set_next_choice_generator(
        &mut self,
        arena: &mut CgArena,
        cg: ChoiceGenerator,
        state_id: Option<StateId>,
    ) -> Registration {
        if self.is_ignored {
            trace!(id = cg.id(), "choice generator rejected: step ignored");
            return Registration::Rejected;
        }
        if self.is_atomic() && cg.is_scheduling_point() {
            trace!(id = cg.id(), level = self.atomic_level, "scheduling point suppressed by atomic section");
            return Registration::Rejected;
        }
        if self.next_cg.is_none()
            && cg.total_number_of_choices() == 1
            && !cg.is_scheduling_point()
        {
            return Registration::Folded(self.fold(arena, cg, state_id));
        }
        Registration::Pending(self.link_next(arena, cg, state_id))
    }

    /// Register a decision the engine cannot proceed without
    ///
    /// A mandatory generator inside an atomic section ends that section;
    /// rejection because the step is ignored is a consistency fault.
    pub fn set_mandatory_next_choice_generator(
        &mut self,
        arena: &mut CgArena,
        cg: ChoiceGenerator,
        state_id: Option<StateId>,
    ) -> Result<CgHandle, InternalError> {
        if self.is_ignored {
            return Err(InternalError::MandatoryRejected(cg.id().to_string()));
        }
        if self.is_atomic() {
            warn!(
                id = cg.id(),
                level = self.atomic_level,
                "atomic section broken by blocking operation"
            );
            self.atomic_level = 0;
        }
        Ok(self.link_next(arena, cg, state_id))
    }

    /// Register a boundary marker regardless of atomic sections
    pub fn set_break_generator(
        &mut self,
        arena: &mut CgArena,
        cg: ChoiceGenerator,
        state_id: Option<StateId>,
    ) -> CgHandle {
        self.link_next(arena, cg, state_id)
    }

    fn link_next(&mut self, arena: &mut CgArena, mut cg: ChoiceGenerator, state_id: Option<StateId>) -> CgHandle {
        match self.next_cg {
            Some(pending) => cg.set_prev(Some(pending), true),
            None => cg.set_prev(self.cur_cg, false),
        }
        cg.set_state_id(state_id);
        trace!(id = cg.id(), choices = cg.total_number_of_choices(), "choice generator registered");
        let handle = arena.insert(cg);
        self.next_cg = Some(handle);
        self.break_requested = true;
        handle
    }

    fn fold(&mut self, arena: &mut CgArena, mut cg: ChoiceGenerator, state_id: Option<StateId>) -> CgHandle {
        cg.set_prev(self.cur_cg, self.cur_cg.is_some());
        cg.set_state_id(state_id);
        cg.advance();
        trace!(id = cg.id(), "single-choice generator folded into transition");
        let handle = arena.insert(cg);
        self.cur_cg = Some(handle);
        handle
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Transition Boundaries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Materialize `next_cg -> cur_cg` and advance the odometer
    ///
    /// Returns `false` if nothing is pending or every combination of the
    /// pending chain has been explored. On `false` the caller restores
    /// its snapshot of this state.
    pub fn initialize_next_transition(&mut self, arena: &mut CgArena) -> Result<bool, InternalError> {
        let Some(next) = self.next_cg else {
            return Ok(false);
        };
        let chain = arena.chain(next)?;
        if !advance_chain(arena, &chain)? {
            trace!(cg = %next, "choice generator chain exhausted");
            return Ok(false);
        }
        self.begin_transition(next);
        debug!(cg = %next, id = arena.get(next)?.id(), "transition initialized");
        Ok(true)
    }

    /// Materialize `next_cg -> cur_cg` selecting recorded raw indices
    pub fn initialize_replay(
        &mut self,
        arena: &mut CgArena,
        indices: &[usize],
    ) -> Result<bool, InternalError> {
        let Some(next) = self.next_cg else {
            return Ok(false);
        };
        let chain = arena.chain(next)?;
        if chain.len() != indices.len() {
            return Ok(false);
        }
        for (handle, &raw) in chain.iter().zip(indices) {
            arena.get_mut(*handle)?.select(raw)?;
        }
        self.begin_transition(next);
        Ok(true)
    }

    fn begin_transition(&mut self, next: CgHandle) {
        self.cur_cg = Some(next);
        self.next_cg = None;
        self.break_requested = false;
        if self.retain_hints {
            self.retain_hints = false;
        } else {
            self.is_ignored = false;
            self.is_forced = false;
            self.is_interesting = false;
            self.is_boring = false;
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Current generator chain, outermost first
    pub fn current_chain(&self, arena: &CgArena) -> Result<Vec<CgHandle>, InternalError> {
        let cur = self.cur_cg.ok_or(InternalError::NoCurrentGenerator)?;
        arena.chain(cur)
    }

    /// Choice of the innermost current generator
    pub fn current_choice(&self, arena: &CgArena) -> Result<ChoiceValue, InternalError> {
        let cur = self.cur_cg.ok_or(InternalError::NoCurrentGenerator)?;
        arena.get(cur)?.current_choice()
    }

    /// Thread that executes the current transition
    ///
    /// The innermost scheduling choice decides; without one, the thread
    /// that registered the innermost generator continues.
    pub fn scheduled_thread(&self, arena: &CgArena) -> Result<ThreadId, InternalError> {
        let chain = self.current_chain(arena)?;
        for handle in chain.iter().rev() {
            let cg = arena.get(*handle)?;
            if cg.is_scheduling_point() {
                return cg.current_thread();
            }
        }
        let innermost = chain.last().ok_or(InternalError::NoCurrentGenerator)?;
        let cg = arena.get(*innermost)?;
        cg.creator()
            .ok_or_else(|| InternalError::Other(format!("generator '{}' has no creator thread", cg.id())))
    }

    /// Feed the pending decision points into a state hash
    pub fn hash_pending<H: Hasher>(&self, arena: &CgArena, hasher: &mut H) -> Result<(), InternalError> {
        hasher.write_u32(self.atomic_level);
        if let Some(next) = self.next_cg {
            for handle in arena.chain(next)? {
                let cg = arena.get(handle)?;
                hasher.write(cg.id().as_bytes());
                hasher.write_usize(cg.total_number_of_choices());
                for t in cg.thread_candidates() {
                    hasher.write_usize(t.as_usize());
                }
            }
        }
        Ok(())
    }
}

/// Odometer step over a cascaded chain (innermost wheel fastest)
fn advance_chain(arena: &mut CgArena, chain: &[CgHandle]) -> Result<bool, InternalError> {
    let fresh = match chain.first() {
        Some(h) => !arena.get(*h)?.is_started(),
        None => return Ok(false),
    };
    if fresh {
        for handle in chain {
            if !arena.get_mut(*handle)?.advance() {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    for i in (0..chain.len()).rev() {
        if !arena.get_mut(chain[i])?.advance() {
            continue;
        }
        let mut carried = true;
        for inner in &chain[i + 1..] {
            let cg = arena.get_mut(*inner)?;
            cg.reset();
            if !cg.advance() {
                // an empty inner wheel never yields a combination
                carried = false;
                break;
            }
        }
        if carried {
            return Ok(true);
        }
    }
    Ok(false)
}

impl Restorable for SystemState {
    type Memento = SystemStateMemento;

    fn backtrack_memento(&self) -> Self::Memento {
        self.clone()
    }

    fn storage_memento(&self) -> Self::Memento {
        self.clone()
    }

    fn restore(&mut self, memento: &Self::Memento) {
        *self = memento.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::choice::SchedulingReason;

    fn threads(n: usize) -> ChoiceGenerator {
        ChoiceGenerator::threads((0..n).map(ThreadId).collect(), SchedulingReason::Yield, true)
    }

    #[test]
    fn test_no_pending_means_no_transition() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        assert!(!ss.initialize_next_transition(&mut arena).unwrap());
    }

    #[test]
    fn test_cascade_enumerates_like_odometer() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.set_next_choice_generator(&mut arena, ChoiceGenerator::int_interval("A", 0, 1, 1), None);
        ss.set_next_choice_generator(&mut arena, ChoiceGenerator::int_interval("B", 0, 2, 1), None);

        let snapshot = ss.backtrack_memento();
        let mut seen = Vec::new();
        while ss.initialize_next_transition(&mut arena).unwrap() {
            let chain = ss.current_chain(&arena).unwrap();
            let a = arena.get(chain[0]).unwrap().current_choice().unwrap().as_int().unwrap();
            let b = arena.get(chain[1]).unwrap().current_choice().unwrap().as_int().unwrap();
            seen.push((a, b));
            ss.restore(&snapshot);
        }
        assert_eq!(seen, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_empty_inner_generator_exhausts_chain() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.set_next_choice_generator(&mut arena, ChoiceGenerator::int_interval("A", 0, 1, 1), None);
        ss.set_next_choice_generator(&mut arena, ChoiceGenerator::int_interval("B", 1, 0, 1), None);

        let snapshot = ss.backtrack_memento();
        for _ in 0..3 {
            assert!(!ss.initialize_next_transition(&mut arena).unwrap());
            ss.restore(&snapshot);
        }
        assert!(ss.cur_cg().is_none());
    }

    #[test]
    fn test_single_data_choice_is_folded() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.set_next_choice_generator(&mut arena, threads(1), None);
        assert!(ss.initialize_next_transition(&mut arena).unwrap());

        let reg = ss.set_next_choice_generator(&mut arena, ChoiceGenerator::int_set("x", vec![4]), None);
        assert!(matches!(reg, Registration::Folded(_)));
        assert!(!ss.break_transition());
        assert_eq!(ss.current_choice(&arena).unwrap(), ChoiceValue::Int(4));
        assert_eq!(ss.current_chain(&arena).unwrap().len(), 2);
    }

    #[test]
    fn test_single_scheduling_choice_is_not_folded() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        let reg = ss.set_next_choice_generator(&mut arena, threads(1), None);
        assert!(matches!(reg, Registration::Pending(_)));
        assert!(ss.break_transition());
    }

    #[test]
    fn test_atomic_suppresses_scheduling_only() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.enter_atomic();

        assert_eq!(ss.set_next_choice_generator(&mut arena, threads(2), None), Registration::Rejected);
        assert!(ss.set_next_choice_generator(&mut arena, ChoiceGenerator::boolean("b"), None).is_registered());
        assert!(ss.set_next_choice_generator(&mut arena, ChoiceGenerator::int_set("x", vec![1]), None).is_registered());
    }

    #[test]
    fn test_mandatory_breaks_atomic() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.enter_atomic();
        ss.enter_atomic();
        ss.set_mandatory_next_choice_generator(&mut arena, threads(2), None).unwrap();
        assert_eq!(ss.atomic_level(), 0);
        assert!(ss.next_cg().is_some());
    }

    #[test]
    fn test_mandatory_rejected_when_ignored() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.set_ignored(true);
        assert!(matches!(
            ss.set_mandatory_next_choice_generator(&mut arena, threads(2), None),
            Err(InternalError::MandatoryRejected(_))
        ));
        assert_eq!(ss.set_next_choice_generator(&mut arena, threads(2), None), Registration::Rejected);
        assert!(ss.break_transition());
    }

    #[test]
    fn test_flags_cleared_unless_retained() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.set_next_choice_generator(&mut arena, threads(2), None);
        ss.set_interesting(true);
        ss.retain_hints(true);
        assert!(ss.initialize_next_transition(&mut arena).unwrap());
        assert!(ss.is_interesting());

        ss.set_next_choice_generator(&mut arena, threads(2), None);
        assert!(ss.initialize_next_transition(&mut arena).unwrap());
        assert!(!ss.is_interesting());
    }

    #[test]
    fn test_scheduled_thread_falls_back_to_creator() {
        let mut ss = SystemState::new();
        let mut arena = CgArena::new();
        ss.set_next_choice_generator(
            &mut arena,
            ChoiceGenerator::boolean("b").with_creator(ThreadId(3)),
            None,
        );
        assert!(ss.initialize_next_transition(&mut arena).unwrap());
        assert_eq!(ss.scheduled_thread(&arena).unwrap(), ThreadId(3));
    }

    #[test]
    fn test_unbalanced_atomic_exit() {
        let mut ss = SystemState::new();
        assert!(ss.exit_atomic().is_err());
    }
}
