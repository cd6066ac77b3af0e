//! Choice Generators
//!
//! A generator enumerates the outcomes of one nondeterministic decision.
//! The enumeration is deterministic: after [`ChoiceGenerator::reset`] the
//! same sequence comes out again, which is what makes backtracking by
//! re-execution work.
//!
//! # Kinds
//!
//! ```text
//! IntInterval  min..=max step delta
//! IntSet       explicit integers
//! Bool         false, true
//! DoubleSet    explicit doubles
//! References   explicit object references (null allowed)
//! Threads      runnable candidates (scheduling) or notify waiters
//! Break        one choice, forces a transition boundary
//! ```

use super::types::{CgHandle, ChoiceValue, SchedulingReason};
use crate::domain::error::InternalError;
use crate::domain::heap::ObjRef;
use crate::domain::state::StateId;
use crate::domain::threads::ThreadId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Uniform view over the closed set of choice kinds
pub trait ChoiceEnumeration {
    /// Total number of values
    fn count(&self) -> usize;

    /// Value at raw (unpermuted) index
    fn value_at(&self, index: usize) -> Option<ChoiceValue>;

    /// Short kind name for diagnostics
    fn kind_name(&self) -> &'static str;
}

/// What a generator enumerates
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceKind {
    /// `min, min + delta, ...` up to and including `max`
    IntInterval {
        /// First value
        min: i64,
        /// Bound (inclusive)
        max: i64,
        /// Step, may be negative for descending intervals
        delta: i64,
    },
    /// Explicit integers
    IntSet(Vec<i64>),
    /// `false` then `true`
    Bool,
    /// Explicit doubles
    DoubleSet(Vec<f64>),
    /// Explicit references
    References(Vec<Option<ObjRef>>),
    /// Thread candidates in stable order
    Threads {
        /// Candidates
        candidates: Vec<ThreadId>,
        /// Why the decision exists
        reason: SchedulingReason,
        /// Whether this decides which thread runs next
        scheduling: bool,
    },
    /// Single-choice boundary marker for `thread`
    Break {
        /// Thread that continues after the boundary
        thread: ThreadId,
        /// Why the boundary exists
        reason: SchedulingReason,
    },
}

impl ChoiceEnumeration for ChoiceKind {
    fn count(&self) -> usize {
        match self {
            Self::IntInterval { min, max, delta } => interval_len(*min, *max, *delta),
            Self::IntSet(values) => values.len(),
            Self::Bool => 2,
            Self::DoubleSet(values) => values.len(),
            Self::References(values) => values.len(),
            Self::Threads { candidates, .. } => candidates.len(),
            Self::Break { .. } => 1,
        }
    }

    fn value_at(&self, index: usize) -> Option<ChoiceValue> {
        if index >= self.count() {
            return None;
        }
        Some(match self {
            Self::IntInterval { min, delta, .. } => {
                let offset = delta.checked_mul(i64::try_from(index).ok()?)?;
                ChoiceValue::Int(min.checked_add(offset)?)
            }
            Self::IntSet(values) => ChoiceValue::Int(values[index]),
            Self::Bool => ChoiceValue::Bool(index == 1),
            Self::DoubleSet(values) => ChoiceValue::Double(values[index]),
            Self::References(values) => ChoiceValue::Reference(values[index]),
            Self::Threads { candidates, .. } => ChoiceValue::Thread(candidates[index]),
            Self::Break { thread, .. } => ChoiceValue::Thread(*thread),
        })
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::IntInterval { .. } => "int interval",
            Self::IntSet(_) => "int set",
            Self::Bool => "boolean",
            Self::DoubleSet(_) => "double set",
            Self::References(_) => "reference",
            Self::Threads { .. } => "thread",
            Self::Break { .. } => "break",
        }
    }
}

fn interval_len(min: i64, max: i64, delta: i64) -> usize {
    let (min, max, delta) = (i128::from(min), i128::from(max), i128::from(delta));
    let span = match delta {
        d if d > 0 && max >= min => (max - min) / d,
        d if d < 0 && min >= max => (min - max) / -d,
        _ => return 0,
    };
    usize::try_from(span + 1).unwrap_or(usize::MAX)
}

/// One nondeterministic decision point
///
/// # Lifecycle
///
/// ```text
/// created ──advance()──► choice 0 ──advance()──► ... ──► choice N-1
///    ▲                                                      │
///    └──────────────────────── reset() ◄────────────────────┘
/// ```
///
/// The current choice is undefined until the first `advance()`.
#[derive(Debug, Clone)]
pub struct ChoiceGenerator {
    id: Arc<str>,
    id_ref: Option<ObjRef>,
    kind: ChoiceKind,
    creator: Option<ThreadId>,
    order: Option<Vec<usize>>,
    cursor: Option<usize>,
    prev: Option<CgHandle>,
    is_cascaded: bool,
    is_done: bool,
    attr: Option<Arc<str>>,
    state_id: Option<StateId>,
}

impl ChoiceGenerator {
    /// Generator over an arbitrary kind
    pub fn new(id: &str, kind: ChoiceKind) -> Self {
        Self {
            id: Arc::from(id),
            id_ref: None,
            kind,
            creator: None,
            order: None,
            cursor: None,
            prev: None,
            is_cascaded: false,
            is_done: false,
            attr: None,
            state_id: None,
        }
    }

    /// Integers `min..=max` stepping by `delta`
    pub fn int_interval(id: &str, min: i64, max: i64, delta: i64) -> Self {
        Self::new(id, ChoiceKind::IntInterval { min, max, delta })
    }

    /// Explicit integers
    pub fn int_set(id: &str, values: Vec<i64>) -> Self {
        Self::new(id, ChoiceKind::IntSet(values))
    }

    /// `false`, `true`
    pub fn boolean(id: &str) -> Self {
        Self::new(id, ChoiceKind::Bool)
    }

    /// Explicit doubles
    pub fn double_set(id: &str, values: Vec<f64>) -> Self {
        Self::new(id, ChoiceKind::DoubleSet(values))
    }

    /// Explicit references
    pub fn references(id: &str, values: Vec<Option<ObjRef>>) -> Self {
        Self::new(id, ChoiceKind::References(values))
    }

    /// Thread choice; `scheduling` marks it as deciding who runs next
    pub fn threads(candidates: Vec<ThreadId>, reason: SchedulingReason, scheduling: bool) -> Self {
        Self::new(
            reason.id(),
            ChoiceKind::Threads {
                candidates,
                reason,
                scheduling,
            },
        )
    }

    /// Single-choice generator that only forces a boundary
    pub fn break_point(thread: ThreadId, reason: SchedulingReason) -> Self {
        Self::new(reason.id(), ChoiceKind::Break { thread, reason }).with_creator(thread)
    }

    /// Attach the object the decision concerns
    pub fn with_ref(mut self, obj: ObjRef) -> Self {
        self.id_ref = Some(obj);
        self
    }

    /// Record the thread that registered the generator
    pub fn with_creator(mut self, thread: ThreadId) -> Self {
        self.creator = Some(thread);
        self
    }

    /// Attach free-form metadata
    pub fn with_attr(mut self, attr: &str) -> Self {
        self.attr = Some(Arc::from(attr));
        self
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Decision point tag
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Object the decision concerns
    pub fn id_ref(&self) -> Option<ObjRef> {
        self.id_ref
    }

    /// What is enumerated
    pub fn kind(&self) -> &ChoiceKind {
        &self.kind
    }

    /// Registering thread
    pub fn creator(&self) -> Option<ThreadId> {
        self.creator
    }

    /// Generator that was active before this one
    pub fn prev(&self) -> Option<CgHandle> {
        self.prev
    }

    /// Registered in the same transition as `prev` (inner odometer wheel)
    pub fn is_cascaded(&self) -> bool {
        self.is_cascaded
    }

    /// Exhausted and not reset since
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Attached metadata
    pub fn attr(&self) -> Option<&str> {
        self.attr.as_deref()
    }

    /// State the generator is anchored to
    pub fn state_id(&self) -> Option<StateId> {
        self.state_id
    }

    /// Thread choice deciding who runs next (breaks transitions, never folded)
    pub fn is_scheduling_point(&self) -> bool {
        matches!(
            self.kind,
            ChoiceKind::Threads { scheduling: true, .. } | ChoiceKind::Break { .. }
        )
    }

    /// Boundary marker that resumes the same thread
    pub fn is_break(&self) -> bool {
        matches!(self.kind, ChoiceKind::Break { .. })
    }

    /// Reason of thread and break generators
    pub fn scheduling_reason(&self) -> Option<SchedulingReason> {
        match self.kind {
            ChoiceKind::Threads { reason, .. } | ChoiceKind::Break { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub(crate) fn set_prev(&mut self, prev: Option<CgHandle>, cascaded: bool) {
        self.prev = prev;
        self.is_cascaded = cascaded;
    }

    pub(crate) fn set_state_id(&mut self, state_id: Option<StateId>) {
        self.state_id = state_id;
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Enumeration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Total number of choices
    pub fn total_number_of_choices(&self) -> usize {
        self.kind.count()
    }

    /// Choices handed out so far, including the current one
    pub fn processed_number_of_choices(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    /// Whether `advance()` would succeed
    pub fn has_more_choices(&self) -> bool {
        !self.is_done && self.processed_number_of_choices() < self.total_number_of_choices()
    }

    /// Move to the next choice; `false` once exhausted
    pub fn advance(&mut self) -> bool {
        if !self.has_more_choices() {
            self.is_done = true;
            return false;
        }
        self.cursor = Some(self.processed_number_of_choices());
        true
    }

    /// Rewind to before the first choice
    pub fn reset(&mut self) {
        self.cursor = None;
        self.is_done = false;
    }

    /// Mark as exhausted
    pub fn set_done(&mut self) {
        self.is_done = true;
    }

    /// Whether `advance()` was called since creation or the last reset
    pub fn is_started(&self) -> bool {
        self.cursor.is_some()
    }

    /// The `i`-th choice in enumeration order
    pub fn choice(&self, i: usize) -> Result<ChoiceValue, InternalError> {
        let raw = self.raw_index(i)?;
        self.kind.value_at(raw).ok_or_else(|| self.out_of_range(i))
    }

    /// The choice selected by the last `advance()`
    pub fn current_choice(&self) -> Result<ChoiceValue, InternalError> {
        let cursor = self
            .cursor
            .ok_or_else(|| InternalError::NoCurrentChoice(self.id.to_string()))?;
        self.choice(cursor)
    }

    /// Unpermuted index of the current choice (what a trace records)
    pub fn current_raw_index(&self) -> Option<usize> {
        self.cursor.and_then(|c| self.raw_index(c).ok())
    }

    /// Current thread choice
    pub fn current_thread(&self) -> Result<ThreadId, InternalError> {
        self.current_choice()?
            .as_thread()
            .ok_or_else(|| InternalError::ChoiceKindMismatch {
                id: self.id.to_string(),
                expected: "thread",
            })
    }

    /// Every value in enumeration order
    pub fn all_choices(&self) -> Vec<ChoiceValue> {
        (0..self.total_number_of_choices())
            .filter_map(|i| self.choice(i).ok())
            .collect()
    }

    /// Thread candidates, empty for non-thread kinds
    pub fn thread_candidates(&self) -> &[ThreadId] {
        match &self.kind {
            ChoiceKind::Threads { candidates, .. } => candidates,
            _ => &[],
        }
    }

    /// Permute the enumeration order; the set of choices is unchanged
    ///
    /// Must be called before the first `advance()`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.total_number_of_choices();
        if n < 2 || self.cursor.is_some() {
            return;
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        self.order = Some(order);
    }

    /// Position the cursor on the raw choice `raw` (trace replay)
    pub fn select(&mut self, raw: usize) -> Result<(), InternalError> {
        let n = self.total_number_of_choices();
        if raw >= n {
            return Err(self.out_of_range(raw));
        }
        let pos = match &self.order {
            Some(order) => order
                .iter()
                .position(|&r| r == raw)
                .ok_or_else(|| self.out_of_range(raw))?,
            None => raw,
        };
        self.cursor = Some(pos);
        self.is_done = false;
        Ok(())
    }

    fn raw_index(&self, i: usize) -> Result<usize, InternalError> {
        if i >= self.total_number_of_choices() {
            return Err(self.out_of_range(i));
        }
        Ok(self.order.as_ref().map_or(i, |order| order[i]))
    }

    fn out_of_range(&self, index: usize) -> InternalError {
        InternalError::ChoiceOutOfRange {
            id: self.id.to_string(),
            index,
            total: self.total_number_of_choices(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn drain(cg: &mut ChoiceGenerator) -> Vec<ChoiceValue> {
        let mut out = Vec::new();
        while cg.advance() {
            out.push(cg.current_choice().unwrap());
        }
        out
    }

    #[test]
    fn test_int_interval_enumeration() {
        let mut cg = ChoiceGenerator::int_interval("i", 1, 7, 3);
        assert_eq!(cg.total_number_of_choices(), 3);
        assert_eq!(
            drain(&mut cg),
            vec![ChoiceValue::Int(1), ChoiceValue::Int(4), ChoiceValue::Int(7)]
        );
        assert!(cg.is_done());
    }

    #[test]
    fn test_descending_and_empty_intervals() {
        let cg = ChoiceGenerator::int_interval("d", 3, 1, -1);
        assert_eq!(cg.all_choices(), vec![ChoiceValue::Int(3), ChoiceValue::Int(2), ChoiceValue::Int(1)]);

        let mut empty = ChoiceGenerator::int_interval("e", 3, 1, 1);
        assert_eq!(empty.total_number_of_choices(), 0);
        assert!(!empty.advance());
    }

    #[test]
    fn test_reset_repeats_sequence() {
        let mut cg = ChoiceGenerator::int_set("s", vec![5, -1, 9]);
        let first = drain(&mut cg);
        cg.reset();
        assert!(!cg.is_done());
        assert_eq!(cg.processed_number_of_choices(), 0);
        assert_eq!(drain(&mut cg), first);
    }

    #[test]
    fn test_processed_count() {
        let mut cg = ChoiceGenerator::boolean("b");
        assert_eq!(cg.processed_number_of_choices(), 0);
        assert!(cg.advance());
        assert_eq!(cg.processed_number_of_choices(), 1);
        assert_eq!(cg.current_choice().unwrap(), ChoiceValue::Bool(false));
        assert!(cg.advance());
        assert_eq!(cg.current_choice().unwrap(), ChoiceValue::Bool(true));
        assert!(!cg.has_more_choices());
    }

    #[test]
    fn test_out_of_range_is_internal_error() {
        let cg = ChoiceGenerator::boolean("b");
        assert!(matches!(
            cg.choice(2),
            Err(InternalError::ChoiceOutOfRange { index: 2, total: 2, .. })
        ));
        assert!(matches!(cg.current_choice(), Err(InternalError::NoCurrentChoice(_))));
    }

    #[test]
    fn test_randomize_permutes_but_keeps_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut cg = ChoiceGenerator::int_interval("r", 0, 9, 1);
        cg.randomize(&mut rng);

        let mut seen: Vec<i64> = drain(&mut cg).into_iter().filter_map(ChoiceValue::as_int).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_order() {
        let order = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut cg = ChoiceGenerator::int_interval("r", 0, 5, 1);
            cg.randomize(&mut rng);
            cg.all_choices()
        };
        assert_eq!(order(11), order(11));
    }

    #[test]
    fn test_select_uses_raw_index() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut cg = ChoiceGenerator::int_interval("r", 0, 4, 1);
        cg.randomize(&mut rng);
        cg.select(2).unwrap();
        assert_eq!(cg.current_choice().unwrap(), ChoiceValue::Int(2));
        assert_eq!(cg.current_raw_index(), Some(2));
        assert!(cg.select(5).is_err());
    }

    #[test]
    fn test_scheduling_flags() {
        let sched = ChoiceGenerator::threads(vec![ThreadId(0), ThreadId(1)], SchedulingReason::Yield, true);
        let notify = ChoiceGenerator::threads(vec![ThreadId(0), ThreadId(1)], SchedulingReason::Notify, false);
        let brk = ChoiceGenerator::break_point(ThreadId(0), SchedulingReason::MaxTransitionLength);
        assert!(sched.is_scheduling_point());
        assert!(!notify.is_scheduling_point());
        assert!(brk.is_scheduling_point());
        assert_eq!(brk.total_number_of_choices(), 1);
        assert_eq!(sched.id(), "YIELD");
    }
}
