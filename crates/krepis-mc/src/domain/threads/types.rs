//! Thread Types
//!
//! Identifiers, the thread state enum with its legal transition table, and
//! the execution frame the interpreter works on.

use serde::Serialize;
use std::fmt;

/// Thread identifier
///
/// Ids are handed out in creation order and never reused, which makes
/// "stable order" of thread choices simply ascending id order.
///
/// # Example
///
/// ```rust
/// use krepis_mc::domain::threads::ThreadId;
///
/// let main = ThreadId::new(0);
/// assert_eq!(main.to_string(), "t0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadId(pub usize);

impl ThreadId {
    /// Create a new thread identifier
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

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Thread state
///
/// # State Machine
///
/// ```text
///   New ──► Running ──► Blocked ──► Unblocked ──► Running
///              │                        ▲
///              ├──► Waiting ──► Notified ┤
///              │       │                 │
///              │       └──► Interrupted ─┤
///              ├──► TimeoutWaiting ──► Timedout ──┘
///              ├──► Sleeping ──► Running | Interrupted
///              └──► Terminated
/// ```
///
/// `Terminated` is irreversible. Re-entering the current state is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ThreadState {
    /// Created, not started
    New,
    /// Executing or ready to execute
    Running,
    /// Waiting to enter a monitor
    Blocked,
    /// Monitor became available; must re-attempt the acquisition
    Unblocked,
    /// Inside `wait()`
    Waiting,
    /// Inside a timed `wait()`
    TimeoutWaiting,
    /// Picked by `notify()`; still has to reacquire the lock
    Notified,
    /// Interrupted while waiting or sleeping; not yet observed
    Interrupted,
    /// A timed wait expired; still has to reacquire the lock
    Timedout,
    /// Finished
    Terminated,
    /// Inside `sleep()`
    Sleeping,
}

impl ThreadState {
    /// Whether `self -> to` is in the legal transition table
    pub fn can_transition_to(self, to: Self) -> bool {
        use ThreadState::*;

        if self == to {
            return true;
        }

        matches!(
            (self, to),
            (New, Running)
                | (Running, Blocked | Waiting | TimeoutWaiting | Sleeping | Terminated)
                | (Unblocked, Running | Blocked)
                | (Blocked, Unblocked)
                | (Waiting, Notified | Unblocked | Interrupted)
                | (TimeoutWaiting, Notified | Unblocked | Interrupted | Timedout)
                | (Notified | Interrupted | Timedout, Unblocked)
                | (Sleeping, Running | Interrupted)
        )
    }

    /// States that must carry a lock reference
    pub fn requires_lock_ref(self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::Waiting | Self::TimeoutWaiting | Self::Notified
        )
    }

    /// Thread has started and not yet terminated
    pub fn is_alive(self) -> bool {
        !matches!(self, Self::New | Self::Terminated)
    }

    /// Inside `wait()` and not yet picked
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Waiting | Self::TimeoutWaiting)
    }
}

/// One execution frame
///
/// The core only needs a program counter; `locals` is scratch space owned by
/// the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Frame {
    /// Program counter
    pub pc: usize,
    /// Interpreter-defined local slots
    pub locals: Vec<i64>,
}

impl Frame {
    /// Frame at `pc` with `num_locals` zeroed slots
    pub fn new(pc: usize, num_locals: usize) -> Self {
        Self {
            pc,
            locals: vec![0; num_locals],
        }
    }
}
