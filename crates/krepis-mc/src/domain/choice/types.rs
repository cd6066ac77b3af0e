//! Choice Value Types

use crate::domain::heap::ObjRef;
use crate::domain::threads::ThreadId;
use serde::Serialize;
use std::fmt;

/// Handle of a generator inside the [`CgArena`](super::CgArena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CgHandle(pub usize);

impl CgHandle {
    /// Create a new handle
    #[inline(always)]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for CgHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cg{}", self.0)
    }
}

/// One outcome offered by a generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ChoiceValue {
    /// Which thread runs (or which waiter is notified)
    Thread(ThreadId),
    /// Integer input
    Int(i64),
    /// Boolean input
    Bool(bool),
    /// Floating point input
    Double(f64),
    /// Object reference (or null)
    Reference(Option<ObjRef>),
}

impl ChoiceValue {
    /// Thread payload
    pub fn as_thread(self) -> Option<ThreadId> {
        match self {
            Self::Thread(t) => Some(t),
            _ => None,
        }
    }

    /// Integer payload
    pub fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Floating point payload
    pub fn as_double(self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Reference payload
    pub fn as_reference(self) -> Option<Option<ObjRef>> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thread(t) => write!(f, "{t}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Reference(Some(r)) => write!(f, "{r}"),
            Self::Reference(None) => write!(f, "null"),
        }
    }
}

/// Why a thread choice was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SchedulingReason {
    /// First transition of the program
    Root,
    /// A thread was started
    Start,
    /// A thread terminated
    Terminate,
    /// Before acquiring a monitor
    MonitorEnter,
    /// After releasing a monitor
    MonitorExit,
    /// The running thread blocked on a monitor
    Block,
    /// The running thread entered `wait()`
    Wait,
    /// Picking a waiter to notify
    Notify,
    /// Before a shared field access
    SharedAccess,
    /// `yield()`
    Yield,
    /// `sleep()`
    Sleep,
    /// A thread was interrupted
    Interrupt,
    /// A suspended thread was resumed or the current one suspended
    Suspend,
    /// Transition exceeded the configured length
    MaxTransitionLength,
}

impl SchedulingReason {
    /// Generator id used for thread choices created for this reason
    pub fn id(self) -> &'static str {
        match self {
            Self::Root => "<root>",
            Self::Start => "START",
            Self::Terminate => "TERMINATE",
            Self::MonitorEnter => "LOCK",
            Self::MonitorExit => "RELEASE",
            Self::Block => "BLOCK",
            Self::Wait => "WAIT",
            Self::Notify => "NOTIFY",
            Self::SharedAccess => "SHARED_FIELD_ACCESS",
            Self::Yield => "YIELD",
            Self::Sleep => "SLEEP",
            Self::Interrupt => "INTERRUPT",
            Self::Suspend => "SUSPEND",
            Self::MaxTransitionLength => "MAX_TRANSITION_LENGTH",
        }
    }
}
