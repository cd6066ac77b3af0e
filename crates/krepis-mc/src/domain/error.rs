//! Domain Model: Explorer Error Types
//!
//! Three failure classes reach the search driver:
//!
//! 1. **Program faults** (`ExplorerError::UncaughtException`) raised by the
//!    program under test. They end the current path with a terminal marker
//!    in the trail; the search backtracks normally.
//! 2. **Engine faults** (`ExplorerError::Internal`) signal a broken engine
//!    invariant. They abort the run.
//! 3. **Exhaustion** is not an error at all: `backtrack()` returns `false`.

use crate::domain::heap::ObjRef;
use crate::domain::threads::{ThreadId, ThreadState};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Internal Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Engine consistency violations
///
/// Any of these means the engine state can no longer be trusted. They are
/// never caught by the driver and never turned into search results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    /// `choice(i)` was asked for an index outside the generator's range
    #[error("choice index {index} out of range for generator '{id}' with {total} choices")]
    ChoiceOutOfRange {
        /// Generator id
        id: String,
        /// Requested index
        index: usize,
        /// Total number of choices
        total: usize,
    },

    /// The current choice was read before the first `advance()`
    #[error("generator '{0}' has no current choice")]
    NoCurrentChoice(String),

    /// A generator was asked for a choice of a kind it does not offer
    #[error("generator '{id}' does not produce {expected} choices")]
    ChoiceKindMismatch {
        /// Generator id
        id: String,
        /// Expected kind
        expected: &'static str,
    },

    /// A handle does not point into the generator arena
    #[error("dangling choice generator handle {0}")]
    DanglingHandle(usize),

    /// No current choice generator at a point where one must exist
    #[error("no current choice generator")]
    NoCurrentGenerator,

    /// A mandatory scheduling point could not be registered
    #[error("mandatory choice generator '{0}' was rejected")]
    MandatoryRejected(String),

    /// Thread state transition outside the legal table
    #[error("illegal thread transition for {thread}: {from:?} -> {to:?}")]
    IllegalThreadTransition {
        /// Thread
        thread: ThreadId,
        /// Source state
        from: ThreadState,
        /// Requested state
        to: ThreadState,
    },

    /// A thread state requires a lock reference that is missing
    #[error("{thread} is {state:?} without a lock reference")]
    MissingLockRef {
        /// Thread
        thread: ThreadId,
        /// Offending state
        state: ThreadState,
    },

    /// A monitor operation by a thread that does not own the monitor
    #[error("{thread} does not own the monitor of {object}")]
    NotMonitorOwner {
        /// Thread
        thread: ThreadId,
        /// Monitor object
        object: ObjRef,
    },

    /// Thread id not present in the registry
    #[error("unknown thread {0}")]
    UnknownThread(ThreadId),

    /// Object reference not present on the heap
    #[error("unknown object {0}")]
    UnknownObject(ObjRef),

    /// Field index outside the object's layout
    #[error("field {field} out of range for {object}")]
    FieldOutOfRange {
        /// Object
        object: ObjRef,
        /// Requested field
        field: usize,
    },

    /// Thread has no execution frame
    #[error("{0} has an empty execution stack")]
    EmptyStack(ThreadId),

    /// Replay diverged from the recorded choice trace
    #[error("replay diverged at transition {transition}: {reason}")]
    ReplayDivergence {
        /// Transition index in the trace
        transition: usize,
        /// What did not match
        reason: String,
    },

    /// Catch-all for interpreter-detected engine misuse
    #[error("internal error: {0}")]
    Other(String),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Configuration Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration loading and validation failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its accepted range
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Explorer Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level error returned by the explorer and the search driver
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    /// The program under test raised an exception nobody handled
    #[error("uncaught exception in {thread}: {message}")]
    UncaughtException {
        /// Faulting thread
        thread: ThreadId,
        /// Exception description
        message: String,
    },

    /// Engine consistency violation
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// Bad configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The search was cancelled through its token
    #[error("search cancelled")]
    Cancelled,
}

impl ExplorerError {
    /// Build a program fault for `thread`
    pub fn program_fault(thread: ThreadId, message: impl Into<String>) -> Self {
        Self::UncaughtException {
            thread,
            message: message.into(),
        }
    }

    /// Program faults end a path but not the search
    pub fn is_program_fault(&self) -> bool {
        matches!(self, Self::UncaughtException { .. })
    }

    /// Fatal errors abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Config(_))
    }

    /// Short category string for reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::UncaughtException { .. } => "PROGRAM_FAULT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Result alias used throughout the engine
pub type ExplorerResult<T> = Result<T, ExplorerError>;
