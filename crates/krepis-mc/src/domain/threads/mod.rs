//! Modeled Threads
//!
//! Thread identity and state, the copy-on-write registry, the scheduling
//! state machine and deadlock diagnosis.

pub mod deadlock;
pub mod info;
pub mod registry;
pub mod scheduler;
pub mod types;

pub use deadlock::{diagnose, DeadlockInfo, StuckThread, WaitForGraph};
pub use info::ThreadInfo;
pub use registry::ThreadList;
pub use scheduler::{MonitorEntry, NotifyOutcome, Scheduler, SchedulingPoint, WaitResume};
pub use types::{Frame, ThreadId, ThreadState};
