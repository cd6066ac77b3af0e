//! Virtual machine driver
//!
//! The [`Explorer`] owns the kernel and system state and executes
//! transitions by handing an [`ExecutionContext`] to an [`Interpreter`].

pub mod context;
pub mod explorer;
pub mod interpreter;

pub use context::{Continuation, ExecutionContext};
pub use explorer::{Explorer, ExplorerStats, ReplayOutcome};
pub use interpreter::Interpreter;
