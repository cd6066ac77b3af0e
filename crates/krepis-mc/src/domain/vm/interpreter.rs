//! Interpreter boundary
//!
//! The engine knows nothing about instructions. An [`Interpreter`] sets up
//! the initial kernel state and executes one instruction at a time through
//! the [`ExecutionContext`] it is handed.

use super::context::ExecutionContext;
use crate::domain::error::ExplorerError;
use crate::domain::state::KernelState;
use crate::domain::threads::ThreadId;

/// Executes the program under test one instruction at a time
///
/// # Contract
///
/// - All program state lives in the [`KernelState`] (frames, heap,
///   classes). The interpreter may only keep data that never changes during
///   exploration, since the engine rewinds the kernel but not the
///   interpreter.
/// - An instruction that registers a choice generator returns its own pc.
///   It is executed again as the first step of the next transition and
///   reads the decision through [`ExecutionContext::choice_for`].
/// - Program faults are reported as [`ExplorerError::UncaughtException`].
pub trait Interpreter {
    /// Build the initial state; returns the main thread (still `New`)
    fn initialize(&mut self, kernel: &mut KernelState) -> Result<ThreadId, ExplorerError>;

    /// Execute the instruction at the current thread's pc
    ///
    /// Returns the next pc, or `None` once the thread has finished.
    fn execute_one_instruction(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Option<usize>, ExplorerError>;

    /// Name used in logs and reports
    fn name(&self) -> &str {
        "program"
    }
}
