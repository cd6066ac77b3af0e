//! Script adapter: a small instruction set behind the [`Interpreter`]
//! boundary, plus built-in scenarios
//!
//! [`Interpreter`]: crate::domain::vm::Interpreter

pub mod interpreter;
pub mod program;
pub mod scenarios;

pub use interpreter::ScriptInterpreter;
pub use program::{Op, Operand, Program, ProgramError, Reg, ThreadSpec};
pub use scenarios::{Scenario, SCENARIOS};
