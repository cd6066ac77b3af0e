//! Adapters Layer - Ports & Adapters Pattern
//!
//! Connects concrete programs and execution strategies to the engine:
//!
//! - `script`: an [`Interpreter`](crate::domain::vm::Interpreter) for a
//!   small concurrent instruction set, with built-in scenarios
//! - `swarm`: parallel seeded searches sharing one visited-state table

pub mod script;
pub mod swarm;

pub use script::{Program, ScriptInterpreter};
pub use swarm::{Swarm, SwarmReport};
