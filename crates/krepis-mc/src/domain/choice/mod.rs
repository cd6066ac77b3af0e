//! Choice Generator Framework
//!
//! Every source of nondeterminism (which thread runs, which waiter is
//! notified, which input value is read) is expressed as a
//! [`ChoiceGenerator`]. The search explores the tree spanned by all their
//! choices.

pub mod arena;
pub mod generator;
pub mod types;

pub use arena::CgArena;
pub use generator::{ChoiceEnumeration, ChoiceGenerator, ChoiceKind};
pub use types::{CgHandle, ChoiceValue, SchedulingReason};
