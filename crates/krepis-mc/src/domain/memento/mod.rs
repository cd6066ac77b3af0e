//! Memento Protocol
//!
//! Every piece of state that must be rewound on backtrack implements
//! [`Restorable`]. Two flavors of memento exist:
//!
//! - **backtrack mementos** may share structure with the live state. They
//!   are only valid while the checkpoint stack holds them and are cheap to
//!   take (reference-count bumps).
//! - **storage mementos** are fully independent deep copies. The visited
//!   state table keeps these when state retention is enabled.
//!
//! `restore` mutates only its receiver and is idempotent.

pub mod backtracker;

pub use backtracker::{BacktrackStats, Backtracker, Checkpoint};

/// State that can be captured and rewound
pub trait Restorable {
    /// Captured snapshot type
    type Memento: Clone;

    /// Snapshot sharing structure with `self`
    fn backtrack_memento(&self) -> Self::Memento;

    /// Snapshot sharing nothing with `self`
    fn storage_memento(&self) -> Self::Memento;

    /// Reinstall a snapshot
    fn restore(&mut self, memento: &Self::Memento);
}
