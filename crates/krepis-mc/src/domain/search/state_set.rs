//! Visited-state table
//!
//! Maps state fingerprints to dense state ids. Backed by a `DashMap` so
//! that several explorers (see the swarm runner) can share one table and
//! prune each other's revisits.

use crate::domain::state::{KernelMemento, StateId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fingerprint -> state id
#[derive(Debug, Default)]
pub struct StateSet {
    states: DashMap<u64, StateId>,
    retained: DashMap<StateId, KernelMemento>,
    next_id: AtomicUsize,
}

impl StateSet {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `fingerprint`; returns its id and whether it was new
    pub fn add(&self, fingerprint: u64) -> (StateId, bool) {
        match self.states.entry(fingerprint) {
            Entry::Occupied(e) => (*e.get(), false),
            Entry::Vacant(e) => {
                let id = StateId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                e.insert(id);
                (id, true)
            }
        }
    }

    /// Like [`add`](Self::add), keeping a storage memento of new states
    pub fn add_retained(&self, fingerprint: u64, memento: impl FnOnce() -> KernelMemento) -> (StateId, bool) {
        let (id, is_new) = self.add(fingerprint);
        if is_new {
            self.retained.insert(id, memento());
        }
        (id, is_new)
    }

    /// Id of a known fingerprint
    pub fn get(&self, fingerprint: u64) -> Option<StateId> {
        self.states.get(&fingerprint).map(|e| *e.value())
    }

    /// Whether `fingerprint` was visited
    pub fn contains(&self, fingerprint: u64) -> bool {
        self.states.contains_key(&fingerprint)
    }

    /// Stored snapshot of a retained state
    pub fn retained(&self, id: StateId) -> Option<KernelMemento> {
        self.retained.get(&id).map(|e| e.value().clone())
    }

    /// Number of distinct states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing was visited
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of retained snapshots
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::memento::Restorable;
    use crate::domain::state::KernelState;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_dense_and_stable() {
        let set = StateSet::new();
        assert_eq!(set.add(10), (StateId(0), true));
        assert_eq!(set.add(20), (StateId(1), true));
        assert_eq!(set.add(10), (StateId(0), false));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(20), Some(StateId(1)));
        assert!(!set.contains(30));
    }

    #[test]
    fn test_retention_only_for_new_states() {
        let set = StateSet::new();
        let kernel = KernelState::new();
        let mut calls = 0;
        set.add_retained(1, || {
            calls += 1;
            kernel.storage_memento()
        });
        set.add_retained(1, || {
            calls += 1;
            kernel.storage_memento()
        });
        assert_eq!(calls, 1);
        assert_eq!(set.retained_len(), 1);
        assert!(set.retained(StateId(0)).is_some());
    }

    #[test]
    fn test_concurrent_inserts() {
        let set = Arc::new(StateSet::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for fp in 0..100u64 {
                        set.add(fp + (t % 2) * 50);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(set.len(), 150);
        let mut ids: Vec<usize> = (0..150u64).map(|fp| set.get(fp).unwrap().as_usize()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..150).collect::<Vec<_>>());
    }
}
