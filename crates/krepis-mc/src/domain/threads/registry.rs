//! Thread registry
//!
//! A persistent vector of thread entries. Cloning the registry is O(1);
//! the first mutation after a clone copies the slot vector (pointers only)
//! and the one `ThreadInfo` being changed.

use super::info::ThreadInfo;
use super::types::{Frame, ThreadId, ThreadState};
use crate::domain::error::InternalError;
use crate::domain::heap::ObjRef;
use crate::domain::memento::Restorable;
use std::sync::Arc;

/// Registry of all threads ever created in one execution
///
/// Slots are indexed by `ThreadId`. A slot becomes `None` once its
/// terminated thread has been released.
#[derive(Debug, Clone, Default)]
pub struct ThreadList {
    threads: Arc<Vec<Option<Arc<ThreadInfo>>>>,
}

impl ThreadList {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new thread in state `New`
    pub fn create(
        &mut self,
        name: &str,
        daemon: bool,
        thread_object: ObjRef,
        entry: Frame,
    ) -> ThreadId {
        let slots = Arc::make_mut(&mut self.threads);
        let id = ThreadId::new(slots.len());
        slots.push(Some(Arc::new(ThreadInfo::new(
            id,
            name,
            daemon,
            thread_object,
            entry,
        ))));
        id
    }

    /// Number of slots (including released ones)
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Whether no thread was ever created
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Lookup that tolerates released threads
    pub fn try_get(&self, id: ThreadId) -> Option<&ThreadInfo> {
        self.threads
            .get(id.as_usize())
            .and_then(|slot| slot.as_deref())
    }

    /// Lookup a live entry
    pub fn get(&self, id: ThreadId) -> Result<&ThreadInfo, InternalError> {
        self.try_get(id).ok_or(InternalError::UnknownThread(id))
    }

    /// Mutable lookup, copying shared structure on demand
    pub fn get_mut(&mut self, id: ThreadId) -> Result<&mut ThreadInfo, InternalError> {
        Arc::make_mut(&mut self.threads)
            .get_mut(id.as_usize())
            .and_then(|slot| slot.as_mut())
            .map(Arc::make_mut)
            .ok_or(InternalError::UnknownThread(id))
    }

    /// Whether the entry was released (or never existed)
    pub fn is_released(&self, id: ThreadId) -> bool {
        self.try_get(id).is_none()
    }

    /// All registered entries in id order
    pub fn iter(&self) -> impl Iterator<Item = &ThreadInfo> {
        self.threads.iter().filter_map(|slot| slot.as_deref())
    }

    /// Ids of threads currently in `state`
    pub fn ids_in_state(&self, state: ThreadState) -> Vec<ThreadId> {
        self.iter()
            .filter(|t| t.state() == state)
            .map(ThreadInfo::id)
            .collect()
    }

    /// Whether any thread has started and not terminated
    pub fn has_alive(&self) -> bool {
        self.iter().any(|t| t.state().is_alive())
    }

    /// The program is over once every non-daemon thread terminated
    ///
    /// Threads that were never started do not keep the program alive.
    pub fn all_non_daemon_terminated(&self) -> bool {
        self.iter()
            .filter(|t| !t.is_daemon())
            .all(|t| matches!(t.state(), ThreadState::Terminated | ThreadState::New))
    }

    /// Drop the entries of terminated threads
    ///
    /// Returns the released ids.
    pub fn release_terminated(&mut self) -> Vec<ThreadId> {
        let terminated: Vec<ThreadId> = self
            .iter()
            .filter(|t| t.is_terminated())
            .map(ThreadInfo::id)
            .collect();
        if terminated.is_empty() {
            return terminated;
        }
        let slots = Arc::make_mut(&mut self.threads);
        for id in &terminated {
            slots[id.as_usize()] = None;
        }
        terminated
    }

    /// Whether `other` still shares the entry of `id` with `self`
    pub fn shares_entry_with(&self, other: &Self, id: ThreadId) -> bool {
        match (
            self.threads.get(id.as_usize()),
            other.threads.get(id.as_usize()),
        ) {
            (Some(Some(a)), Some(Some(b))) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Restorable for ThreadList {
    type Memento = ThreadList;

    fn backtrack_memento(&self) -> Self::Memento {
        self.clone()
    }

    fn storage_memento(&self) -> Self::Memento {
        let slots = self
            .threads
            .iter()
            .map(|slot| slot.as_ref().map(|t| Arc::new(t.storage_memento())))
            .collect();
        Self {
            threads: Arc::new(slots),
        }
    }

    fn restore(&mut self, memento: &Self::Memento) {
        self.threads = Arc::clone(&memento.threads);
    }
}

impl PartialEq for ThreadList {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.threads, &other.threads) || self.threads == other.threads
    }
}

impl Eq for ThreadList {}

impl std::hash::Hash for ThreadList {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.threads.hash(state);
    }
}
