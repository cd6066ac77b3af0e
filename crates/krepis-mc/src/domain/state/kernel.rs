//! Kernel state: everything the program under test can observe
//!
//! Threads, heap and loaded classes. This is what gets fingerprinted for
//! state matching and what the checkpoint stack rewinds.

use crate::domain::error::InternalError;
use crate::domain::heap::{ClassRegistry, Heap, ObjRef};
use crate::domain::memento::Restorable;
use crate::domain::threads::{ThreadId, ThreadInfo, ThreadList, ThreadState};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Threads, heap and classes of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KernelState {
    /// Thread registry
    pub threads: ThreadList,
    /// Object store
    pub heap: Heap,
    /// Loaded classes
    pub classes: ClassRegistry,
}

/// Snapshot of a [`KernelState`]
#[derive(Debug, Clone)]
pub struct KernelMemento {
    threads: ThreadList,
    heap: Heap,
    classes: ClassRegistry,
}

impl KernelState {
    /// Empty kernel
    pub fn new() -> Self {
        Self::default()
    }

    /// 64-bit hash of the observable state
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Whether `thread` could be picked to run now
    ///
    /// Waiters that were interrupted or whose timeout may fire only qualify
    /// once the monitor they have to reacquire is free.
    pub fn is_runnable(&self, thread: &ThreadInfo) -> bool {
        if thread.suspend_count() > 0 {
            return false;
        }
        match thread.state() {
            ThreadState::Running
            | ThreadState::Unblocked
            | ThreadState::Sleeping
            | ThreadState::Timedout => true,
            ThreadState::Interrupted | ThreadState::TimeoutWaiting => self.lock_is_free(thread.lock_ref()),
            _ => false,
        }
    }

    /// Runnable threads in ascending id order
    pub fn runnable_threads(&self) -> Vec<ThreadId> {
        self.threads
            .iter()
            .filter(|t| self.is_runnable(t))
            .map(ThreadInfo::id)
            .collect()
    }

    /// Whether `id` is runnable (released threads are not)
    pub fn is_thread_runnable(&self, id: ThreadId) -> bool {
        self.threads.try_get(id).map_or(false, |t| self.is_runnable(t))
    }

    /// Thread lookup
    pub fn thread(&self, id: ThreadId) -> Result<&ThreadInfo, InternalError> {
        self.threads.get(id)
    }

    /// Mutable thread lookup
    pub fn thread_mut(&mut self, id: ThreadId) -> Result<&mut ThreadInfo, InternalError> {
        self.threads.get_mut(id)
    }

    fn lock_is_free(&self, lock: Option<ObjRef>) -> bool {
        match lock {
            Some(obj) => self.heap.monitor(obj).map_or(false, |m| m.is_free()),
            None => true,
        }
    }
}

impl Restorable for KernelState {
    type Memento = KernelMemento;

    fn backtrack_memento(&self) -> Self::Memento {
        KernelMemento {
            threads: self.threads.backtrack_memento(),
            heap: self.heap.backtrack_memento(),
            classes: self.classes.backtrack_memento(),
        }
    }

    fn storage_memento(&self) -> Self::Memento {
        KernelMemento {
            threads: self.threads.storage_memento(),
            heap: self.heap.storage_memento(),
            classes: self.classes.storage_memento(),
        }
    }

    fn restore(&mut self, memento: &Self::Memento) {
        self.threads.restore(&memento.threads);
        self.heap.restore(&memento.heap);
        self.classes.restore(&memento.classes);
    }
}
