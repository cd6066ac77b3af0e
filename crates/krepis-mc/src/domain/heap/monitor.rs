//! Object monitors

use crate::domain::error::InternalError;
use crate::domain::heap::ObjRef;
use crate::domain::threads::ThreadId;

/// Monitor attached to every heap object
///
/// Tracks the owner with its recursion count plus the threads queued on
/// the monitor. The queues keep insertion order; the scheduler sorts
/// candidates itself when it needs a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Monitor {
    holder: Option<ThreadId>,
    lock_count: u32,
    blocked: Vec<ThreadId>,
    waiting: Vec<ThreadId>,
}

impl Monitor {
    /// Unowned monitor with empty queues
    pub fn new() -> Self {
        Self::default()
    }

    /// Current owner
    pub fn holder(&self) -> Option<ThreadId> {
        self.holder
    }

    /// Recursion count of the owner
    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    /// No owner
    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    /// Owned by `thread`
    pub fn is_held_by(&self, thread: ThreadId) -> bool {
        self.holder == Some(thread)
    }

    /// `thread` may take the monitor right now
    pub fn can_lock(&self, thread: ThreadId) -> bool {
        self.holder.map_or(true, |h| h == thread)
    }

    /// Threads blocked on entry
    pub fn blocked_threads(&self) -> &[ThreadId] {
        &self.blocked
    }

    /// Threads inside `wait()`
    pub fn waiting_threads(&self) -> &[ThreadId] {
        &self.waiting
    }

    /// Take the monitor (or bump the recursion count)
    ///
    /// Returns `false` without side effects if another thread owns it.
    pub(crate) fn acquire(&mut self, thread: ThreadId) -> bool {
        self.acquire_with_count(thread, 1)
    }

    pub(crate) fn acquire_with_count(&mut self, thread: ThreadId, count: u32) -> bool {
        if !self.can_lock(thread) {
            return false;
        }
        self.holder = Some(thread);
        self.lock_count += count;
        true
    }

    /// Drop one recursion level; returns `true` once the monitor is free
    pub(crate) fn release(&mut self, thread: ThreadId, object: ObjRef) -> Result<bool, InternalError> {
        if !self.is_held_by(thread) {
            return Err(InternalError::NotMonitorOwner { thread, object });
        }
        self.lock_count -= 1;
        if self.lock_count == 0 {
            self.holder = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drop every recursion level; returns the released count
    pub(crate) fn release_all(&mut self, thread: ThreadId, object: ObjRef) -> Result<u32, InternalError> {
        if !self.is_held_by(thread) {
            return Err(InternalError::NotMonitorOwner { thread, object });
        }
        let count = self.lock_count;
        self.lock_count = 0;
        self.holder = None;
        Ok(count)
    }

    pub(crate) fn add_blocked(&mut self, thread: ThreadId) {
        if !self.blocked.contains(&thread) {
            self.blocked.push(thread);
        }
    }

    pub(crate) fn remove_blocked(&mut self, thread: ThreadId) -> bool {
        let before = self.blocked.len();
        self.blocked.retain(|t| *t != thread);
        before != self.blocked.len()
    }

    pub(crate) fn take_blocked(&mut self) -> Vec<ThreadId> {
        std::mem::take(&mut self.blocked)
    }

    pub(crate) fn add_waiting(&mut self, thread: ThreadId) {
        if !self.waiting.contains(&thread) {
            self.waiting.push(thread);
        }
    }

    pub(crate) fn remove_waiting(&mut self, thread: ThreadId) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|t| *t != thread);
        before != self.waiting.len()
    }
}
