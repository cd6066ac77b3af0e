//! Per-thread bookkeeping

use super::types::{Frame, ThreadId, ThreadState};
use crate::domain::error::InternalError;
use crate::domain::heap::ObjRef;
use crate::domain::memento::Restorable;
use std::sync::Arc;
use tracing::trace;

/// Everything the engine tracks about one modeled thread
///
/// # Design Notes
///
/// The execution stack sits behind an `Arc` so that cloning a `ThreadInfo`
/// (which happens on every copy-on-write of the registry) costs a pointer
/// bump. Frames are only copied when the thread actually executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadInfo {
    id: ThreadId,
    name: Arc<str>,
    state: ThreadState,
    lock_ref: Option<ObjRef>,
    held_locks: Vec<ObjRef>,
    lock_count_to_restore: Option<u32>,
    daemon: bool,
    suspend_count: u32,
    interrupted: bool,
    thread_object: ObjRef,
    stack: Arc<Vec<Frame>>,
}

impl ThreadInfo {
    /// New thread in state `New` with a single entry frame
    pub fn new(
        id: ThreadId,
        name: impl Into<Arc<str>>,
        daemon: bool,
        thread_object: ObjRef,
        entry: Frame,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            state: ThreadState::New,
            lock_ref: None,
            held_locks: Vec::new(),
            lock_count_to_restore: None,
            daemon,
            suspend_count: 0,
            interrupted: false,
            thread_object,
            stack: Arc::new(vec![entry]),
        }
    }

    /// Thread id
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Monitor this thread is blocked on, waiting on, or reacquiring
    #[inline]
    pub fn lock_ref(&self) -> Option<ObjRef> {
        self.lock_ref
    }

    /// Monitors currently owned (each once, regardless of recursion count)
    pub fn held_locks(&self) -> &[ObjRef] {
        &self.held_locks
    }

    /// Lock count saved by `wait()` and restored on reacquisition
    pub fn lock_count_to_restore(&self) -> Option<u32> {
        self.lock_count_to_restore
    }

    /// Daemon threads do not keep the program alive
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }

    /// Outstanding `suspend()` calls
    pub fn suspend_count(&self) -> u32 {
        self.suspend_count
    }

    /// Pending interrupt flag
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Heap object representing the thread (used by `join`)
    pub fn thread_object(&self) -> ObjRef {
        self.thread_object
    }

    /// Whether the thread finished
    pub fn is_terminated(&self) -> bool {
        self.state == ThreadState::Terminated
    }

    /// Execution stack, outermost frame first
    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    /// Innermost frame
    pub fn top_frame(&self) -> Result<&Frame, InternalError> {
        self.stack.last().ok_or(InternalError::EmptyStack(self.id))
    }

    /// Innermost frame, copying the stack if it is shared
    pub fn top_frame_mut(&mut self) -> Result<&mut Frame, InternalError> {
        let id = self.id;
        Arc::make_mut(&mut self.stack)
            .last_mut()
            .ok_or(InternalError::EmptyStack(id))
    }

    /// Program counter of the innermost frame
    pub fn pc(&self) -> Result<usize, InternalError> {
        self.top_frame().map(|f| f.pc)
    }

    /// Push a frame
    pub fn push_frame(&mut self, frame: Frame) {
        Arc::make_mut(&mut self.stack).push(frame);
    }

    /// Pop the innermost frame
    pub fn pop_frame(&mut self) -> Option<Frame> {
        Arc::make_mut(&mut self.stack).pop()
    }

    /// Move to `to`, enforcing the legal transition table
    ///
    /// Entering a state that needs a lock reference without one is a
    /// consistency fault, so callers set `lock_ref` first.
    pub fn set_state(&mut self, to: ThreadState) -> Result<(), InternalError> {
        let from = self.state;
        if from == to {
            return Ok(());
        }
        if !from.can_transition_to(to) {
            return Err(InternalError::IllegalThreadTransition {
                thread: self.id,
                from,
                to,
            });
        }
        if to.requires_lock_ref() && self.lock_ref.is_none() {
            return Err(InternalError::MissingLockRef {
                thread: self.id,
                state: to,
            });
        }
        trace!(thread = %self.id, ?from, ?to, "thread state change");
        self.state = to;
        Ok(())
    }

    pub(crate) fn set_lock_ref(&mut self, lock: Option<ObjRef>) {
        self.lock_ref = lock;
    }

    pub(crate) fn add_held_lock(&mut self, lock: ObjRef) {
        if !self.held_locks.contains(&lock) {
            self.held_locks.push(lock);
        }
    }

    pub(crate) fn remove_held_lock(&mut self, lock: ObjRef) {
        self.held_locks.retain(|l| *l != lock);
    }

    pub(crate) fn take_held_locks(&mut self) -> Vec<ObjRef> {
        std::mem::take(&mut self.held_locks)
    }

    pub(crate) fn set_lock_count_to_restore(&mut self, count: Option<u32>) {
        self.lock_count_to_restore = count;
    }

    pub(crate) fn set_interrupted(&mut self, interrupted: bool) {
        self.interrupted = interrupted;
    }

    pub(crate) fn suspend(&mut self) {
        self.suspend_count += 1;
    }

    pub(crate) fn resume(&mut self) -> bool {
        if self.suspend_count == 0 {
            return false;
        }
        self.suspend_count -= 1;
        true
    }
}

impl Restorable for ThreadInfo {
    type Memento = ThreadInfo;

    fn backtrack_memento(&self) -> Self::Memento {
        self.clone()
    }

    fn storage_memento(&self) -> Self::Memento {
        let mut copy = self.clone();
        copy.stack = Arc::new(self.stack.as_ref().clone());
        copy
    }

    fn restore(&mut self, memento: &Self::Memento) {
        *self = memento.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread() -> ThreadInfo {
        ThreadInfo::new(ThreadId::new(1), "worker", false, ObjRef::new(0), Frame::new(0, 2))
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut t = thread();
        let err = t.set_state(ThreadState::Waiting).unwrap_err();
        assert!(matches!(err, InternalError::IllegalThreadTransition { .. }));
        assert_eq!(t.state(), ThreadState::New);
    }

    #[test]
    fn test_blocked_requires_lock_ref() {
        let mut t = thread();
        t.set_state(ThreadState::Running).unwrap();
        assert!(matches!(
            t.set_state(ThreadState::Blocked),
            Err(InternalError::MissingLockRef { .. })
        ));

        t.set_lock_ref(Some(ObjRef::new(3)));
        t.set_state(ThreadState::Blocked).unwrap();
        assert_eq!(t.state(), ThreadState::Blocked);
    }

    #[test]
    fn test_frame_copy_on_write() {
        let mut t = thread();
        let snapshot = t.backtrack_memento();
        t.top_frame_mut().unwrap().pc = 5;

        assert_eq!(t.pc().unwrap(), 5);
        assert_eq!(snapshot.pc().unwrap(), 0);

        t.restore(&snapshot);
        assert_eq!(t.pc().unwrap(), 0);
    }

    #[test]
    fn test_storage_memento_is_independent() {
        let t = thread();
        let stored = t.storage_memento();
        assert_eq!(stored, t);
        assert!(!Arc::ptr_eq(&stored.stack, &t.stack));
    }

    #[test]
    fn test_resume_without_suspend() {
        let mut t = thread();
        assert!(!t.resume());
        t.suspend();
        assert_eq!(t.suspend_count(), 1);
        assert!(t.resume());
        assert_eq!(t.suspend_count(), 0);
    }
}
