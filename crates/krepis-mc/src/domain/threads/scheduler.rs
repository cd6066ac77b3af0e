//! Thread Scheduling State Machine
//!
//! Turns monitor contention, wait/notify, start/exit and the other thread
//! operations into thread state changes plus, where the outcome is
//! nondeterministic, a [`SchedulingPoint`] the caller registers with the
//! system state.
//!
//! # Scheduling Points
//!
//! ```text
//! operation          creates a choice when                 mandatory
//! ─────────────────  ────────────────────────────────────  ─────────
//! monitor enter      > 1 runnable (before acquiring)       no
//! block on monitor   >= 1 runnable                         yes
//! monitor exit       >= 2 runnable besides the woken ones  no
//! wait               >= 1 runnable                         yes
//! notify             >= 2 waiters (picks the waiter)       no
//! start/yield/...    > 1 runnable                          no
//! terminate          >= 1 runnable                         yes
//! ```
//!
//! Candidates are always the runnable threads in ascending id order.

use super::types::{ThreadId, ThreadState};
use crate::domain::choice::{ChoiceGenerator, SchedulingReason};
use crate::domain::error::InternalError;
use crate::domain::heap::ObjRef;
use crate::domain::state::KernelState;
use tracing::trace;

/// A decision the caller has to register
#[derive(Debug, Clone)]
pub struct SchedulingPoint {
    /// Generator to register
    pub generator: ChoiceGenerator,
    /// The current thread cannot continue without it
    pub mandatory: bool,
}

/// Result of a monitor acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEntry {
    /// The thread owns the monitor
    Acquired,
    /// The thread is `Blocked` on the monitor
    Blocked,
}

/// Result of resuming a thread that was inside `wait()`
#[derive(Debug, Clone)]
pub enum WaitResume {
    /// Lock count restored, thread is `Running` again
    Reacquired {
        /// Woken by an interrupt
        interrupted: bool,
        /// Woken by its timeout
        timed_out: bool,
    },
    /// Monitor still owned by someone else; thread is `Blocked`
    Blocked(Option<SchedulingPoint>),
}

/// Result of `notify()`
#[derive(Debug, Clone)]
pub enum NotifyOutcome {
    /// Nobody was waiting
    NoWaiter,
    /// This waiter was picked
    Notified(ThreadId),
    /// Several waiters; one must be chosen through this generator
    Choice(SchedulingPoint),
}

/// State machine operations over one kernel state
pub struct Scheduler<'k> {
    kernel: &'k mut KernelState,
}

impl<'k> Scheduler<'k> {
    /// Operate on `kernel`
    pub fn new(kernel: &'k mut KernelState) -> Self {
        Self { kernel }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Choice Construction
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Optional switch: only when more than one thread could run
    pub fn scheduling_point(&self, current: ThreadId, reason: SchedulingReason) -> Option<SchedulingPoint> {
        let candidates = self.kernel.runnable_threads();
        if candidates.len() < 2 {
            return None;
        }
        Some(SchedulingPoint {
            generator: ChoiceGenerator::threads(candidates, reason, true).with_creator(current),
            mandatory: false,
        })
    }

    /// Required switch: `current` cannot continue
    ///
    /// Returns `None` when nothing is runnable (end state or deadlock).
    pub fn mandatory_switch(&self, current: ThreadId, reason: SchedulingReason) -> Option<SchedulingPoint> {
        let candidates = self.kernel.runnable_threads();
        if candidates.is_empty() {
            return None;
        }
        Some(SchedulingPoint {
            generator: ChoiceGenerator::threads(candidates, reason, true).with_creator(current),
            mandatory: true,
        })
    }

    /// Generator for the first transition of the program
    pub fn root_point(main: ThreadId) -> SchedulingPoint {
        SchedulingPoint {
            generator: ChoiceGenerator::threads(vec![main], SchedulingReason::Root, true).with_creator(main),
            mandatory: true,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Lifecycle
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// `NEW -> RUNNING` for `target`, then a possible switch
    pub fn start(&mut self, current: ThreadId, target: ThreadId) -> Result<Option<SchedulingPoint>, InternalError> {
        self.kernel.thread_mut(target)?.set_state(ThreadState::Running)?;
        Ok(self.scheduling_point(current, SchedulingReason::Start))
    }

    /// Release everything `thread` owns, wake its joiners and terminate it
    pub fn terminate(&mut self, thread: ThreadId) -> Result<Option<SchedulingPoint>, InternalError> {
        let locks = self.kernel.thread_mut(thread)?.take_held_locks();
        for obj in locks {
            self.kernel.heap.monitor_mut(obj)?.release_all(thread, obj)?;
            self.wake_on_release(obj)?;
        }

        let info = self.kernel.thread_mut(thread)?;
        info.set_state(ThreadState::Terminated)?;
        let thread_object = info.thread_object();

        // joiners wait on the thread object
        self.notify_all_waiters(thread_object)?;
        Ok(self.mandatory_switch(thread, SchedulingReason::Terminate))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Monitors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Switch before `thread` tries to take `obj`
    ///
    /// None for re-entrant acquisition.
    pub fn monitor_enter_point(&self, thread: ThreadId, obj: ObjRef) -> Result<Option<SchedulingPoint>, InternalError> {
        if self.kernel.heap.monitor(obj)?.is_held_by(thread) {
            return Ok(None);
        }
        Ok(self
            .scheduling_point(thread, SchedulingReason::MonitorEnter)
            .map(|p| with_ref(p, obj)))
    }

    /// Take `obj` or block on it
    pub fn enter_monitor(
        &mut self,
        thread: ThreadId,
        obj: ObjRef,
    ) -> Result<(MonitorEntry, Option<SchedulingPoint>), InternalError> {
        let monitor = self.kernel.heap.monitor_mut(obj)?;
        if monitor.acquire(thread) {
            monitor.remove_blocked(thread);
            let info = self.kernel.thread_mut(thread)?;
            info.add_held_lock(obj);
            info.set_lock_ref(None);
            info.set_state(ThreadState::Running)?;
            return Ok((MonitorEntry::Acquired, None));
        }

        monitor.add_blocked(thread);
        let info = self.kernel.thread_mut(thread)?;
        info.set_lock_ref(Some(obj));
        info.set_state(ThreadState::Blocked)?;
        trace!(%thread, object = %obj, "blocked on monitor");
        let point = self
            .mandatory_switch(thread, SchedulingReason::Block)
            .map(|p| with_ref(p, obj));
        Ok((MonitorEntry::Blocked, point))
    }

    /// Drop one recursion level of `obj`
    ///
    /// Once the monitor is free, blocked and notified threads become
    /// `Unblocked`. A switch is offered only if, not counting the threads
    /// just woken, at least two threads could run.
    pub fn exit_monitor(&mut self, thread: ThreadId, obj: ObjRef) -> Result<Option<SchedulingPoint>, InternalError> {
        if !self.kernel.heap.monitor_mut(obj)?.release(thread, obj)? {
            return Ok(None);
        }
        self.kernel.thread_mut(thread)?.remove_held_lock(obj);
        let woken = self.wake_on_release(obj)?;

        let runnable = self.kernel.runnable_threads();
        let others = runnable.iter().filter(|t| !woken.contains(t)).count();
        if others < 2 {
            return Ok(None);
        }
        Ok(Some(SchedulingPoint {
            generator: ChoiceGenerator::threads(runnable, SchedulingReason::MonitorExit, true)
                .with_creator(thread)
                .with_ref(obj),
            mandatory: false,
        }))
    }

    fn wake_on_release(&mut self, obj: ObjRef) -> Result<Vec<ThreadId>, InternalError> {
        let mut woken = self.kernel.heap.monitor_mut(obj)?.take_blocked();
        woken.extend(
            self.kernel
                .threads
                .iter()
                .filter(|t| t.state() == ThreadState::Notified && t.lock_ref() == Some(obj))
                .map(|t| t.id()),
        );
        woken.sort_unstable();
        woken.dedup();
        for id in &woken {
            self.kernel.thread_mut(*id)?.set_state(ThreadState::Unblocked)?;
        }
        Ok(woken)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Wait / Notify
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Release the full lock count of `obj` and start waiting
    pub fn wait(&mut self, thread: ThreadId, obj: ObjRef, timed: bool) -> Result<Option<SchedulingPoint>, InternalError> {
        let monitor = self.kernel.heap.monitor_mut(obj)?;
        let count = monitor.release_all(thread, obj)?;
        monitor.add_waiting(thread);

        let info = self.kernel.thread_mut(thread)?;
        info.remove_held_lock(obj);
        info.set_lock_ref(Some(obj));
        info.set_lock_count_to_restore(Some(count));
        info.set_state(if timed {
            ThreadState::TimeoutWaiting
        } else {
            ThreadState::Waiting
        })?;

        self.wake_on_release(obj)?;
        Ok(self
            .mandatory_switch(thread, SchedulingReason::Wait)
            .map(|p| with_ref(p, obj)))
    }

    /// Continue a thread that was scheduled while inside `wait()`
    ///
    /// Resolves timeouts and interrupts, then reacquires the monitor with
    /// the saved lock count or blocks on it.
    pub fn resume_wait(&mut self, thread: ThreadId) -> Result<WaitResume, InternalError> {
        let info = self.kernel.thread(thread)?;
        let state = info.state();
        let obj = info.lock_ref().ok_or(InternalError::MissingLockRef { thread, state })?;
        let count = info.lock_count_to_restore().unwrap_or(1);

        let mut interrupted = false;
        let mut timed_out = false;
        match state {
            ThreadState::TimeoutWaiting => {
                self.kernel.heap.monitor_mut(obj)?.remove_waiting(thread);
                let info = self.kernel.thread_mut(thread)?;
                info.set_state(ThreadState::Timedout)?;
                info.set_state(ThreadState::Unblocked)?;
                timed_out = true;
            }
            ThreadState::Timedout => {
                self.kernel.thread_mut(thread)?.set_state(ThreadState::Unblocked)?;
                timed_out = true;
            }
            ThreadState::Interrupted => {
                let info = self.kernel.thread_mut(thread)?;
                info.set_state(ThreadState::Unblocked)?;
                info.set_interrupted(false);
                interrupted = true;
            }
            ThreadState::Unblocked => {}
            from => {
                return Err(InternalError::IllegalThreadTransition {
                    thread,
                    from,
                    to: ThreadState::Unblocked,
                })
            }
        }

        let monitor = self.kernel.heap.monitor_mut(obj)?;
        if monitor.acquire_with_count(thread, count) {
            monitor.remove_blocked(thread);
            let info = self.kernel.thread_mut(thread)?;
            info.add_held_lock(obj);
            info.set_lock_ref(None);
            info.set_lock_count_to_restore(None);
            info.set_state(ThreadState::Running)?;
            return Ok(WaitResume::Reacquired { interrupted, timed_out });
        }

        monitor.add_blocked(thread);
        self.kernel.thread_mut(thread)?.set_state(ThreadState::Blocked)?;
        let point = self
            .mandatory_switch(thread, SchedulingReason::Block)
            .map(|p| with_ref(p, obj));
        Ok(WaitResume::Blocked(point))
    }

    /// Threads waiting on `obj`, ascending
    pub fn waiters(&self, obj: ObjRef) -> Result<Vec<ThreadId>, InternalError> {
        let mut waiters: Vec<ThreadId> = self
            .kernel
            .heap
            .monitor(obj)?
            .waiting_threads()
            .iter()
            .copied()
            .filter(|t| self.kernel.threads.try_get(*t).map_or(false, |i| i.state().is_waiting()))
            .collect();
        waiters.sort_unstable();
        Ok(waiters)
    }

    /// Wake one waiter of `obj`
    ///
    /// With `chosen` set, that waiter is woken (the choice was already
    /// made). Otherwise a sole waiter is woken directly and several
    /// waiters produce a non-scheduling thread choice.
    pub fn notify(
        &mut self,
        thread: ThreadId,
        obj: ObjRef,
        chosen: Option<ThreadId>,
    ) -> Result<NotifyOutcome, InternalError> {
        if !self.kernel.heap.monitor(obj)?.is_held_by(thread) {
            return Err(InternalError::NotMonitorOwner { thread, object: obj });
        }
        let waiters = self.waiters(obj)?;

        if let Some(target) = chosen {
            if !waiters.contains(&target) {
                return Err(InternalError::Other(format!("{target} is not waiting on {obj}")));
            }
            self.notify_one(obj, target)?;
            return Ok(NotifyOutcome::Notified(target));
        }

        match waiters.as_slice() {
            [] => Ok(NotifyOutcome::NoWaiter),
            [only] => {
                self.notify_one(obj, *only)?;
                Ok(NotifyOutcome::Notified(*only))
            }
            _ => Ok(NotifyOutcome::Choice(SchedulingPoint {
                generator: ChoiceGenerator::threads(waiters, SchedulingReason::Notify, false)
                    .with_creator(thread)
                    .with_ref(obj),
                mandatory: false,
            })),
        }
    }

    /// Wake every waiter of `obj`
    pub fn notify_all(&mut self, thread: ThreadId, obj: ObjRef) -> Result<Vec<ThreadId>, InternalError> {
        if !self.kernel.heap.monitor(obj)?.is_held_by(thread) {
            return Err(InternalError::NotMonitorOwner { thread, object: obj });
        }
        self.notify_all_waiters(obj)
    }

    fn notify_all_waiters(&mut self, obj: ObjRef) -> Result<Vec<ThreadId>, InternalError> {
        let waiters = self.waiters(obj)?;
        for w in &waiters {
            self.notify_one(obj, *w)?;
        }
        Ok(waiters)
    }

    fn notify_one(&mut self, obj: ObjRef, waiter: ThreadId) -> Result<(), InternalError> {
        let monitor = self.kernel.heap.monitor_mut(obj)?;
        monitor.remove_waiting(waiter);
        let next = if monitor.is_free() {
            ThreadState::Unblocked
        } else {
            ThreadState::Notified
        };
        self.kernel.thread_mut(waiter)?.set_state(next)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Sleep / Yield / Interrupt / Suspend
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Enter `Sleeping`; others may run meanwhile
    pub fn sleep(&mut self, thread: ThreadId) -> Result<Option<SchedulingPoint>, InternalError> {
        self.kernel.thread_mut(thread)?.set_state(ThreadState::Sleeping)?;
        Ok(self.scheduling_point(thread, SchedulingReason::Sleep))
    }

    /// Leave `Sleeping` (or a pending interrupt); returns whether the sleep
    /// was interrupted
    pub fn wake(&mut self, thread: ThreadId) -> Result<bool, InternalError> {
        let info = self.kernel.thread_mut(thread)?;
        match info.state() {
            ThreadState::Interrupted => {
                info.set_state(ThreadState::Unblocked)?;
                info.set_state(ThreadState::Running)?;
                info.set_interrupted(false);
                Ok(true)
            }
            _ => {
                info.set_state(ThreadState::Running)?;
                Ok(false)
            }
        }
    }

    /// Offer every runnable thread the processor
    pub fn yield_point(&self, thread: ThreadId) -> Option<SchedulingPoint> {
        self.scheduling_point(thread, SchedulingReason::Yield)
    }

    /// Switch before an access to shared object `obj`
    pub fn shared_access_point(&self, thread: ThreadId, obj: ObjRef) -> Option<SchedulingPoint> {
        self.scheduling_point(thread, SchedulingReason::SharedAccess)
            .map(|p| with_ref(p, obj))
    }

    /// Set the interrupt flag of `target`, waking it from wait or sleep
    pub fn interrupt(&mut self, thread: ThreadId, target: ThreadId) -> Result<Option<SchedulingPoint>, InternalError> {
        let info = self.kernel.thread_mut(target)?;
        info.set_interrupted(true);
        let state = info.state();
        let lock = info.lock_ref();
        match state {
            ThreadState::Waiting | ThreadState::TimeoutWaiting => {
                info.set_state(ThreadState::Interrupted)?;
                if let Some(obj) = lock {
                    self.kernel.heap.monitor_mut(obj)?.remove_waiting(target);
                }
            }
            ThreadState::Sleeping => info.set_state(ThreadState::Interrupted)?,
            _ => {}
        }
        Ok(self.scheduling_point(thread, SchedulingReason::Interrupt))
    }

    /// Increment the suspend count of `target`
    pub fn suspend(&mut self, thread: ThreadId, target: ThreadId) -> Result<Option<SchedulingPoint>, InternalError> {
        self.kernel.thread_mut(target)?.suspend();
        if target == thread {
            return Ok(self.mandatory_switch(thread, SchedulingReason::Suspend));
        }
        Ok(None)
    }

    /// Decrement the suspend count of `target`
    pub fn resume(&mut self, thread: ThreadId, target: ThreadId) -> Result<Option<SchedulingPoint>, InternalError> {
        if !self.kernel.thread_mut(target)?.resume() {
            return Ok(None);
        }
        Ok(self.scheduling_point(thread, SchedulingReason::Suspend))
    }
}

fn with_ref(mut point: SchedulingPoint, obj: ObjRef) -> SchedulingPoint {
    point.generator = point.generator.with_ref(obj);
    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::choice::ChoiceValue;
    use crate::domain::threads::Frame;

    fn kernel(n: usize) -> (KernelState, Vec<ThreadId>, ObjRef) {
        let mut kernel = KernelState::new();
        let lock = kernel.heap.allocate("Lock", 0);
        let ids = (0..n)
            .map(|i| {
                let obj = kernel.heap.allocate("Thread", 0);
                let id = kernel.threads.create(&format!("t{i}"), false, obj, Frame::new(0, 0));
                kernel.thread_mut(id).unwrap().set_state(ThreadState::Running).unwrap();
                id
            })
            .collect();
        (kernel, ids, lock)
    }

    fn state(kernel: &KernelState, id: ThreadId) -> ThreadState {
        kernel.thread(id).unwrap().state()
    }

    #[test]
    fn test_single_runnable_creates_no_choice() {
        let (mut kernel, ids, _) = kernel(1);
        let sched = Scheduler::new(&mut kernel);
        assert!(sched.yield_point(ids[0]).is_none());
    }

    #[test]
    fn test_blocking_registers_mandatory_choice() {
        let (mut kernel, ids, lock) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        let (entry, _) = sched.enter_monitor(ids[0], lock).unwrap();
        assert_eq!(entry, MonitorEntry::Acquired);

        let (entry, point) = sched.enter_monitor(ids[1], lock).unwrap();
        assert_eq!(entry, MonitorEntry::Blocked);
        let point = point.unwrap();
        assert!(point.mandatory);
        assert_eq!(point.generator.thread_candidates(), &[ids[0]]);
        assert_eq!(state(&kernel, ids[1]), ThreadState::Blocked);
        assert_eq!(kernel.thread(ids[1]).unwrap().lock_ref(), Some(lock));
    }

    #[test]
    fn test_release_without_third_thread_has_no_choice() {
        let (mut kernel, ids, lock) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[0], lock).unwrap();
        sched.enter_monitor(ids[1], lock).unwrap();

        let point = sched.exit_monitor(ids[0], lock).unwrap();
        assert!(point.is_none());
        assert_eq!(state(&kernel, ids[1]), ThreadState::Unblocked);
    }

    #[test]
    fn test_release_with_third_thread_offers_choice() {
        let (mut kernel, ids, lock) = kernel(3);
        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[0], lock).unwrap();
        sched.enter_monitor(ids[1], lock).unwrap();

        let point = sched.exit_monitor(ids[0], lock).unwrap().unwrap();
        assert!(!point.mandatory);
        assert_eq!(point.generator.thread_candidates(), &[ids[0], ids[1], ids[2]]);
        assert_eq!(point.generator.id_ref(), Some(lock));
    }

    #[test]
    fn test_reentrant_enter_has_no_point() {
        let (mut kernel, ids, lock) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        assert!(sched.monitor_enter_point(ids[0], lock).unwrap().is_some());
        sched.enter_monitor(ids[0], lock).unwrap();
        assert!(sched.monitor_enter_point(ids[0], lock).unwrap().is_none());
        sched.enter_monitor(ids[0], lock).unwrap();
        assert!(sched.exit_monitor(ids[0], lock).unwrap().is_none());
        assert!(kernel.heap.monitor(lock).unwrap().is_held_by(ids[0]));
    }

    #[test]
    fn test_wait_and_reacquire_restores_count() {
        let (mut kernel, ids, lock) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[0], lock).unwrap();
        sched.enter_monitor(ids[0], lock).unwrap();

        let point = sched.wait(ids[0], lock, false).unwrap().unwrap();
        assert!(point.mandatory);
        assert_eq!(point.generator.thread_candidates(), &[ids[1]]);

        sched.enter_monitor(ids[1], lock).unwrap();
        assert!(matches!(sched.notify(ids[1], lock, None).unwrap(), NotifyOutcome::Notified(t) if t == ids[0]));
        sched.exit_monitor(ids[1], lock).unwrap();

        assert!(matches!(
            sched.resume_wait(ids[0]).unwrap(),
            WaitResume::Reacquired { interrupted: false, timed_out: false }
        ));
        assert_eq!(kernel.heap.monitor(lock).unwrap().lock_count(), 2);
        assert_eq!(state(&kernel, ids[0]), ThreadState::Running);
        assert_eq!(kernel.thread(ids[0]).unwrap().lock_count_to_restore(), None);
    }

    #[test]
    fn test_notify_three_waiters() {
        let (mut kernel, ids, lock) = kernel(4);
        let mut sched = Scheduler::new(&mut kernel);
        for &w in &ids[1..] {
            sched.enter_monitor(w, lock).unwrap();
            sched.wait(w, lock, false).unwrap();
        }
        sched.enter_monitor(ids[0], lock).unwrap();

        let NotifyOutcome::Choice(point) = sched.notify(ids[0], lock, None).unwrap() else {
            panic!("expected a notify choice");
        };
        assert!(!point.generator.is_scheduling_point());
        assert_eq!(
            point.generator.all_choices(),
            vec![
                ChoiceValue::Thread(ids[1]),
                ChoiceValue::Thread(ids[2]),
                ChoiceValue::Thread(ids[3])
            ]
        );

        sched.notify(ids[0], lock, Some(ids[2])).unwrap();
        assert_eq!(state(&kernel, ids[1]), ThreadState::Waiting);
        assert_eq!(state(&kernel, ids[2]), ThreadState::Notified);
        assert_eq!(state(&kernel, ids[3]), ThreadState::Waiting);
    }

    #[test]
    fn test_notify_requires_ownership() {
        let (mut kernel, ids, lock) = kernel(1);
        let mut sched = Scheduler::new(&mut kernel);
        assert!(matches!(
            sched.notify(ids[0], lock, None),
            Err(InternalError::NotMonitorOwner { .. })
        ));
    }

    #[test]
    fn test_timed_wait_times_out() {
        let (mut kernel, ids, lock) = kernel(1);
        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[0], lock).unwrap();

        // only the waiter itself can proceed, by timing out
        let point = sched.wait(ids[0], lock, true).unwrap().unwrap();
        assert_eq!(point.generator.thread_candidates(), &[ids[0]]);

        assert!(matches!(
            sched.resume_wait(ids[0]).unwrap(),
            WaitResume::Reacquired { timed_out: true, .. }
        ));
        assert!(kernel.heap.monitor(lock).unwrap().waiting_threads().is_empty());
    }

    #[test]
    fn test_untimed_lone_wait_is_deadlock() {
        let (mut kernel, ids, lock) = kernel(1);
        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[0], lock).unwrap();
        assert!(sched.wait(ids[0], lock, false).unwrap().is_none());
        assert!(kernel.runnable_threads().is_empty());
    }

    #[test]
    fn test_interrupt_wakes_waiter() {
        let (mut kernel, ids, lock) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[1], lock).unwrap();
        sched.wait(ids[1], lock, false).unwrap();

        sched.interrupt(ids[0], ids[1]).unwrap();
        assert_eq!(state(&kernel, ids[1]), ThreadState::Interrupted);
        assert!(kernel.is_thread_runnable(ids[1]));

        let mut sched = Scheduler::new(&mut kernel);
        assert!(matches!(
            sched.resume_wait(ids[1]).unwrap(),
            WaitResume::Reacquired { interrupted: true, .. }
        ));
        assert!(!kernel.thread(ids[1]).unwrap().is_interrupted());
    }

    #[test]
    fn test_terminate_releases_locks_and_wakes_joiners() {
        let (mut kernel, ids, lock) = kernel(2);
        let thread_obj = kernel.thread(ids[1]).unwrap().thread_object();
        let mut sched = Scheduler::new(&mut kernel);

        // t0 joins t1
        sched.enter_monitor(ids[0], thread_obj).unwrap();
        sched.wait(ids[0], thread_obj, false).unwrap();
        sched.enter_monitor(ids[1], lock).unwrap();

        let point = sched.terminate(ids[1]).unwrap().unwrap();
        assert!(point.mandatory);
        assert_eq!(point.generator.thread_candidates(), &[ids[0]]);
        assert!(kernel.heap.monitor(lock).unwrap().is_free());
        assert_eq!(state(&kernel, ids[1]), ThreadState::Terminated);
        assert_eq!(state(&kernel, ids[0]), ThreadState::Unblocked);
    }

    #[test]
    fn test_sleep_and_wake() {
        let (mut kernel, ids, _) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        let point = sched.sleep(ids[0]).unwrap().unwrap();
        assert_eq!(point.generator.thread_candidates(), &[ids[0], ids[1]]);
        assert!(!sched.wake(ids[0]).unwrap());
        assert_eq!(state(&kernel, ids[0]), ThreadState::Running);
    }

    #[test]
    fn test_self_suspend_is_mandatory_switch() {
        let (mut kernel, ids, _) = kernel(2);
        let mut sched = Scheduler::new(&mut kernel);
        let point = sched.suspend(ids[0], ids[0]).unwrap().unwrap();
        assert!(point.mandatory);
        assert_eq!(point.generator.thread_candidates(), &[ids[1]]);
        assert!(sched.resume(ids[1], ids[0]).unwrap().is_some());
    }
}
