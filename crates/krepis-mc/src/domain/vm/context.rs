//! Execution context handed to the interpreter for one instruction
//!
//! Bundles mutable access to the kernel, the system state and the
//! generator arena for exactly one thread, and exposes the engine
//! operations an instruction may trigger: registering decisions, reading
//! them back, and driving the thread state machine.

use crate::domain::choice::{CgArena, CgHandle, ChoiceGenerator, ChoiceValue, SchedulingReason};
use crate::domain::error::{ExplorerError, ExplorerResult};
use crate::domain::heap::{Heap, ObjRef};
use crate::domain::search::SearchContext;
use crate::domain::state::{KernelState, Registration, StateId, SystemState};
use crate::domain::threads::{
    Frame, MonitorEntry, NotifyOutcome, Scheduler, SchedulingPoint, ThreadId, ThreadInfo, WaitResume,
};

/// What the interpreter should do after a blocking-capable operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Go on with the next instruction
    Proceed,
    /// Return the same pc; the instruction runs again in a later transition
    Reexecute,
}

impl Continuation {
    /// Pick the pc to return from `execute_one_instruction`
    pub fn next_pc(self, pc: usize) -> usize {
        match self {
            Self::Proceed => pc + 1,
            Self::Reexecute => pc,
        }
    }
}

/// Mutable view of the engine for one instruction of one thread
pub struct ExecutionContext<'a> {
    kernel: &'a mut KernelState,
    system: &'a mut SystemState,
    arena: &'a mut CgArena,
    search: &'a mut SearchContext,
    output: &'a mut String,
    state_id: Option<StateId>,
    thread: ThreadId,
    first_step: bool,
    folded: bool,
}

impl<'a> ExecutionContext<'a> {
    /// Context for `thread`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel: &'a mut KernelState,
        system: &'a mut SystemState,
        arena: &'a mut CgArena,
        search: &'a mut SearchContext,
        output: &'a mut String,
        state_id: Option<StateId>,
        thread: ThreadId,
        first_step: bool,
    ) -> Self {
        Self {
            kernel,
            system,
            arena,
            search,
            output,
            state_id,
            thread,
            first_step,
            folded: false,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // State Access
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Executing thread
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// First instruction of the transition (re-execution of the decision
    /// point, or the first instruction after a folded decision)
    pub fn is_first_step(&self) -> bool {
        self.first_step
    }

    /// Whether a decision was folded into the transition during this step
    pub fn folded(&self) -> bool {
        self.folded
    }

    /// Read-only kernel
    pub fn kernel(&self) -> &KernelState {
        self.kernel
    }

    /// Heap
    pub fn heap(&self) -> &Heap {
        &self.kernel.heap
    }

    /// Modifiable heap
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.kernel.heap
    }

    /// Load a class, returning the object that holds its statics
    pub fn load_class(&mut self, name: &str, num_statics: usize) -> ObjRef {
        let kernel = &mut *self.kernel;
        kernel.classes.load(&mut kernel.heap, name, num_statics)
    }

    /// Executing thread's bookkeeping
    pub fn thread_info(&self) -> ExplorerResult<&ThreadInfo> {
        Ok(self.kernel.thread(self.thread)?)
    }

    /// Any thread's bookkeeping (`None` once released)
    pub fn thread_info_of(&self, id: ThreadId) -> Option<&ThreadInfo> {
        self.kernel.threads.try_get(id)
    }

    /// Innermost frame of the executing thread
    pub fn frame(&self) -> ExplorerResult<&Frame> {
        Ok(self.thread_info()?.top_frame()?)
    }

    /// Modifiable innermost frame
    pub fn frame_mut(&mut self) -> ExplorerResult<&mut Frame> {
        Ok(self.kernel.thread_mut(self.thread)?.top_frame_mut()?)
    }

    /// Append program output to the transition
    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Program fault raised by the executing thread
    pub fn fault(&self, message: impl Into<String>) -> ExplorerError {
        ExplorerError::program_fault(self.thread, message)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Decisions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Register a data or thread decision
    ///
    /// Generators without a creator are attributed to the executing thread.
    pub fn register_choice_generator(&mut self, cg: ChoiceGenerator) -> ExplorerResult<Registration> {
        let mut cg = self.prepare(cg);
        self.search.randomize(&mut cg);
        let registration = self.system.set_next_choice_generator(self.arena, cg, self.state_id);
        if matches!(registration, Registration::Folded(_)) {
            self.folded = true;
        }
        Ok(registration)
    }

    /// Register a decision the thread cannot continue without
    pub fn register_mandatory(&mut self, cg: ChoiceGenerator) -> ExplorerResult<CgHandle> {
        let mut cg = self.prepare(cg);
        self.search.randomize(&mut cg);
        Ok(self
            .system
            .set_mandatory_next_choice_generator(self.arena, cg, self.state_id)?)
    }

    fn prepare(&self, cg: ChoiceGenerator) -> ChoiceGenerator {
        if cg.creator().is_some() {
            cg
        } else {
            cg.with_creator(self.thread)
        }
    }

    fn register_point(&mut self, point: Option<SchedulingPoint>) -> ExplorerResult<bool> {
        match point {
            None => Ok(false),
            Some(SchedulingPoint { generator, mandatory: true }) => {
                self.register_mandatory(generator)?;
                Ok(true)
            }
            Some(SchedulingPoint { generator, mandatory: false }) => {
                Ok(matches!(self.register_choice_generator(generator)?, Registration::Pending(_)))
            }
        }
    }

    /// Choice of the innermost current generator
    pub fn current_choice(&self) -> ExplorerResult<ChoiceValue> {
        Ok(self.system.current_choice(self.arena)?)
    }

    /// Decision made by the innermost current generator tagged `id` that
    /// this thread registered
    pub fn choice_for(&self, id: &str) -> ExplorerResult<Option<ChoiceValue>> {
        if self.system.cur_cg().is_none() {
            return Ok(None);
        }
        for handle in self.system.current_chain(self.arena)?.into_iter().rev() {
            let cg = self.arena.get(handle)?;
            if cg.id() == id && cg.creator() == Some(self.thread) {
                return Ok(Some(cg.current_choice()?));
            }
        }
        Ok(None)
    }

    /// Integer decision read on re-execution, registered otherwise
    ///
    /// Returns `Some(value)` once decided; `None` means the instruction
    /// must be re-executed (also when the step is ignored and nothing was
    /// registered).
    pub fn choose(&mut self, cg: ChoiceGenerator) -> ExplorerResult<Option<ChoiceValue>> {
        if self.first_step {
            if let Some(value) = self.choice_for(cg.id())? {
                return Ok(Some(value));
            }
        }
        match self.register_choice_generator(cg)? {
            Registration::Folded(handle) => Ok(Some(self.arena.get(handle)?.current_choice()?)),
            Registration::Pending(_) | Registration::Rejected => Ok(None),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Hints
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Prune the state reached by this transition
    pub fn set_ignored(&mut self) {
        self.system.set_ignored(true);
    }

    /// Treat the reached state as new even if seen before
    pub fn set_forced(&mut self) {
        self.system.set_forced(true);
    }

    /// Search hint
    pub fn set_interesting(&mut self) {
        self.system.set_interesting(true);
    }

    /// Search hint
    pub fn set_boring(&mut self) {
        self.system.set_boring(true);
    }

    /// Keep hint flags for one more transition
    pub fn retain_hints(&mut self) {
        self.system.retain_hints(true);
    }

    /// Enter an atomic section
    pub fn begin_atomic(&mut self) {
        self.system.enter_atomic();
    }

    /// Leave an atomic section
    pub fn end_atomic(&mut self) -> ExplorerResult<()> {
        Ok(self.system.exit_atomic()?)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Threads
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Create a thread in state `New` with its own thread object
    pub fn create_thread(&mut self, name: &str, daemon: bool, entry: Frame) -> ThreadId {
        let thread_object = self.kernel.heap.allocate("Thread", 0);
        self.kernel.threads.create(name, daemon, thread_object, entry)
    }

    /// Start `target`; a switch may follow
    pub fn start_thread(&mut self, target: ThreadId) -> ExplorerResult<Continuation> {
        let point = Scheduler::new(self.kernel).start(self.thread, target)?;
        self.register_point(point)?;
        Ok(Continuation::Proceed)
    }

    /// Scheduling point before entering `obj`
    ///
    /// Skipped on the first step so the re-executed instruction proceeds.
    pub fn monitor_enter_point(&mut self, obj: ObjRef) -> ExplorerResult<Continuation> {
        if self.first_step {
            return Ok(Continuation::Proceed);
        }
        let point = Scheduler::new(self.kernel).monitor_enter_point(self.thread, obj)?;
        Ok(if self.register_point(point)? {
            Continuation::Reexecute
        } else {
            Continuation::Proceed
        })
    }

    /// Take the monitor of `obj`, or block
    pub fn enter_monitor(&mut self, obj: ObjRef) -> ExplorerResult<Continuation> {
        let (entry, point) = Scheduler::new(self.kernel).enter_monitor(self.thread, obj)?;
        self.register_point(point)?;
        Ok(match entry {
            MonitorEntry::Acquired => Continuation::Proceed,
            MonitorEntry::Blocked => Continuation::Reexecute,
        })
    }

    /// Release one recursion level of `obj`
    pub fn exit_monitor(&mut self, obj: ObjRef) -> ExplorerResult<()> {
        let point = Scheduler::new(self.kernel).exit_monitor(self.thread, obj)?;
        self.register_point(point)?;
        Ok(())
    }

    /// Whether the executing thread owns `obj`
    pub fn holds_lock(&self, obj: ObjRef) -> ExplorerResult<bool> {
        Ok(self.kernel.heap.monitor(obj)?.is_held_by(self.thread))
    }

    /// Whether the executing thread is resuming from `wait()`
    pub fn is_resuming_wait(&self) -> ExplorerResult<bool> {
        Ok(self.thread_info()?.lock_count_to_restore().is_some())
    }

    /// Enter `wait()` on `obj` (caller checked ownership)
    pub fn wait(&mut self, obj: ObjRef, timed: bool) -> ExplorerResult<Continuation> {
        let point = Scheduler::new(self.kernel).wait(self.thread, obj, timed)?;
        self.register_point(point)?;
        Ok(Continuation::Reexecute)
    }

    /// Finish a `wait()`: reacquire or block again
    pub fn resume_wait(&mut self) -> ExplorerResult<(Continuation, WaitResume)> {
        let resume = Scheduler::new(self.kernel).resume_wait(self.thread)?;
        match &resume {
            WaitResume::Reacquired { .. } => Ok((Continuation::Proceed, resume)),
            WaitResume::Blocked(point) => {
                self.register_point(point.clone())?;
                Ok((Continuation::Reexecute, resume))
            }
        }
    }

    /// Wake one waiter of `obj` (caller checked ownership)
    pub fn notify(&mut self, obj: ObjRef) -> ExplorerResult<Continuation> {
        let chosen = if self.first_step {
            self.choice_for(SchedulingReason::Notify.id())?
                .and_then(ChoiceValue::as_thread)
        } else {
            None
        };
        match Scheduler::new(self.kernel).notify(self.thread, obj, chosen)? {
            NotifyOutcome::NoWaiter | NotifyOutcome::Notified(_) => Ok(Continuation::Proceed),
            NotifyOutcome::Choice(point) => {
                self.register_point(Some(point))?;
                Ok(Continuation::Reexecute)
            }
        }
    }

    /// Wake every waiter of `obj` (caller checked ownership)
    pub fn notify_all(&mut self, obj: ObjRef) -> ExplorerResult<Vec<ThreadId>> {
        Ok(Scheduler::new(self.kernel).notify_all(self.thread, obj)?)
    }

    /// Interrupt `target`
    pub fn interrupt(&mut self, target: ThreadId) -> ExplorerResult<()> {
        let point = Scheduler::new(self.kernel).interrupt(self.thread, target)?;
        self.register_point(point)?;
        Ok(())
    }

    /// Go to sleep; `Reexecute` if other threads get to run first
    pub fn sleep(&mut self) -> ExplorerResult<Continuation> {
        let point = Scheduler::new(self.kernel).sleep(self.thread)?;
        if self.register_point(point)? {
            return Ok(Continuation::Reexecute);
        }
        Scheduler::new(self.kernel).wake(self.thread)?;
        Ok(Continuation::Proceed)
    }

    /// Wake from sleep; returns whether the sleep was interrupted
    pub fn wake(&mut self) -> ExplorerResult<bool> {
        Ok(Scheduler::new(self.kernel).wake(self.thread)?)
    }

    /// Offer the processor to the other runnable threads
    pub fn yield_point(&mut self) -> ExplorerResult<Continuation> {
        if self.first_step {
            return Ok(Continuation::Proceed);
        }
        let point = Scheduler::new(self.kernel).yield_point(self.thread);
        Ok(if self.register_point(point)? {
            Continuation::Reexecute
        } else {
            Continuation::Proceed
        })
    }

    /// Scheduling point before accessing shared object `obj`
    pub fn shared_access(&mut self, obj: ObjRef) -> ExplorerResult<Continuation> {
        if self.first_step {
            return Ok(Continuation::Proceed);
        }
        let point = Scheduler::new(self.kernel).shared_access_point(self.thread, obj);
        Ok(if self.register_point(point)? {
            Continuation::Reexecute
        } else {
            Continuation::Proceed
        })
    }

    /// Suspend `target`
    pub fn suspend(&mut self, target: ThreadId) -> ExplorerResult<()> {
        let point = Scheduler::new(self.kernel).suspend(self.thread, target)?;
        self.register_point(point)?;
        Ok(())
    }

    /// Resume `target`
    pub fn resume(&mut self, target: ThreadId) -> ExplorerResult<()> {
        let point = Scheduler::new(self.kernel).resume(self.thread, target)?;
        self.register_point(point)?;
        Ok(())
    }
}
