//! Script interpreter: executes [`Program`]s under the explorer

use super::program::{Op, Operand, Program, Reg};
use crate::domain::choice::{ChoiceGenerator, ChoiceValue};
use crate::domain::error::{ExplorerError, ExplorerResult, InternalError};
use crate::domain::heap::ObjRef;
use crate::domain::state::KernelState;
use crate::domain::threads::{Frame, ThreadId, ThreadState, WaitResume};
use crate::domain::vm::{Continuation, ExecutionContext, Interpreter};
use std::sync::Arc;

/// Class holding the shared variables
pub const MAIN_CLASS: &str = "Main";

/// Objects allocated by `initialize`; fixed for the whole exploration
#[derive(Debug, Clone)]
struct Layout {
    statics: ObjRef,
    locks: Vec<ObjRef>,
    threads: Vec<ThreadId>,
}

/// [`Interpreter`] for script programs
#[derive(Debug, Clone)]
pub struct ScriptInterpreter {
    program: Arc<Program>,
    layout: Option<Layout>,
}

impl ScriptInterpreter {
    /// Interpreter for `program`
    pub fn new(program: Program) -> Self {
        Self {
            program: Arc::new(program),
            layout: None,
        }
    }

    /// Program being executed
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Object holding the shared variables (after initialization)
    pub fn statics(&self) -> Option<ObjRef> {
        self.layout.as_ref().map(|l| l.statics)
    }

    /// Thread id of program thread `n` (after initialization)
    pub fn thread_id(&self, n: usize) -> Option<ThreadId> {
        self.layout.as_ref().and_then(|l| l.threads.get(n).copied())
    }

    fn layout(&self) -> Result<&Layout, InternalError> {
        self.layout
            .as_ref()
            .ok_or_else(|| InternalError::Other("script interpreter not initialized".into()))
    }

    fn lock(&self, n: usize) -> Result<ObjRef, InternalError> {
        self.layout()?
            .locks
            .get(n)
            .copied()
            .ok_or_else(|| InternalError::Other(format!("lock {n} not declared")))
    }

    fn target(&self, n: usize) -> Result<ThreadId, InternalError> {
        self.layout()?
            .threads
            .get(n)
            .copied()
            .ok_or_else(|| InternalError::Other(format!("thread {n} not declared")))
    }

    fn code_index(&self, thread: ThreadId) -> Result<usize, InternalError> {
        self.layout()?
            .threads
            .iter()
            .position(|t| *t == thread)
            .ok_or(InternalError::UnknownThread(thread))
    }
}

fn reg(ctx: &ExecutionContext<'_>, r: Reg) -> ExplorerResult<i64> {
    ctx.frame()?
        .locals
        .get(r)
        .copied()
        .ok_or_else(|| InternalError::Other(format!("register r{r} out of range")).into())
}

fn set_reg(ctx: &mut ExecutionContext<'_>, r: Reg, value: i64) -> ExplorerResult<()> {
    let slot = ctx
        .frame_mut()?
        .locals
        .get_mut(r)
        .ok_or_else(|| InternalError::Other(format!("register r{r} out of range")))?;
    *slot = value;
    Ok(())
}

fn operand(ctx: &ExecutionContext<'_>, o: Operand) -> ExplorerResult<i64> {
    match o {
        Operand::Const(v) => Ok(v),
        Operand::Reg(r) => reg(ctx, r),
    }
}

fn illegal_monitor_state(ctx: &ExecutionContext<'_>, obj: ObjRef) -> ExplorerError {
    ctx.fault(format!("IllegalMonitorStateException: {obj} not owned"))
}

impl Interpreter for ScriptInterpreter {
    fn initialize(&mut self, kernel: &mut KernelState) -> Result<ThreadId, ExplorerError> {
        self.program
            .validate()
            .map_err(|e| InternalError::Other(e.to_string()))?;

        let statics = kernel.classes.load(&mut kernel.heap, MAIN_CLASS, self.program.num_vars());
        kernel.classes.mark_initialized(MAIN_CLASS);
        let locks = (0..self.program.num_locks())
            .map(|_| kernel.heap.allocate("Lock", 0))
            .collect();
        let threads: Vec<ThreadId> = self
            .program
            .threads()
            .iter()
            .map(|spec| {
                let thread_object = kernel.heap.allocate("Thread", 0);
                let entry = Frame::new(0, self.program.num_registers());
                kernel.threads.create(&spec.name, spec.daemon, thread_object, entry)
            })
            .collect();
        let main = threads
            .first()
            .copied()
            .ok_or_else(|| InternalError::Other("program has no main thread".into()))?;

        self.layout = Some(Layout { statics, locks, threads });
        Ok(main)
    }

    fn execute_one_instruction(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Option<usize>, ExplorerError> {
        let pc = ctx.frame()?.pc;
        let code = &self.program.threads()[self.code_index(ctx.thread())?].code;
        let Some(op) = code.get(pc) else {
            return Ok(None);
        };
        let statics = self.layout()?.statics;

        let next = match op {
            Op::Lock(n) => {
                let obj = self.lock(*n)?;
                if ctx.monitor_enter_point(obj)? == Continuation::Reexecute {
                    return Ok(Some(pc));
                }
                ctx.enter_monitor(obj)?.next_pc(pc)
            }
            Op::Unlock(n) => {
                let obj = self.lock(*n)?;
                if !ctx.holds_lock(obj)? {
                    return Err(illegal_monitor_state(ctx, obj));
                }
                ctx.exit_monitor(obj)?;
                pc + 1
            }
            Op::Wait(n) | Op::TimedWait(n) => {
                let obj = self.lock(*n)?;
                if ctx.is_resuming_wait()? {
                    ctx.resume_wait()?.0.next_pc(pc)
                } else if !ctx.holds_lock(obj)? {
                    return Err(illegal_monitor_state(ctx, obj));
                } else {
                    ctx.wait(obj, matches!(op, Op::TimedWait(_)))?.next_pc(pc)
                }
            }
            Op::Notify(n) => {
                let obj = self.lock(*n)?;
                if !ctx.holds_lock(obj)? {
                    return Err(illegal_monitor_state(ctx, obj));
                }
                ctx.notify(obj)?.next_pc(pc)
            }
            Op::NotifyAll(n) => {
                let obj = self.lock(*n)?;
                if !ctx.holds_lock(obj)? {
                    return Err(illegal_monitor_state(ctx, obj));
                }
                ctx.notify_all(obj)?;
                pc + 1
            }
            Op::Load { var, reg: r } => {
                if ctx.shared_access(statics)? == Continuation::Reexecute {
                    return Ok(Some(pc));
                }
                let value = ctx.heap().field(statics, *var)?;
                set_reg(ctx, *r, value)?;
                pc + 1
            }
            Op::Store { var, src } => {
                if ctx.shared_access(statics)? == Continuation::Reexecute {
                    return Ok(Some(pc));
                }
                let value = operand(ctx, *src)?;
                ctx.heap_mut().set_field(statics, *var, value)?;
                pc + 1
            }
            Op::Add { reg: r, value } => {
                let sum = reg(ctx, *r)?.wrapping_add(operand(ctx, *value)?);
                set_reg(ctx, *r, sum)?;
                pc + 1
            }
            Op::Set { reg: r, value } => {
                set_reg(ctx, *r, *value)?;
                pc + 1
            }
            Op::ChooseInt { reg: r, min, max } => {
                match ctx.choose(ChoiceGenerator::int_interval("chooseInt", *min, *max, 1))? {
                    Some(ChoiceValue::Int(v)) => {
                        set_reg(ctx, *r, v)?;
                        pc + 1
                    }
                    Some(other) => return Err(kind_mismatch("chooseInt", other)),
                    None => pc,
                }
            }
            Op::ChooseBool { reg: r } => match ctx.choose(ChoiceGenerator::boolean("chooseBool"))? {
                Some(ChoiceValue::Bool(b)) => {
                    set_reg(ctx, *r, i64::from(b))?;
                    pc + 1
                }
                Some(other) => return Err(kind_mismatch("chooseBool", other)),
                None => pc,
            },
            Op::Yield => ctx.yield_point()?.next_pc(pc),
            Op::Sleep => {
                let state = ctx.thread_info()?.state();
                if matches!(state, ThreadState::Sleeping | ThreadState::Interrupted) {
                    ctx.wake()?;
                    pc + 1
                } else {
                    ctx.sleep()?.next_pc(pc)
                }
            }
            Op::Start(n) => {
                let target = self.target(*n)?;
                let state = ctx.thread_info_of(target).map(|t| t.state());
                if state != Some(ThreadState::New) {
                    return Err(ctx.fault(format!("IllegalThreadStateException: {target} already started")));
                }
                ctx.start_thread(target)?.next_pc(pc)
            }
            Op::Join(n) => self.join(ctx, *n, pc)?,
            Op::Interrupt(n) => {
                let target = self.target(*n)?;
                if ctx.thread_info_of(target).map_or(false, |t| t.state().is_alive()) {
                    ctx.interrupt(target)?;
                }
                pc + 1
            }
            Op::Suspend(n) => {
                let target = self.target(*n)?;
                ctx.suspend(target)?;
                pc + 1
            }
            Op::Resume(n) => {
                let target = self.target(*n)?;
                ctx.resume(target)?;
                pc + 1
            }
            Op::AtomicBegin => {
                ctx.begin_atomic();
                pc + 1
            }
            Op::AtomicEnd => {
                ctx.end_atomic()?;
                pc + 1
            }
            Op::Assert { reg: r, expected } => {
                let actual = reg(ctx, *r)?;
                if actual != *expected {
                    return Err(ctx.fault(format!("AssertionError: r{r} = {actual}, expected {expected}")));
                }
                pc + 1
            }
            Op::IgnoreIf { reg: r, value } => {
                if reg(ctx, *r)? == *value {
                    ctx.set_ignored();
                }
                pc + 1
            }
            Op::Jump(target) => *target,
            Op::JumpIfEq { reg: r, value, target } => {
                if reg(ctx, *r)? == *value {
                    *target
                } else {
                    pc + 1
                }
            }
            Op::JumpIfNe { reg: r, value, target } => {
                if reg(ctx, *r)? == *value {
                    pc + 1
                } else {
                    *target
                }
            }
            Op::Print(text) => {
                ctx.print(text);
                pc + 1
            }
            Op::PrintReg(r) => {
                let value = reg(ctx, *r)?;
                ctx.print(&value.to_string());
                pc + 1
            }
            Op::Fail(message) => return Err(ctx.fault(message.clone())),
        };
        Ok(Some(next))
    }

    fn name(&self) -> &str {
        self.program.name()
    }
}

impl ScriptInterpreter {
    /// `join()`: wait on the target's thread object until it terminated
    ///
    /// Terminating threads notify all waiters on their thread object.
    /// Released threads count as terminated.
    fn join(&self, ctx: &mut ExecutionContext<'_>, n: usize, pc: usize) -> ExplorerResult<usize> {
        let target = self.target(n)?;
        let Some(info) = ctx.thread_info_of(target) else {
            return Ok(pc + 1);
        };
        let obj = info.thread_object();
        let alive = info.state().is_alive();

        if ctx.is_resuming_wait()? {
            return match ctx.resume_wait()? {
                (_, WaitResume::Reacquired { .. }) => {
                    ctx.exit_monitor(obj)?;
                    Ok(pc)
                }
                (cont, WaitResume::Blocked(_)) => Ok(cont.next_pc(pc)),
            };
        }
        if !alive {
            return Ok(pc + 1);
        }
        if ctx.enter_monitor(obj)? == Continuation::Reexecute {
            return Ok(pc);
        }
        Ok(ctx.wait(obj, false)?.next_pc(pc))
    }
}

fn kind_mismatch(id: &str, value: ChoiceValue) -> ExplorerError {
    InternalError::Other(format!("generator '{id}' produced {value}")).into()
}
