//! Script programs: a tiny instruction set for concurrent test programs
//!
//! A program has a fixed number of shared variables (statics of class
//! `Main`), a fixed number of lock objects and a list of threads. Thread 0
//! is `main`; every other thread is created up front in state `New` and
//! started with [`Op::Start`]. Each thread has its own code and register
//! file (`r0..rN`).

use std::fmt;

/// Register index into the thread's frame
pub type Reg = usize;

/// Immediate or register operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Literal value
    Const(i64),
    /// Register contents
    Reg(Reg),
}

/// One instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// `monitorenter` on lock `n`
    Lock(usize),
    /// `monitorexit` on lock `n`
    Unlock(usize),
    /// `wait()` on lock `n`
    Wait(usize),
    /// `wait(timeout)` on lock `n`
    TimedWait(usize),
    /// `notify()` on lock `n`
    Notify(usize),
    /// `notifyAll()` on lock `n`
    NotifyAll(usize),
    /// `reg = vars[var]`
    Load { var: usize, reg: Reg },
    /// `vars[var] = src`
    Store { var: usize, src: Operand },
    /// `reg += value`
    Add { reg: Reg, value: Operand },
    /// `reg = value`
    Set { reg: Reg, value: i64 },
    /// `reg = choose(min..=max)`
    ChooseInt { reg: Reg, min: i64, max: i64 },
    /// `reg = choose(false, true)` as 0 / 1
    ChooseBool { reg: Reg },
    /// `Thread.yield()`
    Yield,
    /// `Thread.sleep(..)`
    Sleep,
    /// Start thread `n`
    Start(usize),
    /// Wait until thread `n` terminated
    Join(usize),
    /// Interrupt thread `n`
    Interrupt(usize),
    /// Suspend thread `n`
    Suspend(usize),
    /// Resume thread `n`
    Resume(usize),
    /// Enter an atomic section
    AtomicBegin,
    /// Leave an atomic section
    AtomicEnd,
    /// Fail with `AssertionError` unless `reg == expected`
    Assert { reg: Reg, expected: i64 },
    /// Prune the path if `reg == value`
    IgnoreIf { reg: Reg, value: i64 },
    /// Unconditional jump
    Jump(usize),
    /// Jump if `reg == value`
    JumpIfEq { reg: Reg, value: i64, target: usize },
    /// Jump if `reg != value`
    JumpIfNe { reg: Reg, value: i64, target: usize },
    /// Emit text
    Print(String),
    /// Emit a register
    PrintReg(Reg),
    /// Throw an uncaught exception
    Fail(String),
}

/// One thread of a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    /// Thread name
    pub name: String,
    /// Daemon threads do not keep the program alive
    pub daemon: bool,
    /// Instructions
    pub code: Vec<Op>,
}

/// Problems found by [`Program::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    /// No thread at all
    #[error("program '{0}' has no main thread")]
    NoMainThread(String),
    /// An instruction refers to something that does not exist
    #[error("thread '{thread}' pc {pc}: {reason}")]
    BadOperand {
        /// Thread name
        thread: String,
        /// Offending instruction
        pc: usize,
        /// What is wrong
        reason: String,
    },
}

/// A complete script program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: String,
    vars: usize,
    locks: usize,
    registers: usize,
    threads: Vec<ThreadSpec>,
}

impl Program {
    /// Empty program with four registers per thread
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vars: 0,
            locks: 0,
            registers: 4,
            threads: Vec::new(),
        }
    }

    /// Number of shared variables
    pub fn vars(mut self, n: usize) -> Self {
        self.vars = n;
        self
    }

    /// Number of lock objects
    pub fn locks(mut self, n: usize) -> Self {
        self.locks = n;
        self
    }

    /// Registers per thread
    pub fn registers(mut self, n: usize) -> Self {
        self.registers = n;
        self
    }

    /// Add a thread; the first one added is `main`
    pub fn thread(mut self, name: &str, code: Vec<Op>) -> Self {
        self.threads.push(ThreadSpec {
            name: name.to_string(),
            daemon: false,
            code,
        });
        self
    }

    /// Add a daemon thread
    pub fn daemon(mut self, name: &str, code: Vec<Op>) -> Self {
        self.threads.push(ThreadSpec {
            name: name.to_string(),
            daemon: true,
            code,
        });
        self
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of shared variables
    pub fn num_vars(&self) -> usize {
        self.vars
    }

    /// Number of lock objects
    pub fn num_locks(&self) -> usize {
        self.locks
    }

    /// Registers per thread
    pub fn num_registers(&self) -> usize {
        self.registers
    }

    /// Threads, `main` first
    pub fn threads(&self) -> &[ThreadSpec] {
        &self.threads
    }

    /// Check every operand against the declared sizes
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.threads.is_empty() {
            return Err(ProgramError::NoMainThread(self.name.clone()));
        }
        for spec in &self.threads {
            for (pc, op) in spec.code.iter().enumerate() {
                if let Some(reason) = self.check(spec, op) {
                    return Err(ProgramError::BadOperand {
                        thread: spec.name.clone(),
                        pc,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    fn check(&self, spec: &ThreadSpec, op: &Op) -> Option<String> {
        let lock = |n: usize| (n >= self.locks).then(|| format!("lock {n} not declared"));
        let var = |n: usize| (n >= self.vars).then(|| format!("variable {n} not declared"));
        let reg = |r: Reg| (r >= self.registers).then(|| format!("register r{r} not declared"));
        let thread = |n: usize| (n >= self.threads.len()).then(|| format!("thread {n} not declared"));
        let target = |t: usize| (t > spec.code.len()).then(|| format!("jump target {t} out of range"));
        let operand = |o: Operand| match o {
            Operand::Const(_) => None,
            Operand::Reg(r) => reg(r),
        };

        match op {
            Op::Lock(n) | Op::Unlock(n) | Op::Wait(n) | Op::TimedWait(n) | Op::Notify(n) | Op::NotifyAll(n) => {
                lock(*n)
            }
            Op::Load { var: v, reg: r } => var(*v).or_else(|| reg(*r)),
            Op::Store { var: v, src } => var(*v).or_else(|| operand(*src)),
            Op::Add { reg: r, value } => reg(*r).or_else(|| operand(*value)),
            Op::Set { reg: r, .. }
            | Op::ChooseBool { reg: r }
            | Op::Assert { reg: r, .. }
            | Op::IgnoreIf { reg: r, .. }
            | Op::PrintReg(r) => reg(*r),
            Op::ChooseInt { reg: r, min, max } => reg(*r).or_else(|| (min > max).then(|| format!("empty range {min}..={max}"))),
            Op::Start(n) | Op::Join(n) | Op::Interrupt(n) | Op::Suspend(n) | Op::Resume(n) => thread(*n),
            Op::Jump(t) => target(*t),
            Op::JumpIfEq { reg: r, target: t, .. } | Op::JumpIfNe { reg: r, target: t, .. } => {
                reg(*r).or_else(|| target(*t))
            }
            Op::Yield | Op::Sleep | Op::AtomicBegin | Op::AtomicEnd | Op::Print(_) | Op::Fail(_) => None,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program {} (vars {}, locks {})", self.name, self.vars, self.locks)?;
        for (i, spec) in self.threads.iter().enumerate() {
            let kind = if spec.daemon { " daemon" } else { "" };
            writeln!(f, "  thread {i} '{}'{kind}", spec.name)?;
            for (pc, op) in spec.code.iter().enumerate() {
                writeln!(f, "    {pc:>3}: {op:?}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_declared_operands() {
        let program = Program::new("ok")
            .vars(1)
            .locks(1)
            .thread("main", vec![Op::Lock(0), Op::Load { var: 0, reg: 1 }, Op::Unlock(0), Op::Jump(3)]);
        assert!(program.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_problem() {
        let program = Program::new("bad")
            .locks(1)
            .thread("main", vec![Op::Lock(0), Op::Lock(2)]);
        assert_eq!(
            program.validate(),
            Err(ProgramError::BadOperand {
                thread: "main".into(),
                pc: 1,
                reason: "lock 2 not declared".into(),
            })
        );
        assert!(matches!(Program::new("empty").validate(), Err(ProgramError::NoMainThread(_))));
    }

    #[test]
    fn test_empty_choice_range_rejected() {
        let program = Program::new("range").thread("main", vec![Op::ChooseInt { reg: 0, min: 3, max: 1 }]);
        assert!(program.validate().is_err());
    }
}
