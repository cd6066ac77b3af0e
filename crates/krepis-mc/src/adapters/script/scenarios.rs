//! Built-in scenarios
//!
//! Small concurrent programs with known verdicts, used by the CLI, the
//! integration tests and the benchmarks.

use super::interpreter::ScriptInterpreter;
use super::program::{Op, Operand, Program};

/// A named program factory
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    /// Name used on the command line
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Whether a complete search finds a violation
    pub has_violation: bool,
    build: fn() -> Program,
}

impl Scenario {
    /// Fresh program
    pub fn program(&self) -> Program {
        (self.build)()
    }

    /// Fresh interpreter
    pub fn interpreter(&self) -> ScriptInterpreter {
        ScriptInterpreter::new(self.program())
    }
}

/// Every built-in scenario
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "abba",
        description: "two threads take two locks in opposite order",
        has_violation: true,
        build: abba,
    },
    Scenario {
        name: "racy-counter",
        description: "two unsynchronized increments of a shared counter",
        has_violation: true,
        build: racy_counter,
    },
    Scenario {
        name: "producer-consumer",
        description: "one-slot buffer guarded by wait/notify",
        has_violation: false,
        build: producer_consumer,
    },
    Scenario {
        name: "dining-philosophers",
        description: "three philosophers grabbing left fork first",
        has_violation: true,
        build: dining_philosophers,
    },
    Scenario {
        name: "notify-fanout",
        description: "three waiters woken by three notify() calls",
        has_violation: false,
        build: notify_fanout,
    },
    Scenario {
        name: "choices",
        description: "data choices with a failing combination",
        has_violation: true,
        build: choices,
    },
    Scenario {
        name: "interrupt-sleeper",
        description: "main interrupts a sleeping thread and joins it",
        has_violation: false,
        build: interrupt_sleeper,
    },
    Scenario {
        name: "daemon",
        description: "endless daemon thread does not keep the program alive",
        has_violation: false,
        build: daemon,
    },
];

/// Scenario by name
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Interpreter for the scenario `name`
pub fn by_name(name: &str) -> Option<ScriptInterpreter> {
    find(name).map(Scenario::interpreter)
}

/// Scenario names
pub fn names() -> impl Iterator<Item = &'static str> {
    SCENARIOS.iter().map(|s| s.name)
}

fn spawn_and_join(workers: usize) -> Vec<Op> {
    let mut code: Vec<Op> = (1..=workers).map(Op::Start).collect();
    code.extend((1..=workers).map(Op::Join));
    code
}

/// Lock-order inversion
pub fn abba() -> Program {
    Program::new("abba")
        .locks(2)
        .thread("main", spawn_and_join(2))
        .thread("t1", vec![Op::Lock(0), Op::Lock(1), Op::Unlock(1), Op::Unlock(0)])
        .thread("t2", vec![Op::Lock(1), Op::Lock(0), Op::Unlock(0), Op::Unlock(1)])
}

/// Lost update
pub fn racy_counter() -> Program {
    let worker = vec![
        Op::Load { var: 0, reg: 0 },
        Op::Add {
            reg: 0,
            value: Operand::Const(1),
        },
        Op::Store {
            var: 0,
            src: Operand::Reg(0),
        },
    ];
    let mut main = spawn_and_join(2);
    main.push(Op::Load { var: 0, reg: 0 });
    main.push(Op::Assert { reg: 0, expected: 2 });

    Program::new("racy-counter")
        .vars(1)
        .thread("main", main)
        .thread("w1", worker.clone())
        .thread("w2", worker)
}

/// Guarded one-slot buffer; `vars[0]` is the item, `vars[1]` the full flag
pub fn producer_consumer() -> Program {
    let producer = vec![
        Op::Lock(0),
        Op::Load { var: 1, reg: 0 },
        Op::JumpIfEq {
            reg: 0,
            value: 0,
            target: 5,
        },
        Op::Wait(0),
        Op::Jump(1),
        Op::Store {
            var: 0,
            src: Operand::Const(42),
        },
        Op::Store {
            var: 1,
            src: Operand::Const(1),
        },
        Op::Notify(0),
        Op::Unlock(0),
    ];
    let consumer = vec![
        Op::Lock(0),
        Op::Load { var: 1, reg: 0 },
        Op::JumpIfNe {
            reg: 0,
            value: 0,
            target: 5,
        },
        Op::Wait(0),
        Op::Jump(1),
        Op::Load { var: 0, reg: 1 },
        Op::Store {
            var: 1,
            src: Operand::Const(0),
        },
        Op::Notify(0),
        Op::Unlock(0),
        Op::Assert { reg: 1, expected: 42 },
    ];

    Program::new("producer-consumer")
        .vars(2)
        .locks(1)
        .thread("main", spawn_and_join(2))
        .thread("producer", producer)
        .thread("consumer", consumer)
}

/// Each philosopher takes fork `i`, then fork `i + 1`
pub fn dining_philosophers() -> Program {
    const N: usize = 3;
    let mut program = Program::new("dining-philosophers")
        .locks(N)
        .thread("main", spawn_and_join(N));
    for i in 0..N {
        let (left, right) = (i, (i + 1) % N);
        program = program.thread(
            &format!("philosopher-{i}"),
            vec![Op::Lock(left), Op::Lock(right), Op::Unlock(right), Op::Unlock(left)],
        );
    }
    program
}

/// Three waiters count themselves in `vars[0]`; main notifies once all wait
pub fn notify_fanout() -> Program {
    let waiter = vec![
        Op::Lock(0),
        Op::Load { var: 0, reg: 0 },
        Op::Add {
            reg: 0,
            value: Operand::Const(1),
        },
        Op::Store {
            var: 0,
            src: Operand::Reg(0),
        },
        Op::Wait(0),
        Op::Unlock(0),
    ];
    let mut main = vec![
        Op::Start(1),
        Op::Start(2),
        Op::Start(3),
        Op::Lock(0),
        Op::Load { var: 0, reg: 0 },
        Op::JumpIfEq {
            reg: 0,
            value: 3,
            target: 9,
        },
        Op::Unlock(0),
        Op::Yield,
        Op::Jump(3),
        Op::Notify(0),
        Op::Notify(0),
        Op::Notify(0),
        Op::Unlock(0),
    ];
    main.extend((1..=3).map(Op::Join));

    Program::new("notify-fanout")
        .vars(1)
        .locks(1)
        .thread("main", main)
        .thread("waiter-1", waiter.clone())
        .thread("waiter-2", waiter.clone())
        .thread("waiter-3", waiter)
}

/// Fails for `x == 2 && flag`
pub fn choices() -> Program {
    Program::new("choices").thread(
        "main",
        vec![
            Op::ChooseInt { reg: 0, min: 0, max: 2 },
            Op::ChooseBool { reg: 1 },
            Op::JumpIfNe {
                reg: 0,
                value: 2,
                target: 5,
            },
            Op::JumpIfEq {
                reg: 1,
                value: 0,
                target: 5,
            },
            Op::Fail("IllegalStateException: x == 2 && flag".into()),
            Op::PrintReg(0),
        ],
    )
}

/// Interrupted sleep
pub fn interrupt_sleeper() -> Program {
    Program::new("interrupt-sleeper")
        .thread("main", vec![Op::Start(1), Op::Interrupt(1), Op::Join(1)])
        .thread("sleeper", vec![Op::Sleep, Op::Print("awake".into())])
}

/// Daemon spinning forever next to a short main thread
pub fn daemon() -> Program {
    Program::new("daemon")
        .vars(1)
        .thread(
            "main",
            vec![
                Op::Start(1),
                Op::Store {
                    var: 0,
                    src: Operand::Const(1),
                },
            ],
        )
        .daemon("spinner", vec![Op::Yield, Op::Jump(0)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_validate() {
        for scenario in SCENARIOS {
            assert!(scenario.program().validate().is_ok(), "{}", scenario.name);
            assert_eq!(scenario.program().name(), scenario.name);
        }
    }

    #[test]
    fn test_lookup() {
        assert!(find("abba").is_some());
        assert!(by_name("nope").is_none());
        assert_eq!(names().count(), SCENARIOS.len());
    }
}
