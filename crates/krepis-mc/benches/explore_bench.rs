//! Exploration Benchmark Suite
//!
//! # Scenarios
//!
//! 1. **Built-in scenarios**: complete searches, violations included
//! 2. **Dining philosophers**: state-space growth for N = 2..4
//! 3. **Checkpoints**: one forward/backtrack pair on a deep path
//! 4. **Randomization**: natural order against a seeded permutation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use krepis_mc::adapters::script::{scenarios, Op, Program, ScriptInterpreter};
use krepis_mc::domain::vm::Explorer;
use krepis_mc::domain::ExplorerBuilder;

// ============================================================================
// Helpers
// ============================================================================

fn philosophers(n: usize) -> Program {
    let mut main: Vec<Op> = (1..=n).map(Op::Start).collect();
    main.extend((1..=n).map(Op::Join));
    let mut program = Program::new("philosophers").locks(n).thread("main", main);
    for i in 0..n {
        let (left, right) = (i, (i + 1) % n);
        program = program.thread(
            &format!("p{i}"),
            vec![Op::Lock(left), Op::Lock(right), Op::Unlock(right), Op::Unlock(left)],
        );
    }
    program
}

fn exhaust(interpreter: ScriptInterpreter) -> usize {
    let report = ExplorerBuilder::new()
        .stop_on_first_error(false)
        .run(interpreter)
        .unwrap_or_else(|e| panic!("search failed: {e}"));
    report.stats.visited_states
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_scenarios(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios");

    for name in ["abba", "racy-counter", "producer-consumer", "notify-fanout"] {
        let scenario = scenarios::find(name).unwrap_or_else(|| panic!("unknown scenario {name}"));
        group.bench_function(name, |b| {
            b.iter(|| black_box(exhaust(scenario.interpreter())));
        });
    }

    group.finish();
}

fn bench_dining_philosophers(c: &mut Criterion) {
    let mut group = c.benchmark_group("dining_philosophers");
    group.sample_size(20);

    for n in [2, 3, 4].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter(|| black_box(exhaust(ScriptInterpreter::new(philosophers(n)))));
        });
    }

    group.finish();
}

fn descend(explorer: &mut Explorer<ScriptInterpreter>) {
    while explorer.depth() < 8 && explorer.forward().unwrap_or(false) && !explorer.is_end_state() {}
}

fn bench_checkpoint(c: &mut Criterion) {
    let mut explorer = ExplorerBuilder::new()
        .build(ScriptInterpreter::new(philosophers(3)))
        .unwrap_or_else(|e| panic!("build failed: {e}"));
    descend(&mut explorer);

    c.bench_function("checkpoint_forward_backtrack", |b| {
        b.iter(|| {
            if explorer.forward().unwrap_or(false) {
                explorer.backtrack();
            } else {
                // siblings exhausted: start over
                explorer.reset();
                descend(&mut explorer);
            }
            black_box(explorer.depth())
        });
    });
}

fn bench_randomization(c: &mut Criterion) {
    let mut group = c.benchmark_group("randomization");

    group.bench_function("natural", |b| {
        b.iter(|| black_box(exhaust(ScriptInterpreter::new(philosophers(3)))));
    });
    group.bench_function("seeded", |b| {
        b.iter(|| {
            let report = ExplorerBuilder::new()
                .seed(42)
                .stop_on_first_error(false)
                .run(ScriptInterpreter::new(philosophers(3)))
                .unwrap_or_else(|e| panic!("search failed: {e}"));
            black_box(report.stats.visited_states)
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_scenarios,
    bench_dining_philosophers,
    bench_checkpoint,
    bench_randomization
);

criterion_main!(benches);
