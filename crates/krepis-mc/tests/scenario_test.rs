//! Integration Tests: built-in scenarios under depth-first search
//!
//! Each scenario has a known verdict. These tests run complete searches and
//! check verdicts, deadlock diagnoses, limits and cancellation.

use krepis_mc::adapters::script::scenarios::{self, SCENARIOS};
use krepis_mc::adapters::script::{Op, Operand, Program, ScriptInterpreter};
use krepis_mc::domain::search::report::ViolationKind;
use krepis_mc::domain::{CancelToken, ExplorerBuilder, SearchOutcome, ThreadId};

fn complete_search(name: &str) -> krepis_mc::domain::SearchReport {
    ExplorerBuilder::new()
        .stop_on_first_error(false)
        .run(scenarios::by_name(name).unwrap())
        .unwrap()
}

mod verdict_tests {
    use super::*;

    #[test]
    fn test_every_scenario_matches_its_verdict() {
        for scenario in SCENARIOS {
            let report = ExplorerBuilder::new().run(scenario.interpreter()).unwrap();
            assert_eq!(
                report.has_violations(),
                scenario.has_violation,
                "{}: {report}",
                scenario.name
            );
            let expected = if scenario.has_violation {
                SearchOutcome::ErrorFound
            } else {
                SearchOutcome::Completed
            };
            assert_eq!(report.outcome, expected, "{}", scenario.name);
        }
    }

    #[test]
    fn test_racy_counter_reports_assertion() {
        let report = ExplorerBuilder::new().run(scenarios::by_name("racy-counter").unwrap()).unwrap();
        let violation = report.first_violation().unwrap();
        match &violation.kind {
            ViolationKind::UncaughtException { thread, message } => {
                assert_eq!(*thread, ThreadId(0));
                assert!(message.contains("AssertionError"), "{message}");
            }
            other => panic!("unexpected violation: {other:?}"),
        }
        assert_eq!(violation.depth, violation.trail.len());
        assert_eq!(violation.choice_trace.len(), violation.trail.len());
    }

    #[test]
    fn test_choices_fails_only_for_one_combination() {
        let report = complete_search("choices");
        assert_eq!(report.outcome, SearchOutcome::Completed);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].summary().contains("x == 2 && flag"));
    }

    #[test]
    fn test_atomic_increments_are_not_racy() {
        let worker = vec![
            Op::AtomicBegin,
            Op::Load { var: 0, reg: 0 },
            Op::Add {
                reg: 0,
                value: Operand::Const(1),
            },
            Op::Store {
                var: 0,
                src: Operand::Reg(0),
            },
            Op::AtomicEnd,
        ];
        let program = Program::new("atomic-counter")
            .vars(1)
            .thread(
                "main",
                vec![
                    Op::Start(1),
                    Op::Start(2),
                    Op::Join(1),
                    Op::Join(2),
                    Op::Load { var: 0, reg: 0 },
                    Op::Assert { reg: 0, expected: 2 },
                ],
            )
            .thread("w1", worker.clone())
            .thread("w2", worker);

        let report = ExplorerBuilder::new().run(ScriptInterpreter::new(program)).unwrap();
        assert_eq!(report.outcome, SearchOutcome::Completed);
        assert!(!report.has_violations());
    }

    #[test]
    fn test_ignored_path_is_pruned() {
        let program = Program::new("ignored").thread(
            "main",
            vec![
                Op::ChooseInt { reg: 0, min: 0, max: 2 },
                Op::IgnoreIf { reg: 0, value: 2 },
                Op::Assert { reg: 0, expected: 2 },
            ],
        );
        // every surviving path fails the assertion except the ignored one
        let report = ExplorerBuilder::new()
            .stop_on_first_error(false)
            .run(ScriptInterpreter::new(program))
            .unwrap();
        assert_eq!(report.violations.len(), 2);
        assert!(report.stats.explorer.ignored_states >= 1);
    }
}

mod deadlock_tests {
    use super::*;

    fn deadlock_cycles(name: &str) -> Vec<Vec<ThreadId>> {
        let report = ExplorerBuilder::new().run(scenarios::by_name(name).unwrap()).unwrap();
        assert!(report.found_deadlock(), "{report}");
        match &report.first_violation().unwrap().kind {
            ViolationKind::Deadlock { info } => info.cycles.clone(),
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn test_abba_cycle() {
        let cycles = deadlock_cycles("abba");
        assert_eq!(cycles.len(), 1);
        let mut cycle = cycles[0].clone();
        cycle.sort();
        assert_eq!(cycle, vec![ThreadId(1), ThreadId(2)]);
    }

    #[test]
    fn test_dining_philosophers_cycle() {
        let cycles = deadlock_cycles("dining-philosophers");
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn test_deadlocks_can_be_ignored() {
        let report = ExplorerBuilder::new()
            .config(krepis_mc::domain::ExplorerConfig::default().with_report_deadlocks(false))
            .run(scenarios::by_name("abba").unwrap())
            .unwrap();
        assert_eq!(report.outcome, SearchOutcome::Completed);
        assert!(!report.has_violations());
    }
}

mod scheduling_tests {
    use super::*;
    use krepis_mc::domain::vm::Explorer;
    use krepis_mc::domain::vm::Interpreter;

    /// Largest NOTIFY generator seen on any path
    fn notify_sizes<I: Interpreter>(ex: &mut Explorer<I>) -> Vec<usize> {
        let mut sizes = Vec::new();
        loop {
            if ex.forward().unwrap() {
                if let Some(t) = ex.trail().last() {
                    sizes.extend(t.choices.iter().filter(|c| c.id == "NOTIFY").map(|c| c.total));
                }
                if ex.is_new_state() && !ex.is_end_state() {
                    continue;
                }
            }
            if !ex.backtrack() {
                break;
            }
        }
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    #[test]
    fn test_notify_chooses_among_waiters() {
        let mut ex = ExplorerBuilder::new()
            .build(scenarios::by_name("notify-fanout").unwrap())
            .unwrap();
        let sizes = notify_sizes(&mut ex);
        assert!(sizes.contains(&3), "{sizes:?}");
        assert!(sizes.contains(&2), "{sizes:?}");
    }

    #[test]
    fn test_same_states_under_any_seed() {
        let plain = complete_search("producer-consumer");
        for seed in [1, 2, 3] {
            let seeded = ExplorerBuilder::new()
                .seed(seed)
                .stop_on_first_error(false)
                .run(scenarios::by_name("producer-consumer").unwrap())
                .unwrap();
            assert_eq!(seeded.stats.visited_states, plain.stats.visited_states);
            assert_eq!(seeded.seed, Some(seed));
        }
    }

    #[test]
    fn test_short_transitions_reach_same_verdict() {
        for scenario in SCENARIOS {
            for max in [1, 2] {
                let report = ExplorerBuilder::new()
                    .max_transition_length(Some(max))
                    .run(scenario.interpreter())
                    .unwrap();
                assert_eq!(
                    report.has_violations(),
                    scenario.has_violation,
                    "{} with max_transition_length = {max}",
                    scenario.name
                );
            }
        }
    }
}

mod limit_tests {
    use super::*;

    #[test]
    fn test_state_limit() {
        let report = ExplorerBuilder::new()
            .max_states(3)
            .run(scenarios::by_name("producer-consumer").unwrap())
            .unwrap();
        assert_eq!(report.outcome, SearchOutcome::StateLimitReached);
        assert!(report.stats.visited_states >= 3);
    }

    #[test]
    fn test_depth_limit_hides_deep_violation() {
        let report = ExplorerBuilder::new()
            .depth_limit(2)
            .run(scenarios::by_name("racy-counter").unwrap())
            .unwrap();
        assert_eq!(report.outcome, SearchOutcome::Completed);
        assert!(!report.has_violations());
        assert!(report.stats.depth_pruned > 0);
        assert!(report.stats.explorer.max_depth <= 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let report = ExplorerBuilder::new()
            .cancel_token(token)
            .run(scenarios::by_name("producer-consumer").unwrap())
            .unwrap();
        assert_eq!(report.outcome, SearchOutcome::Cancelled);
    }

    #[test]
    fn test_report_serializes() {
        let report = ExplorerBuilder::new().run(scenarios::by_name("abba").unwrap()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "error_found");
        assert_eq!(json["violations"][0]["kind"], "deadlock");
    }
}
