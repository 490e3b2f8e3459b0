use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use sweepdag::dag::{Graph, TaskOutcome};
use sweepdag::engine::{RecoveryController, Scenario};
use sweepdag_test_utils::all_strategies;
use sweepdag_test_utils::builders::{CallLog, GraphBuilder, fail, flaky, ok};

/// Dependency lists where task `i` may only depend on tasks `0..i`.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        picks.into_iter().map(|p| p % i).collect()
                    }
                })
                .collect()
        })
    })
}

fn task_name(i: usize) -> String {
    format!("task_{i}")
}

fn build_graph(
    deps: &[BTreeSet<usize>],
    log: &CallLog,
    action_for: impl Fn(&CallLog, &str, usize) -> sweepdag::Action,
) -> Graph {
    let mut builder = GraphBuilder::new();
    for (i, task_deps) in deps.iter().enumerate() {
        let name = task_name(i);
        let dep_names: Vec<String> = task_deps.iter().map(|d| task_name(*d)).collect();
        let dep_refs: Vec<&str> = dep_names.iter().map(String::as_str).collect();
        builder = builder.task(&name, action_for(log, &name, i), &dep_refs);
    }
    builder.build().expect("generated graphs are acyclic")
}

/// Whether task `i` should succeed: it is not failing itself and all its
/// dependencies succeed.
fn expected_success(deps: &[BTreeSet<usize>], failing: &BTreeSet<usize>) -> Vec<bool> {
    let mut succeeds = Vec::with_capacity(deps.len());
    for (i, task_deps) in deps.iter().enumerate() {
        let deps_ok = task_deps.iter().all(|d| succeeds[*d]);
        succeeds.push(deps_ok && !failing.contains(&i));
    }
    succeeds
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn single_pass_settles_every_task(
        deps in dag_strategy(10),
        failing_raw in proptest::collection::btree_set(0..10usize, 0..4),
    ) {
        let failing: BTreeSet<usize> =
            failing_raw.into_iter().filter(|i| *i < deps.len()).collect();
        let expected = expected_success(&deps, &failing);

        for config in all_strategies() {
            let log = CallLog::new();
            let graph = build_graph(&deps, &log, |log, name, i| {
                if failing.contains(&i) { fail(log, name) } else { ok(log, name) }
            });
            let mut scenario = Scenario::new(graph, config.clone());
            scenario.run_blocking(false).expect("non-raising pass succeeds");
            let graph = scenario.graph();

            prop_assert!(graph.pending().is_empty(), "{:?} left {:?}", config, graph.pending());

            let counts = log.counts();
            for (i, task_deps) in deps.iter().enumerate() {
                let name = task_name(i);
                let succeeded = matches!(graph.outcome(&name), Some(TaskOutcome::Success(_)));
                prop_assert_eq!(succeeded, expected[i], "{} under {:?}", name, config);
                prop_assert!(counts.get(&name).copied().unwrap_or(0) <= 1);

                let blocked = graph
                    .outcome(&name)
                    .and_then(TaskOutcome::failure)
                    .is_some_and(|f| f.is_blocked());
                if blocked {
                    prop_assert!(!log.was_called(&name), "blocked {} was invoked", name);
                }
                if log.was_called(&name) {
                    for d in task_deps {
                        prop_assert!(log.position(&task_name(*d)) < log.position(&name));
                    }
                }
            }
        }
    }

    #[test]
    fn flaky_tasks_converge_with_enough_passes(
        deps in dag_strategy(8),
        flaky_raw in proptest::collection::btree_set(0..8usize, 1..4),
    ) {
        let flaky_set: BTreeSet<usize> =
            flaky_raw.into_iter().filter(|i| *i < deps.len()).collect();
        let runtime = tokio::runtime::Runtime::new().expect("runtime");

        for config in all_strategies() {
            let log = CallLog::new();
            let graph = build_graph(&deps, &log, |log, name, i| {
                if flaky_set.contains(&i) { flaky(log, name, 1) } else { ok(log, name) }
            });
            let mut scenario = Scenario::new(graph, config.clone());
            let controller = RecoveryController::new(deps.len() + 1);

            let report = runtime
                .block_on(controller.run(&mut scenario))
                .expect("recovery finishes");

            prop_assert!(report.completed, "{:?}", config);

            let counts: BTreeMap<String, usize> = log.counts().into_iter().collect();
            for i in 0..deps.len() {
                let name = task_name(i);
                let want = if flaky_set.contains(&i) { 2 } else { 1 };
                prop_assert_eq!(counts.get(&name).copied(), Some(want), "{} under {:?}", name, config);
            }
        }
    }
}
