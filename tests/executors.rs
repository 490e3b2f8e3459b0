mod common;

use std::time::{Duration, Instant};

use sweepdag::dag::{Graph, TaskFailure, TaskOutcome};
use sweepdag::engine::Scenario;
use sweepdag::errors::SweepdagError;
use sweepdag::exec::{
    ExecutorConfig, PassOptions, run_async, run_parallel, run_parallel_async, spawn_blocking_pass,
};

use common::*;

fn fan_out(log: &CallLog) -> Graph {
    GraphBuilder::new()
        .task("A", ok(log, "A"), &[])
        .task("B", ok(log, "B"), &["A"])
        .task("C", ok(log, "C"), &["A"])
        .build()
        .expect("valid graph")
}

fn failing_chain(log: &CallLog) -> Graph {
    GraphBuilder::new()
        .task("A", fail(log, "A"), &[])
        .task("B", ok(log, "B"), &["A"])
        .build()
        .expect("valid graph")
}

#[tokio::test]
async fn all_success_fan_out_runs_dependents_after_root() -> TestResult {
    init_tracing();

    for config in all_strategies() {
        let log = CallLog::new();
        let mut scenario = Scenario::new(fan_out(&log), config.clone());

        let report = with_timeout(scenario.run_once()).await?;
        let graph = scenario.graph();

        assert!(graph.is_complete(), "{config:?}");
        assert_eq!(graph.done().len(), 3);
        for name in ["A", "B", "C"] {
            assert!(is_success(graph, name), "{name} under {config:?}");
            assert_eq!(log.count(name), 1);
        }
        assert_eq!(graph.output("B"), Some("B-out"));
        assert!(log.position("A") < log.position("B"));
        assert!(log.position("A") < log.position("C"));
        assert_eq!(report.executed, 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.not_reached, 0);
    }
    Ok(())
}

#[tokio::test]
async fn failed_dependency_blocks_without_invoking() -> TestResult {
    init_tracing();

    for config in all_strategies() {
        let log = CallLog::new();
        let mut scenario = Scenario::new(failing_chain(&log), config.clone());

        let report = with_timeout(scenario.run_once()).await?;
        let graph = scenario.graph();

        assert!(is_error(graph, "A"), "{config:?}");
        assert_eq!(blocked_by(graph, "B").as_deref(), Some("A"));
        assert!(!log.was_called("B"));
        assert!(graph.is_done("B"));
        assert!(graph.has_recorded_failure());
        assert_eq!(report.failed, 1);
        assert_eq!(report.blocked, 1);
    }
    Ok(())
}

#[tokio::test]
async fn raise_errors_returns_first_failure_and_keeps_results() -> TestResult {
    init_tracing();

    for config in all_strategies() {
        let log = CallLog::new();
        let mut scenario = Scenario::new(failing_chain(&log), config.clone());

        let err = with_timeout(scenario.run_once_raising())
            .await
            .unwrap_err();

        match err {
            SweepdagError::TaskFailed { task, failure } => {
                assert_eq!(task, "A");
                assert_eq!(failure, TaskFailure::Error("A failed".to_string()));
            }
            other => panic!("expected TaskFailed under {config:?}, got {other:?}"),
        }
        assert!(is_error(scenario.graph(), "A"));
        assert!(!log.was_called("B"));
    }
    Ok(())
}

#[tokio::test]
async fn raise_errors_drains_tasks_already_in_flight() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let mut graph = GraphBuilder::new()
        .task("fast_fail", sleepy_fail(&log, "fast_fail", 10), &[])
        .task("slow", sleepy(&log, "slow", 150), &[])
        .task("after_slow", ok(&log, "after_slow"), &["slow"])
        .build()?;

    let err = with_timeout(run_async(&mut graph, PassOptions::raising()))
        .await
        .unwrap_err();

    assert!(matches!(err, SweepdagError::TaskFailed { ref task, .. } if task == "fast_fail"));
    // `slow` was already running: it finishes and is recorded.
    assert!(is_success(&graph, "slow"));
    // Nothing new is dispatched once the pass is aborting.
    assert!(!log.was_called("after_slow"));
    assert_eq!(graph.pending(), vec!["after_slow"]);
    Ok(())
}

#[tokio::test]
async fn raise_errors_never_starts_siblings_queued_behind_the_failure() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let mut graph = GraphBuilder::new()
        .task("A", fail(&log, "A"), &[])
        .task("B", ok(&log, "B"), &[])
        .task("C", ok(&log, "C"), &[])
        .build()?;

    let err = with_timeout(run_async(&mut graph, PassOptions::raising()))
        .await
        .unwrap_err();

    assert!(matches!(err, SweepdagError::TaskFailed { ref task, .. } if task == "A"));
    assert_eq!(log.calls(), vec!["A"]);
    assert!(is_error(&graph, "A"));
    // Never started, so no outcome and nothing left marked running.
    assert_eq!(graph.pending(), vec!["B", "C"]);
    assert_eq!(graph.runnable(), vec!["B".to_string(), "C".to_string()]);

    // The next pass picks them up.
    let report = with_timeout(run_async(&mut graph, PassOptions::default())).await?;
    assert_eq!(report.executed, 2);
    assert!(is_success(&graph, "B"));
    assert!(is_success(&graph, "C"));
    assert_eq!(log.count("A"), 1);
    Ok(())
}

#[tokio::test]
async fn panicking_action_is_captured_as_failure() -> TestResult {
    init_tracing();

    for config in all_strategies() {
        let log = CallLog::new();
        let graph = GraphBuilder::new()
            .task("boom", panicking(&log, "boom"), &[])
            .task("next", ok(&log, "next"), &["boom"])
            .task("other", ok(&log, "other"), &[])
            .build()?;
        let mut scenario = Scenario::new(graph, config.clone());

        with_timeout(scenario.run_once()).await?;
        let graph = scenario.graph();

        match graph.outcome("boom") {
            Some(TaskOutcome::Failed(TaskFailure::Panicked(msg))) => {
                assert!(msg.contains("boom exploded"), "{msg}");
            }
            other => panic!("expected Panicked under {config:?}, got {other:?}"),
        }
        assert_eq!(blocked_by(graph, "next").as_deref(), Some("boom"));
        assert!(is_success(graph, "other"));
    }
    Ok(())
}

#[tokio::test]
async fn rerunning_a_finished_graph_invokes_nothing() -> TestResult {
    init_tracing();

    for config in all_strategies() {
        let log = CallLog::new();
        let mut scenario = Scenario::new(failing_chain(&log), config.clone());

        with_timeout(scenario.run_once()).await?;
        let report = with_timeout(scenario.run_once()).await?;

        assert_eq!(report.executed, 0, "{config:?}");
        assert_eq!(log.count("A"), 1);
        assert!(!log.was_called("B"));
    }
    Ok(())
}

#[tokio::test]
async fn cooperative_overlaps_waiting_of_async_actions() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let mut graph = GraphBuilder::new()
        .task("a", sleepy(&log, "a", 200), &[])
        .task("b", sleepy(&log, "b", 200), &[])
        .task("c", sleepy(&log, "c", 200), &[])
        .build()?;

    let started = Instant::now();
    with_timeout(run_async(&mut graph, PassOptions::default())).await?;

    assert!(graph.is_complete());
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "took {:?}",
        started.elapsed()
    );
    Ok(())
}

#[tokio::test]
async fn worker_pool_respects_its_bound() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let probe = ConcurrencyProbe::new();
    let mut builder = GraphBuilder::new();
    for i in 0..6 {
        let name = format!("t{i}");
        builder = builder.task(&name, probed(&probe, &log, &name, 30), &[]);
    }
    let mut graph = builder.build()?;

    let report = with_timeout(run_parallel_async(&mut graph, 2, PassOptions::default())).await?;

    assert_eq!(report.succeeded, 6);
    assert!(probe.max_seen() <= 2, "saw {}", probe.max_seen());
    assert!(probe.max_seen() >= 1);
    Ok(())
}

#[tokio::test]
async fn pool_join_failure_names_the_lost_task() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let mut graph = GraphBuilder::new()
        .task("bomb", panics_on_drop(&log, "bomb"), &[])
        .task("after_bomb", ok(&log, "after_bomb"), &["bomb"])
        .build()?;

    let err = with_timeout(run_parallel_async(&mut graph, 2, PassOptions::default()))
        .await
        .unwrap_err();

    match err {
        SweepdagError::Executor(msg) => assert!(msg.contains("'bomb'"), "{msg}"),
        other => panic!("expected Executor, got {other:?}"),
    }
    assert!(log.was_called("bomb"));
    assert!(!log.was_called("after_bomb"));
    assert_eq!(graph.outcome("bomb"), None);
    assert_eq!(graph.pending(), vec!["after_bomb", "bomb"]);
    assert_eq!(graph.runnable(), vec!["bomb".to_string()]);
    Ok(())
}

#[tokio::test]
async fn blocking_pass_that_cannot_be_joined_keeps_recorded_outcomes() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let mut graph = fan_out(&log);

    let err = spawn_blocking_pass(&mut graph, |graph| {
        run_parallel(graph, 2, PassOptions::default())?;
        panic!("coordinator died after the pass");
    })
    .await
    .unwrap_err();

    assert!(matches!(err, SweepdagError::Executor(_)));
    assert_eq!(graph.len(), 3);
    assert!(graph.is_complete());
    assert_eq!(graph.output("C"), Some("C-out"));
    Ok(())
}

#[tokio::test]
async fn blocking_pass_returns_the_graph_on_success() -> TestResult {
    let log = CallLog::new();
    let mut graph = failing_chain(&log);

    let report = spawn_blocking_pass(&mut graph, |graph| {
        run_parallel(graph, 1, PassOptions::default())
    })
    .await?;

    assert_eq!(report.failed, 1);
    assert_eq!(blocked_by(&graph, "B").as_deref(), Some("A"));
    Ok(())
}

#[test]
fn parallel_respects_its_bound_and_blocks_until_done() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let probe = ConcurrencyProbe::new();
    let mut builder = GraphBuilder::new();
    for i in 0..6 {
        let name = format!("t{i}");
        let deps: Vec<String> = if i >= 3 { vec![format!("t{}", i - 3)] } else { vec![] };
        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
        builder = builder.task(&name, probed(&probe, &log, &name, 20), &deps);
    }
    let mut graph = builder.build()?;

    let report = run_parallel(&mut graph, 3, PassOptions::default())?;

    assert_eq!(report.succeeded, 6);
    assert!(graph.is_complete());
    assert!(probe.max_seen() <= 3, "saw {}", probe.max_seen());
    for i in 3..6 {
        assert!(log.position(&format!("t{}", i - 3)) < log.position(&format!("t{i}")));
    }
    Ok(())
}

#[test]
fn parallel_drives_async_actions_on_workers() -> TestResult {
    init_tracing();

    let log = CallLog::new();
    let mut graph = GraphBuilder::new()
        .task("a", sleepy(&log, "a", 10), &[])
        .task("b", sleepy(&log, "b", 10), &["a"])
        .build()?;

    run_parallel(&mut graph, 2, PassOptions::default())?;

    assert!(graph.is_complete());
    assert_eq!(log.calls(), vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn zero_workers_is_a_config_error() -> TestResult {
    let log = CallLog::new();

    let mut graph = fan_out(&log);
    let err = run_parallel_async(&mut graph, 0, PassOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SweepdagError::ConfigError(_)));

    let mut graph = fan_out(&log);
    let err = run_parallel(&mut graph, 0, PassOptions::default()).unwrap_err();
    assert!(matches!(err, SweepdagError::ConfigError(_)));

    assert!(log.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn heartbeat_does_not_change_results() -> TestResult {
    init_tracing();

    for config in all_strategies() {
        let log = CallLog::new();
        let graph = GraphBuilder::new()
            .task("a", sleepy(&log, "a", 60), &[])
            .task("b", ok(&log, "b"), &["a"])
            .build()?;
        let config = config
            .with_heartbeat(Duration::from_millis(10))
            .with_log_tasks(false);
        let mut scenario = Scenario::new(graph, config.clone());

        with_timeout(scenario.run_once()).await?;

        assert!(scenario.graph().is_complete(), "{config:?}");
        assert_eq!(log.calls(), vec!["a", "b"]);
    }
    Ok(())
}

#[test]
fn run_blocking_works_for_every_strategy() -> TestResult {
    init_tracing();

    for config in [
        ExecutorConfig::cooperative(),
        ExecutorConfig::worker_pool(3),
        ExecutorConfig::parallel(3),
    ] {
        let log = CallLog::new();
        let mut scenario = Scenario::new(fan_out(&log), config.clone());

        let report = scenario.run_blocking(false)?;

        assert_eq!(report.succeeded, 3, "{config:?}");
        assert!(scenario.into_graph().is_complete());
    }
    Ok(())
}
