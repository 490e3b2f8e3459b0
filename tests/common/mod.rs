#![allow(dead_code)]

pub use sweepdag_test_utils::builders::*;
pub use sweepdag_test_utils::fake_runner::{FakePass, FakePassRunner};
pub use sweepdag_test_utils::{all_strategies, init_tracing, with_timeout};

use sweepdag::dag::{Graph, TaskFailure, TaskOutcome};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn is_success(graph: &Graph, name: &str) -> bool {
    matches!(graph.outcome(name), Some(TaskOutcome::Success(_)))
}

pub fn is_error(graph: &Graph, name: &str) -> bool {
    matches!(
        graph.outcome(name),
        Some(TaskOutcome::Failed(TaskFailure::Error(_)))
    )
}

/// The dependency that blocked `name`, if it was blocked.
pub fn blocked_by(graph: &Graph, name: &str) -> Option<String> {
    match graph.outcome(name) {
        Some(TaskOutcome::Failed(TaskFailure::Blocked { dependency })) => Some(dependency.clone()),
        _ => None,
    }
}
