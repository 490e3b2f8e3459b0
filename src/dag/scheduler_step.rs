// src/dag/scheduler_step.rs

//! Result type of recording one task outcome.

use crate::dag::task::TaskName;

/// Structured result of a single scheduler "step".
///
/// Executors queue `newly_ready` and count `newly_blocked` in the pass report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Dependents that became runnable because of this step.
    pub newly_ready: Vec<TaskName>,
    /// Tasks recorded as blocked because of this step (transitively).
    pub newly_blocked: Vec<TaskName>,
}
