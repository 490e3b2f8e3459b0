// src/dag/state_manager.rs

//! Per-run state management for tasks in a graph.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::dag::adjacency::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task::{TaskFailure, TaskName, TaskOutcome};

/// Mutable per-run state: what is done, how it ended, what is in flight.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunState {
    pub(crate) done: BTreeSet<TaskName>,
    pub(crate) results: BTreeMap<TaskName, TaskOutcome>,
    pub(crate) running: BTreeSet<TaskName>,
}

/// Where a task stands with respect to being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Already completed (success or recorded failure).
    Done,
    /// Dispatched and not yet recorded.
    Running,
    /// Every dependency succeeded.
    Ready,
    /// Some dependency has not completed yet.
    Waiting,
    /// The named dependency failed.
    Blocked(TaskName),
}

/// Manages per-run state transitions for tasks.
pub(crate) struct StateManager<'a> {
    graph: &'a DagGraph,
    state: &'a mut RunState,
}

impl<'a> StateManager<'a> {
    pub(crate) fn new(graph: &'a DagGraph, state: &'a mut RunState) -> Self {
        Self { graph, state }
    }

    pub(crate) fn readiness(&self, name: &str) -> Readiness {
        ReadOnlyStateManager::new(self.graph, self.state).readiness(name)
    }

    /// Record every not-done task with a failed dependency as blocked.
    ///
    /// Runs in topological order, so blocking propagates in a single sweep.
    pub(crate) fn settle_blocked(&mut self) -> Vec<TaskName> {
        let mut newly_blocked = Vec::new();

        for name in self.graph.topological_order() {
            if let Readiness::Blocked(dependency) = self.readiness(name) {
                self.mark_blocked(name, dependency);
                newly_blocked.push(name.clone());
            }
        }

        newly_blocked
    }

    /// Runnable tasks in topological order. Does not mark them running.
    pub(crate) fn collect_ready(&self) -> Vec<TaskName> {
        self.graph
            .topological_order()
            .iter()
            .filter(|name| self.readiness(name) == Readiness::Ready)
            .cloned()
            .collect()
    }

    pub(crate) fn mark_running(&mut self, name: &str) {
        self.state.running.insert(name.to_string());
    }

    pub(crate) fn unmark_running(&mut self, name: &str) {
        self.state.running.remove(name);
    }

    /// Record the outcome of a dispatched task.
    ///
    /// On success the dependents that became runnable are returned; on
    /// failure every transitive dependent still pending is recorded as
    /// blocked.
    pub(crate) fn record(&mut self, name: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.state.running.remove(name);
        self.state.done.insert(name.to_string());
        let succeeded = outcome.is_success();
        self.state.results.insert(name.to_string(), outcome);

        if succeeded {
            let newly_ready = self
                .graph
                .dependents_of(name)
                .iter()
                .filter(|dependent| self.readiness(dependent) == Readiness::Ready)
                .cloned()
                .collect();
            SchedulerStep {
                newly_ready,
                newly_blocked: Vec::new(),
            }
        } else {
            SchedulerStep {
                newly_ready: Vec::new(),
                newly_blocked: self.mark_dependents_blocked(name),
            }
        }
    }

    /// Mark all not-done dependents (and their dependents) of a failed task
    /// as blocked. The failed task itself is not included.
    fn mark_dependents_blocked(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<(TaskName, TaskName)> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .map(|d| (d.clone(), failed_task.to_string()))
            .collect();

        let mut newly_blocked = Vec::new();

        while let Some((name, dependency)) = stack.pop() {
            if self.state.done.contains(&name) || self.state.running.contains(&name) {
                continue;
            }
            self.mark_blocked(&name, dependency);
            stack.extend(
                self.graph
                    .dependents_of(&name)
                    .iter()
                    .map(|d| (d.clone(), name.clone())),
            );
            newly_blocked.push(name);
        }

        newly_blocked
    }

    fn mark_blocked(&mut self, name: &str, dependency: TaskName) {
        debug!(task = %name, dependency = %dependency, "dependency failed; marking task blocked");
        self.state.done.insert(name.to_string());
        self.state.results.insert(
            name.to_string(),
            TaskOutcome::Failed(TaskFailure::Blocked { dependency }),
        );
    }

    /// Forget dispatched-but-unrecorded tasks at the end of a pass.
    pub(crate) fn clear_running(&mut self) -> Vec<TaskName> {
        std::mem::take(&mut self.state.running).into_iter().collect()
    }
}

/// A read-only view used where only shared access to the state is available.
pub(crate) struct ReadOnlyStateManager<'a> {
    graph: &'a DagGraph,
    state: &'a RunState,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub(crate) fn new(graph: &'a DagGraph, state: &'a RunState) -> Self {
        Self { graph, state }
    }

    pub(crate) fn readiness(&self, name: &str) -> Readiness {
        if self.state.done.contains(name) {
            return Readiness::Done;
        }
        if self.state.running.contains(name) {
            return Readiness::Running;
        }

        let mut waiting = false;
        for dep in self.graph.dependencies_of(name) {
            match self.state.results.get(dep) {
                Some(TaskOutcome::Success(_)) => {}
                Some(TaskOutcome::Failed(_)) => return Readiness::Blocked(dep.clone()),
                None => waiting = true,
            }
        }

        if waiting {
            Readiness::Waiting
        } else {
            Readiness::Ready
        }
    }
}
