// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;

use tracing::{debug, info};

use crate::dag::adjacency::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, Readiness, RunState, StateManager};
use crate::dag::task::{Action, Task, TaskFailure, TaskName, TaskOutcome};
use crate::errors::{Result, SweepdagError};

/// Graph holds the immutable task DAG plus the results accumulated by passes.
///
/// It is responsible for:
/// - validating dependency references and acyclicity at construction
/// - deciding which tasks are runnable, waiting or blocked
/// - recording outcomes and blocking dependents of failed tasks
/// - building the reduced graph a retry runs on
#[derive(Debug, Clone, Default)]
pub struct Graph {
    tasks: BTreeMap<TaskName, Task>,
    dag: DagGraph,
    state: RunState,
}

/// Counts over the tasks of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
    pub pending: usize,
}

/// Build a validated [`Graph`] from a name → action mapping and a
/// name → dependencies mapping. Tasks without an entry have no dependencies.
///
/// Errors:
/// - [`SweepdagError::DuplicateTask`] when an action name repeats,
/// - [`SweepdagError::TaskNotFound`] when dependencies are declared for a
///   name that has no action,
/// - [`SweepdagError::UnknownDependency`] for a dependency without an action,
/// - [`SweepdagError::CyclicDependency`] for any cycle, self-loops included.
pub fn create_graph<A, N, D, M, L, K>(actions: A, dependencies: D) -> Result<Graph>
where
    A: IntoIterator<Item = (N, Action)>,
    N: Into<TaskName>,
    D: IntoIterator<Item = (M, L)>,
    M: Into<TaskName>,
    L: IntoIterator<Item = K>,
    K: Into<TaskName>,
{
    let mut actions_by_name: BTreeMap<TaskName, Action> = BTreeMap::new();
    for (name, action) in actions {
        let name = name.into();
        if actions_by_name.contains_key(&name) {
            return Err(SweepdagError::DuplicateTask(name));
        }
        actions_by_name.insert(name, action);
    }

    let mut deps_by_name: BTreeMap<TaskName, BTreeSet<TaskName>> = actions_by_name
        .keys()
        .map(|name| (name.clone(), BTreeSet::new()))
        .collect();

    for (name, deps) in dependencies {
        let name = name.into();
        let Some(entry) = deps_by_name.get_mut(&name) else {
            return Err(SweepdagError::TaskNotFound(name));
        };
        entry.extend(deps.into_iter().map(Into::into));
    }

    let dag = DagGraph::build(&deps_by_name)?;

    let tasks = actions_by_name
        .into_iter()
        .map(|(name, action)| {
            let deps = deps_by_name.remove(&name).unwrap_or_default();
            (name.clone(), Task::new(name, action, deps))
        })
        .collect();

    debug!(tasks = dag.len(), "graph created");

    Ok(Graph {
        tasks,
        dag,
        state: RunState::default(),
    })
}

impl Graph {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.dag.tasks()
    }

    /// Dependencies that still constrain `name` in this graph.
    ///
    /// In a reduced graph this excludes dependencies satisfied by an earlier
    /// pass; [`Task::dependencies`] keeps the declared set.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.dag.dependencies_of(name)
    }

    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dag.dependents_of(name)
    }

    pub fn topological_order(&self) -> &[TaskName] {
        self.dag.topological_order()
    }

    /// Names completed (successfully or not) in this or a prior pass.
    pub fn done(&self) -> &BTreeSet<TaskName> {
        &self.state.done
    }

    pub fn is_done(&self, name: &str) -> bool {
        self.state.done.contains(name)
    }

    pub fn results(&self) -> &BTreeMap<TaskName, TaskOutcome> {
        &self.state.results
    }

    pub fn outcome(&self, name: &str) -> Option<&TaskOutcome> {
        self.state.results.get(name)
    }

    /// Output of a successful task, including ones carried from earlier passes.
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outcome(name).and_then(TaskOutcome::output)
    }

    /// Returns `None` for unknown tasks.
    pub fn readiness(&self, name: &str) -> Option<Readiness> {
        if !self.tasks.contains_key(name) {
            return None;
        }
        Some(ReadOnlyStateManager::new(&self.dag, &self.state).readiness(name))
    }

    /// Tasks that could be dispatched right now, in topological order.
    pub fn runnable(&self) -> Vec<TaskName> {
        let mgr = ReadOnlyStateManager::new(&self.dag, &self.state);
        self.dag
            .topological_order()
            .iter()
            .filter(|name| mgr.readiness(name) == Readiness::Ready)
            .cloned()
            .collect()
    }

    /// Every task of this graph finished with a success.
    pub fn is_complete(&self) -> bool {
        self.tasks
            .keys()
            .all(|name| matches!(self.state.results.get(name), Some(TaskOutcome::Success(_))))
    }

    pub fn has_recorded_failure(&self) -> bool {
        self.state.results.values().any(TaskOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TaskFailure)> {
        self.state
            .results
            .iter()
            .filter_map(|(name, outcome)| outcome.failure().map(|f| (name.as_str(), f)))
    }

    /// Tasks of this graph without a recorded outcome.
    pub fn pending(&self) -> Vec<&str> {
        self.tasks
            .keys()
            .filter(|name| !self.state.done.contains(*name))
            .map(|s| s.as_str())
            .collect()
    }

    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            total: self.tasks.len(),
            ..GraphSummary::default()
        };
        for name in self.tasks.keys() {
            match self.state.results.get(name) {
                Some(TaskOutcome::Success(_)) => summary.succeeded += 1,
                Some(TaskOutcome::Failed(f)) if f.is_blocked() => summary.blocked += 1,
                Some(TaskOutcome::Failed(_)) => summary.failed += 1,
                None => summary.pending += 1,
            }
        }
        summary
    }

    /// Group tasks into waves of mutually independent tasks.
    pub fn waves(&self) -> Vec<Vec<TaskName>> {
        self.dag.waves()
    }

    /// Human-readable plan: one block per wave, one line per task.
    pub fn execution_plan(&self) -> String {
        let mut out = String::new();
        for (i, wave) in self.waves().iter().enumerate() {
            let _ = writeln!(out, "wave {}:", i + 1);
            for name in wave {
                let deps = self.dependencies_of(name);
                if deps.is_empty() {
                    let _ = writeln!(out, "  {name}");
                } else {
                    let _ = writeln!(out, "  {name} (after {})", deps.join(", "));
                }
            }
        }
        out
    }

    /// Build the graph a retry runs on.
    ///
    /// Keeps every task not completed successfully (failed, blocked, never
    /// reached) and the edges among them. Successful outcomes are carried
    /// forward so later passes still see them, but their tasks are dropped
    /// and never invoked again.
    pub fn reduce(self) -> Graph {
        let Graph {
            tasks, mut state, ..
        } = self;

        state.running.clear();
        state.results.retain(|_, outcome| outcome.is_success());
        state.done = state.results.keys().cloned().collect();

        let remaining: BTreeMap<TaskName, Task> = tasks
            .into_iter()
            .filter(|(name, _)| !state.done.contains(name))
            .collect();

        let deps: BTreeMap<TaskName, BTreeSet<TaskName>> = remaining
            .iter()
            .map(|(name, task)| {
                let kept = task
                    .dependencies()
                    .iter()
                    .filter(|dep| remaining.contains_key(*dep))
                    .cloned()
                    .collect();
                (name.clone(), kept)
            })
            .collect();

        info!(
            remaining = remaining.len(),
            carried = state.done.len(),
            "built reduced graph for retry"
        );

        Graph {
            tasks: remaining,
            dag: DagGraph::from_validated(&deps),
            state,
        }
    }

    // --- pass plumbing used by the executors -------------------------------

    /// Settle stale blocking and return the initially runnable tasks.
    pub(crate) fn begin_pass(&mut self) -> (Vec<TaskName>, VecDeque<TaskName>) {
        let mut mgr = StateManager::new(&self.dag, &mut self.state);
        let stale = mgr.clear_running();
        if !stale.is_empty() {
            debug!(tasks = ?stale, "clearing running marks left by an earlier pass");
        }
        let blocked = mgr.settle_blocked();
        let ready = mgr.collect_ready().into_iter().collect();
        (blocked, ready)
    }

    /// Mark `name` running and hand out its action, if it is still runnable.
    pub(crate) fn start(&mut self, name: &str) -> Option<Action> {
        let mut mgr = StateManager::new(&self.dag, &mut self.state);
        if mgr.readiness(name) != Readiness::Ready {
            return None;
        }
        let action = self.tasks.get(name)?.action().clone();
        mgr.mark_running(name);
        Some(action)
    }

    pub(crate) fn record(&mut self, name: &str, outcome: TaskOutcome) -> SchedulerStep {
        StateManager::new(&self.dag, &mut self.state).record(name, outcome)
    }

    /// Undo [`Graph::start`] for a task whose action was never invoked.
    pub(crate) fn release(&mut self, name: &str) {
        StateManager::new(&self.dag, &mut self.state).unmark_running(name);
    }

    pub(crate) fn clear_running(&mut self) -> Vec<TaskName> {
        StateManager::new(&self.dag, &mut self.state).clear_running()
    }
}
