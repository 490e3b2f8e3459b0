// src/exec/pass.rs

//! Bookkeeping shared by every strategy.
//!
//! A [`Pass`] is the single writer of a graph while the pass runs: executors
//! only move actions onto workers and hand outcomes back through
//! [`Pass::complete`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::dag::{Action, Graph, TaskName, TaskOutcome};
use crate::errors::{Result, SweepdagError};
use crate::exec::{PassOptions, PassReport};

/// Raised once a pass starts aborting. Dispatched work checks it right
/// before invoking its action, so work that has not started yet never does.
#[derive(Debug, Clone, Default)]
pub(crate) struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub(crate) fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }
}

pub(crate) struct Pass<'g> {
    graph: &'g mut Graph,
    opts: PassOptions,
    queue: VecDeque<TaskName>,
    in_flight: Vec<TaskName>,
    abort: Option<SweepdagError>,
    signal: AbortSignal,
    lost: usize,
    report: PassReport,
    started: Instant,
}

impl<'g> Pass<'g> {
    pub(crate) fn begin(graph: &'g mut Graph, opts: PassOptions, strategy: &'static str) -> Self {
        let (blocked, queue) = graph.begin_pass();

        info!(
            strategy,
            tasks = graph.len(),
            already_done = graph.done().len(),
            runnable = queue.len(),
            raise_errors = opts.raise_errors,
            "starting pass"
        );

        let report = PassReport {
            blocked: blocked.len(),
            ..PassReport::default()
        };

        Self {
            graph,
            opts,
            queue,
            in_flight: Vec::new(),
            abort: None,
            signal: AbortSignal::default(),
            lost: 0,
            report,
            started: Instant::now(),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn abort_signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Next runnable task and its action, marked running.
    ///
    /// Returns `None` once the pass is aborting, so in-flight work drains
    /// without new dispatches.
    pub(crate) fn next_dispatch(&mut self) -> Option<(TaskName, Action)> {
        if self.abort.is_some() {
            return None;
        }
        while let Some(name) = self.queue.pop_front() {
            if let Some(action) = self.graph.start(&name) {
                if self.opts.log_tasks {
                    info!(task = %name, "starting task");
                } else {
                    debug!(task = %name, "starting task");
                }
                self.in_flight.push(name.clone());
                return Some((name, action));
            }
        }
        None
    }

    /// Fold the outcome of a dispatched task into the graph.
    pub(crate) fn complete(&mut self, name: TaskName, outcome: TaskOutcome) {
        self.in_flight.retain(|n| n != &name);
        self.report.executed += 1;

        let first_failure = match &outcome {
            TaskOutcome::Success(_) => {
                self.report.succeeded += 1;
                if self.opts.log_tasks {
                    info!(task = %name, "task succeeded");
                } else {
                    debug!(task = %name, "task succeeded");
                }
                None
            }
            TaskOutcome::Failed(failure) => {
                self.report.failed += 1;
                warn!(task = %name, error = %failure, "task failed");
                Some(failure.clone())
            }
        };

        let step = self.graph.record(&name, outcome);
        self.report.blocked += step.newly_blocked.len();
        if !step.newly_blocked.is_empty() {
            debug!(task = %name, blocked = ?step.newly_blocked, "dependents blocked");
        }
        self.queue.extend(step.newly_ready);

        if let Some(failure) = first_failure {
            if self.opts.raise_errors && self.abort.is_none() {
                info!(
                    task = %name,
                    in_flight = self.in_flight.len(),
                    "aborting pass after failure; draining in-flight tasks"
                );
                self.abort_with(SweepdagError::TaskFailed {
                    task: name,
                    failure,
                });
            }
        }
    }

    /// A dispatched task saw the abort signal and never invoked its action.
    /// It goes back to pending with no outcome.
    pub(crate) fn release(&mut self, name: TaskName) {
        self.in_flight.retain(|n| n != &name);
        self.graph.release(&name);
        debug!(task = %name, "pass aborting; task not started");
    }

    /// A dispatched task vanished without an outcome (join or channel
    /// breakage). Its task stays unrecorded and the pass aborts.
    ///
    /// `name` is `None` when the breakage cannot be tied to a task; the
    /// in-flight list is then left as it is.
    pub(crate) fn lose(&mut self, name: Option<TaskName>, err: SweepdagError) {
        match name {
            Some(name) => {
                self.in_flight.retain(|n| n != &name);
                error!(task = %name, error = %err, "lost track of a dispatched task");
            }
            None => {
                self.lost += 1;
                error!(lost = self.lost, error = %err, "lost track of a dispatched task");
            }
        }
        self.abort_with(err);
    }

    pub(crate) fn abort_with(&mut self, err: SweepdagError) {
        if self.abort.is_none() {
            self.abort = Some(err);
            self.signal.raise();
        }
    }

    pub(crate) fn heartbeat(&self) {
        info!(
            in_flight = ?self.in_flight,
            lost = self.lost,
            queued = self.queue.len(),
            elapsed_secs = self.started.elapsed().as_secs(),
            "waiting on tasks"
        );
    }

    pub(crate) fn finish(mut self) -> Result<PassReport> {
        let stale = self.graph.clear_running();
        if !stale.is_empty() {
            warn!(tasks = ?stale, "pass ended with unrecorded running tasks");
        }

        self.report.not_reached = self.graph.pending().len();
        self.report.duration = self.started.elapsed();

        let summary = self.graph.summary();
        info!(
            executed = self.report.executed,
            succeeded = self.report.succeeded,
            failed = self.report.failed,
            blocked = self.report.blocked,
            not_reached = self.report.not_reached,
            complete = self.graph.is_complete(),
            total_failed = summary.failed,
            elapsed_ms = self.report.duration.as_millis() as u64,
            "pass finished"
        );

        match self.abort {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}
