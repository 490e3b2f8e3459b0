// src/engine/recovery.rs

//! Bounded retry of partially failed passes.
//!
//! After each pass the graph is classified:
//!
//! - [`RecoveryState::AllSucceeded`]: done.
//! - [`RecoveryState::HasRecordedFailure`]: rebuild a reduced graph from the
//!   tasks that did not succeed and run again, up to `nb_turn` passes.
//! - [`RecoveryState::RaceConditionSuspected`]: the pass stopped (or ended)
//!   without any task outcome explaining it. This is fatal and surfaces as
//!   [`SweepdagError::RaceCondition`].

use tracing::{error, info, warn};

use crate::dag::Graph;
use crate::errors::{Result, SweepdagError};
use crate::exec::{PassReport, PassRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    AllSucceeded,
    HasRecordedFailure,
    RaceConditionSuspected,
}

/// Classify a graph after a pass.
pub fn classify(graph: &Graph) -> RecoveryState {
    if graph.is_complete() {
        RecoveryState::AllSucceeded
    } else if graph.has_recorded_failure() {
        RecoveryState::HasRecordedFailure
    } else {
        RecoveryState::RaceConditionSuspected
    }
}

/// What the controller did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Every task ended with a success.
    pub completed: bool,
    /// Passes started, including ones that returned an error.
    pub passes: usize,
    /// Classification after the last pass.
    pub state: RecoveryState,
    /// Reports of the passes that returned normally.
    pub reports: Vec<PassReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryController {
    nb_turn: usize,
    raise_errors: bool,
}

impl RecoveryController {
    /// Allow at most `nb_turn` passes. Passes capture failures by default.
    pub fn new(nb_turn: usize) -> Self {
        Self {
            nb_turn,
            raise_errors: false,
        }
    }

    /// Run each pass with `raise_errors`, so a pass stops at its first
    /// failure and the next pass picks up from there.
    pub fn with_raise_errors(mut self, raise_errors: bool) -> Self {
        self.raise_errors = raise_errors;
        self
    }

    pub fn nb_turn(&self) -> usize {
        self.nb_turn
    }

    /// Drive `runner` until its graph completes, a pass is unexplained, or
    /// `nb_turn` passes have run.
    ///
    /// Running out of passes is not an error: the report says
    /// `completed = false` and the runner keeps the last graph.
    pub async fn run<R>(&self, runner: &mut R) -> Result<RecoveryReport>
    where
        R: PassRunner + ?Sized,
    {
        if self.nb_turn == 0 {
            return Err(SweepdagError::ConfigError(
                "recovery needs at least one pass (nb_turn = 0)".to_string(),
            ));
        }

        let mut reports = Vec::new();

        for pass in 1..=self.nb_turn {
            if pass > 1 {
                let graph = runner.take_graph();
                runner.set_graph(graph.reduce());
            }

            info!(
                pass,
                nb_turn = self.nb_turn,
                tasks = runner.graph().len(),
                "recovery: starting pass"
            );

            let result = runner.run_pass(self.raise_errors).await;
            let state = classify(runner.graph());

            match result {
                Ok(report) => {
                    reports.push(report);
                    match state {
                        RecoveryState::AllSucceeded => {
                            info!(pass, "recovery: all tasks succeeded");
                            return Ok(RecoveryReport {
                                completed: true,
                                passes: pass,
                                state,
                                reports,
                            });
                        }
                        RecoveryState::HasRecordedFailure => {
                            warn!(
                                pass,
                                failed = runner.graph().failures().count(),
                                "recovery: pass ended with failures"
                            );
                        }
                        RecoveryState::RaceConditionSuspected => {
                            let pending = runner.graph().pending().len();
                            error!(pass, pending, "recovery: pass ended with unexplained pending tasks");
                            return Err(SweepdagError::RaceCondition {
                                source: Box::new(SweepdagError::Executor(format!(
                                    "pass ended with {pending} task(s) neither completed nor failed"
                                ))),
                            });
                        }
                    }
                }
                Err(err) if err.is_structural() || matches!(err, SweepdagError::ConfigError(_)) => {
                    return Err(err);
                }
                Err(err) => {
                    if state == RecoveryState::HasRecordedFailure {
                        warn!(pass, error = %err, "recovery: pass aborted on a recorded failure");
                    } else {
                        error!(pass, error = %err, "recovery: pass aborted without a recorded failure");
                        return Err(SweepdagError::RaceCondition {
                            source: Box::new(err),
                        });
                    }
                }
            }
        }

        let summary = runner.graph().summary();
        warn!(
            nb_turn = self.nb_turn,
            remaining = summary.total - summary.succeeded,
            "recovery: out of passes"
        );

        Ok(RecoveryReport {
            completed: false,
            passes: self.nb_turn,
            state: classify(runner.graph()),
            reports,
        })
    }
}
