// src/exec/mod.rs

//! Execution layer: the three pass strategies and shell command actions.
//!
//! - [`cooperative`] runs a pass on a single thread of control
//!   ([`run_async`]).
//! - [`pool`] runs a pass on a bounded tokio worker pool
//!   ([`run_parallel_async`]).
//! - [`parallel`] runs a pass synchronously on a rayon thread pool
//!   ([`run_parallel`]).
//! - [`pass`] is the bookkeeping all three share.
//! - [`command`] builds actions that run shell commands.
//! - [`backend`] provides the [`PassRunner`] seam the recovery controller
//!   drives, which tests can replace with a fake.

pub mod backend;
pub mod command;
pub mod cooperative;
pub mod parallel;
pub(crate) mod pass;
pub mod pool;

use std::time::Duration;

pub use backend::PassRunner;
pub use command::command_action;
pub use cooperative::run_async;
pub use parallel::{run_parallel, spawn_blocking_pass};
pub use pool::run_parallel_async;

/// How a scenario executes its passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One thread of control; waiting inside async actions overlaps.
    Cooperative,
    /// At most `workers` actions in flight on the tokio runtime.
    WorkerPool { workers: usize },
    /// At most `workers` actions on a dedicated thread pool; blocking call.
    Parallel { workers: usize },
}

impl Strategy {
    pub fn workers(&self) -> Option<usize> {
        match self {
            Strategy::Cooperative => None,
            Strategy::WorkerPool { workers } | Strategy::Parallel { workers } => Some(*workers),
        }
    }
}

/// Executor settings threaded into a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub strategy: Strategy,
    /// Log in-flight tasks at this interval while waiting. Never affects
    /// scheduling.
    pub heartbeat: Option<Duration>,
    /// Per-task start/finish lines at `info` (true) or `debug` (false).
    pub log_tasks: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Cooperative,
            heartbeat: None,
            log_tasks: true,
        }
    }
}

impl ExecutorConfig {
    pub fn cooperative() -> Self {
        Self::default()
    }

    pub fn worker_pool(workers: usize) -> Self {
        Self {
            strategy: Strategy::WorkerPool { workers },
            ..Self::default()
        }
    }

    pub fn parallel(workers: usize) -> Self {
        Self {
            strategy: Strategy::Parallel { workers },
            ..Self::default()
        }
    }

    pub fn with_heartbeat(mut self, every: Duration) -> Self {
        self.heartbeat = Some(every);
        self
    }

    pub fn with_log_tasks(mut self, log_tasks: bool) -> Self {
        self.log_tasks = log_tasks;
        self
    }

    pub fn pass_options(&self, raise_errors: bool) -> PassOptions {
        PassOptions {
            raise_errors,
            heartbeat: self.heartbeat,
            log_tasks: self.log_tasks,
        }
    }
}

/// Options for a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    /// Stop dispatching at the first failure and return it as an error.
    pub raise_errors: bool,
    pub heartbeat: Option<Duration>,
    pub log_tasks: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            raise_errors: false,
            heartbeat: None,
            log_tasks: true,
        }
    }
}

impl PassOptions {
    pub fn raising() -> Self {
        Self {
            raise_errors: true,
            ..Self::default()
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Actions invoked and recorded during this pass.
    pub executed: usize,
    pub succeeded: usize,
    /// Invoked actions that failed.
    pub failed: usize,
    /// Tasks recorded as blocked during this pass.
    pub blocked: usize,
    /// Tasks left without an outcome when the pass ended.
    pub not_reached: usize,
    pub duration: Duration,
}
