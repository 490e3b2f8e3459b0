// src/dag/task.rs

//! Tasks, their actions and the tagged outcome of running them.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Value produced by a successful action (a report path, a log excerpt, ...).
pub type TaskOutput = String;

/// What an action hands back to the scheduler.
pub type ActionResult = anyhow::Result<TaskOutput>;

/// Boxed future returned by asynchronous actions.
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send + 'static>>;

/// A nullary, reusable operation.
///
/// Actions are reference counted so that a retried task can be invoked again
/// and so that executors can move a handle onto a worker while the graph
/// keeps ownership of the task.
#[derive(Clone)]
pub enum Action {
    /// Runs on the calling thread (or a worker thread) until it returns.
    Blocking(Arc<dyn Fn() -> ActionResult + Send + Sync>),
    /// Produces a future; waiting inside it yields to other in-flight tasks.
    Future(Arc<dyn Fn() -> ActionFuture + Send + Sync>),
}

impl Action {
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        Action::Blocking(Arc::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        Action::Future(Arc::new(move || Box::pin(f()) as ActionFuture))
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Action::Blocking(_))
    }

    /// Invoke the action from async code.
    ///
    /// Blocking actions run inline when the returned future is polled, so a
    /// single coordinator never overlaps their CPU work. Panics are captured
    /// as [`TaskFailure::Panicked`].
    pub async fn invoke(self) -> TaskOutcome {
        match self {
            Action::Blocking(f) => outcome_of(catch_unwind(AssertUnwindSafe(|| f()))),
            Action::Future(f) => {
                let fut = match catch_unwind(AssertUnwindSafe(|| f())) {
                    Ok(fut) => fut,
                    Err(payload) => return panicked(payload),
                };
                outcome_of(AssertUnwindSafe(fut).catch_unwind().await)
            }
        }
    }

    /// Invoke the action on the current (non-async) thread.
    ///
    /// Future actions are driven on a fresh current-thread runtime, so this
    /// must not be called from inside an async task.
    pub fn invoke_blocking(self) -> TaskOutcome {
        match self {
            Action::Blocking(f) => outcome_of(catch_unwind(AssertUnwindSafe(|| f()))),
            Action::Future(f) => {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        return TaskOutcome::Failed(TaskFailure::Error(format!(
                            "building runtime for async action: {e}"
                        )));
                    }
                };
                outcome_of(catch_unwind(AssertUnwindSafe(|| rt.block_on(f()))))
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Blocking(_) => f.write_str("Action::Blocking(..)"),
            Action::Future(_) => f.write_str("Action::Future(..)"),
        }
    }
}

fn outcome_of(result: std::thread::Result<ActionResult>) -> TaskOutcome {
    match result {
        Ok(Ok(output)) => TaskOutcome::Success(output),
        Ok(Err(err)) => TaskOutcome::Failed(TaskFailure::Error(format!("{err:#}"))),
        Err(payload) => panicked(payload),
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> TaskOutcome {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    TaskOutcome::Failed(TaskFailure::Panicked(msg))
}

/// Why a task did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    /// The action returned an error.
    #[error("{0}")]
    Error(String),
    /// The action panicked.
    #[error("panicked: {0}")]
    Panicked(String),
    /// A dependency failed, so the action was never invoked.
    #[error("blocked by failed dependency '{dependency}'")]
    Blocked { dependency: TaskName },
}

impl TaskFailure {
    pub fn is_blocked(&self) -> bool {
        matches!(self, TaskFailure::Blocked { .. })
    }
}

/// Outcome recorded for a task in the graph's results store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(TaskOutput),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success(out) => Some(out),
            TaskOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Failed(f) => Some(f),
        }
    }
}

/// A named unit of work with declared dependencies.
///
/// Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Task {
    name: TaskName,
    action: Action,
    dependencies: BTreeSet<TaskName>,
}

impl Task {
    pub fn new(name: TaskName, action: Action, dependencies: BTreeSet<TaskName>) -> Self {
        Self {
            name,
            action,
            dependencies,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Dependencies as declared, including ones already satisfied by a
    /// previous pass.
    pub fn dependencies(&self) -> &BTreeSet<TaskName> {
        &self.dependencies
    }
}
