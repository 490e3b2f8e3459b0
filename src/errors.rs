// src/errors.rs

//! Crate-wide error type.
//!
//! Task failures are *not* errors: they are captured as
//! [`TaskOutcome::Failed`](crate::dag::TaskOutcome) in the graph's results.
//! Only structural problems, aborted passes and executor breakage surface
//! through [`SweepdagError`].

use thiserror::Error;

use crate::dag::{TaskFailure, TaskName};

#[derive(Error, Debug)]
pub enum SweepdagError {
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskName, dependency: TaskName },

    #[error("dependencies declared for unknown task '{0}'")]
    TaskNotFound(TaskName),

    #[error("task '{0}' is defined more than once")]
    DuplicateTask(TaskName),

    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<TaskName> },

    /// A pass run with `raise_errors = true` stopped at this failure.
    #[error("task '{task}' failed: {failure}")]
    TaskFailed { task: TaskName, failure: TaskFailure },

    /// A pass aborted but no task outcome explains the abort.
    #[error("pass aborted without any recorded task failure (suspected race condition): {source}")]
    RaceCondition {
        #[source]
        source: Box<SweepdagError>,
    },

    #[error("executor error: {0}")]
    Executor(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SweepdagError {
    /// Structural errors are raised at graph construction and never retried.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SweepdagError::UnknownDependency { .. }
                | SweepdagError::TaskNotFound(_)
                | SweepdagError::DuplicateTask(_)
                | SweepdagError::CyclicDependency { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SweepdagError>;
