// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{ExecutorConfig, Strategy};
use crate::types::StrategyKind;

/// Top-level sweep file as read from TOML, before validation.
///
/// ```toml
/// [executor]
/// strategy = "pool"
/// workers = 4
/// retries = 3
///
/// [task.synth]
/// cmd = "vivado -mode batch -source synth.tcl -tclargs {{width}}"
///
/// [task.route]
/// cmd = "vivado -mode batch -source route.tcl -tclargs {{width}}"
/// after = ["synth"]
///
/// [[sweep]]
/// name = "w8"
/// vars = { width = "8" }
/// ```
///
/// All sections are optional at this stage; [`SweepFile`] is the validated
/// form the rest of the crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSweepFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    /// Task templates from `[task.<name>]`, keyed by template name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskTemplate>,

    /// Configurations from `[[sweep]]`, in file order.
    #[serde(default)]
    pub sweep: Vec<SweepEntry>,
}

/// Validated sweep file. Construct with `SweepFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct SweepFile {
    pub executor: ExecutorSection,
    pub task: BTreeMap<String, TaskTemplate>,
    pub sweep: Vec<SweepEntry>,
}

impl SweepFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        task: BTreeMap<String, TaskTemplate>,
        sweep: Vec<SweepEntry>,
    ) -> Self {
        Self {
            executor,
            task,
            sweep,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Worker count for `pool` / `parallel`; defaults to the number of CPUs.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Stop each pass at its first failure.
    #[serde(default)]
    pub raise_errors: bool,

    /// Maximum number of passes (the first run included).
    #[serde(default = "default_retries")]
    pub retries: usize,

    #[serde(default)]
    pub heartbeat_secs: Option<u64>,

    #[serde(default = "default_log_tasks")]
    pub log_tasks: bool,
}

fn default_retries() -> usize {
    3
}

fn default_log_tasks() -> bool {
    true
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            workers: None,
            raise_errors: false,
            retries: default_retries(),
            heartbeat_secs: None,
            log_tasks: default_log_tasks(),
        }
    }
}

impl ExecutorSection {
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        let strategy = match self.strategy {
            StrategyKind::Cooperative => Strategy::Cooperative,
            StrategyKind::Pool => Strategy::WorkerPool {
                workers: self.effective_workers(),
            },
            StrategyKind::Parallel => Strategy::Parallel {
                workers: self.effective_workers(),
            },
        };

        ExecutorConfig {
            strategy,
            heartbeat: self.heartbeat_secs.map(Duration::from_secs),
            log_tasks: self.log_tasks,
        }
    }
}

/// `[task.<name>]` section: a command template expanded once per sweep
/// configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskTemplate {
    /// Shell command; `{{var}}` and `{{config}}` are substituted.
    pub cmd: String,

    /// Templates this one waits for, within the same configuration.
    #[serde(default)]
    pub after: Vec<String>,
}

/// One `[[sweep]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepEntry {
    pub name: String,

    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}
