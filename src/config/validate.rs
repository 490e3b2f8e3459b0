// src/config/validate.rs

use std::collections::BTreeSet;

use crate::config::model::{RawSweepFile, SweepFile};
use crate::errors::{Result, SweepdagError};
use crate::sweep::{CONFIG_PLACEHOLDER, placeholders};

impl TryFrom<RawSweepFile> for SweepFile {
    type Error = SweepdagError;

    fn try_from(raw: RawSweepFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(SweepFile::new_unchecked(raw.executor, raw.task, raw.sweep))
    }
}

/// Validate an already-built [`SweepFile`], e.g. after CLI overrides were
/// applied to it.
pub fn validate_config(cfg: &SweepFile) -> Result<()> {
    let raw = RawSweepFile {
        executor: cfg.executor.clone(),
        task: cfg.task.clone(),
        sweep: cfg.sweep.clone(),
    };
    validate_raw_config(&raw)
}

fn validate_raw_config(cfg: &RawSweepFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_executor(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_sweeps(cfg)?;
    validate_placeholders(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawSweepFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(SweepdagError::ConfigError(
            "sweep file must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor(cfg: &RawSweepFile) -> Result<()> {
    let exec = &cfg.executor;

    if exec.workers == Some(0) {
        return Err(SweepdagError::ConfigError(
            "[executor].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if exec.retries == 0 {
        return Err(SweepdagError::ConfigError(
            "[executor].retries must be >= 1 (got 0)".to_string(),
        ));
    }

    if exec.heartbeat_secs == Some(0) {
        return Err(SweepdagError::ConfigError(
            "[executor].heartbeat_secs must be >= 1 when set (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawSweepFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if name.contains('@') {
            return Err(SweepdagError::ConfigError(format!(
                "task name '{name}' must not contain '@'"
            )));
        }
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(SweepdagError::ConfigError(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_sweeps(cfg: &RawSweepFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    for entry in cfg.sweep.iter() {
        if entry.name.trim().is_empty() {
            return Err(SweepdagError::ConfigError(
                "[[sweep]] entries need a non-empty `name`".to_string(),
            ));
        }
        if entry.name.contains('@') {
            return Err(SweepdagError::ConfigError(format!(
                "sweep name '{}' must not contain '@'",
                entry.name
            )));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(SweepdagError::ConfigError(format!(
                "sweep name '{}' is used more than once",
                entry.name
            )));
        }
    }
    Ok(())
}

fn validate_placeholders(cfg: &RawSweepFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let used = placeholders(&task.cmd).map_err(|e| {
            SweepdagError::ConfigError(format!("task '{name}': {e}"))
        })?;

        for var in used {
            if cfg.sweep.is_empty() {
                return Err(SweepdagError::ConfigError(format!(
                    "task '{name}' uses placeholder '{{{{{var}}}}}' but no [[sweep]] is declared"
                )));
            }
            if var == CONFIG_PLACEHOLDER {
                continue;
            }
            if let Some(entry) = cfg.sweep.iter().find(|s| !s.vars.contains_key(var)) {
                return Err(SweepdagError::ConfigError(format!(
                    "task '{name}' uses placeholder '{{{{{var}}}}}' which sweep '{}' does not define",
                    entry.name
                )));
            }
        }
    }
    Ok(())
}
