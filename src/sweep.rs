// src/sweep.rs

//! Expansion of a sweep file into `(name, action, dependencies)` triples.
//!
//! Every task template is instantiated once per `[[sweep]]` configuration as
//! `<task>@<config>`; its `after` list is rewritten to the instances of the
//! same configuration. Without any `[[sweep]]` the templates are used as-is.
//! Commands may refer to configuration variables as `{{var}}` and to the
//! configuration name as `{{config}}`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::SweepFile;
use crate::dag::{Action, Graph, TaskName, create_graph};
use crate::errors::{Result, SweepdagError};
use crate::exec::command_action;

/// Placeholder that expands to the configuration name.
pub const CONFIG_PLACEHOLDER: &str = "config";

/// Name of the instance of `task` for configuration `config`.
pub fn instance_name(task: &str, config: Option<&str>) -> TaskName {
    match config {
        Some(config) => format!("{task}@{config}"),
        None => task.to_string(),
    }
}

/// Placeholder names used in `template`, in order of appearance.
///
/// Single braces are left alone so shell syntax like `${HOME}` passes
/// through.
pub fn placeholders(template: &str) -> std::result::Result<Vec<&str>, String> {
    let mut found = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(format!("unterminated placeholder in '{template}'"));
        };
        let name = after[..end].trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("invalid placeholder '{{{{{}}}}}'", &after[..end]));
        }
        found.push(name);
        rest = &after[end + 2..];
    }

    Ok(found)
}

/// Substitute `{{var}}` and `{{config}}` in `template`.
pub fn render(
    template: &str,
    vars: &BTreeMap<String, String>,
    config: Option<&str>,
) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(format!("unterminated placeholder in '{template}'"));
        };
        let name = after[..end].trim();
        let value = match (name, config) {
            (CONFIG_PLACEHOLDER, Some(config)) => config,
            _ => vars
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| format!("no value for placeholder '{{{{{name}}}}}'"))?,
        };
        out.push_str(value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Flat plan ready for [`create_graph`].
#[derive(Debug, Default)]
pub struct SweepPlan {
    pub actions: BTreeMap<TaskName, Action>,
    pub dependencies: BTreeMap<TaskName, Vec<TaskName>>,
    /// Rendered shell command per task, for tasks built from a sweep file.
    pub commands: BTreeMap<TaskName, String>,
}

impl SweepPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_graph(self) -> Result<Graph> {
        create_graph(self.actions, self.dependencies)
    }
}

#[derive(Debug)]
struct Entry {
    name: TaskName,
    action: Action,
    dependencies: Vec<TaskName>,
    command: Option<String>,
}

/// Collects `(name, action, dependencies)` triples, from code or from a
/// sweep file, and turns them into a [`SweepPlan`].
#[derive(Debug, Default)]
pub struct SweepBuilder {
    entries: Vec<Entry>,
}

impl SweepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one task.
    pub fn task<N, I, D>(mut self, name: N, action: Action, dependencies: I) -> Self
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = D>,
        D: Into<TaskName>,
    {
        self.add_task(name, action, dependencies);
        self
    }

    pub fn add_task<N, I, D>(&mut self, name: N, action: Action, dependencies: I)
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = D>,
        D: Into<TaskName>,
    {
        self.entries.push(Entry {
            name: name.into(),
            action,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            command: None,
        });
    }

    /// Expand every task template for every sweep configuration into shell
    /// command actions.
    pub fn from_config(cfg: &SweepFile) -> Result<Self> {
        let mut builder = Self::new();

        let configs: Vec<(Option<&str>, BTreeMap<String, String>)> = if cfg.sweep.is_empty() {
            vec![(None, BTreeMap::new())]
        } else {
            cfg.sweep
                .iter()
                .map(|s| (Some(s.name.as_str()), s.vars.clone()))
                .collect()
        };

        for (config, vars) in &configs {
            for (template_name, template) in &cfg.task {
                let name = instance_name(template_name, *config);
                let cmd = render(&template.cmd, vars, *config).map_err(|e| {
                    SweepdagError::ConfigError(format!("task '{name}': {e}"))
                })?;
                let deps = template
                    .after
                    .iter()
                    .map(|dep| instance_name(dep, *config))
                    .collect();

                debug!(task = %name, cmd = %cmd, "expanded task template");

                builder.entries.push(Entry {
                    action: command_action(name.clone(), cmd.clone()),
                    name,
                    dependencies: deps,
                    command: Some(cmd),
                });
            }
        }

        Ok(builder)
    }

    /// Merge programmatic tasks into a builder created from a sweep file.
    pub fn extend(mut self, other: SweepBuilder) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// Finish the plan. Names must be unique.
    pub fn build(self) -> Result<SweepPlan> {
        let mut plan = SweepPlan::default();
        let mut seen = BTreeSet::new();

        for entry in self.entries {
            if !seen.insert(entry.name.clone()) {
                return Err(SweepdagError::DuplicateTask(entry.name));
            }
            if let Some(cmd) = entry.command {
                plan.commands.insert(entry.name.clone(), cmd);
            }
            if !entry.dependencies.is_empty() {
                plan.dependencies
                    .insert(entry.name.clone(), entry.dependencies);
            }
            plan.actions.insert(entry.name, entry.action);
        }

        Ok(plan)
    }
}
