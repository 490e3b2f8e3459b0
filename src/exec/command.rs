// src/exec/command.rs

//! Shell command actions.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::{Action, TaskOutput};

/// How many trailing stderr lines a failure message carries.
const STDERR_TAIL_LINES: usize = 20;

/// Build an async action that runs `cmd` through the platform shell.
///
/// The action succeeds with the trimmed stdout of the process and fails with
/// the exit code and the tail of stderr.
pub fn command_action(task: impl Into<String>, cmd: impl Into<String>) -> Action {
    let task = task.into();
    let cmd = cmd.into();
    Action::future(move || run_command(task.clone(), cmd.clone()))
}

/// Run a single shell command to completion.
pub async fn run_command(task: String, cmd: String) -> Result<TaskOutput> {
    info!(task = %task, cmd = %cmd, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = command
        .output()
        .await
        .with_context(|| format!("spawning process for task '{task}'"))?;

    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task = %task, "stderr: {}", line);
    }

    info!(
        task = %task,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    if !output.status.success() {
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        if tail.is_empty() {
            bail!("command exited with code {code}");
        }
        bail!("command exited with code {code}: {tail}");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
