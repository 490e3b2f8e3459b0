// src/exec/pool.rs

//! Bounded worker-pool pass on the tokio runtime.

use std::collections::HashMap;

use tokio::task::{Id, JoinSet};
use tracing::debug;

use crate::dag::{Action, Graph, TaskName, TaskOutcome};
use crate::errors::{Result, SweepdagError};
use crate::exec::pass::{AbortSignal, Pass};
use crate::exec::{PassOptions, PassReport};

/// Run one pass over `graph` with at most `workers` actions in flight.
///
/// Blocking actions go to the blocking thread pool, async actions are
/// spawned as tasks. This coordinator is the only writer of the graph: it
/// awaits the next completion, records it and fills free slots. Completion
/// order is unspecified; the recorded results are not.
///
/// A worker that cannot be joined aborts the pass with
/// [`SweepdagError::Executor`] naming its task, and leaves that task
/// unrecorded.
pub async fn run_parallel_async(
    graph: &mut Graph,
    workers: usize,
    opts: PassOptions,
) -> Result<PassReport> {
    if workers == 0 {
        return Err(SweepdagError::ConfigError(
            "worker pool needs at least one worker (got 0)".to_string(),
        ));
    }

    let mut pass = Pass::begin(graph, opts, "pool");
    let signal = pass.abort_signal();
    let mut join_set: JoinSet<(TaskName, Option<TaskOutcome>)> = JoinSet::new();
    let mut spawned: HashMap<Id, TaskName> = HashMap::new();

    loop {
        while pass.in_flight() < workers {
            let Some((name, action)) = pass.next_dispatch() else {
                break;
            };
            debug!(task = %name, blocking = action.is_blocking(), "dispatching to worker");
            let key = name.clone();
            let signal = signal.clone();
            let handle = if action.is_blocking() {
                join_set.spawn_blocking(move || {
                    if signal.is_raised() {
                        return (name, None);
                    }
                    let outcome = action.invoke_blocking();
                    (name, Some(outcome))
                })
            } else {
                join_set.spawn(spawn_future(name, action, signal))
            };
            spawned.insert(handle.id(), key);
        }

        if join_set.is_empty() {
            break;
        }

        let joined = match opts.heartbeat {
            Some(every) => {
                tokio::select! {
                    joined = join_set.join_next_with_id() => joined,
                    _ = tokio::time::sleep(every) => {
                        pass.heartbeat();
                        continue;
                    }
                }
            }
            None => join_set.join_next_with_id().await,
        };

        match joined {
            Some(Ok((id, (name, outcome)))) => {
                spawned.remove(&id);
                match outcome {
                    Some(outcome) => pass.complete(name, outcome),
                    None => pass.release(name),
                }
            }
            Some(Err(err)) => {
                let name = spawned.remove(&err.id());
                let msg = match &name {
                    Some(name) => format!("worker for task '{name}' could not be joined: {err}"),
                    None => format!("worker task could not be joined: {err}"),
                };
                pass.lose(name, SweepdagError::Executor(msg));
            }
            None => break,
        }
    }

    pass.finish()
}

async fn spawn_future(
    name: TaskName,
    action: Action,
    signal: AbortSignal,
) -> (TaskName, Option<TaskOutcome>) {
    if signal.is_raised() {
        return (name, None);
    }
    let outcome = action.invoke().await;
    (name, Some(outcome))
}
