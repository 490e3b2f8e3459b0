// src/exec/parallel.rs

//! Synchronous parallel pass on a dedicated rayon thread pool.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{RecvTimeoutError, unbounded};
use rayon::ThreadPoolBuilder;
use tracing::{debug, error};

use crate::dag::{Graph, TaskName, TaskOutcome};
use crate::errors::{Result, SweepdagError};
use crate::exec::pass::Pass;
use crate::exec::{PassOptions, PassReport};

/// Run one pass over `graph`, blocking the calling thread until it ends.
///
/// `workers` threads run actions; each sends its outcome back over a channel
/// and the calling thread, the only writer of the graph, records it and
/// dispatches whatever became runnable. Async actions are driven to
/// completion on their worker with a current-thread runtime.
///
/// Must not be called from inside an async task; use
/// [`Scenario`](crate::engine::Scenario) or [`spawn_blocking_pass`], which
/// move it to a blocking thread.
pub fn run_parallel(graph: &mut Graph, workers: usize, opts: PassOptions) -> Result<PassReport> {
    if workers == 0 {
        return Err(SweepdagError::ConfigError(
            "parallel executor needs at least one worker (got 0)".to_string(),
        ));
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("sweepdag-worker-{i}"))
        .build()
        .map_err(|e| SweepdagError::Executor(format!("building worker thread pool: {e}")))?;

    let (tx, rx) = unbounded::<(TaskName, Option<TaskOutcome>)>();
    let mut pass = Pass::begin(graph, opts, "parallel");
    let signal = pass.abort_signal();

    loop {
        while pass.in_flight() < workers {
            let Some((name, action)) = pass.next_dispatch() else {
                break;
            };
            let tx = tx.clone();
            let signal = signal.clone();
            pool.spawn(move || {
                let outcome = if signal.is_raised() {
                    None
                } else {
                    Some(action.invoke_blocking())
                };
                if tx.send((name, outcome)).is_err() {
                    debug!("coordinator gone; dropping task outcome");
                }
            });
        }

        if pass.in_flight() == 0 {
            break;
        }

        let received = match opts.heartbeat {
            Some(every) => match rx.recv_timeout(every) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => {
                    pass.heartbeat();
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => rx.recv().ok(),
        };

        match received {
            Some((name, Some(outcome))) => pass.complete(name, outcome),
            Some((name, None)) => pass.release(name),
            None => {
                pass.lose(
                    None,
                    SweepdagError::Executor(
                        "worker channel closed with tasks in flight".to_string(),
                    ),
                );
                break;
            }
        }
    }

    pass.finish()
}

/// Run a synchronous pass over `graph` on tokio's blocking pool.
///
/// The graph is shared with the blocking thread and handed back whatever
/// happens there, so outcomes recorded before a panic survive it. A pass
/// that cannot be joined returns [`SweepdagError::Executor`] and its
/// dispatched-but-unrecorded tasks are cleared back to pending.
pub async fn spawn_blocking_pass<F>(graph: &mut Graph, pass: F) -> Result<PassReport>
where
    F: FnOnce(&mut Graph) -> Result<PassReport> + Send + 'static,
{
    let shared = Arc::new(Mutex::new(std::mem::take(graph)));
    let worker = Arc::clone(&shared);

    let joined = tokio::task::spawn_blocking(move || {
        let mut graph = worker.lock().unwrap_or_else(PoisonError::into_inner);
        pass(&mut graph)
    })
    .await;

    *graph = match Arc::try_unwrap(shared) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
        Err(shared) => {
            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        }
    };

    match joined {
        Ok(result) => result,
        Err(err) => {
            let stale = graph.clear_running();
            error!(error = %err, unrecorded = ?stale, "blocking pass could not be joined");
            Err(SweepdagError::Executor(format!(
                "parallel pass could not be joined: {err}"
            )))
        }
    }
}
