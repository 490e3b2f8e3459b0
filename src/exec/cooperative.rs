// src/exec/cooperative.rs

//! Single-threaded cooperative pass.

use futures::stream::{FuturesUnordered, StreamExt};

use crate::dag::Graph;
use crate::errors::Result;
use crate::exec::pass::Pass;
use crate::exec::{PassOptions, PassReport};

/// Run one pass over `graph` on the current task.
///
/// Every runnable task is started at once and polled together; the loop
/// wakes on whichever finishes first, records it and starts whatever that
/// unlocked. Blocking actions run inline when polled, so only waiting inside
/// async actions overlaps.
///
/// With `raise_errors`, the first failure stops further dispatch. Tasks
/// whose action already started are drained and recorded; tasks pushed but
/// not yet polled stay pending. Then the failure is returned
/// as [`SweepdagError::TaskFailed`](crate::errors::SweepdagError::TaskFailed).
pub async fn run_async(graph: &mut Graph, opts: PassOptions) -> Result<PassReport> {
    let mut pass = Pass::begin(graph, opts, "cooperative");
    let signal = pass.abort_signal();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while let Some((name, action)) = pass.next_dispatch() {
            let signal = signal.clone();
            in_flight.push(async move {
                // Blocking actions start on first poll, which may come after
                // a sibling already aborted the pass.
                if signal.is_raised() {
                    return (name, None);
                }
                let outcome = action.invoke().await;
                (name, Some(outcome))
            });
        }

        if in_flight.is_empty() {
            break;
        }

        let next = match opts.heartbeat {
            Some(every) => {
                tokio::select! {
                    next = in_flight.next() => next,
                    _ = tokio::time::sleep(every) => {
                        pass.heartbeat();
                        continue;
                    }
                }
            }
            None => in_flight.next().await,
        };

        match next {
            Some((name, Some(outcome))) => pass.complete(name, outcome),
            Some((name, None)) => pass.release(name),
            None => {}
        }
    }

    pass.finish()
}
