// src/exec/backend.rs

//! Pluggable pass runner abstraction.
//!
//! The recovery controller talks to a `PassRunner` instead of a concrete
//! scenario. Production code uses [`Scenario`](crate::engine::Scenario);
//! tests can provide a runner that scripts pass results without running
//! anything.

use std::future::Future;
use std::pin::Pin;

use crate::dag::Graph;
use crate::errors::Result;
use crate::exec::PassReport;

/// Something that owns a graph and can run one pass over it.
pub trait PassRunner: Send {
    /// Run one pass over the current graph.
    ///
    /// The implementation is free to:
    /// - drive one of the real executors (production)
    /// - record or fail tasks directly (tests)
    fn run_pass(
        &mut self,
        raise_errors: bool,
    ) -> Pin<Box<dyn Future<Output = Result<PassReport>> + Send + '_>>;

    fn graph(&self) -> &Graph;

    /// Take the current graph out, leaving an empty one behind.
    fn take_graph(&mut self) -> Graph;

    fn set_graph(&mut self, graph: Graph);
}
