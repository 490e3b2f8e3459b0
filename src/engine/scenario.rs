// src/engine/scenario.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::dag::Graph;
use crate::errors::Result;
use crate::exec::{
    ExecutorConfig, PassReport, PassRunner, Strategy, run_async, run_parallel,
    run_parallel_async, spawn_blocking_pass,
};

/// Couples one [`Graph`] with one executor configuration.
///
/// Each `run*` call is one pass over the current graph; outcomes stay in the
/// graph afterwards. Replacing the graph (as the recovery controller does)
/// keeps the configuration.
pub struct Scenario {
    graph: Graph,
    config: ExecutorConfig,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("tasks", &self.graph.len())
            .field("done", &self.graph.done().len())
            .field("config", &self.config)
            .finish()
    }
}

impl Scenario {
    pub fn new(graph: Graph, config: ExecutorConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one pass, capturing task failures in the graph.
    pub async fn run_once(&mut self) -> Result<PassReport> {
        self.run(false).await
    }

    /// Run one pass, returning the first task failure as an error.
    pub async fn run_once_raising(&mut self) -> Result<PassReport> {
        self.run(true).await
    }

    /// Run one pass with the configured strategy.
    ///
    /// The parallel strategy blocks, so it runs on tokio's blocking pool
    /// through [`spawn_blocking_pass`].
    pub async fn run(&mut self, raise_errors: bool) -> Result<PassReport> {
        let opts = self.config.pass_options(raise_errors);
        debug!(strategy = ?self.config.strategy, raise_errors, "scenario: running pass");

        match self.config.strategy {
            Strategy::Cooperative => run_async(&mut self.graph, opts).await,
            Strategy::WorkerPool { workers } => {
                run_parallel_async(&mut self.graph, workers, opts).await
            }
            Strategy::Parallel { workers } => {
                spawn_blocking_pass(&mut self.graph, move |graph| {
                    run_parallel(graph, workers, opts)
                })
                .await
            }
        }
    }

    /// Run one pass from synchronous code.
    ///
    /// Must not be called from inside an async task.
    pub fn run_blocking(&mut self, raise_errors: bool) -> Result<PassReport> {
        let opts = self.config.pass_options(raise_errors);
        if let Strategy::Parallel { workers } = self.config.strategy {
            return run_parallel(&mut self.graph, workers, opts);
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.run(raise_errors))
    }
}

impl PassRunner for Scenario {
    fn run_pass(
        &mut self,
        raise_errors: bool,
    ) -> Pin<Box<dyn Future<Output = Result<PassReport>> + Send + '_>> {
        Box::pin(self.run(raise_errors))
    }

    fn graph(&self) -> &Graph {
        &self.graph
    }

    fn take_graph(&mut self) -> Graph {
        std::mem::take(&mut self.graph)
    }

    fn set_graph(&mut self, graph: Graph) {
        self.graph = graph;
    }
}
