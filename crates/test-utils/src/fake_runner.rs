use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use sweepdag::dag::Graph;
use sweepdag::errors::{Result, SweepdagError};
use sweepdag::exec::{PassOptions, PassReport, PassRunner, run_async};

/// What the fake runner does on one pass.
#[derive(Debug, Clone)]
pub enum FakePass {
    /// Run a real cooperative pass.
    Run,
    /// Return an executor error without touching the graph.
    AbortUnexplained(String),
    /// Run a real cooperative pass, then report an executor error anyway.
    RunThenAbort(String),
}

/// A pass runner that follows a script instead of a configured strategy:
/// - records the size of the graph each pass started with
/// - falls back to [`FakePass::Run`] once the script is exhausted.
pub struct FakePassRunner {
    graph: Graph,
    script: VecDeque<FakePass>,
    graph_sizes: Vec<usize>,
}

impl FakePassRunner {
    pub fn new(graph: Graph, script: impl IntoIterator<Item = FakePass>) -> Self {
        Self {
            graph,
            script: script.into_iter().collect(),
            graph_sizes: Vec::new(),
        }
    }

    /// Number of tasks in the graph at the start of each pass.
    pub fn graph_sizes(&self) -> &[usize] {
        &self.graph_sizes
    }
}

impl PassRunner for FakePassRunner {
    fn run_pass(
        &mut self,
        raise_errors: bool,
    ) -> Pin<Box<dyn Future<Output = Result<PassReport>> + Send + '_>> {
        Box::pin(async move {
            self.graph_sizes.push(self.graph.len());
            let opts = PassOptions {
                raise_errors,
                ..PassOptions::default()
            };

            match self.script.pop_front().unwrap_or(FakePass::Run) {
                FakePass::Run => run_async(&mut self.graph, opts).await,
                FakePass::AbortUnexplained(msg) => Err(SweepdagError::Executor(msg)),
                FakePass::RunThenAbort(msg) => {
                    let _ = run_async(&mut self.graph, opts).await;
                    Err(SweepdagError::Executor(msg))
                }
            }
        })
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
