// src/dag/mod.rs

//! DAG representation and per-run bookkeeping.
//!
//! - [`task`] defines tasks, actions and tagged outcomes.
//! - [`adjacency`] holds the validated dependency structure.
//! - [`graph`] is the public [`Graph`] plus [`create_graph`].
//! - [`state_manager`] manages per-run state transitions.
//! - [`scheduler_step`] defines the result type of recording an outcome.

pub mod adjacency;
pub mod graph;
pub mod scheduler_step;
pub mod state_manager;
pub mod task;

pub use adjacency::DagGraph;
pub use graph::{create_graph, Graph, GraphSummary};
pub use scheduler_step::SchedulerStep;
pub use state_manager::Readiness;
pub use task::{
    Action, ActionFuture, ActionResult, Task, TaskFailure, TaskName, TaskOutcome, TaskOutput,
};
