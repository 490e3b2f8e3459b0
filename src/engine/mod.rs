// src/engine/mod.rs

//! Orchestration engine for sweepdag.
//!
//! This module ties together:
//! - the [`Scenario`] façade binding a graph to an executor configuration
//! - the [`RecoveryController`] that classifies a graph after each pass and
//!   retries the unfinished part

pub mod recovery;
pub mod scenario;

pub use recovery::{RecoveryController, RecoveryReport, RecoveryState, classify};
pub use scenario::Scenario;
