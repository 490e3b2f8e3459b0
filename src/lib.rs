// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sweep;
pub mod types;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{SweepFile, default_config_path, load_and_validate, validate_config};
use crate::dag::TaskName;
use crate::engine::RecoveryReport;
use crate::sweep::SweepBuilder;

pub use crate::dag::{Action, Graph, TaskFailure, TaskOutcome, create_graph};
pub use crate::engine::{RecoveryController, Scenario};
pub use crate::errors::SweepdagError;
pub use crate::exec::ExecutorConfig;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - sweep file loading and CLI overrides
/// - expansion into a plan and graph construction
/// - one scenario driven by the recovery controller
/// - the final summary
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args)?;

    let plan = SweepBuilder::from_config(&cfg)?.build()?;
    let commands = plan.commands.clone();
    let graph = plan.into_graph()?;

    if args.dry_run {
        print!("{}", dry_run_plan(&cfg, &graph, &commands));
        debug!("dry-run complete (no execution)");
        return Ok(());
    }

    let executor = cfg.executor.executor_config();
    info!(
        tasks = graph.len(),
        strategy = ?executor.strategy,
        retries = cfg.executor.retries,
        "starting sweep"
    );

    let mut scenario = Scenario::new(graph, executor);
    let controller = RecoveryController::new(cfg.executor.retries)
        .with_raise_errors(cfg.executor.raise_errors);
    let report = controller.run(&mut scenario).await?;

    print_summary(scenario.graph(), &report);

    if !report.completed {
        bail!(
            "sweep did not complete after {} pass(es); {} task(s) still failing",
            report.passes,
            scenario.graph().failures().count()
        );
    }
    Ok(())
}

/// Fold CLI flags into the loaded sweep file and re-validate.
fn apply_overrides(cfg: &mut SweepFile, args: &CliArgs) -> Result<()> {
    if let Some(strategy) = args.strategy {
        cfg.executor.strategy = strategy;
    }
    if let Some(workers) = args.workers {
        cfg.executor.workers = Some(workers);
    }
    if let Some(retries) = args.retries {
        cfg.executor.retries = retries;
    }
    if args.raise_errors {
        cfg.executor.raise_errors = true;
    }
    validate_config(cfg)?;
    Ok(())
}

/// Plan output: executor settings, the waves of [`Graph::execution_plan`],
/// then the rendered command of every task built from the sweep file.
pub fn dry_run_plan(cfg: &SweepFile, graph: &Graph, commands: &BTreeMap<TaskName, String>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "sweepdag dry-run");
    let _ = writeln!(out, "  executor.strategy = {:?}", cfg.executor.strategy);
    let _ = writeln!(out, "  executor.workers = {}", cfg.executor.effective_workers());
    let _ = writeln!(out, "  executor.retries = {}", cfg.executor.retries);
    let _ = writeln!(out, "  executor.raise_errors = {}", cfg.executor.raise_errors);
    let _ = writeln!(out);

    let _ = writeln!(out, "tasks ({}):", graph.len());
    out.push_str(&graph.execution_plan());

    if !commands.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "commands:");
        for (name, cmd) in commands {
            let _ = writeln!(out, "  {name}: {cmd}");
        }
    }
    out
}

fn print_summary(graph: &Graph, report: &RecoveryReport) {
    println!(
        "sweep {} after {} pass(es)",
        if report.completed { "completed" } else { "incomplete" },
        report.passes
    );

    for (name, outcome) in graph.results() {
        match outcome {
            TaskOutcome::Success(_) => println!("  ok       {name}"),
            TaskOutcome::Failed(f) if f.is_blocked() => println!("  blocked  {name}: {f}"),
            TaskOutcome::Failed(f) => println!("  FAILED   {name}: {f}"),
        }
    }
    for name in graph.pending() {
        println!("  pending  {name}");
    }
}
