// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// Executor strategy as named in the sweep file and on the CLI.
///
/// - `Cooperative`: one thread of control, async actions overlap their
///   waiting (default).
/// - `Pool`: bounded worker pool on the tokio runtime.
/// - `Parallel`: dedicated thread pool, synchronous coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Cooperative,
    Pool,
    Parallel,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cooperative" => Ok(StrategyKind::Cooperative),
            "pool" => Ok(StrategyKind::Pool),
            "parallel" => Ok(StrategyKind::Parallel),
            other => Err(format!(
                "invalid strategy: {other} (expected \"cooperative\", \"pool\" or \"parallel\")"
            )),
        }
    }
}
