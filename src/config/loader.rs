// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSweepFile, SweepFile};
use crate::errors::Result;

/// Load a sweep file from a given path and return the raw `RawSweepFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSweepFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> Result<RawSweepFile> {
    let config: RawSweepFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a sweep file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks executor settings, `after` references, sweep names and
///   command placeholders.
///
/// Cycles among templates are reported later, when the expanded plan is
/// turned into a graph.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SweepFile> {
    let raw = load_from_path(&path)?;
    SweepFile::try_from(raw)
}

/// Default sweep file: `Sweep.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Sweep.toml")
}
