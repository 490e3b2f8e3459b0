// src/config/mod.rs

//! Sweep file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a sweep file from disk (`loader.rs`).
//! - Validate executor settings, references and placeholders (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{ExecutorSection, RawSweepFile, SweepEntry, SweepFile, TaskTemplate};
pub use validate::validate_config;
