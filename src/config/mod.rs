// src/config/mod.rs

//! Desired-state schema and its TOML encoding.
//!
//! Responsibilities:
//! - Define the program spec data model (`model.rs`).
//! - Parse/render the `programs.toml` document (`loader.rs`).
//! - Validate specs and fill in defaults (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_dir, load_from_path, parse_programs, render_programs, PROGRAMS_FILE};
pub use model::{ProgramSpec, ProgramsFile};
pub use validate::ensure_unique_names;
