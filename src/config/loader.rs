// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ProgramSpec, ProgramsFile};
use crate::config::validate::ensure_unique_names;
use crate::errors::Result;
use crate::fs::FileSystem;

/// File name of the desired-state file inside the config directory.
pub const PROGRAMS_FILE: &str = "programs.toml";

/// Parse the TOML desired-state document.
///
/// Rejects duplicated program names. Per-program validation (`check()`) is
/// left to the reconciler so that one bad entry doesn't block the rest.
pub fn parse_programs(contents: &str) -> Result<Vec<ProgramSpec>> {
    let file: ProgramsFile = toml::from_str(contents)?;
    ensure_unique_names(&file.program)?;
    Ok(file.program)
}

/// Render specs back into the TOML document, preserving order.
pub fn render_programs(specs: &[ProgramSpec]) -> Result<String> {
    let file = ProgramsFile {
        program: specs.to_vec(),
    };
    Ok(toml::to_string(&file)?)
}

/// Load the desired-state list from `path`.
///
/// A missing file is an empty list, not an error.
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<Vec<ProgramSpec>> {
    if !fs.exists(path) {
        return Ok(Vec::new());
    }
    let contents = fs.read_to_string(path)?;
    parse_programs(&contents)
}

/// Resolve the default config directory.
///
/// `PROCWARDEN_HOME` wins; otherwise `~/.procwarden`, or `./.procwarden` when
/// no home directory can be determined.
pub fn default_config_dir() -> PathBuf {
    match std::env::var_os("PROCWARDEN_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".procwarden"),
    }
}
