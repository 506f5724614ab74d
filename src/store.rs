// src/store.rs

//! Persistence adapter for the desired-state list.
//!
//! The supervisor only talks to a [`ProgramStore`]; the in-memory registry
//! stays authoritative and the store is a best-effort mirror of it.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{load_from_path, render_programs, ProgramSpec, PROGRAMS_FILE};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};

pub trait ProgramStore: Send + Sync + Debug {
    /// Read the persisted desired state (duplicates already rejected).
    fn load(&self) -> Result<Vec<ProgramSpec>>;

    /// Replace the persisted desired state.
    fn save(&self, specs: &[ProgramSpec]) -> Result<()>;
}

/// TOML file store: `<config dir>/programs.toml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    /// Store backed by the real filesystem inside `config_dir`.
    pub fn in_dir(config_dir: impl AsRef<Path>) -> Self {
        Self::new(
            Arc::new(RealFileSystem),
            config_dir.as_ref().join(PROGRAMS_FILE),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgramStore for FileStore {
    fn load(&self) -> Result<Vec<ProgramSpec>> {
        let specs = load_from_path(self.fs.as_ref(), &self.path)?;
        debug!(path = ?self.path, programs = specs.len(), "loaded desired state");
        Ok(specs)
    }

    fn save(&self, specs: &[ProgramSpec]) -> Result<()> {
        let rendered = render_programs(specs)?;
        self.fs.write(&self.path, rendered.as_bytes())?;
        debug!(path = ?self.path, programs = specs.len(), "saved desired state");
        Ok(())
    }
}
