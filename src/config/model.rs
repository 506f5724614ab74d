// src/config/model.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// On-disk shape of the desired-state file.
///
/// ```toml
/// [[program]]
/// name = "web"
/// command = "python -m http.server 8000"
/// dir = "/srv/www"
/// autostart = true
/// start_retries = 3
/// ```
///
/// Order of the `[[program]]` tables is the registry's display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramsFile {
    #[serde(default)]
    pub program: Vec<ProgramSpec>,
}

/// Desired state for one supervised program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSpec {
    /// Unique key in the registry.
    pub name: String,

    /// Shell line executed with `sh -c`.
    pub command: String,

    /// Working directory; `check()` fills in `/` when left empty.
    #[serde(default)]
    pub dir: String,

    /// Start the program as soon as it is registered.
    #[serde(default)]
    pub autostart: bool,

    /// Consecutive failed starts/crashes tolerated before going `Fatal`.
    #[serde(default)]
    pub start_retries: u32,

    /// When false, an exit while running parks the program in `Stopped`
    /// instead of scheduling a restart.
    #[serde(default = "default_autorestart")]
    pub autorestart: bool,

    /// Base delay between a crash and the next attempt (e.g. `"1s"`).
    ///
    /// Doubled for each consecutive failure, capped at one minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<String>,

    /// Grace period between the termination signal and a forced kill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<String>,

    /// Extra environment variables for the child.
    ///
    /// Kept last: it renders as a `[program.environment]` sub-table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

fn default_autorestart() -> bool {
    true
}

impl ProgramSpec {
    /// Minimal spec with defaults for everything but name and command.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            dir: String::new(),
            autostart: false,
            start_retries: 0,
            environment: BTreeMap::new(),
            autorestart: default_autorestart(),
            retry_delay: None,
            stop_timeout: None,
        }
    }

    /// Content hash over the fields that affect how the program runs.
    ///
    /// Two specs with the same fingerprint are treated as unchanged by the
    /// reconciler. Every field is length-prefixed so adjacent values can't
    /// collide.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        let mut field = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        field(self.name.as_bytes());
        field(self.command.as_bytes());
        field(self.dir.as_bytes());
        field(&[self.autostart as u8]);
        field(&self.start_retries.to_le_bytes());
        field(&(self.environment.len() as u64).to_le_bytes());
        for (key, value) in &self.environment {
            field(key.as_bytes());
            field(value.as_bytes());
        }
        field(&[self.autorestart as u8]);
        field(self.retry_delay.as_deref().unwrap_or("").as_bytes());
        field(self.stop_timeout.as_deref().unwrap_or("").as_bytes());

        hasher.finalize()
    }
}
