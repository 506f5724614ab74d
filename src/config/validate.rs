// src/config/validate.rs

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::duration::parse_duration;
use crate::config::model::ProgramSpec;
use crate::errors::{Result, SupervisorError};

pub const DEFAULT_DIR: &str = "/";
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"));

impl ProgramSpec {
    /// Validate the program spec and fill in defaults.
    ///
    /// Checks:
    /// - `name` is non-empty and made of `[A-Za-z0-9._-]`
    /// - `command` is non-empty
    /// - `retry_delay` / `stop_timeout` parse as durations
    ///
    /// An empty `dir` becomes `/`.
    pub fn check(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SupervisorError::validation("name", "must not be empty"));
        }
        if !NAME_RE.is_match(&self.name) {
            return Err(SupervisorError::validation(
                "name",
                format!(
                    "'{}' may only contain letters, digits, '.', '_' and '-'",
                    self.name
                ),
            ));
        }
        if self.command.trim().is_empty() {
            return Err(SupervisorError::validation(
                "command",
                format!("program '{}' has an empty command", self.name),
            ));
        }
        if self.dir.trim().is_empty() {
            self.dir = DEFAULT_DIR.to_string();
        }
        if let Some(ref s) = self.retry_delay {
            parse_duration("retry_delay", s)?;
        }
        if let Some(ref s) = self.stop_timeout {
            parse_duration("stop_timeout", s)?;
        }
        Ok(())
    }

    /// Base backoff delay, falling back to the default for unset or
    /// unparsable values.
    pub fn effective_retry_delay(&self) -> Duration {
        self.retry_delay
            .as_deref()
            .and_then(|s| parse_duration("retry_delay", s).ok())
            .unwrap_or(DEFAULT_RETRY_DELAY)
    }

    /// Grace period before a forced kill.
    pub fn effective_stop_timeout(&self) -> Duration {
        self.stop_timeout
            .as_deref()
            .and_then(|s| parse_duration("stop_timeout", s).ok())
            .unwrap_or(DEFAULT_STOP_TIMEOUT)
    }
}

/// Fail on the first name that appears twice.
pub fn ensure_unique_names(specs: &[ProgramSpec]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(SupervisorError::DuplicateName(spec.name.clone()));
        }
    }
    Ok(())
}
