// src/logging.rs

//! `tracing` subscriber for the daemon. Output goes to stderr so stdout stays
//! free for `--check`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when `--log-level` is absent.
pub const LOG_ENV: &str = "PROCWARDEN_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let level = resolve_level(cli_level, env.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

/// The flag wins over the environment; an unreadable environment value is
/// ignored. Falls back to `INFO`.
pub fn resolve_level(cli_level: Option<LogLevel>, env: Option<&str>) -> Level {
    cli_level
        .map(Level::from)
        .or_else(|| env.and_then(parse_level_str))
        .unwrap_or(Level::INFO)
}

/// Case-insensitive level name; `warning` is accepted for `warn`.
pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim() {
        w if w.eq_ignore_ascii_case("warning") => Some(Level::WARN),
        other => other.parse().ok(),
    }
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
