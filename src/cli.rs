// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procwarden`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procwarden",
    version,
    about = "Keep a declared set of programs running.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory holding `programs.toml`.
    ///
    /// If omitted, `PROCWARDEN_HOME` or `~/.procwarden` is used.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCWARDEN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the programs file, print it, and exit.
    #[arg(long)]
    pub check: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
