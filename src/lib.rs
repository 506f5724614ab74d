// src/lib.rs

pub mod api;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod errors;
pub mod event;
pub mod fs;
pub mod logging;
pub mod process;
pub mod store;
pub mod supervisor;

mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_dir, ProgramSpec};
use crate::store::{FileStore, ProgramStore};
use crate::supervisor::{Supervisor, SupervisorOptions};

/// Requests fed to the control loop, by OS signals or by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Re-read the store and reconcile.
    Reload,
    /// Stop every program and leave the loop.
    Shutdown,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config dir + TOML store
/// - the supervisor and its initial reconcile
/// - signal handling (SIGINT/SIGTERM shut down, SIGHUP reloads)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_dir = args.config_dir.clone().unwrap_or_else(default_config_dir);
    let store = FileStore::in_dir(&config_dir);
    info!(path = ?store.path(), "using programs file");

    if args.check {
        let specs = store
            .load()
            .with_context(|| format!("loading {}", store.path().display()))?;
        return print_check(specs);
    }

    let supervisor = Supervisor::new(Arc::new(store), SupervisorOptions::default());
    let report = supervisor
        .reload()
        .await
        .context("initial load of programs")?;
    info!(
        added = report.added.len(),
        rejected = report.rejected.len(),
        "initial reconcile done"
    );

    let (tx, rx) = mpsc::channel::<Control>(16);
    spawn_signal_listener(tx);

    serve(&supervisor, rx).await
}

/// Process control requests until `Shutdown` arrives (or every sender is
/// gone), then stop all programs.
pub async fn serve(supervisor: &Supervisor, mut control: mpsc::Receiver<Control>) -> Result<()> {
    while let Some(request) = control.recv().await {
        match request {
            Control::Reload => match supervisor.reload().await {
                Ok(report) if report.is_noop() => info!("reload: nothing changed"),
                Ok(report) => info!(?report, "reload applied"),
                Err(e) => warn!(error = %e, "reload failed; keeping current programs"),
            },
            Control::Shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    supervisor.shutdown().await;
    Ok(())
}

fn spawn_signal_listener(tx: mpsc::Sender<Control>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sighup) =
                match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
                    (Ok(term), Ok(hup)) => (term, hup),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "failed to install signal handlers");
                        return;
                    }
                };

            loop {
                let request = tokio::select! {
                    _ = tokio::signal::ctrl_c() => Control::Shutdown,
                    _ = sigterm.recv() => Control::Shutdown,
                    _ = sighup.recv() => Control::Reload,
                };
                if tx.send(request).await.is_err() || request == Control::Shutdown {
                    return;
                }
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(Control::Shutdown).await;
        }
    });
}

/// `--check` output: print each program and whether it validates.
fn print_check(specs: Vec<ProgramSpec>) -> Result<()> {
    println!("procwarden check");
    println!("programs ({}):", specs.len());

    let mut invalid = 0usize;
    for mut spec in specs {
        let verdict = spec.check();
        println!("  - {}", spec.name);
        println!("      command: {}", spec.command);
        println!("      dir: {}", spec.dir);
        println!(
            "      autostart: {}  start_retries: {}  autorestart: {}",
            spec.autostart, spec.start_retries, spec.autorestart
        );
        if !spec.environment.is_empty() {
            println!("      environment: {:?}", spec.environment);
        }
        if let Some(ref d) = spec.retry_delay {
            println!("      retry_delay: {d}");
        }
        if let Some(ref d) = spec.stop_timeout {
            println!("      stop_timeout: {d}");
        }
        if let Err(e) = verdict {
            invalid += 1;
            println!("      INVALID: {e}");
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} invalid program spec(s)");
    }
    Ok(())
}
