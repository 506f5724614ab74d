// src/process/spawn.rs

//! Child command construction and signal delivery.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::ProgramSpec;

/// Spawn the program's command with piped stdout/stderr.
///
/// On Unix the child leads its own process group so that signals reach
/// everything `sh -c` started.
pub(crate) fn spawn_program(spec: &ProgramSpec) -> io::Result<Child> {
    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.command);
        c
    };

    cmd.current_dir(&spec.dir)
        .envs(&spec.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn()
}

/// Ask the process group led by `pid` to terminate.
///
/// Returns `false` when no graceful signal could be delivered; the caller
/// should fall back to a hard kill.
#[cfg(unix)]
pub(crate) fn terminate(pid: u32) -> bool {
    signal_group(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(not(unix))]
pub(crate) fn terminate(_pid: u32) -> bool {
    false
}

/// Kill the whole process group led by `pid`.
#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) {
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pid: u32) {}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid;

    // pid 0 would address our own process group.
    if pid == 0 {
        return false;
    }
    let pid = Pid::from_raw(pid as i32);
    match killpg(pid, signal) {
        Ok(()) => {
            debug!(%pid, ?signal, "signalled process group");
            true
        }
        Err(e) => {
            warn!(%pid, ?signal, error = %e, "failed to signal process group, trying process only");
            kill(pid, signal).is_ok()
        }
    }
}
