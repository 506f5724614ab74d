// src/process/mod.rs

//! Supervision of a single OS process.
//!
//! - [`controller`] owns the lifecycle state machine and its timers.
//! - [`spawn`] builds the child command and delivers signals.
//! - [`output`] tees the child's stdout/stderr into a broadcaster.
//! - [`observer`] defines the hook invoked on every state transition.

use std::fmt;

use serde::Serialize;

pub mod controller;
pub mod observer;
pub mod output;
pub mod spawn;

pub use controller::ProcessController;
pub use observer::{LogObserver, TransitionObserver};
pub use output::OutputChunk;

/// Lifecycle state of a supervised program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    /// Waiting out the retry delay after a failed start or a crash.
    Backoff,
    /// Retries exhausted; only a manual start leaves this state.
    Fatal,
}

impl ProcessState {
    pub fn is_running(self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running)
    }

    /// No stop or start is in flight: anything but `Starting`, `Running` or
    /// `Stopping`.
    pub fn is_settled(self) -> bool {
        !matches!(
            self,
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Stopped => "Stopped",
            ProcessState::Starting => "Starting",
            ProcessState::Running => "Running",
            ProcessState::Stopping => "Stopping",
            ProcessState::Backoff => "Backoff",
            ProcessState::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to [`ProcessController::operate`].
///
/// `Start` and `Stop` come from users and the reconciler. `Exited` and
/// `RetryElapsed` are produced by the controller's own background tasks and
/// carry the run generation they belong to, so a late signal from an earlier
/// run is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    Start,
    Stop,
    Exited { run: u64, code: Option<i32> },
    RetryElapsed { run: u64 },
}
