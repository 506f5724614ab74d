// src/process/controller.rs

//! Lifecycle state machine for one supervised program.
//!
//! ```text
//!            Start                 spawn ok
//!   Stopped ───────► Starting ───────────────► Running
//!      ▲  ▲             ▲   │ spawn failed       │  │ Stop
//!      │  │     retry   │   ▼                    │  ▼
//!      │  └── Stop ── Backoff ◄──── exited ──────┘ Stopping
//!      │                │                           │
//!      │     retries >  │                           │ exited
//!      │  start_retries ▼                           │
//!      │              Fatal ── Start ──► Starting   │
//!      └────────────────────────────────────────────┘
//! ```
//!
//! Every mutation goes through [`ProcessController::operate`], which holds
//! the controller's lock for the whole transition, so callers (users, the
//! reconciler, the controller's own timers and waiter) are serialized.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::observer::TransitionObserver;
use super::output::{tee, OutputChunk};
use super::spawn::{kill_group, spawn_program, terminate};
use super::{ProcessEvent, ProcessState};
use crate::broadcast::{Broadcaster, BroadcasterConfig};
use crate::config::ProgramSpec;
use crate::errors::{Result, SupervisorError};
use crate::sync::lock;

/// Upper bound for the exponential retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Handle to the spawned child, held only while it is alive.
struct ChildHandle {
    pid: u32,
    /// Tells the waiter task to kill the child outright.
    kill: Option<oneshot::Sender<()>>,
}

struct Inner {
    state: ProcessState,
    retries: u32,
    /// Bumped on every spawn attempt and on cancelled backoffs.
    run: u64,
    child: Option<ChildHandle>,
    last_exit_code: Option<i32>,
}

pub struct ProcessController {
    spec: ProgramSpec,
    output: Broadcaster<OutputChunk>,
    observers: Vec<Arc<dyn TransitionObserver>>,
    inner: Mutex<Inner>,
    this: Weak<ProcessController>,
}

impl fmt::Debug for ProcessController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ProcessController")
            .field("name", &self.spec.name)
            .field("state", &inner.state)
            .field("retries", &inner.retries)
            .field("run", &inner.run)
            .finish_non_exhaustive()
    }
}

impl ProcessController {
    /// Create a controller in `Stopped`.
    ///
    /// `spec` is expected to have passed [`ProgramSpec::check`]. Observers
    /// are notified in the given order.
    pub fn new(
        spec: ProgramSpec,
        output: BroadcasterConfig,
        observers: Vec<Arc<dyn TransitionObserver>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            spec,
            output: Broadcaster::new(output),
            observers,
            inner: Mutex::new(Inner {
                state: ProcessState::Stopped,
                retries: 0,
                run: 0,
                child: None,
                last_exit_code: None,
            }),
            this: this.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ProgramSpec {
        &self.spec
    }

    pub fn output(&self) -> &Broadcaster<OutputChunk> {
        &self.output
    }

    pub fn state(&self) -> ProcessState {
        lock(&self.inner).state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn retries(&self) -> u32 {
        lock(&self.inner).retries
    }

    pub fn pid(&self) -> Option<u32> {
        lock(&self.inner).child.as_ref().map(|c| c.pid)
    }

    pub fn last_exit_code(&self) -> Option<i32> {
        lock(&self.inner).last_exit_code
    }

    /// Apply `event` and return the resulting state.
    ///
    /// Events without a row in the transition table fail with
    /// `InvalidTransition` and leave the state untouched. `Exited` and
    /// `RetryElapsed` from an earlier run are ignored.
    pub fn operate(&self, event: ProcessEvent) -> Result<ProcessState> {
        let mut inner = lock(&self.inner);

        match (inner.state, event) {
            (ProcessState::Stopped | ProcessState::Fatal, ProcessEvent::Start) => {
                inner.retries = 0;
                self.start_attempt(&mut inner);
            }

            (ProcessState::Running, ProcessEvent::Stop) => {
                self.transition(&mut inner, ProcessState::Stopping);
                self.request_stop(&mut inner);
            }

            (ProcessState::Backoff, ProcessEvent::Stop) => {
                // Invalidate the pending retry timer.
                inner.run += 1;
                self.transition(&mut inner, ProcessState::Stopped);
            }

            (ProcessState::Running, ProcessEvent::Exited { run, code }) if run == inner.run => {
                inner.child = None;
                inner.last_exit_code = code;
                info!(program = %self.spec.name, run, ?code, "process exited unexpectedly");
                if self.spec.autorestart {
                    self.record_failure(&mut inner);
                } else {
                    self.transition(&mut inner, ProcessState::Stopped);
                }
            }

            (ProcessState::Stopping, ProcessEvent::Exited { run, code }) if run == inner.run => {
                inner.child = None;
                inner.last_exit_code = code;
                self.transition(&mut inner, ProcessState::Stopped);
            }

            (ProcessState::Backoff, ProcessEvent::RetryElapsed { run }) if run == inner.run => {
                self.start_attempt(&mut inner);
            }

            (state, ProcessEvent::Exited { run, .. } | ProcessEvent::RetryElapsed { run }) => {
                debug!(
                    program = %self.spec.name,
                    %state,
                    event_run = run,
                    current_run = inner.run,
                    "ignoring stale event"
                );
            }

            (state, event) => {
                return Err(SupervisorError::InvalidTransition {
                    name: self.spec.name.clone(),
                    state,
                    event,
                });
            }
        }

        Ok(inner.state)
    }

    fn transition(&self, inner: &mut Inner, to: ProcessState) {
        let from = inner.state;
        inner.state = to;
        for observer in &self.observers {
            observer.on_transition(&self.spec.name, from, to);
        }
    }

    /// `Starting`, then either `Running` or a recorded failure.
    fn start_attempt(&self, inner: &mut Inner) {
        self.transition(inner, ProcessState::Starting);
        inner.run += 1;
        let run = inner.run;

        let Some(this) = self.this.upgrade() else {
            // Only reachable while the last Arc is being dropped.
            self.record_failure(inner);
            return;
        };

        match spawn_program(&self.spec) {
            Ok(mut child) => {
                let pid = child.id().unwrap_or(0);
                info!(program = %self.spec.name, pid, run, cmd = %self.spec.command, "process spawned");

                if let Some(stdout) = child.stdout.take() {
                    tee(self.spec.name.clone(), "stdout", stdout, self.output.clone());
                }
                if let Some(stderr) = child.stderr.take() {
                    tee(self.spec.name.clone(), "stderr", stderr, self.output.clone());
                }

                let (kill_tx, kill_rx) = oneshot::channel();
                inner.child = Some(ChildHandle {
                    pid,
                    kill: Some(kill_tx),
                });
                self.transition(inner, ProcessState::Running);
                tokio::spawn(wait_for_exit(this, run, pid, child, kill_rx));
            }
            Err(e) => {
                warn!(program = %self.spec.name, run, error = %e, "failed to spawn process");
                self.record_failure(inner);
            }
        }
    }

    /// Count a failed start or crash; `Fatal` once past `start_retries`.
    fn record_failure(&self, inner: &mut Inner) {
        inner.retries += 1;
        if inner.retries > self.spec.start_retries {
            warn!(
                program = %self.spec.name,
                retries = inner.retries,
                start_retries = self.spec.start_retries,
                "retries exhausted"
            );
            self.transition(inner, ProcessState::Fatal);
            return;
        }

        self.transition(inner, ProcessState::Backoff);
        let delay = self.retry_delay(inner.retries);
        let run = inner.run;
        debug!(program = %self.spec.name, run, ?delay, "scheduling restart");

        if let Some(this) = self.this.upgrade() {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = this.operate(ProcessEvent::RetryElapsed { run }) {
                    debug!(program = %this.spec.name, error = %e, "retry not applied");
                }
            });
        }
    }

    fn retry_delay(&self, retries: u32) -> Duration {
        let base = self.spec.effective_retry_delay();
        let factor = 1u32 << retries.saturating_sub(1).min(16);
        base.saturating_mul(factor).min(MAX_RETRY_DELAY.max(base))
    }

    /// Send the termination signal and arm the forced-kill timer.
    fn request_stop(&self, inner: &mut Inner) {
        let run = inner.run;
        let Some(child) = inner.child.as_mut() else {
            return;
        };

        if !terminate(child.pid) {
            if let Some(kill) = child.kill.take() {
                let _ = kill.send(());
            }
            return;
        }

        let grace = self.spec.effective_stop_timeout();
        if let Some(this) = self.this.upgrade() {
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                this.escalate(run);
            });
        }
    }

    /// Kill the child if it is still stopping the same run.
    fn escalate(&self, run: u64) {
        let mut inner = lock(&self.inner);
        if inner.state != ProcessState::Stopping || inner.run != run {
            return;
        }
        if let Some(kill) = inner.child.as_mut().and_then(|c| c.kill.take()) {
            warn!(program = %self.spec.name, run, "stop timeout elapsed; killing process");
            let _ = kill.send(());
        }
    }
}

/// Own the child until it exits, then report back to the controller.
async fn wait_for_exit(
    controller: Arc<ProcessController>,
    run: u64,
    pid: u32,
    mut child: Child,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = &mut kill_rx => {
            kill_group(pid);
            if let Err(e) = child.start_kill() {
                debug!(program = %controller.spec.name, error = %e, "start_kill failed");
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => {
            info!(
                program = %controller.spec.name,
                pid,
                run,
                exit_code = ?status.code(),
                success = status.success(),
                "process exited"
            );
            status.code()
        }
        Err(e) => {
            warn!(program = %controller.spec.name, pid, run, error = %e, "waiting for process failed");
            None
        }
    };

    if let Err(e) = controller.operate(ProcessEvent::Exited { run, code }) {
        debug!(program = %controller.spec.name, error = %e, "exit not applied");
    }
}
