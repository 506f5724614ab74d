// src/process/observer.rs

use tracing::info;

use super::ProcessState;

/// Hook called synchronously on every state transition.
///
/// Implementations run while the controller's lock is held: they must not
/// block and must not call back into the same controller.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, program: &str, from: ProcessState, to: ProcessState);
}

impl<F> TransitionObserver for F
where
    F: Fn(&str, ProcessState, ProcessState) + Send + Sync,
{
    fn on_transition(&self, program: &str, from: ProcessState, to: ProcessState) {
        self(program, from, to)
    }
}

/// Logs every transition at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl TransitionObserver for LogObserver {
    fn on_transition(&self, program: &str, from: ProcessState, to: ProcessState) {
        info!(program = %program, %from, %to, "state transition");
    }
}
