#![allow(dead_code)]

pub use procwarden_test_utils::{
    fast_options, init_tracing, mock_store_path, mock_supervisor, with_timeout, EventLog,
    ProgramSpecBuilder,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use procwarden::broadcast::BroadcasterConfig;
use procwarden::config::ProgramSpec;
use procwarden::process::{ProcessController, ProcessState, TransitionObserver};
use procwarden::supervisor::Supervisor;

/// Transitions seen by a controller, as `(from, to)` pairs.
pub type Transitions = Arc<Mutex<Vec<(ProcessState, ProcessState)>>>;

/// Standalone controller (no supervisor) that records its transitions.
pub fn recorded_controller(mut spec: ProgramSpec) -> (Arc<ProcessController>, Transitions) {
    spec.check().expect("test spec should validate");
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let observer = move |_: &str, from: ProcessState, to: ProcessState| {
        sink.lock().unwrap().push((from, to));
    };
    let observers: Vec<Arc<dyn TransitionObserver>> = vec![Arc::new(observer)];
    let controller = ProcessController::new(spec, BroadcasterConfig::default(), observers);
    (controller, log)
}

/// Poll until `controller` reaches `state` (panics after 10s).
pub async fn wait_for_state(controller: &ProcessController, state: ProcessState) {
    with_timeout(async {
        while controller.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

/// Poll until program `name` reaches `state` in the supervisor.
pub async fn wait_for_program(sup: &Supervisor, name: &str, state: ProcessState) {
    with_timeout(async {
        loop {
            if sup.state(name).ok() == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}
