// tests/controller_fsm.rs

mod common;
use crate::common::{init_tracing, recorded_controller, wait_for_state, with_timeout, ProgramSpecBuilder};

use std::time::Duration;

use procwarden::errors::SupervisorError;
use procwarden::process::{ProcessEvent, ProcessState};

use ProcessState::*;

const MISSING_DIR: &str = "/nonexistent/procwarden-test-dir";

#[tokio::test]
async fn spawn_failures_exhaust_retries_then_stay_fatal() {
    init_tracing();
    let spec = ProgramSpecBuilder::new("A", "true")
        .dir(MISSING_DIR)
        .start_retries(2)
        .retry_delay("10ms")
        .build();
    let (ctl, log) = recorded_controller(spec);

    let state = ctl.operate(ProcessEvent::Start).unwrap();
    assert_eq!(state, Backoff, "first spawn fails synchronously");

    wait_for_state(&ctl, Fatal).await;
    assert_eq!(ctl.retries(), 3);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (Stopped, Starting),
            (Starting, Backoff),
            (Backoff, Starting),
            (Starting, Backoff),
            (Backoff, Starting),
            (Starting, Fatal),
        ]
    );

    // No further automatic attempts.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(ctl.state(), Fatal);
    assert_eq!(log.lock().unwrap().len(), 6);

    // A manual start leaves Fatal with a fresh retry counter.
    ctl.operate(ProcessEvent::Start).unwrap();
    assert_eq!(log.lock().unwrap()[6], (Fatal, Starting));
    wait_for_state(&ctl, Fatal).await;
}

#[tokio::test]
async fn crash_loop_goes_fatal_after_start_retries_plus_one() {
    init_tracing();
    let spec = ProgramSpecBuilder::crasher("crashy", 1)
        .start_retries(3)
        .retry_delay("10ms")
        .build();
    let (ctl, log) = recorded_controller(spec);

    ctl.operate(ProcessEvent::Start).unwrap();
    wait_for_state(&ctl, Fatal).await;

    assert_eq!(ctl.retries(), 4);
    assert_eq!(ctl.last_exit_code(), Some(1));
    assert_eq!(ctl.pid(), None);
    let runs = log
        .lock()
        .unwrap()
        .iter()
        .filter(|t| **t == (Starting, Running))
        .count();
    assert_eq!(runs, 4);
}

#[tokio::test]
async fn stop_running_program_goes_through_stopping() {
    init_tracing();
    let (ctl, log) = recorded_controller(ProgramSpecBuilder::sleeper("sleepy").build());

    assert_eq!(ctl.operate(ProcessEvent::Start).unwrap(), Running);
    assert!(ctl.is_running());
    assert!(ctl.pid().is_some());

    assert_eq!(ctl.operate(ProcessEvent::Stop).unwrap(), Stopping);
    assert!(!ctl.is_running());
    wait_for_state(&ctl, Stopped).await;

    assert_eq!(ctl.pid(), None);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (Stopped, Starting),
            (Starting, Running),
            (Running, Stopping),
            (Stopping, Stopped),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn stop_escalates_to_kill_after_stop_timeout() {
    init_tracing();
    let spec = ProgramSpecBuilder::new("stubborn", "trap '' TERM; sleep 30")
        .stop_timeout("200ms")
        .build();
    let (ctl, _log) = recorded_controller(spec);

    ctl.operate(ProcessEvent::Start).unwrap();
    // Let the shell install its trap before signalling it.
    tokio::time::sleep(Duration::from_millis(200)).await;

    ctl.operate(ProcessEvent::Stop).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctl.state(), Stopping, "SIGTERM is ignored");

    wait_for_state(&ctl, Stopped).await;
}

#[tokio::test]
async fn exit_without_autorestart_parks_in_stopped() {
    init_tracing();
    let spec = ProgramSpecBuilder::crasher("oneshot", 3)
        .autorestart(false)
        .build();
    let (ctl, log) = recorded_controller(spec);

    ctl.operate(ProcessEvent::Start).unwrap();
    wait_for_state(&ctl, Stopped).await;

    assert_eq!(ctl.last_exit_code(), Some(3));
    assert_eq!(ctl.retries(), 0);
    assert_eq!(log.lock().unwrap().last(), Some(&(Running, Stopped)));
}

#[tokio::test]
async fn stop_during_backoff_cancels_pending_retry() {
    init_tracing();
    let spec = ProgramSpecBuilder::crasher("flappy", 1)
        .start_retries(5)
        .retry_delay("300ms")
        .build();
    let (ctl, _log) = recorded_controller(spec);

    ctl.operate(ProcessEvent::Start).unwrap();
    wait_for_state(&ctl, Backoff).await;

    assert_eq!(ctl.operate(ProcessEvent::Stop).unwrap(), Stopped);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(ctl.state(), Stopped, "retry timer must not restart it");
}

#[tokio::test]
async fn events_without_a_transition_are_rejected() {
    init_tracing();
    let (ctl, log) = recorded_controller(ProgramSpecBuilder::sleeper("strict").build());

    match ctl.operate(ProcessEvent::Stop) {
        Err(SupervisorError::InvalidTransition { name, state, event }) => {
            assert_eq!(name, "strict");
            assert_eq!(state, Stopped);
            assert_eq!(event, ProcessEvent::Stop);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert_eq!(ctl.state(), Stopped);
    assert!(log.lock().unwrap().is_empty());

    ctl.operate(ProcessEvent::Start).unwrap();
    assert!(matches!(
        ctl.operate(ProcessEvent::Start),
        Err(SupervisorError::InvalidTransition { state: Running, .. })
    ));

    ctl.operate(ProcessEvent::Stop).unwrap();
    wait_for_state(&ctl, Stopped).await;
}

#[tokio::test]
async fn stale_internal_events_are_ignored() {
    init_tracing();
    let (ctl, log) = recorded_controller(ProgramSpecBuilder::sleeper("stale").build());

    let state = ctl
        .operate(ProcessEvent::Exited { run: 42, code: Some(0) })
        .unwrap();
    assert_eq!(state, Stopped);
    let state = ctl.operate(ProcessEvent::RetryElapsed { run: 7 }).unwrap();
    assert_eq!(state, Stopped);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stdout_and_stderr_are_captured() {
    init_tracing();
    let spec = ProgramSpecBuilder::new("chatty", "echo hello; echo oops >&2; sleep 30").build();
    let (ctl, _log) = recorded_controller(spec);
    let mut out = ctl.output().subscribe("viewer");

    ctl.operate(ProcessEvent::Start).unwrap();

    let mut captured = String::new();
    with_timeout(async {
        while !(captured.contains("hello") && captured.contains("oops")) {
            let chunk = out.recv().await.expect("output stream closed early");
            captured.push_str(&chunk.to_string_lossy());
        }
    })
    .await;

    ctl.operate(ProcessEvent::Stop).unwrap();
    wait_for_state(&ctl, Stopped).await;
}

#[tokio::test]
async fn environment_and_dir_are_applied() {
    init_tracing();
    let spec = ProgramSpecBuilder::new("envy", "echo \"$GREETING from $(pwd)\"")
        .env("GREETING", "hi")
        .dir("/")
        .autorestart(false)
        .build();
    let (ctl, _log) = recorded_controller(spec);
    let mut out = ctl.output().subscribe("viewer");

    ctl.operate(ProcessEvent::Start).unwrap();

    let mut captured = String::new();
    with_timeout(async {
        while !captured.ends_with('\n') {
            let chunk = out.recv().await.expect("output stream closed early");
            captured.push_str(&chunk.to_string_lossy());
        }
    })
    .await;
    assert_eq!(captured.trim(), "hi from /");
    wait_for_state(&ctl, Stopped).await;
}
