pub mod builders;
pub mod events;

use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use procwarden::fs::MockFileSystem;
use procwarden::store::FileStore;
use procwarden::supervisor::{Supervisor, SupervisorOptions};
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::ProgramSpecBuilder;
pub use events::EventLog;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Supervisor options with a short stop-and-wait poll, so tests that race
/// the last transition don't sit out a full second.
pub fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        stop_poll_interval: Duration::from_millis(50),
        ..SupervisorOptions::default()
    }
}

/// Path the in-memory store reads and writes.
pub fn mock_store_path() -> PathBuf {
    PathBuf::from("/procwarden/programs.toml")
}

/// Supervisor backed by an in-memory filesystem.
///
/// The returned `MockFileSystem` shares state with the store, so tests can
/// seed `programs.toml` or make writes fail.
pub fn mock_supervisor() -> (Supervisor, MockFileSystem) {
    let fs = MockFileSystem::new();
    let store = FileStore::new(Arc::new(fs.clone()), mock_store_path());
    (Supervisor::new(Arc::new(store), fast_options()), fs)
}
