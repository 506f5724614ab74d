#![allow(dead_code)]

use procwarden::config::ProgramSpec;

/// Builder for `ProgramSpec` to simplify test setup.
///
/// Defaults match `ProgramSpec::new`, except `dir`, which points at the
/// system temp dir so commands never depend on the test's cwd.
pub struct ProgramSpecBuilder {
    spec: ProgramSpec,
}

impl ProgramSpecBuilder {
    pub fn new(name: &str, command: &str) -> Self {
        let mut spec = ProgramSpec::new(name, command);
        spec.dir = std::env::temp_dir().to_string_lossy().into_owned();
        Self { spec }
    }

    /// Long-running program that does nothing.
    pub fn sleeper(name: &str) -> Self {
        Self::new(name, "sleep 30")
    }

    /// Program that exits with `code` right away.
    pub fn crasher(name: &str, code: i32) -> Self {
        Self::new(name, &format!("exit {code}"))
    }

    pub fn command(mut self, command: &str) -> Self {
        self.spec.command = command.to_string();
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.spec.dir = dir.to_string();
        self
    }

    pub fn autostart(mut self, val: bool) -> Self {
        self.spec.autostart = val;
        self
    }

    pub fn start_retries(mut self, n: u32) -> Self {
        self.spec.start_retries = n;
        self
    }

    pub fn autorestart(mut self, val: bool) -> Self {
        self.spec.autorestart = val;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec
            .environment
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn retry_delay(mut self, d: &str) -> Self {
        self.spec.retry_delay = Some(d.to_string());
        self
    }

    pub fn stop_timeout(mut self, d: &str) -> Self {
        self.spec.stop_timeout = Some(d.to_string());
        self
    }

    pub fn build(self) -> ProgramSpec {
        self.spec
    }
}
