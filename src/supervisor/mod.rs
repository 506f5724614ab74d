// src/supervisor/mod.rs

//! Registry of supervised programs and the operations exposed to
//! transports.
//!
//! A [`Supervisor`] is a cheap, cloneable handle. It owns:
//! - the registry (desired specs + live controllers, in display order)
//! - the global event broadcaster
//! - the persistence store
//!
//! Reconciliation (`load`) and stop-and-wait live in [`reconcile`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, BroadcasterConfig, Subscription};
use crate::config::ProgramSpec;
use crate::errors::{Result, SupervisorError};
use crate::event::Event;
use crate::process::{
    LogObserver, OutputChunk, ProcessController, ProcessEvent, ProcessState, TransitionObserver,
};
use crate::store::ProgramStore;
use crate::sync::lock;

pub mod reconcile;
pub mod registry;
pub mod relay;

pub use reconcile::{Change, LoadReport, RejectedSpec};
pub use relay::EventRelay;

use registry::Registry;

/// Tunables for a supervisor instance.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Global event stream.
    pub events: BroadcasterConfig,
    /// Per-program output stream.
    pub output: BroadcasterConfig,
    /// Fallback wake-up interval of stop-and-wait.
    pub stop_poll_interval: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            events: BroadcasterConfig::default(),
            output: BroadcasterConfig::default(),
            stop_poll_interval: Duration::from_secs(1),
        }
    }
}

/// One row of [`Supervisor::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ProgramStatus {
    pub name: String,
    pub spec: ProgramSpec,
    pub state: ProcessState,
    pub retries: u32,
    pub pid: Option<u32>,
    pub last_exit_code: Option<i32>,
}

struct Shared {
    registry: Mutex<Registry>,
    /// Serializes whole `load` calls, including their removal drains.
    reconcile: tokio::sync::Mutex<()>,
    events: Broadcaster<Event>,
    store: Arc<dyn ProgramStore>,
    options: SupervisorOptions,
    next_waiter: AtomicU64,
    /// Background update tasks; `shutdown` joins them before draining.
    updates: Mutex<JoinSet<()>>,
    shutting_down: AtomicBool,
}

#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("programs", &lock(&self.shared.registry).names())
            .field("store", &self.shared.store)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(store: Arc<dyn ProgramStore>, options: SupervisorOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                reconcile: tokio::sync::Mutex::new(()),
                events: Broadcaster::new(options.events),
                store,
                options,
                next_waiter: AtomicU64::new(0),
                updates: Mutex::new(JoinSet::new()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Current registry, one row per program, in display order.
    pub fn snapshot(&self) -> Vec<ProgramStatus> {
        let entries = lock(&self.shared.registry).entries();
        entries
            .into_iter()
            .map(|(spec, controller)| ProgramStatus {
                name: spec.name.clone(),
                state: controller.state(),
                retries: controller.retries(),
                pid: controller.pid(),
                last_exit_code: controller.last_exit_code(),
                spec,
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.shared.registry).names().to_vec()
    }

    pub fn state(&self, name: &str) -> Result<ProcessState> {
        Ok(self.controller(name)?.state())
    }

    pub fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self.controller(name)?.is_running())
    }

    /// Live controller registered under `name`.
    pub fn controller(&self, name: &str) -> Result<Arc<ProcessController>> {
        lock(&self.shared.registry)
            .controller(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))
    }

    pub fn start(&self, name: &str) -> Result<ProcessState> {
        self.controller(name)?.operate(ProcessEvent::Start)
    }

    pub fn stop(&self, name: &str) -> Result<ProcessState> {
        self.controller(name)?.operate(ProcessEvent::Stop)
    }

    /// Re-read the store and reconcile against it.
    pub async fn reload(&self) -> Result<LoadReport> {
        let desired = self.shared.store.load()?;
        info!(programs = desired.len(), "reloading desired state");
        self.load(desired).await
    }

    /// Mirror the desired specs, in registry order, to the store.
    ///
    /// A failure is returned as-is; the registry is not touched.
    pub fn save(&self) -> Result<()> {
        let specs = lock(&self.shared.registry).specs();
        self.shared.store.save(&specs)
    }

    /// Validate and reconcile a single spec, optionally persisting the
    /// result.
    pub async fn add_or_update(&self, spec: ProgramSpec, persist: bool) -> Result<Change> {
        let change = {
            let _serial = self.shared.reconcile.lock().await;
            self.apply_one(spec)?
        };
        if persist {
            self.save()?;
        }
        Ok(change)
    }

    pub fn subscribe_events(&self, id: impl Into<String>) -> Subscription<Event> {
        self.shared.events.subscribe(id)
    }

    pub fn unsubscribe_events(&self, id: &str) {
        self.shared.events.unsubscribe(id);
    }

    /// Tail a program's captured output.
    ///
    /// The subscription belongs to the controller that is live right now; a
    /// later update replaces the controller and closes this stream; viewers
    /// subscribe again to follow the new one.
    pub fn subscribe_output(
        &self,
        name: &str,
        connection_id: impl Into<String>,
    ) -> Result<Subscription<OutputChunk>> {
        Ok(self.controller(name)?.output().subscribe(connection_id))
    }

    pub fn unsubscribe_output(&self, name: &str, connection_id: &str) -> Result<()> {
        self.controller(name)?.output().unsubscribe(connection_id);
        Ok(())
    }

    /// Stop every program and wait until all of them have settled.
    ///
    /// Blocks further reconciles, lets in-flight updates finish without
    /// restarting anything, then drains every controller.
    pub async fn shutdown(&self) {
        let _serial = self.shared.reconcile.lock().await;
        self.shared.shutting_down.store(true, Ordering::SeqCst);

        let mut updates = std::mem::take(&mut *lock(&self.shared.updates));
        if !updates.is_empty() {
            debug!(pending = updates.len(), "waiting for in-flight updates");
        }
        while let Some(res) = updates.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "update task failed");
            }
        }

        let controllers = lock(&self.shared.registry).controllers();
        info!(programs = controllers.len(), "stopping all programs");

        let mut set = JoinSet::new();
        for controller in controllers {
            let sup = self.clone();
            set.spawn(async move { sup.drain(&controller).await });
        }
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "stop task failed");
            }
        }
        info!("all programs stopped");
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }

    /// Track a background update so `shutdown` can wait for it.
    pub(crate) fn spawn_update<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut updates = lock(&self.shared.updates);
        // Reap finished tasks so the set doesn't grow with every update.
        while updates.try_join_next().is_some() {}
        updates.spawn(task);
    }

    pub(crate) fn broadcast_event(&self, message: impl Into<String>) {
        self.shared.events.write(Event::new(message));
    }

    pub(crate) fn new_controller(&self, spec: ProgramSpec) -> Arc<ProcessController> {
        let observers: Vec<Arc<dyn TransitionObserver>> = vec![
            Arc::new(EventRelay::new(self.shared.events.clone())),
            Arc::new(LogObserver),
        ];
        ProcessController::new(spec, self.shared.options.output, observers)
    }
}
