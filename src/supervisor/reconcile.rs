// src/supervisor/reconcile.rs

//! Declarative reconciliation and stop-and-wait.
//!
//! `load` diffs a desired list against the registry:
//! - new names get a fresh `Stopped` controller (`"<name> added"`), started
//!   right away when `autostart` is set;
//! - unchanged specs (same fingerprint) are left alone, no events;
//! - changed specs emit `"<name> update"` and are swapped in the background:
//!   stop-and-wait the old controller, register a fresh one, start it again
//!   if the old one was running;
//! - names no longer desired are stop-and-waited, then removed
//!   (`"<name> deleted"`).
//!
//! The registry lock is only held for the synchronous map work; draining a
//! process always happens outside it.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::registry::Registry;
use super::Supervisor;
use crate::broadcast::Broadcaster;
use crate::config::{ensure_unique_names, ProgramSpec};
use crate::errors::Result;
use crate::event::Event;
use crate::process::{ProcessController, ProcessEvent, ProcessState};
use crate::sync::lock;

/// What reconciling one spec did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Change {
    Added,
    Updated,
    Unchanged,
}

/// A desired entry skipped because it failed validation.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedSpec {
    pub name: String,
    pub error: String,
}

/// Outcome of one `load`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
    pub rejected: Vec<RejectedSpec>,
}

impl LoadReport {
    fn record(&mut self, name: String, change: Change) {
        match change {
            Change::Added => self.added.push(name),
            Change::Updated => self.updated.push(name),
            Change::Unchanged => self.unchanged.push(name),
        }
    }

    /// Nothing was added, updated, deleted or rejected.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.rejected.is_empty()
    }
}

/// Drops the stop-and-wait subscription however the wait ends.
struct Unsubscribe<'a> {
    events: &'a Broadcaster<Event>,
    id: String,
}

impl Drop for Unsubscribe<'_> {
    fn drop(&mut self) {
        self.events.unsubscribe(&self.id);
    }
}

impl Supervisor {
    /// Reconcile the registry against `desired`.
    ///
    /// Duplicate names reject the whole list before anything changes. Specs
    /// that fail validation are skipped and listed in
    /// [`LoadReport::rejected`]. Returns once additions and removals are
    /// done; updates finish in the background.
    pub async fn load(&self, desired: Vec<ProgramSpec>) -> Result<LoadReport> {
        ensure_unique_names(&desired)?;
        let _serial = self.shared.reconcile.lock().await;

        let order: Vec<String> = desired.iter().map(|s| s.name.clone()).collect();
        let mut report = LoadReport::default();
        let mut autostart = Vec::new();

        let removed: Vec<String> = {
            let mut reg = lock(&self.shared.registry);
            for spec in desired {
                let name = spec.name.clone();
                match self.apply_spec(&mut reg, spec) {
                    Ok((change, start)) => {
                        report.record(name, change);
                        autostart.extend(start);
                    }
                    Err(e) => {
                        warn!(program = %name, error = %e, "rejecting program spec");
                        report.rejected.push(RejectedSpec {
                            name,
                            error: e.to_string(),
                        });
                    }
                }
            }

            let keep: HashSet<&str> = order.iter().map(String::as_str).collect();
            let removed = reg
                .names()
                .iter()
                .filter(|n| !keep.contains(n.as_str()))
                .cloned()
                .collect();
            reg.reorder(&order);
            removed
        };

        for controller in autostart {
            self.autostart(&controller);
        }

        for name in removed {
            info!(program = %name, "stop before delete program");
            if self.remove_program(&name).await {
                report.deleted.push(name);
            }
        }

        info!(
            added = report.added.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            deleted = report.deleted.len(),
            rejected = report.rejected.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Reconcile a single spec without touching other programs.
    pub(crate) fn apply_one(&self, spec: ProgramSpec) -> Result<Change> {
        let (change, start) = {
            let mut reg = lock(&self.shared.registry);
            self.apply_spec(&mut reg, spec)?
        };
        if let Some(controller) = start {
            self.autostart(&controller);
        }
        Ok(change)
    }

    /// Stop `name` and wait until its process is confirmed gone.
    pub async fn stop_and_wait(&self, name: &str) -> Result<()> {
        let controller = self.controller(name)?;
        self.drain(&controller).await;
        Ok(())
    }

    /// Synchronous part of reconciling one spec. Returns the controller to
    /// autostart, if any.
    fn apply_spec(
        &self,
        reg: &mut Registry,
        mut spec: ProgramSpec,
    ) -> Result<(Change, Option<Arc<ProcessController>>)> {
        spec.check()?;
        let name = spec.name.clone();

        let Some(existing) = reg.spec(&name) else {
            let autostart = spec.autostart;
            let controller = self.new_controller(spec.clone());
            reg.insert(spec, Arc::clone(&controller));
            self.broadcast_event(format!("{name} added"));
            info!(program = %name, "program added");
            return Ok((Change::Added, autostart.then_some(controller)));
        };

        if existing.fingerprint() == spec.fingerprint() {
            return Ok((Change::Unchanged, None));
        }

        self.broadcast_event(format!("{name} update"));
        info!(program = %name, "program update");
        reg.set_spec(spec);
        if let Some(old) = reg.controller(&name) {
            let was_running = old.is_running();
            let sup = self.clone();
            self.spawn_update(async move { sup.finish_update(name, old, was_running).await });
        }
        Ok((Change::Updated, None))
    }

    fn autostart(&self, controller: &Arc<ProcessController>) {
        if let Err(e) = controller.operate(ProcessEvent::Start) {
            warn!(program = %controller.name(), error = %e, "autostart failed");
        }
    }

    /// Background half of an update: drain the old controller, then swap in
    /// one built from the latest desired spec.
    ///
    /// `was_running` is sampled when the update is decided. Output viewers
    /// of the old controller are closed once it is replaced. During
    /// shutdown the fresh controller is registered but not started.
    async fn finish_update(&self, name: String, old: Arc<ProcessController>, was_running: bool) {
        self.drain(&old).await;

        let fresh = {
            let mut reg = lock(&self.shared.registry);
            match reg.spec(&name).cloned() {
                Some(spec) => {
                    let fresh = self.new_controller(spec);
                    reg.replace_controller(&name, &old, Arc::clone(&fresh))
                        .then_some(fresh)
                }
                None => None,
            }
        };

        match fresh {
            Some(fresh) => {
                old.output().close_all();
                debug!(program = %name, was_running, "controller replaced");
                if was_running && self.is_shutting_down() {
                    info!(program = %name, "shutting down; not restarting updated program");
                } else if was_running {
                    if let Err(e) = fresh.operate(ProcessEvent::Start) {
                        warn!(program = %name, error = %e, "restart after update failed");
                    }
                }
            }
            None => debug!(program = %name, "update superseded; nothing to swap"),
        }
    }

    /// Drain and unregister `name`. Loops in case an update swapped in a new
    /// controller while the previous one was draining.
    async fn remove_program(&self, name: &str) -> bool {
        loop {
            let Some(controller) = lock(&self.shared.registry).controller(name) else {
                return false;
            };
            self.drain(&controller).await;

            if lock(&self.shared.registry).remove_if(name, &controller) {
                controller.output().close_all();
                self.broadcast_event(format!("{name} deleted"));
                info!(program = %name, "program deleted");
                return true;
            }
        }
    }

    /// Stop-and-wait on a controller.
    ///
    /// Returns once the controller has settled (not starting, running or
    /// stopping). Wakes on every global event and, in case the final
    /// transition slipped past the subscription, on a fixed interval. A
    /// controller waiting in `Backoff` is moved to `Stopped` so its pending
    /// retry can't restart it.
    pub(crate) async fn drain(&self, controller: &Arc<ProcessController>) {
        if controller.state().is_settled() {
            park_backoff(controller);
            return;
        }

        let id = format!(
            "stop-wait-{}",
            self.shared.next_waiter.fetch_add(1, Ordering::Relaxed)
        );
        let mut events = self.shared.events.subscribe(id.clone());
        let _unsubscribe = Unsubscribe {
            events: &self.shared.events,
            id,
        };

        if controller.state() == ProcessState::Running {
            if let Err(e) = controller.operate(ProcessEvent::Stop) {
                debug!(program = %controller.name(), error = %e, "stop not applied");
            }
        }

        let interval = self.shared.options.stop_poll_interval;
        while !controller.state().is_settled() {
            tokio::select! {
                ev = events.recv() => {
                    if ev.is_none() {
                        // Subscription closed; keep going on the timer alone.
                        tokio::time::sleep(interval).await;
                    }
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        park_backoff(controller);
        debug!(program = %controller.name(), state = %controller.state(), "stop-and-wait done");
    }
}

fn park_backoff(controller: &ProcessController) {
    if controller.state() == ProcessState::Backoff {
        if let Err(e) = controller.operate(ProcessEvent::Stop) {
            debug!(program = %controller.name(), error = %e, "backoff not cancelled");
        }
    }
}
