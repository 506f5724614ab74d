// src/supervisor/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProgramSpec;
use crate::process::ProcessController;

/// Name-keyed desired specs and live controllers, plus display order.
///
/// `desired` and `live` always have the same key set; `names` lists exactly
/// those keys.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    names: Vec<String>,
    desired: HashMap<String, ProgramSpec>,
    live: HashMap<String, Arc<ProcessController>>,
}

impl Registry {
    pub(crate) fn spec(&self, name: &str) -> Option<&ProgramSpec> {
        self.desired.get(name)
    }

    pub(crate) fn controller(&self, name: &str) -> Option<Arc<ProcessController>> {
        self.live.get(name).cloned()
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn insert(&mut self, spec: ProgramSpec, controller: Arc<ProcessController>) {
        let name = spec.name.clone();
        if !self.desired.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.desired.insert(name.clone(), spec);
        self.live.insert(name, controller);
    }

    /// Record a new desired spec without touching the live controller.
    pub(crate) fn set_spec(&mut self, spec: ProgramSpec) {
        if let Some(slot) = self.desired.get_mut(&spec.name) {
            *slot = spec;
        }
    }

    /// Swap the live controller, but only if `expected` is still the one
    /// registered.
    pub(crate) fn replace_controller(
        &mut self,
        name: &str,
        expected: &Arc<ProcessController>,
        fresh: Arc<ProcessController>,
    ) -> bool {
        match self.live.get_mut(name) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                *current = fresh;
                true
            }
            _ => false,
        }
    }

    /// Remove `name` if `expected` is still its live controller.
    pub(crate) fn remove_if(&mut self, name: &str, expected: &Arc<ProcessController>) -> bool {
        let matches = self
            .live
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, expected));
        if matches {
            self.live.remove(name);
            self.desired.remove(name);
            self.names.retain(|n| n != name);
        }
        matches
    }

    /// Reorder `names` to follow `order`; registered names missing from
    /// `order` keep their relative position at the end.
    pub(crate) fn reorder(&mut self, order: &[String]) {
        let mut names: Vec<String> = order
            .iter()
            .filter(|n| self.desired.contains_key(n.as_str()))
            .cloned()
            .collect();
        for name in &self.names {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        self.names = names;
    }

    pub(crate) fn specs(&self) -> Vec<ProgramSpec> {
        self.names
            .iter()
            .filter_map(|n| self.desired.get(n).cloned())
            .collect()
    }

    pub(crate) fn entries(&self) -> Vec<(ProgramSpec, Arc<ProcessController>)> {
        self.names
            .iter()
            .filter_map(|n| Some((self.desired.get(n)?.clone(), self.live.get(n)?.clone())))
            .collect()
    }

    pub(crate) fn controllers(&self) -> Vec<Arc<ProcessController>> {
        self.names
            .iter()
            .filter_map(|n| self.live.get(n).cloned())
            .collect()
    }
}
