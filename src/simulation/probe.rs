//! Probes - observers of the engine lifecycle
//!
//! Every hook has a no-op default. During one run the engine calls
//! `prepare` first and `end` last, exactly once each, whatever happened in
//! between. A probe that panics fails the run like any other user fault.

use crate::core::error::KernelError;
use crate::simulation::engine::SimulationEngine;
use crate::simulation::model::ModelTypes;

pub trait Probe<T: ModelTypes>: Send {
    /// Called before the simulation is built
    fn prepare(&mut self) {}

    /// Called once the initial consistent states exist
    fn observe_initial(&mut self, _engine: &SimulationEngine<T>) {}

    /// Called after every round
    fn observe_intermediate(&mut self, _engine: &SimulationEngine<T>) {}

    /// Called when the end criterion holds
    fn observe_final(&mut self, _engine: &SimulationEngine<T>) {}

    fn on_error(&mut self, _error: &KernelError) {}

    fn on_abort(&mut self, _engine: &SimulationEngine<T>) {}

    fn end(&mut self) {}
}

/// Probes of one engine, notified in insertion order
pub(crate) struct ProbeSet<T: ModelTypes> {
    probes: Vec<(String, Box<dyn Probe<T>>)>,
}

impl<T: ModelTypes> Default for ProbeSet<T> {
    fn default() -> Self {
        Self { probes: Vec::new() }
    }
}

impl<T: ModelTypes> ProbeSet<T> {
    /// Register `probe`, returning the one it replaces
    pub fn insert(&mut self, name: String, probe: Box<dyn Probe<T>>) -> Option<Box<dyn Probe<T>>> {
        match self.probes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, probe)),
            None => {
                self.probes.push((name, probe));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Probe<T>>> {
        let index = self.probes.iter().position(|(n, _)| n == name)?;
        Some(self.probes.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.probes.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn for_each(&mut self, mut notify: impl FnMut(&str, &mut dyn Probe<T>)) {
        for (name, probe) in &mut self.probes {
            notify(name, probe.as_mut());
        }
    }
}
