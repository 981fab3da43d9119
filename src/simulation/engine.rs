//! Simulation engine - the global loop and its lifecycle
//!
//! `Init -> Running -> {Finished | Aborted | Errored}`. A run builds the
//! initial consistent states, then repeats rounds until the model's end
//! criterion holds, an abort is requested, or a fault occurs. Faults in user
//! code (returned errors and panics) are caught here and reported to every
//! probe.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::agent::{Agent, Environment};
use crate::core::config::EngineConfig;
use crate::core::error::{KernelError, Result};
use crate::core::types::{AgentId, LevelId, SimulationTime};
use crate::simulation::disambiguation::{DisambiguationHeuristic, LastConsistentState};
use crate::simulation::model::{ModelTypes, SimulationModel};
use crate::simulation::probe::{Probe, ProbeSet};
use crate::simulation::report::RunReport;
use crate::simulation::world::{LevelStats, SimulationWorld};
use crate::state::{ConsistentState, DynamicState, LevelTimeline};

/// Lifecycle state of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineStatus {
    Init,
    Running,
    Finished,
    Aborted,
    Errored,
}

impl EngineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EngineStatus::Finished | EngineStatus::Aborted | EngineStatus::Errored
        )
    }
}

/// Thread-safe handle to request an abort
///
/// The request is honored at the next round boundary.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn request_abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct SimulationEngine<T: ModelTypes> {
    config: EngineConfig,
    heuristic: Box<dyn DisambiguationHeuristic<T>>,
    probes: ProbeSet<T>,
    world: Option<SimulationWorld<T>>,
    status: EngineStatus,
    abort: AbortHandle,
}

impl<T: ModelTypes> Default for SimulationEngine<T> {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl<T: ModelTypes> SimulationEngine<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            heuristic: Box::new(LastConsistentState),
            probes: ProbeSet::default(),
            world: None,
            status: EngineStatus::Init,
            abort: AbortHandle::default(),
        }
    }

    /// Replace the default `LastConsistentState` heuristic
    pub fn with_heuristic(mut self, heuristic: impl DisambiguationHeuristic<T> + 'static) -> Self {
        self.heuristic = Box::new(heuristic);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a probe under `name`, returning the probe it replaces
    pub fn add_probe(&mut self, name: impl Into<String>, probe: impl Probe<T> + 'static) -> Option<Box<dyn Probe<T>>> {
        self.probes.insert(name.into(), Box::new(probe))
    }

    pub fn remove_probe(&mut self, name: &str) -> Option<Box<dyn Probe<T>>> {
        self.probes.remove(name)
    }

    pub fn probe_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.probes.names()
    }

    /// Run the simulation described by `model` to completion
    ///
    /// Returns the terminal status, `Finished` or `Aborted`. Any fault ends
    /// the run in `Errored` and is returned after every probe saw it. An
    /// engine runs once.
    pub fn run<M: SimulationModel<T> + ?Sized>(&mut self, model: &M) -> Result<EngineStatus> {
        if self.status != EngineStatus::Init {
            return Err(KernelError::AlreadyRan);
        }
        self.status = EngineStatus::Running;
        info!(seed = self.config.seed, probes = self.probes.len(), "Simulation starting");

        let outcome = self
            .notify("prepare", |probe, _| probe.prepare())
            .and_then(|()| self.execute(model));
        if let Err(err) = &outcome {
            error!(error = %err, "Simulation failed");
            self.status = EngineStatus::Errored;
            self.settle("on_error", |probe| probe.on_error(err));
        }
        self.settle("end", |probe| probe.end());

        info!(status = ?self.status, rounds = self.rounds(), "Simulation ended");
        outcome
    }

    fn execute<M: SimulationModel<T> + ?Sized>(&mut self, model: &M) -> Result<EngineStatus> {
        let config = &self.config;
        let world = guarded("initialization", || SimulationWorld::initialize(model, config))?;
        let initial_time = world.initial_time;
        self.world = Some(world);
        self.notify("observe_initial", |probe, engine| probe.observe_initial(engine))?;

        if self.end_reached(model, initial_time)? {
            return self.finish();
        }

        loop {
            if let Some(reason) = self.abort_reason() {
                return self.abort(reason);
            }
            if !self.step()? {
                warn!("No level is scheduled anymore");
                return self.finish();
            }
            self.notify("observe_intermediate", |probe, engine| probe.observe_intermediate(engine))?;

            let time = self.current_time().unwrap_or(initial_time);
            if self.end_reached(model, time)? {
                return self.finish();
            }
        }
    }

    fn step(&mut self) -> Result<bool> {
        let Some(world) = self.world.as_mut() else {
            return Ok(false);
        };
        let context = format!("round {}", world.rounds + 1);
        let config = &self.config;
        let heuristic = self.heuristic.as_ref();
        guarded(&context, || world.run_round(config, heuristic))
    }

    fn end_reached<M: SimulationModel<T> + ?Sized>(&self, model: &M, time: SimulationTime) -> Result<bool> {
        guarded("end criterion", || Ok(model.is_final_time_or_after(time, self)))
    }

    fn abort_reason(&self) -> Option<&'static str> {
        if self.abort.is_requested() {
            return Some("abort requested");
        }
        match self.config.round_limit {
            Some(limit) if self.rounds() >= limit => Some("round limit reached"),
            _ => None,
        }
    }

    fn finish(&mut self) -> Result<EngineStatus> {
        self.status = EngineStatus::Finished;
        info!(rounds = self.rounds(), "End criterion reached");
        self.notify("observe_final", |probe, engine| probe.observe_final(engine))?;
        Ok(self.status)
    }

    fn abort(&mut self, reason: &str) -> Result<EngineStatus> {
        self.status = EngineStatus::Aborted;
        warn!(reason, rounds = self.rounds(), "Simulation aborted");
        self.notify("on_abort", |probe, engine| probe.on_abort(engine))?;
        Ok(self.status)
    }

    /// Call a hook on every probe with read access to the engine
    ///
    /// A panicking probe stops the notification and fails the run.
    fn notify(&mut self, hook_name: &str, mut hook: impl FnMut(&mut dyn Probe<T>, &Self)) -> Result<()> {
        let mut probes = std::mem::take(&mut self.probes);
        let engine: &Self = self;
        let mut outcome = Ok(());
        probes.for_each(|name, probe| {
            if outcome.is_ok() {
                let context = format!("{hook_name} of {name}");
                outcome = guarded(&context, || {
                    hook(probe, engine);
                    Ok(())
                });
            }
        });
        self.probes = probes;
        outcome
    }

    /// Call a terminal hook on every probe, logging panics
    fn settle(&mut self, hook_name: &str, mut hook: impl FnMut(&mut dyn Probe<T>)) {
        self.probes.for_each(|name, probe| {
            let context = format!("{hook_name} of {name}");
            if let Err(err) = guarded(&context, || {
                hook(probe);
                Ok(())
            }) {
                error!(error = %err, "Probe failed after the run");
            }
        });
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Time of the last completed round, `None` before initialization
    pub fn current_time(&self) -> Option<SimulationTime> {
        self.world.as_ref().map(|w| w.current_time)
    }

    pub fn rounds(&self) -> u64 {
        self.world.as_ref().map_or(0, |w| w.rounds)
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn request_abort(&self) {
        self.abort.request_abort();
    }

    /// Level identifiers in tie rank order
    pub fn levels(&self) -> &[LevelId] {
        match &self.world {
            Some(world) => world.topology.ids(),
            None => &[],
        }
    }

    /// Agents residing in `level`, by ascending id
    pub fn agents_in(&self, level: &LevelId) -> Vec<&Agent<T>> {
        let Some(world) = &self.world else {
            return Vec::new();
        };
        let Some(runtime) = world.level(level) else {
            return Vec::new();
        };
        runtime
            .state
            .snapshot()
            .agent_ids()
            .filter_map(|id| world.agents.get(&id))
            .collect()
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent<T>> {
        self.world.as_ref()?.agents.get(&id)
    }

    /// Every agent of the simulation, by ascending id
    pub fn agents(&self) -> impl Iterator<Item = &Agent<T>> + '_ {
        self.world.iter().flat_map(|w| w.agents.values())
    }

    pub fn environment(&self) -> Option<&Environment<T>> {
        self.world.as_ref().map(|w| &w.environment)
    }

    /// Dynamic state of every level, in tie rank order
    pub fn dynamic_states(&self) -> Vec<(&LevelId, &DynamicState<T>)> {
        self.world
            .iter()
            .flat_map(|w| w.levels.iter())
            .map(|runtime| (runtime.id(), &runtime.state))
            .collect()
    }

    pub fn dynamic_state(&self, level: &LevelId) -> Option<&DynamicState<T>> {
        self.world.as_ref()?.level(level).map(|runtime| &runtime.state)
    }

    /// Last consistent state of `level`
    pub fn consistent_state(&self, level: &LevelId) -> Option<&Arc<ConsistentState<T>>> {
        self.dynamic_state(level).map(DynamicState::snapshot)
    }

    pub fn timeline(&self, level: &LevelId) -> Option<&LevelTimeline<T>> {
        self.world.as_ref()?.level(level).map(|runtime| &runtime.timeline)
    }

    pub fn level_stats(&self, level: &LevelId) -> Option<LevelStats> {
        self.world.as_ref()?.level(level).map(|runtime| runtime.stats)
    }

    pub fn report(&self) -> RunReport {
        RunReport::new(self.status, self.world.as_ref())
    }
}

/// Run `f`, turning a panic into a `KernelError::Panic`
fn guarded<R>(context: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(KernelError::Panic {
            context: context.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
