//! One round of the global loop
//!
//! A round gathers every level due at the earliest scheduled time, runs
//! natural actions, perceptions and decisions for them, distributes the
//! resulting influences, then lets each due level react.
//!
//! Influence order is fixed: for each due level in tie rank order, the
//! environment's influences first, then each agent's in ascending id order.
//! Cascades from reactions follow, in reaction order. The parallel path
//! buffers per agent and merges in that same order.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::agent::Agent;
use crate::core::config::EngineConfig;
use crate::core::error::{CallbackPhase, ConfigError, KernelError, Result};
use crate::core::types::{AgentId, LevelId, Owner, SimulationTime, TimeInterval};
use crate::influence::{Influence, InfluenceMap, InfluenceSink, InfluenceSource, Stamped, SystemEvent};
use crate::level::{ReactionInput, SystemPhase};
use crate::simulation::disambiguation::{DisambiguationHeuristic, ExposureRequest};
use crate::simulation::model::ModelTypes;
use crate::simulation::perception::{call_rng, ActionContext, DecisionContext, LevelViews, PerceptionContext};
use crate::simulation::system::apply_system_influences;
use crate::simulation::world::{LevelRuntime, SimulationWorld};
use crate::state::{PeriodInfluences, StateBuilder};
use crate::time::checked_next_due;

/// Read-only data shared by every agent work item of a round
struct RoundShared<'w, T: ModelTypes> {
    seed: u64,
    round: u64,
    time: SimulationTime,
    /// Due level ranks, in processing order
    ranks: &'w [usize],
    /// Views per due level, aligned with `ranks`
    views: &'w [LevelViews<T>],
    levels: &'w [LevelRuntime<T>],
}

/// One agent and the due levels it resides in
struct AgentWork<'w, T: ModelTypes> {
    agent: &'w mut Agent<T>,
    /// Indices into `RoundShared::ranks`
    slots: Vec<usize>,
    /// Emitted influences per due level, aligned with `RoundShared::ranks`
    outputs: Vec<Vec<Influence<T>>>,
}

impl<T: ModelTypes> AgentWork<'_, T> {
    /// Perceive every due level, revise memory once, then decide
    fn run(&mut self, shared: &RoundShared<'_, T>) -> Result<()> {
        let id = self.agent.id();
        let owner = Owner::Agent(id);
        let mut perceived = BTreeMap::new();

        for &slot in &self.slots {
            let rank = shared.ranks[slot];
            let runtime = &shared.levels[rank];
            let level = runtime.id();
            let behavior = self
                .agent
                .behavior(level)
                .ok_or_else(|| missing_behavior(&*self.agent, level))?;
            let (public, private) = own_states(runtime, id)?;

            let mut ctx = PerceptionContext {
                level,
                period: TimeInterval::new(runtime.consistent_time(), shared.time),
                agent: id,
                public,
                private,
                memory: self.agent.memory(),
                views: &shared.views[slot],
                rng: call_rng(shared.seed, shared.round, owner, rank, CallbackPhase::Perception),
            };
            let result = behavior
                .perceive(&mut ctx)
                .map_err(|source| KernelError::behavior(owner, level, CallbackPhase::Perception, source))?;
            perceived.insert(level.clone(), result);
        }

        if let Err(source) = self.agent.revise_memory(&perceived) {
            let first = shared.levels[shared.ranks[self.slots[0]]].id();
            return Err(KernelError::behavior(owner, first, CallbackPhase::MemoryRevision, source));
        }

        for &slot in &self.slots {
            let rank = shared.ranks[slot];
            let runtime = &shared.levels[rank];
            let level = runtime.id();
            let behavior = self
                .agent
                .behavior(level)
                .ok_or_else(|| missing_behavior(&*self.agent, level))?;
            let (public, private) = own_states(runtime, id)?;
            let perceived_here = perceived.get(level).ok_or_else(|| KernelError::AgentNotResident {
                agent: id,
                level: level.clone(),
            })?;

            let period = TimeInterval::new(runtime.consistent_time(), shared.time);
            let mut ctx = DecisionContext {
                level,
                period,
                agent: id,
                public,
                private,
                memory: self.agent.memory(),
                perceived: perceived_here,
                views: &shared.views[slot],
                rng: call_rng(shared.seed, shared.round, owner, rank, CallbackPhase::Decision),
            };
            let mut sink = InfluenceSink::new(
                InfluenceSource::Behavior {
                    owner,
                    level: level.clone(),
                },
                period,
                &mut self.outputs[slot],
            );
            behavior
                .decide(&mut ctx, &mut sink)
                .map_err(|source| KernelError::behavior(owner, level, CallbackPhase::Decision, source))?;
            trace!(agent = %id, level = %level, emitted = sink.emitted(), "Agent decided");
        }

        Ok(())
    }
}

fn own_states<T: ModelTypes>(
    runtime: &LevelRuntime<T>,
    id: AgentId,
) -> Result<(&T::PublicState, &T::PrivateState)> {
    let not_resident = || KernelError::AgentNotResident {
        agent: id,
        level: runtime.id().clone(),
    };
    let public = runtime.state.snapshot().agent(id).ok_or_else(not_resident)?;
    let private = runtime.privates.agent(id).ok_or_else(not_resident)?;
    Ok((public, private))
}

fn missing_behavior<T: ModelTypes>(agent: &Agent<T>, level: &LevelId) -> KernelError {
    ConfigError::MissingBehavior {
        agent: agent.id(),
        category: agent.category().clone(),
        level: level.clone(),
    }
    .into()
}

impl<T: ModelTypes> SimulationWorld<T> {
    /// Run the next round
    ///
    /// Returns `false` when no level is scheduled anymore.
    pub fn run_round(&mut self, config: &EngineConfig, heuristic: &dyn DisambiguationHeuristic<T>) -> Result<bool> {
        let Some((time, ranks)) = self.queue.pop_round() else {
            return Ok(false);
        };
        debug_assert!(time > self.current_time, "round time must strictly increase");
        self.rounds += 1;
        let round = self.rounds;
        debug!(round, time = %time, due = ranks.len(), "Round started");

        for runtime in &mut self.levels {
            runtime.state.begin_transitory();
        }

        let views: Vec<LevelViews<T>> = ranks
            .iter()
            .map(|&rank| self.views_for(rank, time, heuristic))
            .collect();

        let influences = self.collect_influences(config, round, time, &ranks, &views)?;
        debug!(round, influences = influences.len(), "Influences collected");
        self.record(influences)?;

        let mut cascades = Vec::new();
        for &rank in &ranks {
            self.react(rank, time, &mut cascades)?;
        }
        self.record(cascades)?;

        self.current_time = time;
        debug!(round, time = %time, next_due = ?self.queue.peek_time(), "Round finished");
        Ok(true)
    }

    /// Consistent states exposed to observers of the level at `rank`
    fn views_for(
        &self,
        rank: usize,
        time: SimulationTime,
        heuristic: &dyn DisambiguationHeuristic<T>,
    ) -> LevelViews<T> {
        let observer = &self.levels[rank];
        let observer_time = observer.consistent_time();

        let views = self
            .topology
            .perceptible_from(observer.id())
            .filter_map(|target| {
                let timeline = &self.level(target)?.timeline;
                let request = ExposureRequest {
                    observer: observer.id(),
                    observer_time,
                    target,
                    round_time: time,
                };
                Some((target.clone(), heuristic.expose(&request, timeline)))
            })
            .collect();
        LevelViews::new(views)
    }

    /// Run natural actions and agent work items of the due levels
    fn collect_influences(
        &mut self,
        config: &EngineConfig,
        round: u64,
        time: SimulationTime,
        ranks: &[usize],
        views: &[LevelViews<T>],
    ) -> Result<Vec<Influence<T>>> {
        let levels = &self.levels;

        let mut environment_outputs = Vec::with_capacity(ranks.len());
        for (slot, &rank) in ranks.iter().enumerate() {
            let runtime = &levels[rank];
            let mut buffer = Vec::new();
            if let Some(action) = self.environment.natural_action(runtime.id()) {
                let period = TimeInterval::new(runtime.consistent_time(), time);
                let mut ctx = ActionContext {
                    level: runtime.id(),
                    period,
                    public: runtime.state.snapshot().environment(),
                    private: runtime.privates.environment(),
                    views: &views[slot],
                    rng: call_rng(config.seed, round, Owner::Environment, rank, CallbackPhase::NaturalAction),
                };
                let mut sink = InfluenceSink::new(
                    InfluenceSource::Behavior {
                        owner: Owner::Environment,
                        level: runtime.id().clone(),
                    },
                    period,
                    &mut buffer,
                );
                action.act(&mut ctx, &mut sink).map_err(|source| {
                    KernelError::behavior(Owner::Environment, runtime.id(), CallbackPhase::NaturalAction, source)
                })?;
                trace!(level = %runtime.id(), emitted = sink.emitted(), "Environment acted");
            }
            environment_outputs.push(buffer);
        }

        let mut work: Vec<AgentWork<'_, T>> = self
            .agents
            .values_mut()
            .filter_map(|agent| {
                let slots: Vec<usize> = ranks
                    .iter()
                    .enumerate()
                    .filter(|(_, rank)| agent.resides_in(levels[**rank].id()))
                    .map(|(slot, _)| slot)
                    .collect();
                if slots.is_empty() {
                    return None;
                }
                Some(AgentWork {
                    agent,
                    slots,
                    outputs: (0..ranks.len()).map(|_| Vec::new()).collect(),
                })
            })
            .collect();

        let shared = RoundShared {
            seed: config.seed,
            round,
            time,
            ranks,
            views,
            levels,
        };
        if work.len() >= config.parallel_threshold {
            debug!(round, work_items = work.len(), "Running agents in parallel");
            let results: Vec<Result<()>> = work.par_iter_mut().map(|item| item.run(&shared)).collect();
            results.into_iter().collect::<Result<()>>()?;
        } else {
            work.iter_mut().try_for_each(|item| item.run(&shared))?;
        }

        let mut merged = Vec::new();
        for (slot, environment) in environment_outputs.into_iter().enumerate() {
            merged.extend(environment);
            for item in &mut work {
                merged.append(&mut item.outputs[slot]);
            }
        }
        Ok(merged)
    }

    /// Append influences to their targets' transitory states
    fn record(&mut self, influences: Vec<Influence<T>>) -> Result<()> {
        let mut map = InfluenceMap::new();
        for influence in influences {
            let from = influence.source().level();
            let to = influence.target();
            if !self.topology.can_influence(from, to) {
                return Err(KernelError::UndeclaredInfluenceTarget {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            map.add(influence);
        }

        for runtime in &mut self.levels {
            for influence in map.for_level(runtime.level.id()) {
                runtime.state.record(influence);
            }
        }
        debug_assert!(map.is_empty(), "influence addressed to an unknown level");
        Ok(())
    }

    /// Close the transitory period of the level at `rank`
    fn react(&mut self, rank: usize, time: SimulationTime, cascades: &mut Vec<Influence<T>>) -> Result<()> {
        let runtime = &mut self.levels[rank];
        let level = runtime.level.id().clone();
        let reaction = runtime.level.reaction();
        let PeriodInfluences { system, regular } = runtime.state.drain();

        if let Some(unknown) = regular.iter().find(|r| !reaction.handles(r.category())) {
            return Err(KernelError::UnrecognizedInfluence {
                level,
                category: unknown.category().to_string(),
            });
        }

        let prior = Arc::clone(runtime.state.snapshot());
        let t_min = prior.time();
        let events: Vec<Stamped<SystemEvent>> = system
            .iter()
            .map(|s| Stamped {
                produced: s.produced,
                source: s.source.clone(),
                value: s.event(),
            })
            .collect();
        let happens_before = reaction.system_phase() == SystemPhase::BeforeRegular;
        let consumed_system = system.len() as u64;
        let consumed_regular = regular.len() as u64;
        let cascades_before = cascades.len();
        let (system_first, system_last) = if happens_before {
            (system, Vec::new())
        } else {
            (Vec::new(), system)
        };

        let mut builder = StateBuilder::from_prior(&prior, &mut runtime.privates);
        apply_system_influences(&mut builder, &mut self.agents, &self.topology, system_first, cascades)?;

        let input = ReactionInput {
            level: &level,
            t_min,
            t_max: time,
            prior: &prior,
            system: &events,
            regular: &regular,
            happens_before,
        };
        let mut emitted = Vec::new();
        let mut sink = InfluenceSink::new(
            InfluenceSource::Reaction { level: level.clone() },
            input.period(),
            &mut emitted,
        );
        reaction
            .react(&input, &mut builder, &mut sink)
            .map_err(|source| KernelError::Reaction {
                level: level.clone(),
                source,
            })?;

        apply_system_influences(&mut builder, &mut self.agents, &self.topology, system_last, cascades)?;

        let next = Arc::new(builder.finish(time));
        let agents = next.agent_count();
        runtime.state.install(Arc::clone(&next));
        runtime.timeline.push(next);
        cascades.append(&mut emitted);

        runtime.stats.reactions += 1;
        runtime.stats.consumed_system += consumed_system;
        runtime.stats.consumed_regular += consumed_regular;
        runtime.stats.cascades += (cascades.len() - cascades_before) as u64;

        let next_due = checked_next_due(runtime.level.time_model(), time).map_err(|source| KernelError::Time {
            level: level.clone(),
            source,
        })?;
        self.queue.schedule(rank, next_due);

        debug!(
            level = %level,
            time = %time,
            system = consumed_system,
            regular = consumed_regular,
            agents,
            next_due = %next_due,
            "Level reacted"
        );
        Ok(())
    }
}
