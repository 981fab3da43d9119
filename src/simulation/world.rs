//! Runtime state of a simulation: levels, environment and agents

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::agent::{Agent, Environment};
use crate::core::config::EngineConfig;
use crate::core::error::{ConfigError, Result};
use crate::core::types::{AgentId, LevelId, Owner, SimulationTime};
use crate::level::{Level, LevelTopology};
use crate::simulation::model::{ModelTypes, SimulationModel};
use crate::state::{ConsistentState, DynamicState, LevelTimeline, LocalPrivates, StateBuilder};
use crate::time::{checked_next_due, DueQueue};

/// Counters kept per level for the run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub reactions: u64,
    pub consumed_system: u64,
    pub consumed_regular: u64,
    pub cascades: u64,
}

/// One level with everything the engine tracks for it
pub(crate) struct LevelRuntime<T: ModelTypes> {
    pub level: Level<T>,
    pub state: DynamicState<T>,
    pub privates: LocalPrivates<T>,
    pub timeline: LevelTimeline<T>,
    pub stats: LevelStats,
}

impl<T: ModelTypes> LevelRuntime<T> {
    fn new(level: Level<T>, initial: ConsistentState<T>, privates: LocalPrivates<T>, depth: usize) -> Self {
        let initial = Arc::new(initial);
        Self {
            level,
            state: DynamicState::Consistent(Arc::clone(&initial)),
            privates,
            timeline: LevelTimeline::new(initial, depth),
            stats: LevelStats::default(),
        }
    }

    pub fn id(&self) -> &LevelId {
        self.level.id()
    }

    /// Time of the last consistent state
    pub fn consistent_time(&self) -> SimulationTime {
        self.state.snapshot().time()
    }
}

/// Initial local states of one level, gathered before building its state
struct LevelSeed<T: ModelTypes> {
    environment: Option<(T::PublicState, T::PrivateState)>,
    agents: Vec<(AgentId, T::PublicState, T::PrivateState)>,
}

pub(crate) struct SimulationWorld<T: ModelTypes> {
    pub topology: LevelTopology,
    /// Indexed by tie rank
    pub levels: Vec<LevelRuntime<T>>,
    pub environment: Environment<T>,
    pub agents: BTreeMap<AgentId, Agent<T>>,
    pub queue: DueQueue,
    pub initial_time: SimulationTime,
    pub current_time: SimulationTime,
    pub rounds: u64,
}

impl<T: ModelTypes> SimulationWorld<T> {
    /// Build the initial consistent states from the model
    ///
    /// Every failure here is a configuration error.
    pub fn initialize<M: SimulationModel<T> + ?Sized>(model: &M, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let initial_time = model.initial_time().ok_or(ConfigError::MissingInitialTime)?;
        let params = model.parameters();

        let mut levels = model.generate_levels(params)?;
        let topology = LevelTopology::build(&levels, &config.level_order)?;
        levels.sort_by_key(|level| topology.rank_of(level.id()));

        let mut environment = model.generate_environment(params, &topology)?;
        let generated = model.generate_agents(params, &topology)?;

        let mut seeds: Vec<LevelSeed<T>> = (0..topology.len())
            .map(|_| LevelSeed {
                environment: None,
                agents: Vec::new(),
            })
            .collect();

        for level in environment.acting_levels() {
            if !topology.contains(level) {
                return Err(unknown_level(Owner::Environment, level).into());
            }
        }
        for (level, local) in environment.take_pending() {
            let rank = topology
                .rank_of(&level)
                .ok_or_else(|| unknown_level(Owner::Environment, &level))?;
            seeds[rank].environment = Some(local);
        }

        let mut agents = BTreeMap::new();
        for mut agent in generated {
            let id = agent.id();
            if agents.contains_key(&id) {
                return Err(ConfigError::DuplicateAgent(id).into());
            }
            if let Some(level) = agent.behavior_levels().find(|l| !topology.contains(l)) {
                return Err(unknown_level(Owner::Agent(id), level).into());
            }
            for (level, (public, private)) in agent.take_pending() {
                let rank = topology
                    .rank_of(&level)
                    .ok_or_else(|| unknown_level(Owner::Agent(id), &level))?;
                if !agent.has_behavior(&level) {
                    return Err(ConfigError::MissingBehavior {
                        agent: id,
                        category: agent.category().clone(),
                        level,
                    }
                    .into());
                }
                seeds[rank].agents.push((id, public, private));
                agent.enter(level);
            }
            agents.insert(id, agent);
        }

        let mut queue = DueQueue::new();
        let mut runtimes = Vec::with_capacity(levels.len());
        for (rank, (level, seed)) in levels.into_iter().zip(seeds).enumerate() {
            let (public, private) = seed.environment.ok_or_else(|| ConfigError::IncompleteEnvironment {
                level: level.id().clone(),
                what: "local state",
            })?;

            let mut privates = LocalPrivates::new(private);
            let mut builder = StateBuilder::initial(level.id().clone(), public, &mut privates);
            for (id, public, private) in seed.agents {
                builder.insert_agent(id, public, private)?;
            }
            let state = builder.finish(initial_time);

            let next_due = checked_next_due(level.time_model(), initial_time).map_err(|source| {
                ConfigError::TimeModel {
                    level: level.id().clone(),
                    source,
                }
            })?;
            queue.schedule(rank, next_due);

            debug!(
                level = %level.id(),
                rank,
                agents = state.agent_count(),
                next_due = %next_due,
                "Level initialized"
            );
            runtimes.push(LevelRuntime::new(level, state, privates, config.history_depth));
        }

        info!(
            levels = runtimes.len(),
            agents = agents.len(),
            initial_time = %initial_time,
            "Simulation initialized"
        );

        Ok(Self {
            topology,
            levels: runtimes,
            environment,
            agents,
            queue,
            initial_time,
            current_time: initial_time,
            rounds: 0,
        })
    }

    pub fn level(&self, id: &LevelId) -> Option<&LevelRuntime<T>> {
        self.topology.rank_of(id).map(|rank| &self.levels[rank])
    }
}

fn unknown_level(owner: Owner, level: &LevelId) -> ConfigError {
    ConfigError::UnknownLevel {
        owner,
        level: level.clone(),
    }
}
