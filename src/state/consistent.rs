//! Consistent states and the builder that produces the next one

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::core::error::{KernelError, Result};
use crate::core::types::{AgentId, LevelId, SimulationTime};
use crate::simulation::model::ModelTypes;

/// Immutable snapshot of one level at one instant
///
/// Holds the environment's public local state and the public local state of
/// every agent residing in the level. Never mutated: each reaction replaces
/// it with a new snapshot.
#[derive(Debug)]
pub struct ConsistentState<T: ModelTypes> {
    level: LevelId,
    time: SimulationTime,
    environment: Arc<T::PublicState>,
    agents: BTreeMap<AgentId, Arc<T::PublicState>>,
}

impl<T: ModelTypes> ConsistentState<T> {
    pub(crate) fn new(
        level: LevelId,
        time: SimulationTime,
        environment: Arc<T::PublicState>,
        agents: BTreeMap<AgentId, Arc<T::PublicState>>,
    ) -> Self {
        Self {
            level,
            time,
            environment,
            agents,
        }
    }

    pub fn level(&self) -> &LevelId {
        &self.level
    }

    pub fn time(&self) -> SimulationTime {
        self.time
    }

    pub fn environment(&self) -> &T::PublicState {
        &self.environment
    }

    pub fn agent(&self, id: AgentId) -> Option<&T::PublicState> {
        self.agents.get(&id).map(|state| &**state)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Agent public states in ascending identifier order
    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &T::PublicState)> + '_ {
        self.agents.iter().map(|(id, state)| (*id, &**state))
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

impl<T: ModelTypes> PartialEq for ConsistentState<T>
where
    T::PublicState: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.time == other.time
            && self.environment == other.environment
            && self.agents == other.agents
    }
}

impl<T: ModelTypes> Serialize for ConsistentState<T>
where
    T::PublicState: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let agents: BTreeMap<AgentId, &T::PublicState> =
            self.agents.iter().map(|(id, state)| (*id, &**state)).collect();

        let mut state = serializer.serialize_struct("ConsistentState", 4)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("time", &self.time)?;
        state.serialize_field("environment", &*self.environment)?;
        state.serialize_field("agents", &agents)?;
        state.end()
    }
}

/// Private local states of one level, visible only to their owners
#[derive(Debug)]
pub struct LocalPrivates<T: ModelTypes> {
    pub(crate) environment: T::PrivateState,
    pub(crate) agents: BTreeMap<AgentId, T::PrivateState>,
}

impl<T: ModelTypes> LocalPrivates<T> {
    pub(crate) fn new(environment: T::PrivateState) -> Self {
        Self {
            environment,
            agents: BTreeMap::new(),
        }
    }

    pub fn environment(&self) -> &T::PrivateState {
        &self.environment
    }

    pub fn agent(&self, id: AgentId) -> Option<&T::PrivateState> {
        self.agents.get(&id)
    }
}

/// Output builder for the next consistent state of a level
///
/// Starts as a copy of the prior consistent state (agent states are shared
/// until first written). Private states are edited in place. Reactions edit
/// local states through it; adding and removing agents is reserved to the
/// engine's system phase.
#[derive(Debug)]
pub struct StateBuilder<'p, T: ModelTypes> {
    level: LevelId,
    environment: Arc<T::PublicState>,
    agents: BTreeMap<AgentId, Arc<T::PublicState>>,
    privates: &'p mut LocalPrivates<T>,
}

impl<'p, T: ModelTypes> StateBuilder<'p, T> {
    pub(crate) fn from_prior(prior: &ConsistentState<T>, privates: &'p mut LocalPrivates<T>) -> Self {
        Self {
            level: prior.level.clone(),
            environment: Arc::clone(&prior.environment),
            agents: prior.agents.clone(),
            privates,
        }
    }

    /// Builder for a level's initial state
    pub(crate) fn initial(level: LevelId, environment: T::PublicState, privates: &'p mut LocalPrivates<T>) -> Self {
        Self {
            level,
            environment: Arc::new(environment),
            agents: BTreeMap::new(),
            privates,
        }
    }

    pub fn level(&self) -> &LevelId {
        &self.level
    }

    pub fn environment(&self) -> &T::PublicState {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut T::PublicState {
        Arc::make_mut(&mut self.environment)
    }

    pub fn environment_private(&self) -> &T::PrivateState {
        &self.privates.environment
    }

    pub fn environment_private_mut(&mut self) -> &mut T::PrivateState {
        &mut self.privates.environment
    }

    pub fn agent(&self, id: AgentId) -> Option<&T::PublicState> {
        self.agents.get(&id).map(|state| &**state)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut T::PublicState> {
        self.agents.get_mut(&id).map(Arc::make_mut)
    }

    pub fn agent_private(&self, id: AgentId) -> Option<&T::PrivateState> {
        self.privates.agents.get(&id)
    }

    pub fn agent_private_mut(&mut self, id: AgentId) -> Option<&mut T::PrivateState> {
        self.privates.agents.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Identifiers of resident agents, ascending
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &T::PublicState)> + '_ {
        self.agents.iter().map(|(id, state)| (*id, &**state))
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub(crate) fn insert_agent(
        &mut self,
        id: AgentId,
        public: T::PublicState,
        private: T::PrivateState,
    ) -> Result<()> {
        if self.agents.contains_key(&id) {
            return Err(KernelError::AgentAlreadyResident {
                agent: id,
                level: self.level.clone(),
            });
        }
        self.agents.insert(id, Arc::new(public));
        self.privates.agents.insert(id, private);
        Ok(())
    }

    pub(crate) fn remove_agent(&mut self, id: AgentId) -> Result<(Arc<T::PublicState>, T::PrivateState)> {
        let not_resident = || KernelError::AgentNotResident {
            agent: id,
            level: self.level.clone(),
        };
        let public = self.agents.remove(&id).ok_or_else(not_resident)?;
        let private = self.privates.agents.remove(&id).ok_or_else(not_resident)?;
        Ok((public, private))
    }

    /// Freeze into the consistent state at `time`
    pub(crate) fn finish(self, time: SimulationTime) -> ConsistentState<T> {
        debug_assert_eq!(self.agents.len(), self.privates.agents.len());
        ConsistentState::new(self.level, time, self.environment, self.agents)
    }
}
