//! Agents and the environment - the owners of local states
//!
//! An agent carries its identity, a category tag, a global memory and one
//! behavior per level it may reside in. Its per-level local states live in
//! the levels' dynamic states once the engine admits it.

pub mod environment;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::core::error::BehaviorError;
use crate::core::types::{AgentCategory, AgentId, LevelId};
use crate::influence::InfluenceSink;
use crate::simulation::model::ModelTypes;
use crate::simulation::perception::{DecisionContext, PerceptionContext};

pub use environment::{Environment, NaturalActionModel};

/// Per-level behavior of an agent
///
/// `perceive` and `decide` run once per due level the agent resides in.
/// Neither can touch dynamic states: the only output of `decide` is the
/// influences it emits.
pub trait AgentBehavior<T: ModelTypes>: Send + Sync {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, T>) -> Result<T::Perceived, BehaviorError>;

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, T>,
        influences: &mut InfluenceSink<'_, T>,
    ) -> Result<(), BehaviorError>;
}

/// Folds a round's perceptions into an agent's global memory
///
/// Runs once per agent per round, after every perception of the round and
/// before any decision. `perceived` holds one entry per due level.
pub trait MemoryRevisionModel<T: ModelTypes>: Send + Sync {
    fn revise(
        &self,
        agent: AgentId,
        memory: &mut T::Memory,
        perceived: &BTreeMap<LevelId, T::Perceived>,
    ) -> Result<(), BehaviorError>;
}

/// A simulated agent
pub struct Agent<T: ModelTypes> {
    id: AgentId,
    category: AgentCategory,
    memory: T::Memory,
    memory_revision: Option<Arc<dyn MemoryRevisionModel<T>>>,
    behaviors: BTreeMap<LevelId, Arc<dyn AgentBehavior<T>>>,
    /// Local states waiting for the engine to admit the agent
    pending: BTreeMap<LevelId, (T::PublicState, T::PrivateState)>,
    resident_in: BTreeSet<LevelId>,
    /// Destinations of level changes whose entry is still queued
    entering: BTreeSet<LevelId>,
}

impl<T: ModelTypes> Agent<T> {
    pub fn new(id: AgentId, category: impl Into<AgentCategory>, memory: T::Memory) -> Self {
        Self {
            id,
            category: category.into(),
            memory,
            memory_revision: None,
            behaviors: BTreeMap::new(),
            pending: BTreeMap::new(),
            resident_in: BTreeSet::new(),
            entering: BTreeSet::new(),
        }
    }

    pub fn with_behavior(self, level: impl Into<LevelId>, behavior: impl AgentBehavior<T> + 'static) -> Self {
        self.with_shared_behavior(level, Arc::new(behavior))
    }

    /// Register a behavior shared with other agents
    pub fn with_shared_behavior(mut self, level: impl Into<LevelId>, behavior: Arc<dyn AgentBehavior<T>>) -> Self {
        self.behaviors.insert(level.into(), behavior);
        self
    }

    /// Initial local states in `level`
    ///
    /// The agent starts residing there when the engine admits it, either at
    /// initialization or through an `AddAgent` influence.
    pub fn residing_in(mut self, level: impl Into<LevelId>, public: T::PublicState, private: T::PrivateState) -> Self {
        self.pending.insert(level.into(), (public, private));
        self
    }

    pub fn with_memory_revision(mut self, model: impl MemoryRevisionModel<T> + 'static) -> Self {
        self.memory_revision = Some(Arc::new(model));
        self
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn category(&self) -> &AgentCategory {
        &self.category
    }

    pub fn memory(&self) -> &T::Memory {
        &self.memory
    }

    pub fn memory_revision(&self) -> Option<&dyn MemoryRevisionModel<T>> {
        self.memory_revision.as_deref()
    }

    /// Run the memory revision model, if any, over a round's perceptions
    pub(crate) fn revise_memory(&mut self, perceived: &BTreeMap<LevelId, T::Perceived>) -> Result<(), BehaviorError> {
        match &self.memory_revision {
            Some(model) => model.revise(self.id, &mut self.memory, perceived),
            None => Ok(()),
        }
    }

    pub fn behavior(&self, level: &LevelId) -> Option<&dyn AgentBehavior<T>> {
        self.behaviors.get(level).map(|b| b.as_ref())
    }

    pub fn has_behavior(&self, level: &LevelId) -> bool {
        self.behaviors.contains_key(level)
    }

    /// Levels with a registered behavior
    pub fn behavior_levels(&self) -> impl Iterator<Item = &LevelId> + '_ {
        self.behaviors.keys()
    }

    /// Levels the agent currently resides in
    pub fn levels(&self) -> impl Iterator<Item = &LevelId> + '_ {
        self.resident_in.iter()
    }

    pub fn resides_in(&self, level: &LevelId) -> bool {
        self.resident_in.contains(level)
    }

    pub fn is_resident_anywhere(&self) -> bool {
        !self.resident_in.is_empty()
    }

    /// Returns true while a level change has left the origin but not yet
    /// entered its destination
    pub fn is_in_transit(&self) -> bool {
        !self.entering.is_empty()
    }

    /// Levels with local states waiting for admission
    pub fn pending_levels(&self) -> impl Iterator<Item = &LevelId> + '_ {
        self.pending.keys()
    }

    pub(crate) fn take_pending(&mut self) -> BTreeMap<LevelId, (T::PublicState, T::PrivateState)> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn enter(&mut self, level: LevelId) {
        self.entering.remove(&level);
        self.resident_in.insert(level);
    }

    pub(crate) fn depart_for(&mut self, destination: LevelId) {
        self.entering.insert(destination);
    }

    pub(crate) fn leave(&mut self, level: &LevelId) -> bool {
        self.resident_in.remove(level)
    }
}

impl<T: ModelTypes> fmt::Debug for Agent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("memory", &self.memory)
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .field("resident_in", &self.resident_in)
            .field("entering", &self.entering)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::simulation::model::tests::TestTypes;

    /// Behavior that perceives its own public state and emits nothing
    pub struct Idle;

    impl AgentBehavior<TestTypes> for Idle {
        fn perceive(&self, ctx: &mut PerceptionContext<'_, TestTypes>) -> Result<i64, BehaviorError> {
            Ok(*ctx.public())
        }

        fn decide(
            &self,
            _ctx: &mut DecisionContext<'_, TestTypes>,
            _influences: &mut InfluenceSink<'_, TestTypes>,
        ) -> Result<(), BehaviorError> {
            Ok(())
        }
    }

    #[test]
    fn test_agent_builder() {
        let mut agent: Agent<TestTypes> = Agent::new(AgentId(3), "walker", vec![])
            .with_behavior("physical", Idle)
            .residing_in("physical", 1, 2);

        assert_eq!(agent.id(), AgentId(3));
        assert_eq!(agent.category().as_str(), "walker");
        assert!(agent.has_behavior(&LevelId::new("physical")));
        assert!(!agent.is_resident_anywhere());
        assert_eq!(agent.pending_levels().count(), 1);

        let pending = agent.take_pending();
        assert_eq!(pending.get(&LevelId::new("physical")), Some(&(1, 2)));
        agent.enter(LevelId::new("physical"));
        assert!(agent.resides_in(&LevelId::new("physical")));
        assert!(agent.leave(&LevelId::new("physical")));
        assert!(!agent.is_resident_anywhere());
    }
}
