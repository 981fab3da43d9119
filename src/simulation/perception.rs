//! Contexts handed to perception, decision and natural-action code
//!
//! A context exposes the caller's own local states, the disambiguated
//! consistent states of every level its level perceives, and a random
//! generator private to the call. Nothing in a context can write to a
//! dynamic state.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::core::error::CallbackPhase;
use crate::core::types::{AgentId, LevelId, Owner, SimulationTime, TimeInterval};
use crate::simulation::model::ModelTypes;
use crate::state::ConsistentState;

/// Consistent states exposed to observers of one level during a round
#[derive(Debug)]
pub struct LevelViews<T: ModelTypes> {
    views: BTreeMap<LevelId, Arc<ConsistentState<T>>>,
}

impl<T: ModelTypes> LevelViews<T> {
    pub(crate) fn new(views: BTreeMap<LevelId, Arc<ConsistentState<T>>>) -> Self {
        Self { views }
    }

    pub fn get(&self, level: &LevelId) -> Option<&ConsistentState<T>> {
        self.views.get(level).map(|state| &**state)
    }

    /// Perceptible levels, in identifier order
    pub fn levels(&self) -> impl Iterator<Item = &LevelId> + '_ {
        self.views.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LevelId, &ConsistentState<T>)> + '_ {
        self.views.iter().map(|(id, state)| (id, &**state))
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Derive the generator of one callback
///
/// Mixes the run seed with everything that identifies the call, so a call
/// draws the same numbers whatever thread runs it and whatever ran before.
pub(crate) fn call_rng(seed: u64, round: u64, owner: Owner, level_rank: usize, phase: CallbackPhase) -> ChaCha8Rng {
    let owner_key = match owner {
        Owner::Environment => 0,
        Owner::Agent(id) => id.0.wrapping_add(1),
    };
    let phase_key = match phase {
        CallbackPhase::Perception => 1,
        CallbackPhase::MemoryRevision => 2,
        CallbackPhase::Decision => 3,
        CallbackPhase::NaturalAction => 4,
    };

    let mut state = seed;
    for word in [round, owner_key, level_rank as u64, phase_key] {
        state = splitmix64(state ^ word);
    }
    ChaCha8Rng::seed_from_u64(state)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// What an agent sees while perceiving one level
pub struct PerceptionContext<'a, T: ModelTypes> {
    pub(crate) level: &'a LevelId,
    pub(crate) period: TimeInterval,
    pub(crate) agent: AgentId,
    pub(crate) public: &'a T::PublicState,
    pub(crate) private: &'a T::PrivateState,
    pub(crate) memory: &'a T::Memory,
    pub(crate) views: &'a LevelViews<T>,
    pub(crate) rng: ChaCha8Rng,
}

impl<'a, T: ModelTypes> PerceptionContext<'a, T> {
    pub fn level(&self) -> &LevelId {
        self.level
    }

    /// Transitory period of the level, `]last consistent time, round time[`
    pub fn period(&self) -> TimeInterval {
        self.period
    }

    /// Time of the level's last consistent state
    pub fn time(&self) -> SimulationTime {
        self.period.lower
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn public(&self) -> &T::PublicState {
        self.public
    }

    pub fn private(&self) -> &T::PrivateState {
        self.private
    }

    pub fn memory(&self) -> &T::Memory {
        self.memory
    }

    /// Disambiguated consistent state of a perceptible level
    pub fn view(&self, level: &LevelId) -> Option<&ConsistentState<T>> {
        self.views.get(level)
    }

    pub fn views(&self) -> &LevelViews<T> {
        self.views
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

/// What an agent sees while deciding at one level
///
/// Memory has already been revised with every perception of the round.
pub struct DecisionContext<'a, T: ModelTypes> {
    pub(crate) level: &'a LevelId,
    pub(crate) period: TimeInterval,
    pub(crate) agent: AgentId,
    pub(crate) public: &'a T::PublicState,
    pub(crate) private: &'a T::PrivateState,
    pub(crate) memory: &'a T::Memory,
    pub(crate) perceived: &'a T::Perceived,
    pub(crate) views: &'a LevelViews<T>,
    pub(crate) rng: ChaCha8Rng,
}

impl<'a, T: ModelTypes> DecisionContext<'a, T> {
    pub fn level(&self) -> &LevelId {
        self.level
    }

    pub fn period(&self) -> TimeInterval {
        self.period
    }

    pub fn time(&self) -> SimulationTime {
        self.period.lower
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn public(&self) -> &T::PublicState {
        self.public
    }

    pub fn private(&self) -> &T::PrivateState {
        self.private
    }

    pub fn memory(&self) -> &T::Memory {
        self.memory
    }

    /// This round's perception of the level
    pub fn perceived(&self) -> &T::Perceived {
        self.perceived
    }

    pub fn view(&self, level: &LevelId) -> Option<&ConsistentState<T>> {
        self.views.get(level)
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

/// What the environment sees while acting at one level
pub struct ActionContext<'a, T: ModelTypes> {
    pub(crate) level: &'a LevelId,
    pub(crate) period: TimeInterval,
    pub(crate) public: &'a T::PublicState,
    pub(crate) private: &'a T::PrivateState,
    pub(crate) views: &'a LevelViews<T>,
    pub(crate) rng: ChaCha8Rng,
}

impl<'a, T: ModelTypes> ActionContext<'a, T> {
    pub fn level(&self) -> &LevelId {
        self.level
    }

    pub fn period(&self) -> TimeInterval {
        self.period
    }

    pub fn time(&self) -> SimulationTime {
        self.period.lower
    }

    pub fn public(&self) -> &T::PublicState {
        self.public
    }

    pub fn private(&self) -> &T::PrivateState {
        self.private
    }

    pub fn view(&self, level: &LevelId) -> Option<&ConsistentState<T>> {
        self.views.get(level)
    }

    pub fn views(&self) -> &LevelViews<T> {
        self.views
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}
