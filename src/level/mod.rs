//! Levels - independently clocked layers of description

pub mod reaction;
pub mod topology;

use std::collections::BTreeSet;
use std::fmt;

use crate::core::error::ConfigError;
use crate::core::types::{LevelId, SimulationTime};
use crate::simulation::model::ModelTypes;
use crate::time::{PeriodicTimeModel, TimeModel};

pub use reaction::{IdentityReaction, ReactionInput, ReactionModel, SystemPhase};
pub use topology::LevelTopology;

/// One level of the simulation
///
/// A level owns its clock and its reaction. It always perceives and
/// influences itself; other adjacent levels are declared explicitly and
/// checked when the engine initializes.
pub struct Level<T: ModelTypes> {
    id: LevelId,
    time_model: Box<dyn TimeModel>,
    reaction: Box<dyn ReactionModel<T>>,
    perceptible: BTreeSet<LevelId>,
    influenceable: BTreeSet<LevelId>,
}

impl<T: ModelTypes> Level<T> {
    pub fn new(
        id: impl Into<LevelId>,
        time_model: impl TimeModel + 'static,
        reaction: impl ReactionModel<T> + 'static,
    ) -> Self {
        let id = id.into();
        Self {
            perceptible: BTreeSet::from([id.clone()]),
            influenceable: BTreeSet::from([id.clone()]),
            id,
            time_model: Box::new(time_model),
            reaction: Box::new(reaction),
        }
    }

    /// Level with a periodic clock
    pub fn periodic(
        id: impl Into<LevelId>,
        period: i64,
        phase_shift: i64,
        initial: SimulationTime,
        reaction: impl ReactionModel<T> + 'static,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        let clock = PeriodicTimeModel::new(period, phase_shift, initial).map_err(|source| {
            ConfigError::TimeModel {
                level: id.clone(),
                source,
            }
        })?;
        Ok(Self::new(id, clock, reaction))
    }

    /// Declare levels this level can observe
    pub fn perceiving<L: Into<LevelId>>(mut self, levels: impl IntoIterator<Item = L>) -> Self {
        self.perceptible.extend(levels.into_iter().map(Into::into));
        self
    }

    /// Declare levels this level can send influences to
    pub fn influencing<L: Into<LevelId>>(mut self, levels: impl IntoIterator<Item = L>) -> Self {
        self.influenceable.extend(levels.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> &LevelId {
        &self.id
    }

    pub fn time_model(&self) -> &dyn TimeModel {
        self.time_model.as_ref()
    }

    pub fn reaction(&self) -> &dyn ReactionModel<T> {
        self.reaction.as_ref()
    }

    pub fn perceptible(&self) -> &BTreeSet<LevelId> {
        &self.perceptible
    }

    pub fn influenceable(&self) -> &BTreeSet<LevelId> {
        &self.influenceable
    }

    pub fn perceives(&self, level: &LevelId) -> bool {
        self.perceptible.contains(level)
    }

    pub fn influences(&self, level: &LevelId) -> bool {
        self.influenceable.contains(level)
    }
}

impl<T: ModelTypes> fmt::Debug for Level<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("id", &self.id)
            .field("perceptible", &self.perceptible)
            .field("influenceable", &self.influenceable)
            .finish_non_exhaustive()
    }
}
