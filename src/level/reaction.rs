//! Level reaction models

use std::collections::BTreeSet;

use crate::core::error::BehaviorError;
use crate::core::types::{LevelId, SimulationTime, TimeInterval};
use crate::influence::{InfluenceCategory, InfluenceSink, RegularInfluence, Stamped, SystemEvent};
use crate::simulation::model::ModelTypes;
use crate::state::{ConsistentState, StateBuilder};

/// When the engine applies a level's system influences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemPhase {
    /// Structural changes are visible in `next` when `react` runs
    #[default]
    BeforeRegular,
    /// `react` sees the prior agent set; structural changes follow it
    AfterRegular,
}

/// Everything a reaction reads
pub struct ReactionInput<'a, T: ModelTypes> {
    pub level: &'a LevelId,
    /// Time of the prior consistent state
    pub t_min: SimulationTime,
    /// Time of the consistent state being built
    pub t_max: SimulationTime,
    pub prior: &'a ConsistentState<T>,
    /// System influences of the period, in emission order
    pub system: &'a [Stamped<SystemEvent>],
    /// Regular influences of the period, in emission order
    pub regular: &'a [Stamped<RegularInfluence<T>>],
    /// True if the system influences were applied before `react` runs
    pub happens_before: bool,
}

impl<T: ModelTypes> ReactionInput<'_, T> {
    /// The transitory period `]t_min, t_max[` being closed
    pub fn period(&self) -> TimeInterval {
        TimeInterval::new(self.t_min, self.t_max)
    }

    /// Regular influences of one category, in emission order
    pub fn of_category<'b>(
        &'b self,
        category: &'b InfluenceCategory,
    ) -> impl Iterator<Item = &'b Stamped<RegularInfluence<T>>> + 'b {
        self.regular.iter().filter(move |r| r.category() == category)
    }
}

/// Folds one transitory period into a level's next consistent state
///
/// `next` starts as a copy of `input.prior`. Cascading influences emitted
/// through `cascade` are consumed in a later round.
pub trait ReactionModel<T: ModelTypes>: Send + Sync {
    /// Whether this reaction knows how to process `category`
    fn handles(&self, category: &InfluenceCategory) -> bool;

    fn system_phase(&self) -> SystemPhase {
        SystemPhase::BeforeRegular
    }

    fn react(
        &self,
        input: &ReactionInput<'_, T>,
        next: &mut StateBuilder<'_, T>,
        cascade: &mut InfluenceSink<'_, T>,
    ) -> Result<(), BehaviorError>;
}

/// Accepts a fixed set of categories and leaves the state unchanged
#[derive(Debug, Clone, Default)]
pub struct IdentityReaction {
    categories: BTreeSet<InfluenceCategory>,
}

impl IdentityReaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handling<C: Into<InfluenceCategory>>(categories: impl IntoIterator<Item = C>) -> Self {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

impl<T: ModelTypes> ReactionModel<T> for IdentityReaction {
    fn handles(&self, category: &InfluenceCategory) -> bool {
        self.categories.contains(category)
    }

    fn react(
        &self,
        _input: &ReactionInput<'_, T>,
        _next: &mut StateBuilder<'_, T>,
        _cascade: &mut InfluenceSink<'_, T>,
    ) -> Result<(), BehaviorError> {
        Ok(())
    }
}
