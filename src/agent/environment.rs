//! The environment - singleton owner of per-level local states

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::error::BehaviorError;
use crate::core::types::LevelId;
use crate::influence::InfluenceSink;
use crate::simulation::model::ModelTypes;
use crate::simulation::perception::ActionContext;

/// Spontaneous dynamics of the environment at one level
pub trait NaturalActionModel<T: ModelTypes>: Send + Sync {
    fn act(
        &self,
        ctx: &mut ActionContext<'_, T>,
        influences: &mut InfluenceSink<'_, T>,
    ) -> Result<(), BehaviorError>;
}

/// Per-level local states and natural actions of the environment
///
/// Every level needs a public and private state. A level without a natural
/// action simply produces no environment influences.
pub struct Environment<T: ModelTypes> {
    pending: BTreeMap<LevelId, (T::PublicState, T::PrivateState)>,
    actions: BTreeMap<LevelId, Arc<dyn NaturalActionModel<T>>>,
}

impl<T: ModelTypes> Default for Environment<T> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            actions: BTreeMap::new(),
        }
    }
}

impl<T: ModelTypes> Environment<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: impl Into<LevelId>, public: T::PublicState, private: T::PrivateState) -> Self {
        self.pending.insert(level.into(), (public, private));
        self
    }

    pub fn with_natural_action(
        mut self,
        level: impl Into<LevelId>,
        action: impl NaturalActionModel<T> + 'static,
    ) -> Self {
        self.actions.insert(level.into(), Arc::new(action));
        self
    }

    pub fn natural_action(&self, level: &LevelId) -> Option<&dyn NaturalActionModel<T>> {
        self.actions.get(level).map(|a| a.as_ref())
    }

    /// Levels with a natural action
    pub fn acting_levels(&self) -> impl Iterator<Item = &LevelId> + '_ {
        self.actions.keys()
    }

    /// Levels with initial local states not yet installed
    pub fn pending_levels(&self) -> impl Iterator<Item = &LevelId> + '_ {
        self.pending.keys()
    }

    pub(crate) fn take_pending(&mut self) -> BTreeMap<LevelId, (T::PublicState, T::PrivateState)> {
        std::mem::take(&mut self.pending)
    }
}

impl<T: ModelTypes> fmt::Debug for Environment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("pending", &self.pending)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
