//! Consistent / transitory representation of a level's dynamic state

use std::sync::Arc;

use crate::core::types::SimulationTime;
use crate::influence::{Influence, RegularInfluence, Stamped, SystemInfluence};
use crate::simulation::model::ModelTypes;
use crate::state::consistent::ConsistentState;

/// Influences of one transitory period, split by kind
///
/// Both vectors keep emission order.
#[derive(Debug)]
pub struct PeriodInfluences<T: ModelTypes> {
    pub system: Vec<Stamped<SystemInfluence<T>>>,
    pub regular: Vec<Stamped<RegularInfluence<T>>>,
}

impl<T: ModelTypes> Default for PeriodInfluences<T> {
    fn default() -> Self {
        Self {
            system: Vec::new(),
            regular: Vec::new(),
        }
    }
}

impl<T: ModelTypes> PeriodInfluences<T> {
    pub fn len(&self) -> usize {
        self.system.len() + self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.regular.is_empty()
    }
}

/// Open period following a consistent state
///
/// Accumulates the influences addressed to the level until its next
/// reaction.
#[derive(Debug)]
pub struct TransitoryState<T: ModelTypes> {
    from: Arc<ConsistentState<T>>,
    influences: Vec<Influence<T>>,
}

impl<T: ModelTypes> TransitoryState<T> {
    pub fn begin(from: Arc<ConsistentState<T>>) -> Self {
        Self {
            from,
            influences: Vec::new(),
        }
    }

    /// Consistent state the period started from
    pub fn origin(&self) -> &Arc<ConsistentState<T>> {
        &self.from
    }

    pub fn start(&self) -> SimulationTime {
        self.from.time()
    }

    pub fn influences(&self) -> &[Influence<T>] {
        &self.influences
    }

    pub fn record(&mut self, influence: Influence<T>) {
        debug_assert_eq!(influence.target(), self.from.level());
        self.influences.push(influence);
    }

    /// Take every recorded influence, split into system and regular
    pub fn drain(&mut self) -> PeriodInfluences<T> {
        let mut period = PeriodInfluences::default();
        for influence in self.influences.drain(..) {
            match influence.into_stamped() {
                Ok(system) => period.system.push(system),
                Err(regular) => period.regular.push(regular),
            }
        }
        period
    }
}

/// Dynamic state of one level
///
/// Either the consistent snapshot of the last reaction, or the transitory
/// period that follows it. Never both.
#[derive(Debug)]
pub enum DynamicState<T: ModelTypes> {
    Consistent(Arc<ConsistentState<T>>),
    Transitory(TransitoryState<T>),
}

impl<T: ModelTypes> DynamicState<T> {
    pub fn new(initial: ConsistentState<T>) -> Self {
        DynamicState::Consistent(Arc::new(initial))
    }

    /// Last consistent state, whatever the current representation
    pub fn snapshot(&self) -> &Arc<ConsistentState<T>> {
        match self {
            DynamicState::Consistent(state) => state,
            DynamicState::Transitory(transitory) => transitory.origin(),
        }
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, DynamicState::Consistent(_))
    }

    pub fn is_transitory(&self) -> bool {
        matches!(self, DynamicState::Transitory(_))
    }

    /// Open the transitory period after the current consistent state
    ///
    /// No-op if the period is already open.
    pub fn begin_transitory(&mut self) {
        if let DynamicState::Consistent(state) = self {
            let from = Arc::clone(state);
            *self = DynamicState::Transitory(TransitoryState::begin(from));
        }
    }

    /// Append an influence to the open period, opening it if needed
    pub fn record(&mut self, influence: Influence<T>) {
        self.begin_transitory();
        if let DynamicState::Transitory(transitory) = self {
            transitory.record(influence);
        }
    }

    /// Influences waiting for the next reaction
    pub fn pending(&self) -> usize {
        match self {
            DynamicState::Consistent(_) => 0,
            DynamicState::Transitory(transitory) => transitory.influences().len(),
        }
    }

    /// Take the open period's influences
    ///
    /// The state stays transitory until `install` is called.
    pub fn drain(&mut self) -> PeriodInfluences<T> {
        match self {
            DynamicState::Consistent(_) => PeriodInfluences::default(),
            DynamicState::Transitory(transitory) => transitory.drain(),
        }
    }

    /// Close the period with the state produced by the level's reaction
    pub(crate) fn install(&mut self, next: Arc<ConsistentState<T>>) {
        debug_assert!(next.time() > self.snapshot().time());
        *self = DynamicState::Consistent(next);
    }
}
