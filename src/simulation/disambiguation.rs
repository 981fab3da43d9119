//! Which consistent state of a level an observer gets to see
//!
//! Levels run on their own clocks, so an observer at one level is rarely
//! time-aligned with the levels it perceives. A heuristic picks, from the
//! retained history of the perceived level, the state to expose.

use std::sync::Arc;

use crate::core::types::{LevelId, SimulationTime};
use crate::simulation::model::ModelTypes;
use crate::state::{ConsistentState, LevelTimeline};

/// One observation to disambiguate
#[derive(Debug, Clone, Copy)]
pub struct ExposureRequest<'a> {
    /// Level whose agents and environment observe
    pub observer: &'a LevelId,
    /// Start of the observer's transitory period
    pub observer_time: SimulationTime,
    /// Level being observed
    pub target: &'a LevelId,
    /// Time of the round being computed
    pub round_time: SimulationTime,
}

pub trait DisambiguationHeuristic<T: ModelTypes>: Send + Sync {
    fn expose(&self, request: &ExposureRequest<'_>, timeline: &LevelTimeline<T>) -> Arc<ConsistentState<T>>;
}

/// Expose the most recently completed consistent state
#[derive(Debug, Clone, Copy, Default)]
pub struct LastConsistentState;

impl<T: ModelTypes> DisambiguationHeuristic<T> for LastConsistentState {
    fn expose(&self, _request: &ExposureRequest<'_>, timeline: &LevelTimeline<T>) -> Arc<ConsistentState<T>> {
        Arc::clone(timeline.latest())
    }
}

/// Expose the latest state not after the observer's period start
///
/// Observers then see every level as it was when their own period opened.
/// Falls back to the oldest retained state when the history is too short.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignedToObserverStart;

impl<T: ModelTypes> DisambiguationHeuristic<T> for AlignedToObserverStart {
    fn expose(&self, request: &ExposureRequest<'_>, timeline: &LevelTimeline<T>) -> Arc<ConsistentState<T>> {
        let state = timeline
            .at_or_before(request.observer_time)
            .unwrap_or_else(|| timeline.oldest());
        Arc::clone(state)
    }
}
