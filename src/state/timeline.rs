//! Bounded history of a level's consistent states

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::types::SimulationTime;
use crate::simulation::model::ModelTypes;
use crate::state::consistent::ConsistentState;

/// Most recent consistent states of one level, oldest first
///
/// Never empty: the latest state is always retained. At most `depth`
/// states are kept.
#[derive(Debug)]
pub struct LevelTimeline<T: ModelTypes> {
    latest: Arc<ConsistentState<T>>,
    earlier: VecDeque<Arc<ConsistentState<T>>>,
    depth: usize,
}

impl<T: ModelTypes> LevelTimeline<T> {
    pub fn new(initial: Arc<ConsistentState<T>>, depth: usize) -> Self {
        Self {
            latest: initial,
            earlier: VecDeque::new(),
            depth: depth.max(1),
        }
    }

    pub fn push(&mut self, state: Arc<ConsistentState<T>>) {
        debug_assert!(state.time() > self.latest.time());
        let previous = std::mem::replace(&mut self.latest, state);
        self.earlier.push_back(previous);
        while self.earlier.len() >= self.depth {
            self.earlier.pop_front();
        }
    }

    /// Most recently completed consistent state
    pub fn latest(&self) -> &Arc<ConsistentState<T>> {
        &self.latest
    }

    pub fn oldest(&self) -> &Arc<ConsistentState<T>> {
        self.earlier.front().unwrap_or(&self.latest)
    }

    /// Most recent retained state whose time is not after `time`
    pub fn at_or_before(&self, time: SimulationTime) -> Option<&Arc<ConsistentState<T>>> {
        self.iter().rev().find(|state| state.time() <= time)
    }

    /// Retained states, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<ConsistentState<T>>> + '_ {
        self.earlier.iter().chain(std::iter::once(&self.latest))
    }

    pub fn len(&self) -> usize {
        self.earlier.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::model::tests::TestTypes;
    use crate::state::consistent::tests::state_with;

    fn state(time: i64) -> Arc<ConsistentState<TestTypes>> {
        Arc::new(state_with("a", time, time, &[]).0)
    }

    fn times(timeline: &LevelTimeline<TestTypes>) -> Vec<i64> {
        timeline.iter().map(|s| s.time().ticks()).collect()
    }

    #[test]
    fn test_history_is_bounded() {
        let mut timeline = LevelTimeline::new(state(0), 3);
        for t in 1..=5 {
            timeline.push(state(t));
        }

        assert_eq!(times(&timeline), vec![3, 4, 5]);
        assert_eq!(timeline.latest().time(), SimulationTime(5));
        assert_eq!(timeline.oldest().time(), SimulationTime(3));
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_depth_one_keeps_only_latest() {
        let mut timeline = LevelTimeline::new(state(0), 1);
        timeline.push(state(2));
        assert_eq!(times(&timeline), vec![2]);
    }

    #[test]
    fn test_at_or_before() {
        let mut timeline = LevelTimeline::new(state(0), 8);
        timeline.push(state(3));
        timeline.push(state(6));

        assert_eq!(timeline.at_or_before(SimulationTime(5)).map(|s| s.time()), Some(SimulationTime(3)));
        assert_eq!(timeline.at_or_before(SimulationTime(6)).map(|s| s.time()), Some(SimulationTime(6)));
        assert!(timeline.at_or_before(SimulationTime(-1)).is_none());
    }
}
