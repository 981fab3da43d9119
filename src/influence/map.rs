//! Round-scoped collection of influences grouped by target level

use std::collections::BTreeMap;

use crate::core::types::LevelId;
use crate::influence::Influence;
use crate::simulation::model::ModelTypes;

/// Multimap from target level to the influences addressed to it
///
/// Each bag keeps insertion order, which is the kernel's deterministic
/// influence order. Bags are drained exactly once.
#[derive(Debug)]
pub struct InfluenceMap<T: ModelTypes> {
    bags: BTreeMap<LevelId, Vec<Influence<T>>>,
}

impl<T: ModelTypes> Default for InfluenceMap<T> {
    fn default() -> Self {
        Self {
            bags: BTreeMap::new(),
        }
    }
}

impl<T: ModelTypes> InfluenceMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an influence to the bag of its target level
    pub fn add(&mut self, influence: Influence<T>) {
        self.bags
            .entry(influence.target().clone())
            .or_default()
            .push(influence);
    }

    /// Remove and return every influence targeted at `level`
    pub fn for_level(&mut self, level: &LevelId) -> Vec<Influence<T>> {
        self.bags.remove(level).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.values().all(Vec::is_empty)
    }
}

impl<T: ModelTypes> Extend<Influence<T>> for InfluenceMap<T> {
    fn extend<I: IntoIterator<Item = Influence<T>>>(&mut self, iter: I) {
        for influence in iter {
            self.add(influence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentId, Owner, SimulationTime, TimeInterval};
    use crate::influence::{InfluenceKind, InfluenceSource, RegularInfluence};
    use crate::simulation::model::tests::TestTypes;

    fn regular(target: &str, value: i64) -> Influence<TestTypes> {
        Influence::new(
            LevelId::new(target),
            TimeInterval::new(SimulationTime(0), SimulationTime(1)),
            InfluenceSource::Behavior {
                owner: Owner::Agent(AgentId(0)),
                level: LevelId::new("a"),
            },
            InfluenceKind::Regular(RegularInfluence::new("value", value)),
        )
    }

    fn payloads(bag: &[Influence<TestTypes>]) -> Vec<i64> {
        bag.iter()
            .map(|i| match i.kind() {
                InfluenceKind::Regular(r) => *r.payload(),
                InfluenceKind::System(_) => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_bags_keep_insertion_order() {
        let mut map = InfluenceMap::new();
        map.add(regular("b", 3));
        map.add(regular("a", 1));
        map.add(regular("b", 2));

        assert_eq!(payloads(&map.for_level(&LevelId::new("b"))), vec![3, 2]);
        assert_eq!(payloads(&map.for_level(&LevelId::new("a"))), vec![1]);
    }

    #[test]
    fn test_for_level_removes_the_bag() {
        let mut map = InfluenceMap::new();
        map.extend([regular("a", 1), regular("a", 2)]);

        assert_eq!(payloads(&map.for_level(&LevelId::new("a"))), vec![1, 2]);
        assert!(map.for_level(&LevelId::new("a")).is_empty());
        assert!(map.is_empty());
    }
}
