//! Level identifiers, tie ranks and adjacency, validated once

use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::core::error::ConfigError;
use crate::core::types::LevelId;
use crate::level::Level;
use crate::simulation::model::ModelTypes;

/// Validated view of the simulation's levels
///
/// Levels are listed in tie rank order: the configured `level_order`
/// first, then the remaining levels in declaration order. Levels due at the
/// same time are processed in that order.
#[derive(Debug, Clone)]
pub struct LevelTopology {
    order: Vec<LevelId>,
    ranks: AHashMap<LevelId, usize>,
    perceptible: Vec<BTreeSet<LevelId>>,
    influenceable: Vec<BTreeSet<LevelId>>,
}

impl LevelTopology {
    pub fn build<T: ModelTypes>(levels: &[Level<T>], level_order: &[LevelId]) -> Result<Self, ConfigError> {
        if levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }

        let mut declared: AHashMap<&LevelId, usize> = AHashMap::with_capacity(levels.len());
        for (index, level) in levels.iter().enumerate() {
            if declared.insert(level.id(), index).is_some() {
                return Err(ConfigError::DuplicateLevel(level.id().clone()));
            }
        }

        for level in levels {
            let adjacency = [
                ("perceptible", level.perceptible()),
                ("influenceable", level.influenceable()),
            ];
            for (relation, targets) in adjacency {
                if let Some(missing) = targets.iter().find(|t| !declared.contains_key(t)) {
                    return Err(ConfigError::UndeclaredAdjacency {
                        level: level.id().clone(),
                        relation,
                        target: missing.clone(),
                    });
                }
            }
        }

        let mut order_indices = Vec::with_capacity(levels.len());
        let mut placed = vec![false; levels.len()];
        for id in level_order {
            let index = *declared
                .get(id)
                .ok_or_else(|| ConfigError::UnknownOrderedLevel(id.clone()))?;
            if !placed[index] {
                placed[index] = true;
                order_indices.push(index);
            }
        }
        order_indices.extend((0..levels.len()).filter(|i| !placed[*i]));

        let order: Vec<LevelId> = order_indices.iter().map(|i| levels[*i].id().clone()).collect();
        let ranks = order.iter().enumerate().map(|(rank, id)| (id.clone(), rank)).collect();
        let perceptible = order_indices
            .iter()
            .map(|i| levels[*i].perceptible().clone())
            .collect();
        let influenceable = order_indices
            .iter()
            .map(|i| levels[*i].influenceable().clone())
            .collect();

        Ok(Self {
            order,
            ranks,
            perceptible,
            influenceable,
        })
    }

    /// Level identifiers in tie rank order
    pub fn ids(&self) -> &[LevelId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, level: &LevelId) -> bool {
        self.ranks.contains_key(level)
    }

    pub fn rank_of(&self, level: &LevelId) -> Option<usize> {
        self.ranks.get(level).copied()
    }

    pub fn id_at(&self, rank: usize) -> &LevelId {
        &self.order[rank]
    }

    pub fn can_influence(&self, from: &LevelId, to: &LevelId) -> bool {
        self.rank_of(from)
            .is_some_and(|rank| self.influenceable[rank].contains(to))
    }

    pub fn can_perceive(&self, from: &LevelId, to: &LevelId) -> bool {
        self.rank_of(from)
            .is_some_and(|rank| self.perceptible[rank].contains(to))
    }

    /// Levels perceptible from `level`, in identifier order
    pub fn perceptible_from(&self, level: &LevelId) -> impl Iterator<Item = &LevelId> + '_ {
        self.rank_of(level)
            .into_iter()
            .flat_map(move |rank| self.perceptible[rank].iter())
    }

    /// Levels `level` may influence, in identifier order
    pub fn influenceable_from(&self, level: &LevelId) -> impl Iterator<Item = &LevelId> + '_ {
        self.rank_of(level)
            .into_iter()
            .flat_map(move |rank| self.influenceable[rank].iter())
    }
}
