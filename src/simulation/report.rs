//! Run summary and serialization

use serde::Serialize;

use crate::core::types::{LevelId, SimulationTime};
use crate::simulation::engine::EngineStatus;
use crate::simulation::model::ModelTypes;
use crate::simulation::world::{LevelStats, SimulationWorld};

/// Outcome of one engine run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: EngineStatus,
    pub rounds: u64,
    pub initial_time: Option<SimulationTime>,
    pub final_time: Option<SimulationTime>,
    pub agent_count: usize,
    pub levels: Vec<LevelReport>,
}

/// Per-level totals, in tie rank order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelReport {
    pub level: LevelId,
    pub last_consistent: SimulationTime,
    pub resident_agents: usize,
    #[serde(flatten)]
    pub stats: LevelStats,
}

impl RunReport {
    pub(crate) fn new<T: ModelTypes>(status: EngineStatus, world: Option<&SimulationWorld<T>>) -> Self {
        let Some(world) = world else {
            return Self {
                status,
                rounds: 0,
                initial_time: None,
                final_time: None,
                agent_count: 0,
                levels: Vec::new(),
            };
        };

        let levels = world
            .levels
            .iter()
            .map(|runtime| {
                let snapshot = runtime.state.snapshot();
                LevelReport {
                    level: runtime.id().clone(),
                    last_consistent: snapshot.time(),
                    resident_agents: snapshot.agent_count(),
                    stats: runtime.stats,
                }
            })
            .collect();

        Self {
            status,
            rounds: world.rounds,
            initial_time: Some(world.initial_time),
            final_time: Some(world.current_time),
            agent_count: world.agents.len(),
            levels,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        let reactions: u64 = self.levels.iter().map(|l| l.stats.reactions).sum();
        let consumed: u64 = self
            .levels
            .iter()
            .map(|l| l.stats.consumed_regular + l.stats.consumed_system)
            .sum();
        let span = match (self.initial_time, self.final_time) {
            (Some(start), Some(end)) => format!("from {start} to {end}"),
            _ => "before initialization".to_string(),
        };
        format!(
            "{:?} after {} rounds {}\n{} levels, {} reactions, {} influences consumed, {} agents remain",
            self.status,
            self.rounds,
            span,
            self.levels.len(),
            reactions,
            consumed,
            self.agent_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::model::tests::TestTypes;

    #[test]
    fn test_report_before_initialization() {
        let report = RunReport::new::<TestTypes>(EngineStatus::Errored, None);
        assert_eq!(report.rounds, 0);
        assert!(report.levels.is_empty());
        assert!(report.summary().contains("before initialization"));
        assert!(report.to_json().contains("\"status\": \"Errored\""));
    }

    #[test]
    fn test_level_stats_are_flattened() {
        let report = RunReport {
            status: EngineStatus::Finished,
            rounds: 3,
            initial_time: Some(SimulationTime(0)),
            final_time: Some(SimulationTime(3)),
            agent_count: 1,
            levels: vec![LevelReport {
                level: LevelId::new("a"),
                last_consistent: SimulationTime(3),
                resident_agents: 1,
                stats: LevelStats {
                    reactions: 3,
                    consumed_system: 0,
                    consumed_regular: 6,
                    cascades: 0,
                },
            }],
        };

        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["levels"][0]["reactions"], 3);
        assert_eq!(json["levels"][0]["consumed_regular"], 6);
        assert!(report.summary().starts_with("Finished after 3 rounds from t=0 to t=3"));
    }
}
