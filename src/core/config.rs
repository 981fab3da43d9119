//! Engine configuration with documented constants
//!
//! Everything the engine needs beyond the simulation model is collected here
//! and passed explicitly to `SimulationEngine::with_config`.

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::core::types::LevelId;

/// Configuration for the simulation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === DETERMINISM ===
    /// Master seed for the per-call random generators handed to
    /// perception, decision and natural-action code
    ///
    /// Each call gets its own generator derived from this seed, the round
    /// number, the owner and the level, so the draw sequence does not depend
    /// on execution order.
    pub seed: u64,

    // === SCHEDULING ===
    /// Processing order of levels due in the same round
    ///
    /// Levels listed here come first, in this order. Unlisted levels follow
    /// in the order the model declared them.
    pub level_order: Vec<LevelId>,

    /// Maximum number of rounds before the engine aborts the run
    ///
    /// `None` leaves termination entirely to the model's end criterion.
    pub round_limit: Option<u64>,

    // === DISAMBIGUATION ===
    /// Number of consistent states retained per level
    ///
    /// The default heuristic only needs the latest one. Heuristics that
    /// look back in time (e.g. `AlignedToObserverStart`) need enough depth
    /// to cover the longest period ratio between levels.
    pub history_depth: usize,

    // === PARALLELIZATION ===
    /// Minimum number of agent work items in a round before decisions run
    /// on the rayon thread pool
    ///
    /// Below this threshold thread overhead exceeds benefits. Results are
    /// merged in the same order either way.
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            level_order: Vec::new(),
            round_limit: None,
            history_depth: 8,
            parallel_threshold: 1000,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_level_order(mut self, order: impl IntoIterator<Item = LevelId>) -> Self {
        self.level_order = order.into_iter().collect();
        self
    }

    pub fn with_round_limit(mut self, limit: u64) -> Self {
        self.round_limit = Some(limit);
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid(
                "history_depth must keep at least the latest consistent state".into(),
            ));
        }

        if self.parallel_threshold == 0 {
            return Err(ConfigError::Invalid(
                "parallel_threshold must be at least 1".into(),
            ));
        }

        if self.round_limit == Some(0) {
            return Err(ConfigError::Invalid("round_limit of 0 never runs a round".into()));
        }

        for (i, level) in self.level_order.iter().enumerate() {
            if self.level_order[..i].contains(level) {
                return Err(ConfigError::Invalid(format!(
                    "level_order lists {} twice",
                    level
                )));
            }
        }

        Ok(())
    }

    /// Parse and validate a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a TOML file
    pub fn load_from_toml(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
