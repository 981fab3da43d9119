use std::fmt;

use thiserror::Error;

use crate::core::types::{AgentCategory, AgentId, LevelId, Owner, SimulationTime};

/// Error type returned by user callbacks (perception, decision, reaction, ...)
pub type BehaviorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal errors raised while building a simulation from its model
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("model provided no initial time")]
    MissingInitialTime,

    #[error("model generated no levels")]
    NoLevels,

    #[error("duplicate level identifier: {0}")]
    DuplicateLevel(LevelId),

    #[error("level {level} declares {relation} level {target}, which does not exist")]
    UndeclaredAdjacency {
        level: LevelId,
        relation: &'static str,
        target: LevelId,
    },

    #[error("duplicate agent identifier: {0}")]
    DuplicateAgent(AgentId),

    #[error("{agent} ({category}) resides in level {level} without a behavior for it")]
    MissingBehavior {
        agent: AgentId,
        category: AgentCategory,
        level: LevelId,
    },

    #[error("{owner} refers to unknown level {level}")]
    UnknownLevel { owner: Owner, level: LevelId },

    #[error("environment has no {what} for level {level}")]
    IncompleteEnvironment { level: LevelId, what: &'static str },

    #[error("level_order names unknown level {0}")]
    UnknownOrderedLevel(LevelId),

    #[error("invalid time model for level {level}: {source}")]
    TimeModel {
        level: LevelId,
        #[source]
        source: TimeModelError,
    },

    #[error("invalid engine configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Errors raised by time models
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeModelError {
    #[error("period must be positive, got {0}")]
    NonPositivePeriod(i64),

    #[error("phase shift {phase_shift} must lie in [0, {period})")]
    PhaseShiftOutOfRange { phase_shift: i64, period: i64 },

    #[error("next due time {next} does not advance past {current}")]
    NotAdvancing {
        current: SimulationTime,
        next: SimulationTime,
    },

    #[error("next due time after {0} overflows")]
    Overflow(SimulationTime),

    #[error("no due time is scheduled after {0}")]
    Exhausted(SimulationTime),
}

/// Which user callback was running when a fault happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    Perception,
    MemoryRevision,
    Decision,
    NaturalAction,
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackPhase::Perception => "perception",
            CallbackPhase::MemoryRevision => "memory revision",
            CallbackPhase::Decision => "decision",
            CallbackPhase::NaturalAction => "natural action",
        };
        f.write_str(name)
    }
}

/// Top-level kernel error
///
/// Every variant is fatal: the engine reports it to its probes and stops.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("level {level} cannot react to unrecognized influence category '{category}'")]
    UnrecognizedInfluence { level: LevelId, category: String },

    #[error("{owner} failed during {phase} at level {level}: {source}")]
    Behavior {
        owner: Owner,
        level: LevelId,
        phase: CallbackPhase,
        #[source]
        source: BehaviorError,
    },

    #[error("reaction of level {level} failed: {source}")]
    Reaction {
        level: LevelId,
        #[source]
        source: BehaviorError,
    },

    #[error("panic during {context}: {message}")]
    Panic { context: String, message: String },

    #[error("level {from} cannot influence level {to}")]
    UndeclaredInfluenceTarget { from: LevelId, to: LevelId },

    #[error("{0} already exists")]
    AgentAlreadyExists(AgentId),

    #[error("unknown {0}")]
    UnknownAgent(AgentId),

    #[error("{agent} does not reside in level {level}")]
    AgentNotResident { agent: AgentId, level: LevelId },

    #[error("{agent} already resides in level {level}")]
    AgentAlreadyResident { agent: AgentId, level: LevelId },

    #[error("cannot apply system influence for {agent} at level {level}: {reason}")]
    InvalidSystemInfluence {
        agent: AgentId,
        level: LevelId,
        reason: String,
    },

    #[error("time model of level {level} failed: {source}")]
    Time {
        level: LevelId,
        #[source]
        source: TimeModelError,
    },

    #[error("engine already ran; create a new engine for another run")]
    AlreadyRan,
}

impl KernelError {
    /// Wrap a callback error raised by an agent or the environment
    pub fn behavior(owner: Owner, level: &LevelId, phase: CallbackPhase, source: BehaviorError) -> Self {
        Self::Behavior {
            owner,
            level: level.clone(),
            phase,
            source,
        }
    }

    /// Returns true for errors caused by the model definition rather than a running round
    pub fn is_configuration(&self) -> bool {
        matches!(self, KernelError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_influence_message() {
        let err = KernelError::UnrecognizedInfluence {
            level: LevelId::new("social"),
            category: "gossip".into(),
        };
        assert_eq!(
            err.to_string(),
            "level social cannot react to unrecognized influence category 'gossip'"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_config_error_converts() {
        let err: KernelError = ConfigError::NoLevels.into();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no levels"));
    }

    #[test]
    fn test_behavior_error_keeps_source() {
        let source: BehaviorError = "out of fuel".into();
        let err = KernelError::behavior(
            Owner::Agent(AgentId(7)),
            &LevelId::new("physical"),
            CallbackPhase::Decision,
            source,
        );
        assert_eq!(
            err.to_string(),
            "agent#7 failed during decision at level physical: out of fuel"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
