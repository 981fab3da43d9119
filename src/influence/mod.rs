//! Influences - the only way behavior code changes the simulation
//!
//! Decisions, natural actions and reactions never touch dynamic states.
//! They emit influences; the target level's reaction folds them into its
//! next consistent state.
//!
//! Two kinds exist:
//! - **System** influences are structural (agents joining, leaving or
//!   moving between levels) and are interpreted by the engine.
//! - **Regular** influences carry a domain payload tagged with a category,
//!   interpreted only by the target level's reaction model.

pub mod map;
pub mod sink;

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::core::types::{AgentCategory, AgentId, LevelId, Owner, TimeInterval};
use crate::simulation::model::ModelTypes;

pub use map::InfluenceMap;
pub use sink::InfluenceSink;

/// Category tag of a regular influence
///
/// Reaction models declare which categories they handle; receiving any
/// other category is fatal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InfluenceCategory(pub String);

impl InfluenceCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InfluenceCategory {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for InfluenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an influence came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfluenceSource {
    /// Decision of an agent or natural action of the environment at `level`
    Behavior { owner: Owner, level: LevelId },
    /// Cascade produced by the reaction of `level`
    Reaction { level: LevelId },
}

impl InfluenceSource {
    /// Level whose influenceable set bounds the possible targets
    pub fn level(&self) -> &LevelId {
        match self {
            InfluenceSource::Behavior { level, .. } => level,
            InfluenceSource::Reaction { level } => level,
        }
    }
}

/// Domain influence interpreted by the target level's reaction
#[derive(Debug)]
pub struct RegularInfluence<T: ModelTypes> {
    category: InfluenceCategory,
    payload: T::Payload,
}

impl<T: ModelTypes> RegularInfluence<T> {
    pub fn new(category: impl Into<InfluenceCategory>, payload: T::Payload) -> Self {
        Self {
            category: category.into(),
            payload,
        }
    }

    pub fn category(&self) -> &InfluenceCategory {
        &self.category
    }

    pub fn payload(&self) -> &T::Payload {
        &self.payload
    }
}

impl From<String> for InfluenceCategory {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Structural influence interpreted by the engine
///
/// The target level is the level the change applies to.
pub enum SystemInfluence<T: ModelTypes> {
    /// A new agent joins the simulation in the target level
    ///
    /// The agent must declare residence in the target level and nowhere else.
    AddAgent(Box<Agent<T>>),
    /// The agent leaves the target level, and the simulation once it
    /// resides nowhere
    RemoveAgent(AgentId),
    /// An existing agent starts residing in the target level
    EnterLevel {
        agent: AgentId,
        public: T::PublicState,
        private: T::PrivateState,
    },
    /// The agent leaves the target level for `to`
    ///
    /// The engine turns the arrival into an `EnterLevel` influence for `to`,
    /// consumed by the next reaction of `to`.
    ChangeLevel {
        agent: AgentId,
        to: LevelId,
        public: T::PublicState,
        private: T::PrivateState,
    },
}

impl<T: ModelTypes> SystemInfluence<T> {
    /// Lightweight description handed to reaction models
    pub fn event(&self) -> SystemEvent {
        match self {
            SystemInfluence::AddAgent(agent) => SystemEvent::AgentAdded {
                agent: agent.id(),
                category: agent.category().clone(),
            },
            SystemInfluence::RemoveAgent(agent) => SystemEvent::AgentRemoved { agent: *agent },
            SystemInfluence::EnterLevel { agent, .. } => SystemEvent::AgentEntered { agent: *agent },
            SystemInfluence::ChangeLevel { agent, to, .. } => SystemEvent::AgentLeft {
                agent: *agent,
                to: to.clone(),
            },
        }
    }

    pub fn agent(&self) -> AgentId {
        match self {
            SystemInfluence::AddAgent(agent) => agent.id(),
            SystemInfluence::RemoveAgent(agent) => *agent,
            SystemInfluence::EnterLevel { agent, .. } => *agent,
            SystemInfluence::ChangeLevel { agent, .. } => *agent,
        }
    }
}

impl<T: ModelTypes> fmt::Debug for SystemInfluence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.event().fmt(f)
    }
}

/// What a system influence does, without its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEvent {
    AgentAdded { agent: AgentId, category: AgentCategory },
    AgentRemoved { agent: AgentId },
    AgentEntered { agent: AgentId },
    AgentLeft { agent: AgentId, to: LevelId },
}

/// Either kind of influence
#[derive(Debug)]
pub enum InfluenceKind<T: ModelTypes> {
    System(SystemInfluence<T>),
    Regular(RegularInfluence<T>),
}

/// A value tagged with its production interval and source
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<I> {
    pub produced: TimeInterval,
    pub source: InfluenceSource,
    pub value: I,
}

impl<I> Deref for Stamped<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.value
    }
}

/// An influence addressed to one level
///
/// Write-once: nothing mutates an influence after emission. Further effects
/// are expressed as new influences.
#[derive(Debug)]
pub struct Influence<T: ModelTypes> {
    target: LevelId,
    produced: TimeInterval,
    source: InfluenceSource,
    kind: InfluenceKind<T>,
}

impl<T: ModelTypes> Influence<T> {
    pub fn new(
        target: LevelId,
        produced: TimeInterval,
        source: InfluenceSource,
        kind: InfluenceKind<T>,
    ) -> Self {
        Self {
            target,
            produced,
            source,
            kind,
        }
    }

    pub fn target(&self) -> &LevelId {
        &self.target
    }

    pub fn produced(&self) -> TimeInterval {
        self.produced
    }

    pub fn source(&self) -> &InfluenceSource {
        &self.source
    }

    pub fn kind(&self) -> &InfluenceKind<T> {
        &self.kind
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind, InfluenceKind::System(_))
    }

    /// Regular category, `None` for system influences
    pub fn category(&self) -> Option<&InfluenceCategory> {
        match &self.kind {
            InfluenceKind::Regular(regular) => Some(regular.category()),
            InfluenceKind::System(_) => None,
        }
    }

    /// Split into the stamped payload, preserving interval and source
    pub fn into_stamped(self) -> Result<Stamped<SystemInfluence<T>>, Stamped<RegularInfluence<T>>> {
        let Influence {
            produced,
            source,
            kind,
            ..
        } = self;
        match kind {
            InfluenceKind::System(value) => Ok(Stamped {
                produced,
                source,
                value,
            }),
            InfluenceKind::Regular(value) => Err(Stamped {
                produced,
                source,
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SimulationTime;
    use crate::simulation::model::tests::TestTypes;

    fn interval() -> TimeInterval {
        TimeInterval::new(SimulationTime(0), SimulationTime(1))
    }

    fn source() -> InfluenceSource {
        InfluenceSource::Behavior {
            owner: Owner::Agent(AgentId(1)),
            level: LevelId::new("physical"),
        }
    }

    #[test]
    fn test_regular_influence_accessors() {
        let influence: Influence<TestTypes> = Influence::new(
            LevelId::new("physical"),
            interval(),
            source(),
            InfluenceKind::Regular(RegularInfluence::new("move", 3)),
        );

        assert!(!influence.is_system());
        assert_eq!(influence.category(), Some(&InfluenceCategory::new("move")));
        assert_eq!(influence.source().level(), &LevelId::new("physical"));

        let stamped = influence.into_stamped().unwrap_err();
        assert_eq!(*stamped.payload(), 3);
        assert_eq!(stamped.produced, interval());
    }

    #[test]
    fn test_system_event_description() {
        let influence: SystemInfluence<TestTypes> = SystemInfluence::ChangeLevel {
            agent: AgentId(4),
            to: LevelId::new("social"),
            public: 0,
            private: 0,
        };
        assert_eq!(influence.agent(), AgentId(4));
        assert_eq!(
            influence.event(),
            SystemEvent::AgentLeft {
                agent: AgentId(4),
                to: LevelId::new("social"),
            }
        );
    }
}
