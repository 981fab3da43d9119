//! Core type definitions used throughout the kernel

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete simulation timestamp
///
/// Totally ordered; the kernel never interprets the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimulationTime(pub i64);

impl SimulationTime {
    pub const fn new(ticks: i64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Shift forward by `delta` ticks, `None` on overflow
    pub fn checked_add(self, delta: i64) -> Option<Self> {
        self.0.checked_add(delta).map(Self)
    }
}

impl From<i64> for SimulationTime {
    fn from(ticks: i64) -> Self {
        Self(ticks)
    }
}

impl fmt::Display for SimulationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

/// Open interval `]lower, upper[` of simulation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub lower: SimulationTime,
    pub upper: SimulationTime,
}

impl TimeInterval {
    pub fn new(lower: SimulationTime, upper: SimulationTime) -> Self {
        debug_assert!(lower < upper, "empty interval ]{lower}, {upper}[");
        Self { lower, upper }
    }

    /// Returns true if `self` lies inside the closure of `outer`
    pub fn within(&self, outer: &TimeInterval) -> bool {
        self.lower >= outer.lower && self.upper <= outer.upper
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "]{}, {}[", self.lower.0, self.upper.0)
    }
}

/// Unique identifier for levels
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LevelId(pub String);

impl LevelId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LevelId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for agents
///
/// Chosen by the simulation author so that runs stay reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl AgentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Behavior lookup tag for agents (not a type hierarchy)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentCategory(pub String);

impl AgentCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentCategory {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced an influence or owns a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Owner {
    Environment,
    Agent(AgentId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Environment => f.write_str("environment"),
            Owner::Agent(id) => id.fmt(f),
        }
    }
}
