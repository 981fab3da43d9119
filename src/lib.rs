//! Multi-level kernel - execution kernel for discrete multi-level agent-based simulations
//!
//! A simulation is split into levels, each with its own clock. Agents and
//! the environment perceive levels, decide or act, and emit influences; each
//! level's reaction folds the influences it received into its next
//! consistent state. The engine keeps independently clocked levels in step
//! and decides what an observer sees of a level it is not aligned with.

pub mod agent;
pub mod core;
pub mod influence;
pub mod level;
pub mod simulation;
pub mod state;
pub mod time;

pub use crate::agent::{Agent, AgentBehavior, Environment, MemoryRevisionModel, NaturalActionModel};
pub use crate::core::{
    AgentCategory, AgentId, BehaviorError, CallbackPhase, ConfigError, EngineConfig, KernelError, LevelId,
    Owner, Result, SimulationTime, TimeInterval, TimeModelError,
};
pub use crate::influence::{
    Influence, InfluenceCategory, InfluenceKind, InfluenceMap, InfluenceSink, InfluenceSource,
    RegularInfluence, Stamped, SystemEvent, SystemInfluence,
};
pub use crate::level::{IdentityReaction, Level, LevelTopology, ReactionInput, ReactionModel, SystemPhase};
pub use crate::simulation::{
    AbortHandle, ActionContext, AlignedToObserverStart, DecisionContext, DisambiguationHeuristic,
    EngineStatus, ExposureRequest, LastConsistentState, LevelReport, LevelStats, LevelViews, ModelTypes,
    PerceptionContext, Probe, RunReport, SimulationEngine, SimulationModel,
};
pub use crate::state::{ConsistentState, DynamicState, LevelTimeline, PeriodInfluences, StateBuilder, TransitoryState};
pub use crate::time::{CustomTimeModel, PeriodicTimeModel, TimeModel};
