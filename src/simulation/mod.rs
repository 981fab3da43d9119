//! Simulation engine - model contract, global loop and lifecycle

pub mod disambiguation;
pub mod engine;
pub mod model;
pub mod perception;
pub mod probe;
pub mod report;
mod round;
mod system;
pub mod world;

pub use disambiguation::{
    AlignedToObserverStart, DisambiguationHeuristic, ExposureRequest, LastConsistentState,
};
pub use engine::{AbortHandle, EngineStatus, SimulationEngine};
pub use model::{ModelTypes, SimulationModel};
pub use perception::{ActionContext, DecisionContext, LevelViews, PerceptionContext};
pub use probe::Probe;
pub use report::{LevelReport, RunReport};
pub use world::LevelStats;
