pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{BehaviorError, CallbackPhase, ConfigError, KernelError, Result, TimeModelError};
pub use types::{AgentCategory, AgentId, LevelId, Owner, SimulationTime, TimeInterval};
