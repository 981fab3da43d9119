//! Simulation model - what a simulation author provides to the engine

use std::fmt::Debug;

use crate::agent::{Agent, Environment};
use crate::core::error::ConfigError;
use crate::core::types::SimulationTime;
use crate::level::{Level, LevelTopology};
use crate::simulation::engine::SimulationEngine;

/// Type family of one simulation
///
/// Ties together the opaque state types the kernel moves around without
/// interpreting them. Implement it on a unit struct:
///
/// ```ignore
/// #[derive(Debug)]
/// struct Traffic;
///
/// impl ModelTypes for Traffic {
///     type PublicState = CarPosition;
///     type PrivateState = ();
///     type Memory = RouteMemory;
///     type Perceived = Vec<CarPosition>;
///     type Payload = Move;
///     type Parameters = TrafficParams;
/// }
/// ```
pub trait ModelTypes: Debug + Send + Sync + Sized + 'static {
    /// Local state visible to every observer of a level
    type PublicState: Clone + Debug + Send + Sync;
    /// Local state visible only to its owner
    type PrivateState: Debug + Send + Sync;
    /// Global memory of an agent, shared across its levels
    type Memory: Debug + Send + Sync;
    /// What a perception call produces
    type Perceived: Debug + Send + Sync;
    /// Payload of regular influences
    type Payload: Debug + Send + Sync;
    /// Simulation parameters threaded through the generators
    type Parameters: Debug + Send + Sync;
}

/// Builds the initial simulation and decides when it ends
///
/// Generator failures are configuration errors: the engine reports them
/// and never starts running.
pub trait SimulationModel<T: ModelTypes> {
    fn parameters(&self) -> &T::Parameters;

    /// Time of the initial consistent states, `None` if undefined
    fn initial_time(&self) -> Option<SimulationTime>;

    fn generate_levels(&self, params: &T::Parameters) -> Result<Vec<Level<T>>, ConfigError>;

    fn generate_environment(
        &self,
        params: &T::Parameters,
        levels: &LevelTopology,
    ) -> Result<Environment<T>, ConfigError>;

    fn generate_agents(
        &self,
        params: &T::Parameters,
        levels: &LevelTopology,
    ) -> Result<Vec<Agent<T>>, ConfigError>;

    /// End criterion, evaluated after initialization and after every round
    fn is_final_time_or_after(&self, time: SimulationTime, engine: &SimulationEngine<T>) -> bool;
}
