//! Per-level dynamic state
//!
//! A level's dynamic state alternates between a consistent snapshot and the
//! transitory period that follows it. Snapshots are shared through `Arc` and
//! never mutated; the next one is produced by a `StateBuilder`.

pub mod consistent;
pub mod dynamic;
pub mod timeline;

pub use consistent::{ConsistentState, LocalPrivates, StateBuilder};
pub use dynamic::{DynamicState, PeriodInfluences, TransitoryState};
pub use timeline::LevelTimeline;
