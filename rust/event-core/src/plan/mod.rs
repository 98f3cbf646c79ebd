// rust/event-core/src/plan/mod.rs

//! Partitioning datasets into work units.
//!
//! The [`PartitionPlanner`] counts the events of each file of a dataset and
//! cuts the resulting stream into [`WorkUnitConfig`]s according to
//! [`PlanLimits`]. Planning is deterministic: the same files and limits
//! always produce the same ordered list of work units.

mod limits;
mod planner;
mod unit;

pub use limits::{limit_from_signed, PlanLimits};
pub use planner::{
    fingerprint, split_into_ranges, EventCounter, EventRange, FileEvents, PartitionPlanner,
    StorageEventCounter,
};
pub use unit::WorkUnitConfig;
