// rust/event-core/src/events/mod.rs

//! Live event access for a single work unit.
//!
//! A [`WorkUnitConfig`](crate::plan::WorkUnitConfig) is turned into an
//! [`EventSource`] by an [`EventSourceFactory`]; an [`EventBuilder`] pairs
//! the two so the opening can be deferred to the worker that runs the unit.

mod factory;
mod source;

pub use factory::{EventBuilder, EventSourceFactory, StorageEventFactory};
pub use source::{EventPass, EventRecord, EventSource};
