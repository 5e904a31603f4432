//! Graph topology and the engine that keeps dependent state in step with it.
//!
//! The [`IndexRegistry`] assigns dense per-kind indexes and reports every
//! slot change as an [`IndexEvent`]. [`GraphEngine`] fans those events out to
//! the buffers, the layout and the partition.

mod element;
mod engine;
mod event;
mod registry;

pub use element::{ElementIndex, ElementKind};
pub use engine::{EngineConfig, GraphEngine};
pub use event::{IndexEvent, TopologyEvent};
pub use registry::{IndexRegistry, RegistryConfig};
