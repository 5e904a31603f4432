//! Spatial structures over node positions.
//!
//! - [`Space`] tracks the drawing area and feeds it to the layout.
//! - [`SpacePartition`] is the Barnes-Hut tree used during a tick.
//! - [`PickIndex`] answers hit tests against published positions.

mod bounds;
mod neighborhood;
mod ntree;
mod picking;

pub use bounds::{Bounds, BoundsProvider, Space, SpaceConfig, SpaceMode};
pub use neighborhood::Neighborhood;
pub use ntree::{Aggregate, Approximation, Bodies, CellId, PartitionConfig, SpacePartition, distance};
pub use picking::{PickIndex, PickPoint};
