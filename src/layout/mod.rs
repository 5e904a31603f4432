//! Force-directed layout.
//!
//! The layout computes node positions on the CPU, one tick at a time. Node
//! and edge state lives in swapper buffers keyed by registry index; the
//! partition supplies Barnes-Hut aggregates for long-range repulsion.

mod attributes;
mod config;
mod energy;
mod force;
mod law;
mod particle;

pub use attributes::AttributeValue;
pub use config::LayoutConfig;
pub use energy::EnergyHistory;
pub use force::{ForceLayout, LayoutContext, NodeBodies};
pub use law::{ForceLaw, LawKind, LinLog, SpringBox};
pub use particle::{Mass, Particle, Spring};
