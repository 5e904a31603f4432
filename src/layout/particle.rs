//! Per-node and per-edge layout state, stored in swapper arrays.
//!
//! Neither type records its own index: slot `i` of the particle array is
//! the node at index `i`, and edge endpoints are read from the registry.

/// Layout view of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Displacement accumulated during the current tick.
    pub displacement: [f64; 3],
    /// Frozen particles accumulate forces but never move.
    pub frozen: bool,
    /// Mass used in repulsion and centroids.
    pub weight: f64,
    /// Incident edges, refreshed at the start of each tick.
    pub degree: usize,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            displacement: [0.0; 3],
            frozen: false,
            weight: 1.0,
            degree: 0,
        }
    }
}

/// Layout view of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    /// Rest length multiplier and attraction strength.
    pub weight: f64,
    /// Ignored springs exert no force.
    pub ignored: bool,
}

impl Default for Spring {
    fn default() -> Self {
        Self {
            weight: 1.0,
            ignored: false,
        }
    }
}

/// A body or a group of bodies as seen by a force law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mass {
    /// Total weight.
    pub weight: f64,
    /// Total degree.
    pub degree: f64,
    /// Number of bodies.
    pub count: usize,
}

impl Mass {
    pub fn of(particle: &Particle) -> Self {
        Self {
            weight: particle.weight,
            degree: particle.degree as f64,
            count: 1,
        }
    }
}

impl From<crate::spatial::Aggregate> for Mass {
    fn from(aggregate: crate::spatial::Aggregate) -> Self {
        Self {
            weight: aggregate.weight,
            degree: aggregate.degree,
            count: aggregate.count,
        }
    }
}
