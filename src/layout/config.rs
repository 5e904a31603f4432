//! Layout configuration.

use serde::{Deserialize, Serialize};

use super::law::LawKind;

/// Tuning of the force-directed layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Force law.
    pub law: LawKind,
    /// Global multiplier applied to displacements.
    pub force: f64,
    /// `1.0` computes repulsion exhaustively; lower values use Barnes-Hut.
    pub quality: f64,
    /// Barnes-Hut opening threshold, in `(0, 1)`.
    pub theta: f64,
    /// Pull toward the centroid. `0.0` disables it.
    pub gravity: f64,
    /// Weight of the repulsive points at the corners and edge midpoints of
    /// the bounds. `0.0` disables them.
    pub boundary_weight: f64,
    /// Stabilization at which the layout counts as converged.
    pub stabilization_limit: f64,
    /// Ticks kept in the energy history.
    pub energy_window: usize,
    /// Longest move of a node in one tick, in units of `k`.
    pub max_step: f64,
    /// Seed for node placement. Values above 2^53 do not survive a JS number.
    pub random_seed: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            law: LawKind::SpringBox,
            force: 1.0,
            quality: 0.5,
            theta: 0.7,
            gravity: 0.0,
            boundary_weight: 0.0,
            stabilization_limit: 0.9,
            energy_window: 50,
            max_step: 1.0,
            random_seed: 0x6e75_6931,
        }
    }
}

impl LayoutConfig {
    /// Whether repulsion is computed pair by pair.
    pub fn is_exact(&self) -> bool {
        self.quality >= 1.0
    }
}
