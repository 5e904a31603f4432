//! Force laws.
//!
//! A law turns a distance into a signed displacement magnitude along the
//! line between two bodies. The tick driver owns geometry, accumulation and
//! energy; laws only know about lengths, weights and the scale `k`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::particle::Mass;

/// Pairwise force model used by the layout.
pub trait ForceLaw: fmt::Debug + Send {
    /// Which law this is.
    fn kind(&self) -> LawKind;

    /// Optimal inter-node distance for `count` nodes sharing `measure`
    /// (area in 2D, volume in 3D).
    fn scale(&self, measure: f64, count: usize, is_3d: bool) -> f64 {
        let per_node = measure.abs() / count.max(1) as f64;
        let k = if is_3d { per_node.cbrt() } else { per_node.sqrt() };
        if k > 0.0 { k } else { 1.0 }
    }

    /// Displacement of a node toward a neighbour at distance `len`, through
    /// a spring of weight `weight`. Negative pushes apart.
    fn attraction(&self, len: f64, k: f64, weight: f64, degree: usize) -> f64;

    /// Displacement of `source` away from `target` at distance `len`.
    /// Never negative.
    fn repulsion(&self, len: f64, k: f64, source: Mass, target: Mass) -> f64;
}

/// Selects a [`ForceLaw`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LawKind {
    /// Spring-embedder with inverse-square repulsion.
    #[default]
    SpringBox,
    /// Power-law energy model favouring clusters.
    LinLog,
}

impl LawKind {
    /// Instantiate the law with its default constants.
    pub fn build(self) -> Box<dyn ForceLaw> {
        match self {
            Self::SpringBox => Box::new(SpringBox::default()),
            Self::LinLog => Box::new(LinLog::default()),
        }
    }

    /// Parse an attribute value such as `"linLog"`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "springbox" | "spring-box" | "spring_box" => Some(Self::SpringBox),
            "linlog" | "lin-log" | "lin_log" => Some(Self::LinLog),
            _ => None,
        }
    }
}

/// Spring-embedder.
///
/// Springs pull toward a rest length of `k * weight`, damped by the node's
/// degree. Repulsion falls off with the square of the distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringBox {
    pub attraction_factor: f64,
    pub repulsion_factor: f64,
    /// Largest repulsion per unit of target weight, in units of `k`.
    pub repulsion_cap: f64,
}

impl Default for SpringBox {
    fn default() -> Self {
        Self {
            attraction_factor: 0.06,
            repulsion_factor: 0.024,
            repulsion_cap: 0.5,
        }
    }
}

impl ForceLaw for SpringBox {
    fn kind(&self) -> LawKind {
        LawKind::SpringBox
    }

    fn attraction(&self, len: f64, k: f64, weight: f64, degree: usize) -> f64 {
        let damping = 0.1 * degree.max(1) as f64;
        self.attraction_factor * (len - k * weight) / damping
    }

    fn repulsion(&self, len: f64, k: f64, _source: Mass, target: Mass) -> f64 {
        let ratio = k / len;
        let kernel = (self.repulsion_factor * ratio * ratio).min(self.repulsion_cap);
        k * kernel * target.weight
    }
}

/// LinLog-style power law.
///
/// Distances are measured in units of `k`. Attraction grows as
/// `len^attraction_exponent`; repulsion decays as `len^repulsion_exponent`
/// and is weighted by both endpoints' degrees and weights, so hubs push harder.
#[derive(Debug, Clone, PartialEq)]
pub struct LinLog {
    pub attraction_exponent: f64,
    pub repulsion_exponent: f64,
    /// Largest value of the repulsion kernel.
    pub repulsion_cap: f64,
}

impl Default for LinLog {
    fn default() -> Self {
        Self {
            attraction_exponent: 0.0,
            repulsion_exponent: -1.2,
            repulsion_cap: 8.0,
        }
    }
}

impl ForceLaw for LinLog {
    fn kind(&self) -> LawKind {
        LawKind::LinLog
    }

    fn attraction(&self, len: f64, k: f64, weight: f64, _degree: usize) -> f64 {
        k * weight * (len / k).powf(self.attraction_exponent)
    }

    fn repulsion(&self, len: f64, k: f64, source: Mass, target: Mass) -> f64 {
        let kernel = (len / k).powf(self.repulsion_exponent).min(self.repulsion_cap);
        // Degrees are shifted by one so isolated nodes still repel. The
        // degree sum of a group already counts every body, so the group
        // weighs in with its mean weight.
        let count = target.count.max(1) as f64;
        let degrees = (source.degree + 1.0) * (target.degree + count);
        k * kernel * degrees * source.weight * (target.weight / count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: Mass = Mass {
        weight: 1.0,
        degree: 1.0,
        count: 1,
    };

    #[test]
    fn test_scale_2d_and_3d() {
        let law = SpringBox::default();
        assert_eq!(law.scale(40_000.0, 100, false), 20.0);
        assert!((law.scale(8000.0, 1, true) - 20.0).abs() < 1e-9);
        assert_eq!(law.scale(0.0, 10, false), 1.0);
    }

    #[test]
    fn test_springbox_rest_length() {
        let law = SpringBox::default();
        assert_eq!(law.attraction(10.0, 10.0, 1.0, 1), 0.0);
        assert!(law.attraction(20.0, 10.0, 1.0, 1) > 0.0);
        assert!(law.attraction(5.0, 10.0, 1.0, 1) < 0.0);
        // Longer rest length for heavier springs.
        assert_eq!(law.attraction(20.0, 10.0, 2.0, 3), 0.0);
    }

    #[test]
    fn test_springbox_repulsion_saturates() {
        let law = SpringBox::default();
        let near = law.repulsion(1e-9, 10.0, ONE, ONE);
        assert_eq!(near, 10.0 * 0.5);
        let far = law.repulsion(100.0, 10.0, ONE, ONE);
        assert!(far < near);
        assert!((far - 10.0 * 0.024 * 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_linlog_balances_one_edge() {
        let law = LinLog::default();
        let k = 5.0;
        // Two connected degree-1 nodes: attraction k, repulsion 4k * len^-1.2.
        let len = k * 4f64.powf(1.0 / 1.2);
        let attraction = law.attraction(len, k, 1.0, 1);
        let repulsion = law.repulsion(len, k, ONE, ONE);
        assert!((attraction - repulsion).abs() < 1e-9);
    }

    #[test]
    fn test_linlog_heavier_target_pushes_harder() {
        let law = LinLog::default();
        let heavy = Mass { weight: 5.0, ..ONE };
        let light = law.repulsion(10.0, 5.0, ONE, ONE);
        assert!((law.repulsion(10.0, 5.0, ONE, heavy) - 5.0 * light).abs() < 1e-9);

        // Four unit bodies of degree one act as four separate bodies.
        let group = Mass {
            weight: 4.0,
            degree: 4.0,
            count: 4,
        };
        assert!((law.repulsion(10.0, 5.0, ONE, group) - 4.0 * light).abs() < 1e-9);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(LawKind::parse("linLog"), Some(LawKind::LinLog));
        assert_eq!(LawKind::parse("SpringBox"), Some(LawKind::SpringBox));
        assert_eq!(LawKind::parse("tidy"), None);
        assert_eq!(LawKind::LinLog.build().kind(), LawKind::LinLog);
    }
}
