//! Drawing-area bounds and the providers that maintain them.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lowest corner.
    pub lo: [f64; 3],
    /// Highest corner.
    pub hi: [f64; 3],
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new([-100.0, -100.0, 0.0], [100.0, 100.0, 0.0])
    }
}

impl Bounds {
    /// Box spanning two corners, in any order.
    pub fn new(a: [f64; 3], b: [f64; 3]) -> Self {
        Self {
            lo: std::array::from_fn(|i| a[i].min(b[i])),
            hi: std::array::from_fn(|i| a[i].max(b[i])),
        }
    }

    /// Degenerate box around one point.
    pub fn point(p: [f64; 3]) -> Self {
        Self { lo: p, hi: p }
    }

    /// Smallest box containing `points` (flat xyz triples), `None` if empty.
    pub fn enclosing(points: &[f64]) -> Option<Self> {
        let mut chunks = points.chunks_exact(3);
        let first = chunks.next()?;
        let mut bounds = Self::point([first[0], first[1], first[2]]);
        for p in chunks {
            bounds.include([p[0], p[1], p[2]]);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.hi[0] - self.lo[0]
    }

    pub fn height(&self) -> f64 {
        self.hi[1] - self.lo[1]
    }

    pub fn depth(&self) -> f64 {
        self.hi[2] - self.lo[2]
    }

    /// Extent along every axis.
    pub fn size(&self) -> [f64; 3] {
        [self.width(), self.height(), self.depth()]
    }

    /// Length of the main diagonal.
    pub fn diagonal(&self) -> f64 {
        let [w, h, d] = self.size();
        (w * w + h * h + d * d).sqrt()
    }

    /// Area in 2D, volume in 3D.
    pub fn measure(&self, is_3d: bool) -> f64 {
        if is_3d {
            self.width() * self.height() * self.depth()
        } else {
            self.width() * self.height()
        }
    }

    pub fn center(&self) -> [f64; 3] {
        std::array::from_fn(|i| (self.lo[i] + self.hi[i]) / 2.0)
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.lo[i] && p[i] <= self.hi[i])
    }

    /// Whether the two boxes overlap (touching counts).
    pub fn intersects(&self, other: &Bounds) -> bool {
        (0..3).all(|i| self.lo[i] <= other.hi[i] && other.lo[i] <= self.hi[i])
    }

    /// Grow to include `p`.
    pub fn include(&mut self, p: [f64; 3]) {
        for i in 0..3 {
            self.lo[i] = self.lo[i].min(p[i]);
            self.hi[i] = self.hi[i].max(p[i]);
        }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            lo: std::array::from_fn(|i| self.lo[i].min(other.lo[i])),
            hi: std::array::from_fn(|i| self.hi[i].max(other.hi[i])),
        }
    }

    /// Expand by `amount` on every side of the first `dims` axes.
    pub fn padded(&self, amount: f64, dims: usize) -> Bounds {
        let mut out = *self;
        for i in 0..dims.min(3) {
            out.lo[i] -= amount;
            out.hi[i] += amount;
        }
        out
    }
}

/// Source of the current drawing area.
///
/// The layout reads `bounds` before computing forces and reports the new
/// positions through `positions_published` once the tick is complete.
pub trait BoundsProvider {
    /// Current drawing area.
    fn bounds(&self) -> Bounds;

    /// Whether the layout runs in three dimensions.
    fn is_3d(&self) -> bool;

    /// Observe the positions (flat xyz triples) produced by the last tick.
    fn positions_published(&mut self, positions: &[f64]);
}

/// How [`Space`] reacts to published positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpaceMode {
    /// Bounds never change.
    #[default]
    Fixed,
    /// Bounds only expand to include positions.
    Growing,
    /// Bounds are recomputed from positions on each publish.
    Adaptive,
}

/// Configuration of [`Space`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpaceConfig {
    pub mode: SpaceMode,
    /// Initial bounds.
    pub bounds: Bounds,
    pub is_3d: bool,
    /// Margin kept around positions in non-fixed modes.
    pub padding: f64,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            mode: SpaceMode::Fixed,
            bounds: Bounds::default(),
            is_3d: false,
            padding: 0.1,
        }
    }
}

/// The default bounds provider.
#[derive(Debug, Clone)]
pub struct Space {
    config: SpaceConfig,
    bounds: Bounds,
}

impl Default for Space {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}

impl Space {
    pub fn new(config: SpaceConfig) -> Self {
        Self {
            bounds: config.bounds,
            config,
        }
    }

    pub fn mode(&self) -> SpaceMode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: SpaceMode) {
        log::debug!("space mode set to {mode:?}");
        self.config.mode = mode;
    }

    pub fn set_3d(&mut self, is_3d: bool) {
        self.config.is_3d = is_3d;
    }

    /// Replace the bounds. Switches to fixed mode.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        if self.config.mode != SpaceMode::Fixed {
            log::warn!("explicit bounds given to a {:?} space, switching to fixed mode", self.config.mode);
            self.config.mode = SpaceMode::Fixed;
        }
        self.bounds = bounds;
    }

    fn dims(&self) -> usize {
        if self.config.is_3d { 3 } else { 2 }
    }
}

impl BoundsProvider for Space {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn is_3d(&self) -> bool {
        self.config.is_3d
    }

    fn positions_published(&mut self, positions: &[f64]) {
        let padding = self.config.padding;
        match self.config.mode {
            SpaceMode::Fixed => {}
            SpaceMode::Growing => {
                if let Some(seen) = Bounds::enclosing(positions) {
                    self.bounds = self.bounds.union(&seen.padded(padding, self.dims()));
                }
            }
            SpaceMode::Adaptive => {
                self.bounds = match Bounds::enclosing(positions) {
                    Some(seen) => seen.padded(padding, self.dims()),
                    None => Bounds::new([-1.0; 3], [1.0; 3]),
                };
            }
        }
    }
}
