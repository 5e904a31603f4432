//! ForceLayout - the per-tick driver of the force-directed layout.
//!
//! One call to [`ForceLayout::compute`]:
//! 1. reads the bounds and refreshes the scale `k` if the area or the node
//!    count changed,
//! 2. accumulates repulsion (pairwise, or Barnes-Hut over the partition),
//!    spring attraction and gravity into per-node displacements,
//! 3. moves every non-frozen node by its displacement times the global
//!    force, capped at `max_step * k`,
//! 4. refreshes the partition, reports positions to the bounds provider,
//!    and closes the tick in the energy history.
//!
//! Positions, particles and springs live in swapper buffers, so they follow
//! the registry's index changes without any bookkeeping here.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::config::LayoutConfig;
use super::energy::EnergyHistory;
use super::law::{ForceLaw, LawKind};
use super::particle::{Mass, Particle, Spring};
use crate::buffers::{ArrayRef, BufferRef, BufferSwapper, PrimitiveType};
use crate::graph::{ElementKind, IndexEvent, IndexRegistry};
use crate::spatial::{Approximation, Bodies, Bounds, BoundsProvider, SpacePartition};

/// The collaborators a layout reads and writes during a tick.
pub struct LayoutContext<'a> {
    pub registry: &'a IndexRegistry,
    pub swapper: &'a mut BufferSwapper,
    pub partition: &'a mut SpacePartition,
    pub space: &'a mut dyn BoundsProvider,
}

/// Node positions and particles viewed as partition bodies.
#[derive(Clone, Copy)]
pub struct NodeBodies<'a> {
    positions: &'a [f64],
    particles: &'a [Particle],
}

impl<'a> NodeBodies<'a> {
    /// Flat xyz triples in index order.
    pub fn positions(&self) -> &'a [f64] {
        self.positions
    }
}

impl Bodies for NodeBodies<'_> {
    fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    fn position(&self, node: usize) -> [f64; 3] {
        let p = &self.positions[node * 3..node * 3 + 3];
        [p[0], p[1], p[2]]
    }

    fn weight(&self, node: usize) -> f64 {
        self.particles[node].weight
    }

    fn degree(&self, node: usize) -> f64 {
        self.particles[node].degree as f64
    }
}

#[inline]
fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Force-directed layout over the registry's nodes and edges.
#[derive(Debug)]
pub struct ForceLayout {
    config: LayoutConfig,
    law: Box<dyn ForceLaw>,
    positions: BufferRef,
    particles: ArrayRef<Particle>,
    springs: ArrayRef<Spring>,
    energy: EnergyHistory,
    rng: ChaCha8Rng,
    k: f64,
    scale_key: Option<(f64, usize)>,
    tick: u64,
    publish_needed: bool,
    displacements: Vec<[f64; 3]>,
}

impl ForceLayout {
    /// Create the layout and register its buffers.
    pub fn new(config: LayoutConfig, registry: &IndexRegistry, swapper: &mut BufferSwapper) -> Self {
        let positions = swapper.create_buffer(registry, ElementKind::Node, 3, PrimitiveType::Double, None);
        let particles = swapper.create_array(registry, ElementKind::Node, 1, |_, _| Particle::default());
        let springs = swapper.create_array(registry, ElementKind::Edge, 1, |_, _| Spring::default());

        let mut config = config;
        config.quality = config.quality.clamp(0.0, 1.0);
        if !(config.theta > 0.0 && config.theta < 1.0) {
            log::warn!("barnes-hut theta {} is outside (0, 1), using 0.7", config.theta);
            config.theta = 0.7;
        }

        Self {
            law: config.law.build(),
            rng: ChaCha8Rng::seed_from_u64(config.random_seed),
            energy: EnergyHistory::new(config.energy_window),
            config,
            positions,
            particles,
            springs,
            k: 1.0,
            scale_key: None,
            tick: 0,
            publish_needed: false,
            displacements: Vec::new(),
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn law(&self) -> LawKind {
        self.law.kind()
    }

    /// Handle of the xyz position buffer.
    pub fn positions(&self) -> BufferRef {
        self.positions
    }

    pub fn particles(&self) -> ArrayRef<Particle> {
        self.particles
    }

    pub fn springs(&self) -> ArrayRef<Spring> {
        self.springs
    }

    /// Current scale constant.
    pub fn k(&self) -> f64 {
        self.k
    }

    /// Ticks computed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn energy(&self) -> &EnergyHistory {
        &self.energy
    }

    /// Convergence score in `[0, 1]`.
    pub fn stabilization(&self) -> f64 {
        self.energy.stabilization()
    }

    pub fn is_stabilized(&self) -> bool {
        self.stabilization() >= self.config.stabilization_limit
    }

    /// Whether positions changed since the last [`Self::mark_published`].
    pub fn is_publish_needed(&self) -> bool {
        self.publish_needed
    }

    pub fn mark_published(&mut self) {
        self.publish_needed = false;
    }

    pub fn position(&self, swapper: &BufferSwapper, node: usize) -> [f64; 3] {
        self.bodies(swapper).position(node)
    }

    /// Positions and particles as partition bodies.
    pub fn bodies<'s>(&self, swapper: &'s BufferSwapper) -> NodeBodies<'s> {
        NodeBodies {
            positions: swapper.direct::<f64>(self.positions),
            particles: swapper.objects(self.particles),
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_force(&mut self, force: f64) {
        log::debug!("layout force set to {force}");
        self.config.force = force;
        self.energy.clear();
    }

    /// Clamped to `[0, 1]`.
    pub fn set_quality(&mut self, quality: f64) {
        let clamped = quality.clamp(0.0, 1.0);
        if clamped != quality {
            log::debug!("layout quality {quality} clamped to {clamped}");
        }
        self.config.quality = clamped;
        self.energy.clear();
    }

    /// Ignored unless strictly inside `(0, 1)`.
    pub fn set_theta(&mut self, theta: f64) {
        if theta > 0.0 && theta < 1.0 {
            log::debug!("barnes-hut theta set to {theta}");
            self.config.theta = theta;
            self.energy.clear();
        } else {
            log::warn!(
                "barnes-hut theta {theta} is outside (0, 1), keeping {}",
                self.config.theta
            );
        }
    }

    pub fn set_gravity(&mut self, gravity: f64) {
        self.config.gravity = gravity;
        self.energy.clear();
    }

    pub fn set_boundary_weight(&mut self, weight: f64) {
        self.config.boundary_weight = weight;
        self.energy.clear();
    }

    pub fn set_stabilization_limit(&mut self, limit: f64) {
        self.config.stabilization_limit = limit;
    }

    pub fn set_random_seed(&mut self, seed: u64) {
        self.config.random_seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Switch force law. The scale is recomputed on the next tick.
    pub fn set_law(&mut self, kind: LawKind) {
        if kind == self.law.kind() {
            return;
        }
        log::debug!("layout law set to {kind:?}");
        self.config.law = kind;
        self.law = kind.build();
        self.scale_key = None;
        self.energy.clear();
    }

    /// Forget the energy history so stabilization restarts from zero.
    pub fn shake(&mut self) {
        self.energy.clear();
    }

    // =========================================================================
    // Per-element operations
    // =========================================================================

    /// Place a node explicitly.
    pub fn move_node(&mut self, node: usize, p: [f64; 3], cx: &mut LayoutContext<'_>) {
        for (axis, value) in p.into_iter().enumerate() {
            cx.swapper.set(self.positions, node, axis, value);
        }
        cx.partition.relocate(node, &self.bodies(cx.swapper));
        self.energy.clear();
        self.publish_needed = true;
    }

    pub fn freeze_node(&mut self, swapper: &mut BufferSwapper, node: usize, frozen: bool) {
        let particles = swapper.objects_mut(self.particles);
        if let Some(particle) = particles.get_mut(node) {
            particle.frozen = frozen;
        }
    }

    pub fn set_node_weight(&mut self, cx: &mut LayoutContext<'_>, node: usize, weight: f64) {
        if let Some(particle) = cx.swapper.objects_mut(self.particles).get_mut(node) {
            particle.weight = weight;
        }
        if let Some(cell) = cx.partition.cell_of(node) {
            cx.partition.invalidate(cell);
        }
        self.energy.clear();
    }

    pub fn set_edge_weight(&mut self, swapper: &mut BufferSwapper, edge: usize, weight: f64) {
        if let Some(spring) = swapper.objects_mut(self.springs).get_mut(edge) {
            spring.weight = weight;
        }
        self.energy.clear();
    }

    pub fn set_edge_ignored(&mut self, swapper: &mut BufferSwapper, edge: usize, ignored: bool) {
        if let Some(spring) = swapper.objects_mut(self.springs).get_mut(edge) {
            spring.ignored = ignored;
        }
        self.energy.clear();
    }

    // =========================================================================
    // Registry events
    // =========================================================================

    /// Follow one registry event. Runs after the swapper and before the
    /// partition, so new nodes are placed before they are indexed.
    pub fn apply(&mut self, event: &IndexEvent, cx: &mut LayoutContext<'_>) {
        match *event {
            IndexEvent::Added {
                kind: ElementKind::Node,
                index,
            } => {
                self.place_random(index as usize, cx);
                self.energy.clear();
            }
            IndexEvent::Added {
                kind: ElementKind::Edge,
                index,
            } => {
                self.place_leaf(index, cx);
                self.energy.clear();
            }
            IndexEvent::Added { .. } | IndexEvent::Swapped { .. } => {}
            IndexEvent::Removed { .. } | IndexEvent::Cleared => self.energy.clear(),
        }
    }

    fn random_point(&mut self, lo: [f64; 3], size: [f64; 3], is_3d: bool) -> [f64; 3] {
        let dims = if is_3d { 3 } else { 2 };
        let mut p = [0.0; 3];
        for axis in 0..dims {
            p[axis] = lo[axis] + self.rng.r#gen::<f64>() * size[axis];
        }
        p
    }

    fn place_random(&mut self, node: usize, cx: &mut LayoutContext<'_>) {
        let bounds = cx.space.bounds();
        let p = self.random_point(bounds.lo, bounds.size(), cx.space.is_3d());
        for (axis, value) in p.into_iter().enumerate() {
            cx.swapper.set(self.positions, node, axis, value);
        }
        self.publish_needed = true;
    }

    /// Move a fresh leaf next to its only neighbour.
    fn place_leaf(&mut self, edge: u32, cx: &mut LayoutContext<'_>) {
        let Some((a, b)) = cx.registry.edge_endpoints(edge) else {
            return;
        };
        let (da, db) = (cx.registry.degree(a), cx.registry.degree(b));
        let (leaf, anchor) = match (da, db) {
            (1, d) if d > 1 => (a as usize, b as usize),
            (d, 1) if d > 1 => (b as usize, a as usize),
            _ => return,
        };

        let is_3d = cx.space.is_3d();
        self.update_scale(&cx.space.bounds(), cx.registry.node_count(), is_3d);
        let k = self.k;
        let center = self.position(cx.swapper, anchor);
        let offset = self.random_point([-k; 3], [2.0 * k; 3], is_3d);
        let p = [center[0] + offset[0], center[1] + offset[1], center[2] + offset[2]];
        for (axis, value) in p.into_iter().enumerate() {
            cx.swapper.set(self.positions, leaf, axis, value);
        }
        cx.partition.relocate(leaf, &self.bodies(cx.swapper));
        self.publish_needed = true;
    }

    // =========================================================================
    // Tick
    // =========================================================================

    fn update_scale(&mut self, bounds: &Bounds, count: usize, is_3d: bool) {
        let key = (bounds.measure(is_3d), count);
        if self.scale_key != Some(key) {
            self.k = self.law.scale(key.0, count, is_3d);
            self.scale_key = Some(key);
            log::debug!("layout scale k = {} for {count} nodes", self.k);
        }
    }

    fn sync_degrees(&self, registry: &IndexRegistry, swapper: &mut BufferSwapper) {
        for (node, particle) in swapper.objects_mut(self.particles).iter_mut().enumerate() {
            particle.degree = registry.degree(node as u32);
        }
    }

    /// Run one simulation step.
    pub fn compute(&mut self, cx: &mut LayoutContext<'_>) {
        let count = cx.registry.node_count();
        let is_3d = cx.space.is_3d();
        self.update_scale(&cx.space.bounds(), count, is_3d);
        self.sync_degrees(cx.registry, cx.swapper);

        let mut displacements = std::mem::take(&mut self.displacements);
        displacements.clear();
        displacements.resize(count, [0.0; 3]);
        {
            let bodies = self.bodies(cx.swapper);
            let springs = cx.swapper.objects(self.springs);
            self.repulsion(&bodies, cx.partition, self.config.is_exact(), &mut displacements);
            self.attraction(&bodies, springs, cx.registry, &mut displacements);
            self.gravity(&bodies, &mut displacements);
            self.boundary(&bodies, &cx.space.bounds(), is_3d, &mut displacements);
        }

        let max_step = self.config.max_step * self.k;
        let force = self.config.force;
        for (particle, d) in cx
            .swapper
            .objects_mut(self.particles)
            .iter_mut()
            .zip(displacements.iter_mut())
        {
            particle.displacement = *d;
            if particle.frozen {
                *d = [0.0; 3];
                continue;
            }
            let mut step = d.map(|c| c * force);
            if !is_3d {
                step[2] = 0.0;
            }
            let len = norm(step);
            if len > max_step {
                step = step.map(|c| c * max_step / len);
            }
            *d = step;
        }

        let mut moved = false;
        let positions = cx.swapper.direct_mut::<f64>(self.positions);
        for (node, step) in displacements.iter().enumerate() {
            if *step == [0.0; 3] {
                continue;
            }
            moved = true;
            for axis in 0..3 {
                positions[node * 3 + axis] += step[axis];
            }
        }
        self.displacements = displacements;

        let bodies = self.bodies(cx.swapper);
        cx.partition.refresh(&bodies);
        cx.space.positions_published(bodies.positions());

        self.energy.store();
        self.tick += 1;
        if moved {
            self.publish_needed = true;
        }
    }

    fn repulsion(&mut self, bodies: &NodeBodies<'_>, partition: &SpacePartition, exact: bool, out: &mut [[f64; 3]]) {
        let count = bodies.len();
        if exact {
            for i in 0..count {
                let p = bodies.position(i);
                let source = Mass::of(&bodies.particles[i]);
                for j in 0..count {
                    if i != j {
                        let target = Mass::of(&bodies.particles[j]);
                        self.repel(p, bodies.position(j), source, target, &mut out[i]);
                    }
                }
            }
            return;
        }

        let theta = self.config.theta;
        let mut stack = Vec::new();
        for i in 0..count {
            let p = bodies.position(i);
            let source = Mass::of(&bodies.particles[i]);
            stack.clear();
            stack.push(partition.root());
            while let Some(cell) = stack.pop() {
                match partition.approximate(i, cell, theta, bodies) {
                    Approximation::Aggregate(aggregate) => {
                        self.repel(p, aggregate.centroid, source, aggregate.into(), &mut out[i]);
                    }
                    Approximation::Exact if partition.is_leaf(cell) => {
                        for &j in partition.elements(cell) {
                            let j = j as usize;
                            if j != i {
                                let target = Mass::of(&bodies.particles[j]);
                                self.repel(p, bodies.position(j), source, target, &mut out[i]);
                            }
                        }
                    }
                    Approximation::Exact => stack.extend(partition.children(cell)),
                }
            }
        }
    }

    #[inline]
    fn repel(&mut self, p: [f64; 3], q: [f64; 3], source: Mass, target: Mass, out: &mut [f64; 3]) {
        let delta = sub(p, q);
        let len = norm(delta);
        if len <= 0.0 {
            return;
        }
        let factor = self.law.repulsion(len, self.k, source, target);
        for axis in 0..3 {
            out[axis] += delta[axis] / len * factor;
        }
        self.energy.accumulate(factor.abs());
    }

    fn attraction(&mut self, bodies: &NodeBodies<'_>, springs: &[Spring], registry: &IndexRegistry, out: &mut [[f64; 3]]) {
        for (edge, spring) in springs.iter().enumerate() {
            if spring.ignored {
                continue;
            }
            let Some((a, b)) = registry.edge_endpoints(edge as u32) else {
                continue;
            };
            let (a, b) = (a as usize, b as usize);
            if a == b {
                continue;
            }
            let delta = sub(bodies.position(b), bodies.position(a));
            let len = norm(delta);
            if len <= 0.0 {
                continue;
            }
            for (node, sign) in [(a, 1.0), (b, -1.0)] {
                let factor = self
                    .law
                    .attraction(len, self.k, spring.weight, bodies.particles[node].degree);
                for axis in 0..3 {
                    out[node][axis] += sign * delta[axis] / len * factor;
                }
                self.energy.accumulate(factor.abs());
            }
        }
    }

    fn gravity(&mut self, bodies: &NodeBodies<'_>, out: &mut [[f64; 3]]) {
        let gravity = self.config.gravity;
        let count = bodies.len();
        if gravity == 0.0 || count == 0 {
            return;
        }
        let mut centroid = [0.0; 3];
        for node in 0..count {
            let p = bodies.position(node);
            for axis in 0..3 {
                centroid[axis] += p[axis] / count as f64;
            }
        }
        for (node, d) in out.iter_mut().enumerate() {
            let pull = sub(centroid, bodies.position(node));
            for axis in 0..3 {
                d[axis] += pull[axis] * gravity;
            }
            self.energy.accumulate(norm(pull) * gravity.abs());
        }
    }

    fn boundary(&mut self, bodies: &NodeBodies<'_>, bounds: &Bounds, is_3d: bool, out: &mut [[f64; 3]]) {
        let weight = self.config.boundary_weight;
        if weight == 0.0 {
            return;
        }
        let target = Mass {
            weight,
            degree: 0.0,
            count: 1,
        };
        let points = boundary_points(bounds, is_3d);
        for (node, d) in out.iter_mut().enumerate() {
            let p = bodies.position(node);
            let source = Mass::of(&bodies.particles[node]);
            for q in &points {
                self.repel(p, *q, source, target, d);
            }
        }
    }

    /// Repulsion displacements alone, without moving anything.
    #[cfg(test)]
    pub(crate) fn repulsion_field(&mut self, cx: &mut LayoutContext<'_>, exact: bool) -> Vec<[f64; 3]> {
        let count = cx.registry.node_count();
        self.update_scale(&cx.space.bounds(), count, cx.space.is_3d());
        self.sync_degrees(cx.registry, cx.swapper);
        let mut out = vec![[0.0; 3]; count];
        let bodies = self.bodies(cx.swapper);
        cx.partition.invalidate_all();
        self.repulsion(&bodies, cx.partition, exact, &mut out);
        self.energy.clear();
        out
    }
}

/// Corners and edge midpoints of `bounds`: 8 points in 2D, 26 in 3D.
fn boundary_points(bounds: &Bounds, is_3d: bool) -> Vec<[f64; 3]> {
    let center = bounds.center();
    let steps = |axis: usize| [bounds.lo[axis], center[axis], bounds.hi[axis]];
    let zs = if is_3d { steps(2).to_vec() } else { vec![center[2]] };
    let mut points = Vec::with_capacity(if is_3d { 26 } else { 8 });
    for z in zs {
        for y in steps(1) {
            for x in steps(0) {
                let p = [x, y, z];
                if p != center {
                    points.push(p);
                }
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EngineConfig, GraphEngine};
    use crate::spatial::SpaceConfig;

    fn engine_with(config: EngineConfig, nodes: usize, edges: &[(usize, usize)]) -> GraphEngine {
        let mut engine = GraphEngine::new(config);
        for i in 0..nodes {
            engine.add_node(&format!("n{i}")).unwrap();
        }
        for (e, (a, b)) in edges.iter().enumerate() {
            engine
                .add_edge(&format!("e{e}"), &format!("n{a}"), &format!("n{b}"), false)
                .unwrap();
        }
        engine
    }

    fn random_edges(nodes: usize, count: usize, seed: u64) -> Vec<(usize, usize)> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..count)
            .map(|_| (rng.gen_range(0..nodes), rng.gen_range(0..nodes)))
            .filter(|(a, b)| a != b)
            .collect()
    }

    #[test]
    fn test_new_nodes_inside_bounds() {
        let engine = engine_with(EngineConfig::default(), 100, &[]);
        let bounds = engine.space().bounds();
        for i in 0..100 {
            let p = engine.position(&format!("n{i}")).unwrap();
            assert!(bounds.contains(p), "{p:?}");
            assert_eq!(p[2], 0.0);
        }
    }

    #[test]
    fn test_leaf_placed_near_anchor() {
        let mut engine = engine_with(EngineConfig::default(), 3, &[(0, 1)]);
        engine.add_edge("e9", "n0", "n2", false).unwrap();
        let k = engine.layout().k();
        let anchor = engine.position("n0").unwrap();
        let leaf = engine.position("n2").unwrap();
        assert!((leaf[0] - anchor[0]).abs() <= k);
        assert!((leaf[1] - anchor[1]).abs() <= k);
    }

    #[test]
    fn test_barnes_hut_converges_to_exact() {
        let mut config = EngineConfig::default();
        config.layout.theta = 0.02;
        let mut engine = engine_with(config, 300, &random_edges(300, 200, 11));
        let (layout, mut cx) = engine.split_layout();

        let exact = layout.repulsion_field(&mut cx, true);
        let approx = layout.repulsion_field(&mut cx, false);

        let mut error = 0.0;
        let mut total = 0.0;
        for (e, a) in exact.iter().zip(&approx) {
            error += norm(sub(*e, *a));
            total += norm(*e);
        }
        assert!(total > 0.0);
        assert!(error / total < 1e-3, "relative error {}", error / total);
    }

    #[test]
    fn test_barnes_hut_coarse_theta_still_close() {
        let mut config = EngineConfig::default();
        config.layout.theta = 0.7;
        let mut engine = engine_with(config, 300, &random_edges(300, 200, 12));
        let (layout, mut cx) = engine.split_layout();

        let exact = layout.repulsion_field(&mut cx, true);
        let approx = layout.repulsion_field(&mut cx, false);
        let error: f64 = exact.iter().zip(&approx).map(|(e, a)| norm(sub(*e, *a))).sum();
        let total: f64 = exact.iter().map(|e| norm(*e)).sum();
        assert!(error / total < 0.25, "relative error {}", error / total);
    }

    #[test]
    fn test_frozen_node_does_not_move() {
        let mut engine = engine_with(EngineConfig::default(), 10, &[(0, 1), (1, 2), (2, 3)]);
        engine.freeze_node("n1", true).unwrap();
        let frozen = engine.position("n1").unwrap();
        let free = engine.position("n2").unwrap();
        for _ in 0..5 {
            engine.step();
        }
        assert_eq!(engine.position("n1").unwrap(), frozen);
        assert_ne!(engine.position("n2").unwrap(), free);
    }

    #[test]
    fn test_step_is_capped() {
        let mut config = EngineConfig::default();
        config.layout.force = 1000.0;
        let mut engine = engine_with(config, 20, &random_edges(20, 30, 3));
        let before: Vec<_> = (0..20).map(|i| engine.position(&format!("n{i}")).unwrap()).collect();
        engine.step();
        let k = engine.layout().k();
        for (i, b) in before.iter().enumerate() {
            let after = engine.position(&format!("n{i}")).unwrap();
            assert!(norm(sub(after, *b)) <= k * (1.0 + 1e-9));
        }
    }

    #[test]
    fn test_publish_flag() {
        let mut engine = engine_with(EngineConfig::default(), 5, &[(0, 1)]);
        assert!(engine.is_publish_needed());
        engine.mark_published();
        assert!(!engine.is_publish_needed());
        engine.step();
        assert!(engine.is_publish_needed());
    }

    #[test]
    fn test_topology_change_resets_stabilization() {
        let mut config = EngineConfig::default();
        config.layout.energy_window = 5;
        let mut engine = engine_with(config, 2, &[]);
        for _ in 0..5 {
            engine.step();
        }
        assert_eq!(engine.layout().energy().len(), 5);

        engine.add_node("late").unwrap();
        assert!(engine.layout().energy().is_empty());
        assert_eq!(engine.stabilization(), 0.0);
    }

    #[test]
    fn test_quality_and_theta_validation() {
        let mut engine = engine_with(EngineConfig::default(), 0, &[]);
        let layout = engine.layout_mut();
        layout.set_quality(3.0);
        assert_eq!(layout.config().quality, 1.0);
        layout.set_quality(-1.0);
        assert_eq!(layout.config().quality, 0.0);

        layout.set_theta(0.3);
        layout.set_theta(1.5);
        layout.set_theta(0.0);
        assert_eq!(layout.config().theta, 0.3);
    }

    #[test]
    fn test_boundary_points() {
        let bounds = Bounds::new([-10.0, -10.0, -10.0], [10.0, 10.0, 10.0]);
        let flat = boundary_points(&bounds, false);
        assert_eq!(flat.len(), 8);
        assert!(flat.iter().all(|p| p[2] == 0.0));
        assert!(flat.contains(&[-10.0, 10.0, 0.0]));
        assert!(flat.contains(&[0.0, -10.0, 0.0]));

        let cube = boundary_points(&bounds, true);
        assert_eq!(cube.len(), 26);
        assert!(!cube.contains(&[0.0; 3]));
    }

    #[test]
    fn test_boundary_pushes_away_from_corner() {
        let mut engine = engine_with(EngineConfig::default(), 1, &[]);
        engine.move_node("n0", [-90.0, -90.0, 0.0]).unwrap();
        engine.step();
        assert_eq!(engine.position("n0"), Some([-90.0, -90.0, 0.0]));

        engine.set_attribute("boundaryWeight", &1.0.into()).unwrap();
        engine.step();
        let p = engine.position("n0").unwrap();
        assert!(p[0] > -90.0 && p[1] > -90.0, "{p:?}");
    }

    #[test]
    fn test_scale_follows_area() {
        let space = SpaceConfig {
            bounds: Bounds::new([0.0; 3], [100.0, 100.0, 0.0]),
            ..SpaceConfig::default()
        };
        let mut engine = engine_with(
            EngineConfig {
                space,
                ..EngineConfig::default()
            },
            25,
            &[],
        );
        engine.step();
        assert_eq!(engine.layout().k(), 20.0);
    }

    #[test]
    fn test_linlog_runs() {
        let mut config = EngineConfig::default();
        config.layout.law = LawKind::LinLog;
        let mut engine = engine_with(config, 30, &random_edges(30, 40, 8));
        for _ in 0..20 {
            engine.step();
        }
        for i in 0..30 {
            let p = engine.position(&format!("n{i}")).unwrap();
            assert!(p.iter().all(|c| c.is_finite()));
        }
    }
}
