//! SpacePartition - a quadtree (2D) or octree (3D) over node positions.
//!
//! Cells live in an arena and refer to each other by [`CellId`]; each cell
//! keeps a non-owning parent id so invalidation can walk to the root
//! iteratively. A leaf holds up to `max_elements_per_cell` node indexes and
//! splits past that; an internal cell creates children only for the
//! sub-regions that receive nodes, and collapses back into a leaf once its
//! subtree holds at most half the threshold. Empty cells are pruned.
//!
//! Every cell caches an [`Aggregate`] of its subtree (weighted centroid,
//! total weight, degree sum). The cache is dropped on every structural
//! change of the subtree and recomputed on the next access.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use super::bounds::Bounds;
use super::neighborhood::Neighborhood;
use crate::graph::{ElementKind, IndexEvent};

/// Read access to the bodies indexed by the partition.
pub trait Bodies {
    /// Number of nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of node `node`.
    fn position(&self, node: usize) -> [f64; 3];

    /// Mass used for centroids and repulsion.
    fn weight(&self, node: usize) -> f64;

    /// Number of incident edges.
    fn degree(&self, node: usize) -> f64;
}

/// Tuning of the tree shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartitionConfig {
    /// Occupants a leaf holds before splitting.
    pub max_elements_per_cell: usize,
    /// Leaves at this depth never split.
    pub max_depth: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_elements_per_cell: 10,
            max_depth: 100,
        }
    }
}

/// Arena address of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u32);

impl CellId {
    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Summary of a subtree as one pseudo-body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    /// Weighted centroid.
    pub centroid: [f64; 3],
    /// Total weight.
    pub weight: f64,
    /// Sum of degrees.
    pub degree: f64,
    /// Number of bodies.
    pub count: usize,
}

#[derive(Default)]
struct Accumulator {
    weighted: [f64; 3],
    plain: [f64; 3],
    weight: f64,
    degree: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, p: [f64; 3], weight: f64, degree: f64, count: usize) {
        for i in 0..3 {
            self.weighted[i] += p[i] * weight;
            self.plain[i] += p[i] * count as f64;
        }
        self.weight += weight;
        self.degree += degree;
        self.count += count;
    }

    fn finish(self) -> Aggregate {
        let centroid = if self.weight > 0.0 {
            self.weighted.map(|s| s / self.weight)
        } else if self.count > 0 {
            self.plain.map(|s| s / self.count as f64)
        } else {
            [0.0; 3]
        };
        Aggregate {
            centroid,
            weight: self.weight,
            degree: self.degree,
            count: self.count,
        }
    }
}

/// Decision of [`SpacePartition::approximate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Approximation {
    /// Visit the cell's contents individually.
    Exact,
    /// Treat the whole cell as this pseudo-body.
    Aggregate(Aggregate),
}

struct SpaceCell {
    bounds: Bounds,
    depth: usize,
    parent: Option<CellId>,
    children: [Option<CellId>; 8],
    leaf: bool,
    elements: Vec<u32>,
    count: usize,
    aggregate: Cell<Option<Aggregate>>,
}

impl SpaceCell {
    fn new(bounds: Bounds, depth: usize, parent: Option<CellId>) -> Self {
        Self {
            bounds,
            depth,
            parent,
            children: [None; 8],
            leaf: true,
            elements: Vec::new(),
            count: 0,
            aggregate: Cell::new(None),
        }
    }
}

/// Hierarchical spatial index over node positions.
pub struct SpacePartition {
    config: PartitionConfig,
    is_3d: bool,
    cells: Vec<SpaceCell>,
    free: Vec<CellId>,
    root: CellId,
    membership: Vec<Option<CellId>>,
}

impl std::fmt::Debug for SpacePartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpacePartition")
            .field("config", &self.config)
            .field("is_3d", &self.is_3d)
            .field("cells", &self.cell_count())
            .field("elements", &self.len())
            .finish()
    }
}

impl SpacePartition {
    /// Create an empty partition covering `bounds`.
    pub fn new(config: PartitionConfig, bounds: Bounds, is_3d: bool) -> Self {
        Self {
            config,
            is_3d,
            cells: vec![SpaceCell::new(bounds, 0, None)],
            free: Vec::new(),
            root: CellId(0),
            membership: Vec::new(),
        }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.cells[self.root.slot()].count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live cells, the root included.
    pub fn cell_count(&self) -> usize {
        self.cells.len() - self.free.len()
    }

    pub fn root(&self) -> CellId {
        self.root
    }

    pub fn bounds(&self, cell: CellId) -> Bounds {
        self.cells[cell.slot()].bounds
    }

    pub fn is_leaf(&self, cell: CellId) -> bool {
        self.cells[cell.slot()].leaf
    }

    pub fn depth(&self, cell: CellId) -> usize {
        self.cells[cell.slot()].depth
    }

    /// Occupants of a leaf; empty for internal cells.
    pub fn elements(&self, cell: CellId) -> &[u32] {
        &self.cells[cell.slot()].elements
    }

    /// Nodes in the subtree.
    pub fn count(&self, cell: CellId) -> usize {
        self.cells[cell.slot()].count
    }

    pub fn children(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.cells[cell.slot()].children.iter().flatten().copied()
    }

    /// Leaf currently holding `node`.
    pub fn cell_of(&self, node: usize) -> Option<CellId> {
        self.membership.get(node).copied().flatten()
    }

    fn fanout(&self) -> usize {
        if self.is_3d { 8 } else { 4 }
    }

    // =========================================================================
    // Arena
    // =========================================================================

    fn alloc(&mut self, bounds: Bounds, depth: usize, parent: CellId) -> CellId {
        let cell = SpaceCell::new(bounds, depth, Some(parent));
        match self.free.pop() {
            Some(id) => {
                self.cells[id.slot()] = cell;
                id
            }
            None => {
                self.cells.push(cell);
                CellId(self.cells.len() as u32 - 1)
            }
        }
    }

    fn release(&mut self, id: CellId) {
        let cell = &mut self.cells[id.slot()];
        cell.elements = Vec::new();
        cell.children = [None; 8];
        cell.parent = None;
        cell.count = 0;
        self.free.push(id);
    }

    fn octant(&self, cell: CellId, p: [f64; 3]) -> usize {
        let center = self.cells[cell.slot()].bounds.center();
        let mut octant = 0;
        for axis in 0..if self.is_3d { 3 } else { 2 } {
            if p[axis] >= center[axis] {
                octant |= 1 << axis;
            }
        }
        octant
    }

    fn octant_bounds(&self, cell: CellId, octant: usize) -> Bounds {
        let parent = self.cells[cell.slot()].bounds;
        let center = parent.center();
        let mut lo = parent.lo;
        let mut hi = parent.hi;
        for axis in 0..if self.is_3d { 3 } else { 2 } {
            if octant & (1 << axis) != 0 {
                lo[axis] = center[axis];
            } else {
                hi[axis] = center[axis];
            }
        }
        Bounds { lo, hi }
    }

    fn child_for(&mut self, cell: CellId, p: [f64; 3]) -> CellId {
        let octant = self.octant(cell, p);
        if let Some(child) = self.cells[cell.slot()].children[octant] {
            return child;
        }
        let bounds = self.octant_bounds(cell, octant);
        let depth = self.cells[cell.slot()].depth + 1;
        let child = self.alloc(bounds, depth, cell);
        self.cells[cell.slot()].children[octant] = Some(child);
        child
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Index `node` at its current position.
    ///
    /// If the position falls outside the root, the tree is rebuilt over an
    /// enlarged root first.
    ///
    /// A node with a non-finite coordinate is left out of the tree until a
    /// later relocation finds it finite again.
    pub fn insert<B: Bodies>(&mut self, node: usize, bodies: &B) {
        let p = bodies.position(node);
        if !is_finite(p) {
            log::warn!("node {node} has a non-finite position {p:?}, not indexed");
            return;
        }
        if !self.cells[self.root.slot()].bounds.contains(p) {
            let grown = self.cells[self.root.slot()].bounds.union(&Bounds::point(p));
            self.rebuild_excluding(grown, bodies, Some(node));
        }
        if self.membership.len() <= node {
            self.membership.resize(node + 1, None);
        }

        let mut cell = self.root;
        loop {
            let c = &mut self.cells[cell.slot()];
            c.count += 1;
            c.aggregate.set(None);
            if c.leaf {
                c.elements.push(node as u32);
                self.membership[node] = Some(cell);
                if c.elements.len() > self.config.max_elements_per_cell && c.depth < self.config.max_depth {
                    self.split(cell, bodies);
                }
                return;
            }
            cell = self.child_for(cell, p);
        }
    }

    fn split<B: Bodies>(&mut self, cell: CellId, bodies: &B) {
        log::trace!("splitting cell {:?} at depth {}", cell, self.cells[cell.slot()].depth);
        let c = &mut self.cells[cell.slot()];
        c.leaf = false;
        let elements = std::mem::take(&mut c.elements);

        for &node in &elements {
            let child = self.child_for(cell, bodies.position(node as usize));
            let ch = &mut self.cells[child.slot()];
            ch.elements.push(node);
            ch.count += 1;
            self.membership[node as usize] = Some(child);
        }

        for octant in 0..self.fanout() {
            let Some(child) = self.cells[cell.slot()].children[octant] else {
                continue;
            };
            let ch = &self.cells[child.slot()];
            if ch.elements.len() > self.config.max_elements_per_cell && ch.depth < self.config.max_depth {
                self.split(child, bodies);
            }
        }
    }

    /// Stop indexing `node`. Returns `false` if it was not indexed.
    pub fn remove(&mut self, node: usize) -> bool {
        let Some(leaf) = self.cell_of(node) else {
            return false;
        };
        self.membership[node] = None;

        let elements = &mut self.cells[leaf.slot()].elements;
        if let Some(at) = elements.iter().position(|&e| e as usize == node) {
            elements.swap_remove(at);
        }

        let mut merge_at = None;
        let mut cursor = Some(leaf);
        while let Some(id) = cursor {
            let c = &mut self.cells[id.slot()];
            c.count -= 1;
            c.aggregate.set(None);
            if !c.leaf && c.count <= self.config.max_elements_per_cell / 2 {
                merge_at = Some(id);
            }
            cursor = c.parent;
        }

        self.prune(leaf);
        if let Some(cell) = merge_at.filter(|c| self.cells[c.slot()].count > 0) {
            self.merge(cell);
        }
        true
    }

    fn prune(&mut self, mut cell: CellId) {
        while cell != self.root && self.cells[cell.slot()].count == 0 {
            let Some(parent) = self.cells[cell.slot()].parent else {
                return;
            };
            for slot in &mut self.cells[parent.slot()].children {
                if *slot == Some(cell) {
                    *slot = None;
                }
            }
            self.release(cell);
            cell = parent;
        }
        let root = &mut self.cells[self.root.slot()];
        if root.count == 0 && !root.leaf {
            root.leaf = true;
        }
    }

    fn merge(&mut self, cell: CellId) {
        if self.cells[cell.slot()].leaf {
            return;
        }
        log::trace!("merging cell {:?} holding {}", cell, self.cells[cell.slot()].count);

        let mut gathered = Vec::with_capacity(self.cells[cell.slot()].count);
        let mut stack: Vec<CellId> = self.children(cell).collect();
        while let Some(id) = stack.pop() {
            stack.extend(self.children(id));
            gathered.append(&mut self.cells[id.slot()].elements);
            self.release(id);
        }

        for &node in &gathered {
            self.membership[node as usize] = Some(cell);
        }
        let c = &mut self.cells[cell.slot()];
        c.children = [None; 8];
        c.leaf = true;
        c.elements = gathered;
        c.aggregate.set(None);
    }

    /// Re-file `node` if it left its leaf, otherwise drop stale aggregates.
    pub fn relocate<B: Bodies>(&mut self, node: usize, bodies: &B) {
        if !is_finite(bodies.position(node)) {
            self.remove(node);
            return;
        }
        match self.cell_of(node) {
            Some(leaf) if self.cells[leaf.slot()].bounds.contains(bodies.position(node)) => {
                self.invalidate(leaf);
            }
            Some(_) => {
                self.remove(node);
                self.insert(node, bodies);
            }
            None => self.insert(node, bodies),
        }
    }

    /// Re-file every node that moved out of its leaf and drop all cached
    /// aggregates. Called once per tick after positions were written.
    pub fn refresh<B: Bodies>(&mut self, bodies: &B) {
        let root = self.cells[self.root.slot()].bounds;
        if finite_positions(bodies).any(|p| !root.contains(p)) {
            let grown = finite_positions(bodies).fold(root, |b, p| b.union(&Bounds::point(p)));
            self.rebuild(grown, bodies);
        }

        for node in 0..bodies.len() {
            let p = bodies.position(node);
            if !is_finite(p) {
                self.remove(node);
                continue;
            }
            match self.cell_of(node) {
                Some(leaf) if self.cells[leaf.slot()].bounds.contains(p) => {}
                _ => {
                    self.remove(node);
                    self.insert(node, bodies);
                }
            }
        }
        self.invalidate_all();
    }

    /// Drop the cached aggregate of `cell` and of all its ancestors.
    pub fn invalidate(&self, cell: CellId) {
        let mut cursor = Some(cell);
        while let Some(id) = cursor {
            let c = &self.cells[id.slot()];
            c.aggregate.set(None);
            cursor = c.parent;
        }
    }

    /// Drop every cached aggregate.
    pub fn invalidate_all(&self) {
        for cell in &self.cells {
            cell.aggregate.set(None);
        }
    }

    /// Discard the tree and index every body again under a root covering
    /// `bounds` and all positions.
    pub fn rebuild<B: Bodies>(&mut self, bounds: Bounds, bodies: &B) {
        self.rebuild_excluding(bounds, bodies, None);
    }

    fn rebuild_excluding<B: Bodies>(&mut self, bounds: Bounds, bodies: &B, skip: Option<usize>) {
        let indexed: Vec<usize> = (0..self.membership.len())
            .filter(|&n| self.membership[n].is_some() && Some(n) != skip)
            .collect();
        let bounds = indexed
            .iter()
            .map(|&n| bodies.position(n))
            .filter(|p| is_finite(*p))
            .fold(bounds, |b, p| b.union(&Bounds::point(p)));

        let dims = if self.is_3d { 3 } else { 2 };
        let extent = bounds.size().into_iter().take(dims).fold(0.0f64, f64::max);
        let root_bounds = bounds.padded(extent * 0.1, dims);
        log::debug!("rebuilding space partition over {root_bounds:?}");

        self.reset(root_bounds);
        for node in indexed {
            self.insert(node, bodies);
        }
    }

    fn reset(&mut self, bounds: Bounds) {
        self.cells.clear();
        self.free.clear();
        self.cells.push(SpaceCell::new(bounds, 0, None));
        self.root = CellId(0);
        self.membership.iter_mut().for_each(|m| *m = None);
    }

    /// Forget every node and restart from `bounds`.
    pub fn clear(&mut self, bounds: Bounds) {
        self.reset(bounds);
        self.membership.clear();
    }

    /// Follow one registry event.
    ///
    /// Node events are applied after the bodies were updated for them, so
    /// an added node already has its position. Edge events only change
    /// degrees, which drops the cached aggregates.
    pub fn apply<B: Bodies>(&mut self, event: &IndexEvent, bodies: &B, bounds: Bounds) {
        match *event {
            IndexEvent::Added {
                kind: ElementKind::Node,
                index,
            } => self.insert(index as usize, bodies),
            IndexEvent::Swapped {
                kind: ElementKind::Node,
                from,
                to,
            } => {
                self.remove(to as usize);
                self.relabel(from as usize, to as usize);
            }
            IndexEvent::Removed {
                kind: ElementKind::Node,
                index,
            } => {
                self.remove(index as usize);
                self.membership.truncate(index as usize);
            }
            IndexEvent::Added { .. } | IndexEvent::Removed { .. } => self.invalidate_all(),
            IndexEvent::Swapped { .. } => {}
            IndexEvent::Cleared => self.clear(bounds),
        }
    }

    fn relabel(&mut self, from: usize, to: usize) {
        let Some(leaf) = self.cell_of(from) else {
            return;
        };
        for e in &mut self.cells[leaf.slot()].elements {
            if *e as usize == from {
                *e = to as u32;
            }
        }
        self.membership[to] = Some(leaf);
        self.membership[from] = None;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Summary of the subtree under `cell`, computed on first access after
    /// a change.
    pub fn aggregate<B: Bodies>(&self, cell: CellId, bodies: &B) -> Aggregate {
        let c = &self.cells[cell.slot()];
        if let Some(aggregate) = c.aggregate.get() {
            return aggregate;
        }

        let mut acc = Accumulator::default();
        if c.leaf {
            for &node in &c.elements {
                let node = node as usize;
                acc.add(bodies.position(node), bodies.weight(node), bodies.degree(node), 1);
            }
        } else {
            for child in c.children.iter().flatten() {
                let a = self.aggregate(*child, bodies);
                acc.add(a.centroid, a.weight, a.degree, a.count);
            }
        }
        let aggregate = acc.finish();
        c.aggregate.set(Some(aggregate));
        aggregate
    }

    /// Barnes-Hut opening test of `cell` as seen from node `source`.
    ///
    /// Leaves are always exact. An internal cell is summarized when its
    /// diagonal over the distance to its centroid is below `theta`.
    pub fn approximate<B: Bodies>(&self, source: usize, cell: CellId, theta: f64, bodies: &B) -> Approximation {
        let c = &self.cells[cell.slot()];
        if c.leaf {
            return Approximation::Exact;
        }
        let aggregate = self.aggregate(cell, bodies);
        let p = bodies.position(source);
        let d = distance(p, aggregate.centroid);
        if d > 0.0 && c.bounds.diagonal() / d < theta {
            Approximation::Aggregate(aggregate)
        } else {
            Approximation::Exact
        }
    }

    /// Nodes inside the axis-aligned box of half-size `radius` around
    /// `source`, excluding `source`. Lazy; clone it to restart.
    pub fn exact_neighborhood<'a, B: Bodies>(
        &'a self,
        source: usize,
        radius: f64,
        bodies: &'a B,
    ) -> Neighborhood<'a, B> {
        let p = bodies.position(source);
        let region = Bounds {
            lo: p.map(|v| v - radius),
            hi: p.map(|v| v + radius),
        };
        Neighborhood::new(self, bodies, source, region)
    }
}

fn is_finite(p: [f64; 3]) -> bool {
    p.iter().all(|c| c.is_finite())
}

fn finite_positions<B: Bodies>(bodies: &B) -> impl Iterator<Item = [f64; 3]> + '_ {
    (0..bodies.len()).map(move |n| bodies.position(n)).filter(|p| is_finite(*p))
}

/// Euclidean distance.
#[inline]
pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    pub(crate) struct Points(pub Vec<[f64; 3]>);

    impl Bodies for Points {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn position(&self, node: usize) -> [f64; 3] {
            self.0[node]
        }

        fn weight(&self, _node: usize) -> f64 {
            1.0
        }

        fn degree(&self, _node: usize) -> f64 {
            1.0
        }
    }

    pub(crate) fn random_points(n: usize, seed: u64) -> Points {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Points(
            (0..n)
                .map(|_| [rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0), 0.0])
                .collect(),
        )
    }

    fn build(points: &Points) -> SpacePartition {
        let mut partition = SpacePartition::new(PartitionConfig::default(), Bounds::default(), false);
        for node in 0..points.len() {
            partition.insert(node, points);
        }
        partition
    }

    fn assert_consistent(partition: &SpacePartition) {
        let mut seen = 0;
        let mut stack = vec![partition.root()];
        while let Some(cell) = stack.pop() {
            let children: Vec<_> = partition.children(cell).collect();
            if partition.is_leaf(cell) {
                assert!(children.is_empty());
                assert_eq!(partition.count(cell), partition.elements(cell).len());
                for &e in partition.elements(cell) {
                    assert_eq!(partition.cell_of(e as usize), Some(cell));
                }
                seen += partition.elements(cell).len();
            } else {
                let sum: usize = children.iter().map(|c| partition.count(*c)).sum();
                assert_eq!(partition.count(cell), sum);
                for child in &children {
                    assert!(partition.count(*child) > 0, "empty child kept");
                }
            }
            stack.extend(children);
        }
        assert_eq!(seen, partition.len());
    }

    #[test]
    fn test_split_on_overflow() {
        let points = random_points(11, 1);
        let mut partition = build(&Points(points.0[..10].to_vec()));
        assert!(partition.is_leaf(partition.root()));

        partition.insert(10, &points);
        assert!(!partition.is_leaf(partition.root()));
        assert!(partition.children(partition.root()).count() <= 4);
        assert_consistent(&partition);
    }

    #[test]
    fn test_remove_merges_and_prunes() {
        let points = random_points(200, 2);
        let mut partition = build(&points);
        assert!(partition.cell_count() > 1);

        for node in 0..196 {
            assert!(partition.remove(node));
            assert_consistent(&partition);
        }
        assert_eq!(partition.len(), 4);
        assert!(partition.is_leaf(partition.root()));
        assert_eq!(partition.cell_count(), 1);
        assert!(!partition.remove(0));
    }

    #[test]
    fn test_aggregate_is_centroid() {
        let points = Points(vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.0, 3.0, 0.0]]);
        let partition = build(&points);
        let aggregate = partition.aggregate(partition.root(), &points);
        assert_eq!(aggregate.count, 3);
        assert_eq!(aggregate.weight, 3.0);
        assert_eq!(aggregate.centroid, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_aggregate_cache_dropped_on_insert() {
        let mut points = Points(vec![[0.0, 0.0, 0.0]]);
        let mut partition = build(&points);
        assert_eq!(partition.aggregate(partition.root(), &points).count, 1);

        points.0.push([10.0, 10.0, 0.0]);
        partition.insert(1, &points);
        let aggregate = partition.aggregate(partition.root(), &points);
        assert_eq!(aggregate.count, 2);
        assert_eq!(aggregate.centroid, [5.0, 5.0, 0.0]);
    }

    #[test]
    fn test_out_of_bounds_insert_grows_root() {
        let mut points = random_points(30, 3);
        let mut partition = build(&points);
        points.0.push([1000.0, -500.0, 0.0]);
        partition.insert(30, &points);

        assert!(partition.bounds(partition.root()).contains([1000.0, -500.0, 0.0]));
        assert_eq!(partition.len(), 31);
        assert_consistent(&partition);
    }

    #[test]
    fn test_refresh_follows_moves() {
        let mut points = random_points(100, 4);
        let mut partition = build(&points);
        for p in points.0.iter_mut().step_by(3) {
            p[0] = -p[0];
            p[1] *= 0.5;
        }
        partition.refresh(&points);
        assert_consistent(&partition);
        for node in 0..points.len() {
            let leaf = partition.cell_of(node).unwrap();
            assert!(partition.bounds(leaf).contains(points.position(node)));
        }
    }

    #[test]
    fn test_non_finite_points_stay_out_of_the_tree() {
        let mut points = random_points(30, 5);
        let mut partition = build(&points);
        let root = partition.bounds(partition.root());

        points.0.push([f64::NAN, 0.0, 0.0]);
        partition.insert(30, &points);
        assert_eq!(partition.cell_of(30), None);
        assert_eq!(partition.len(), 30);

        points.0[3] = [f64::INFINITY, 1.0, 0.0];
        partition.refresh(&points);
        assert_eq!(partition.cell_of(3), None);
        assert_eq!(partition.len(), 29);
        assert_eq!(partition.bounds(partition.root()), root);
        assert_consistent(&partition);

        points.0[3] = [10.0, 10.0, 0.0];
        partition.relocate(3, &points);
        assert!(partition.cell_of(3).is_some());
        assert_eq!(partition.len(), 30);
        assert_consistent(&partition);
    }

    #[test]
    fn test_coincident_points_stop_at_max_depth() {
        let points = Points(vec![[1.0, 1.0, 0.0]; 20]);
        let config = PartitionConfig {
            max_elements_per_cell: 10,
            max_depth: 5,
        };
        let mut partition = SpacePartition::new(config, Bounds::default(), false);
        for node in 0..points.len() {
            partition.insert(node, &points);
        }
        let leaf = partition.cell_of(0).unwrap();
        assert_eq!(partition.depth(leaf), 5);
        assert_eq!(partition.elements(leaf).len(), 20);
    }

    #[test]
    fn test_swap_event_relabels() {
        let points = Points(vec![[-50.0, -50.0, 0.0], [50.0, 50.0, 0.0]]);
        let mut partition = build(&points);

        // Node 0 is removed: node 1 moves into slot 0.
        let moved = Points(vec![[50.0, 50.0, 0.0]]);
        partition.apply(&IndexEvent::Swapped { kind: ElementKind::Node, from: 1, to: 0 }, &moved, Bounds::default());
        partition.apply(&IndexEvent::Removed { kind: ElementKind::Node, index: 1 }, &moved, Bounds::default());

        assert_eq!(partition.len(), 1);
        assert_eq!(partition.cell_of(1), None);
        assert_eq!(partition.aggregate(partition.root(), &moved).centroid, [50.0, 50.0, 0.0]);
        assert_consistent(&partition);
    }

    #[test]
    fn test_octree_uses_eight_children() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let points = Points(
            (0..400)
                .map(|_| std::array::from_fn(|_| rng.gen_range(-10.0..10.0)))
                .collect(),
        );
        let bounds = Bounds::new([-10.0; 3], [10.0; 3]);
        let mut partition = SpacePartition::new(PartitionConfig::default(), bounds, true);
        for node in 0..points.len() {
            partition.insert(node, &points);
        }
        assert_eq!(partition.children(partition.root()).count(), 8);
        assert_consistent(&partition);
    }

    #[test]
    fn test_approximate_far_cell() {
        let mut all = random_points(60, 6);
        // A lone far-away source.
        all.0.push([1.0e6, 1.0e6, 0.0]);
        let mut partition = SpacePartition::new(PartitionConfig::default(), Bounds::default(), false);
        for node in 0..60 {
            partition.insert(node, &all);
        }
        let root = partition.root();
        assert!(matches!(partition.approximate(60, root, 0.5, &all), Approximation::Aggregate(a) if a.count == 60));
        assert_eq!(partition.approximate(0, root, 0.5, &all), Approximation::Exact);
    }
}
