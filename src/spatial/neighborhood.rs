//! Lazy box queries over a [`SpacePartition`].

use super::bounds::Bounds;
use super::ntree::{Bodies, CellId, SpacePartition};

/// Nodes within an axis-aligned region around a source node.
///
/// Walks only the cells whose bounds intersect the region. Finite and
/// restartable: cloning yields an independent walk from the current point.
pub struct Neighborhood<'a, B> {
    partition: &'a SpacePartition,
    bodies: &'a B,
    source: usize,
    region: Bounds,
    pending: Vec<CellId>,
    current: std::slice::Iter<'a, u32>,
}

impl<'a, B: Bodies> Neighborhood<'a, B> {
    pub(crate) fn new(partition: &'a SpacePartition, bodies: &'a B, source: usize, region: Bounds) -> Self {
        let root = partition.root();
        let pending = if partition.bounds(root).intersects(&region) {
            vec![root]
        } else {
            Vec::new()
        };
        Self {
            partition,
            bodies,
            source,
            region,
            pending,
            current: Default::default(),
        }
    }
}

impl<B> Clone for Neighborhood<'_, B> {
    fn clone(&self) -> Self {
        Self {
            partition: self.partition,
            bodies: self.bodies,
            source: self.source,
            region: self.region,
            pending: self.pending.clone(),
            current: self.current.clone(),
        }
    }
}

impl<B: Bodies> Iterator for Neighborhood<'_, B> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            for &node in self.current.by_ref() {
                if node as usize != self.source && self.region.contains(self.bodies.position(node as usize)) {
                    return Some(node);
                }
            }

            let cell = self.pending.pop()?;
            if self.partition.is_leaf(cell) {
                self.current = self.partition.elements(cell).iter();
            } else {
                let region = self.region;
                self.pending.extend(
                    self.partition
                        .children(cell)
                        .filter(|c| self.partition.bounds(*c).intersects(&region)),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::ntree::tests::random_points;
    use crate::spatial::{Bounds, PartitionConfig};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn infinite_radius_matches_brute_force(n in 1usize..300, seed in any::<u64>(), pick in any::<prop::sample::Index>()) {
            let points = random_points(n, seed);
            let mut partition = SpacePartition::new(PartitionConfig::default(), Bounds::default(), false);
            for node in 0..n {
                partition.insert(node, &points);
            }
            let source = pick.index(n);

            let mut found: Vec<u32> = partition.exact_neighborhood(source, f64::INFINITY, &points).collect();
            found.sort_unstable();
            let expected: Vec<u32> = (0..n as u32).filter(|&i| i as usize != source).collect();
            prop_assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_radius_filters_and_restarts() {
        let points = random_points(500, 9);
        let mut partition = SpacePartition::new(PartitionConfig::default(), Bounds::default(), false);
        for node in 0..points.len() {
            partition.insert(node, &points);
        }

        let radius = 20.0;
        let p = points.position(0);
        let mut expected: Vec<u32> = (1..500u32)
            .filter(|&i| {
                let q = points.position(i as usize);
                (q[0] - p[0]).abs() <= radius && (q[1] - p[1]).abs() <= radius
            })
            .collect();
        expected.sort_unstable();

        let walk = partition.exact_neighborhood(0, radius, &points);
        let mut first: Vec<u32> = walk.clone().collect();
        let mut second: Vec<u32> = walk.collect();
        first.sort_unstable();
        second.sort_unstable();
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }
}
