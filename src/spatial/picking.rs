//! R-tree pick index over published positions using the rstar crate.
//!
//! Built from a finished tick's positions, so hit testing never observes
//! a tick in progress. Queries project onto the xy plane:
//! - Nearest node
//! - Nearest node within a distance
//! - Rectangle and radius selection

use rstar::{AABB, PointDistance, RTree, RTreeObject};

/// A published node position in the pick index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickPoint {
    /// Dense node index at publish time.
    pub index: u32,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl RTreeObject for PickPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for PickPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index for hit testing published nodes.
#[derive(Debug, Default)]
pub struct PickIndex {
    tree: RTree<PickPoint>,
}

impl PickIndex {
    /// Bulk-load from flat xyz triples, one per node in index order.
    pub fn from_positions(positions: &[f64]) -> Self {
        let points = positions
            .chunks_exact(3)
            .enumerate()
            .map(|(i, p)| PickPoint {
                index: i as u32,
                x: p[0],
                y: p[1],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Nearest node to a point.
    pub fn nearest(&self, x: f64, y: f64) -> Option<u32> {
        self.tree.nearest_neighbor(&[x, y]).map(|p| p.index)
    }

    /// Nearest node no farther than `max_distance`.
    pub fn nearest_within(&self, x: f64, y: f64, max_distance: f64) -> Option<u32> {
        let max_distance_sq = max_distance * max_distance;
        self.tree
            .nearest_neighbor(&[x, y])
            .filter(|p| p.distance_2(&[x, y]) <= max_distance_sq)
            .map(|p| p.index)
    }

    /// Nodes inside a rectangle.
    pub fn in_rect(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<u32> {
        let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|p| p.index)
            .collect()
    }

    /// Nodes within `radius` of a point.
    pub fn in_radius(&self, x: f64, y: f64, radius: f64) -> Vec<u32> {
        self.tree
            .locate_within_distance([x, y], radius * radius)
            .map(|p| p.index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PickIndex {
        PickIndex::from_positions(&[0.0, 0.0, 0.0, 10.0, 10.0, 0.0, 5.0, 5.0, 3.0])
    }

    #[test]
    fn test_nearest() {
        let index = index();
        assert_eq!(index.nearest(0.0, 0.0), Some(0));
        assert_eq!(index.nearest(6.0, 6.0), Some(2));
        assert_eq!(index.nearest(11.0, 11.0), Some(1));
    }

    #[test]
    fn test_nearest_within() {
        let index = index();
        assert_eq!(index.nearest_within(0.0, 0.0, 5.0), Some(0));
        assert_eq!(index.nearest_within(2.5, 2.5, 1.0), None);
    }

    #[test]
    fn test_in_rect_and_radius() {
        let index = index();
        let mut in_rect = index.in_rect(-1.0, -1.0, 6.0, 6.0);
        in_rect.sort_unstable();
        assert_eq!(in_rect, vec![0, 2]);

        let in_radius = index.in_radius(10.0, 10.0, 1.0);
        assert_eq!(in_radius, vec![1]);
    }

    #[test]
    fn test_empty() {
        let index = PickIndex::from_positions(&[]);
        assert!(index.is_empty());
        assert_eq!(index.nearest(0.0, 0.0), None);
    }
}
