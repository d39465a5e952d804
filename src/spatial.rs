//! Planar nearest-node queries over a road graph
//!
//! Only available with the `spatial-index` feature. Positions are indexed by
//! their XZ coordinates, so a query snaps onto the network regardless of the
//! height it is made at.

#[cfg(feature = "spatial-index")]
use glam::Vec3;
#[cfg(feature = "spatial-index")]
use kiddo::immutable::float::kdtree::ImmutableKdTree;
#[cfg(feature = "spatial-index")]
use kiddo::SquaredEuclidean;

#[cfg(feature = "spatial-index")]
use crate::geometry::flat;

/// A 2D KD-tree over node positions
#[cfg(feature = "spatial-index")]
#[derive(Clone)]
pub struct SpatialIndex {
    tree: ImmutableKdTree<f32, usize, 2, 32>,
    len: usize,
}

#[cfg(feature = "spatial-index")]
impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex").field("len", &self.len).finish_non_exhaustive()
    }
}

#[cfg(feature = "spatial-index")]
impl SpatialIndex {
    /// Index `positions`; the item for each point is its slice index
    ///
    /// `positions` must not be empty.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_town_layout::*;
    ///
    /// # #[cfg(feature = "spatial-index")]
    /// # {
    /// let index = SpatialIndex::new(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)]);
    /// // Height is ignored
    /// assert_eq!(index.find_nearest(Vec3::new(45.0, 90.0, 3.0)), 1);
    /// assert_eq!(index.nearest_within(Vec3::new(20.0, 0.0, 0.0), 5.0), None);
    /// # }
    /// ```
    pub fn new(positions: &[Vec3]) -> Self {
        let points: Vec<[f32; 2]> = positions.iter().map(|&p| flat(p).to_array()).collect();

        Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            len: positions.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the position closest to `position` in XZ
    pub fn find_nearest(&self, position: Vec3) -> usize {
        self.tree
            .nearest_one::<SquaredEuclidean>(&flat(position).to_array())
            .item
    }

    /// Closest position and its XZ distance, if within `max_distance`
    pub fn nearest_within(&self, position: Vec3, max_distance: f32) -> Option<(usize, f32)> {
        if self.is_empty() {
            return None;
        }
        let nearest = self.tree.nearest_one::<SquaredEuclidean>(&flat(position).to_array());
        let distance = nearest.distance.sqrt();
        (distance <= max_distance).then_some((nearest.item, distance))
    }
}
