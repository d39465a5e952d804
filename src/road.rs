//! Road polylines
//!
//! A road is the designer-authored centerline of one street. The generator
//! never mutates roads; the node editing helpers exist for authoring tools.

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered polyline representing one street's centerline
///
/// Roads need at least two nodes to be meshed, sampled or used for building
/// placement; shorter roads are skipped by every generation step.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Road {
    /// Display name (not required to be unique)
    pub name: String,
    /// Centerline nodes in travel order
    pub nodes: Vec<Vec3>,
}

/// Position and heading at some arc length along a road
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSample {
    /// Point on the centerline
    pub position: Vec3,
    /// Unit direction of the segment containing the point
    pub direction: Vec3,
}

impl Road {
    /// Create an empty road
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Create a road from a list of nodes
    pub fn with_nodes(name: impl Into<String>, nodes: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    /// Append a node at the end of the road
    pub fn push_node(&mut self, node: Vec3) {
        self.nodes.push(node);
    }

    /// Insert a node before `index` (clamped to the end)
    pub fn insert_node(&mut self, index: usize, node: Vec3) {
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
    }

    /// Remove and return the node at `index`
    pub fn remove_node(&mut self, index: usize) -> Option<Vec3> {
        (index < self.nodes.len()).then(|| self.nodes.remove(index))
    }

    /// Whether the road has enough nodes to be generated
    #[inline]
    pub fn is_drivable(&self) -> bool {
        self.nodes.len() >= 2
    }

    /// Number of straight segments
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Iterate over consecutive node pairs
    pub fn segments(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        self.nodes.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Total arc length of the polyline
    pub fn length(&self) -> f32 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    /// Position and direction at `distance` along the road
    ///
    /// Distances beyond the road are clamped to its last node. Returns `None`
    /// for roads with fewer than two nodes.
    pub fn sample_at(&self, distance: f32) -> Option<RoadSample> {
        if !self.is_drivable() {
            return None;
        }

        let distance = distance.max(0.0);
        let mut traveled = 0.0;
        let mut last = None;
        for (start, end) in self.segments() {
            let segment_length = start.distance(end);
            let direction = (end - start).normalize_or_zero();
            if traveled + segment_length >= distance {
                return Some(RoadSample {
                    position: start + direction * (distance - traveled),
                    direction,
                });
            }
            traveled += segment_length;
            last = Some(RoadSample {
                position: end,
                direction,
            });
        }
        last
    }

    /// Positions every `spacing` units along the road, starting at the first node
    pub fn sample_every(&self, spacing: f32) -> Vec<Vec3> {
        if !self.is_drivable() || spacing <= 0.0 {
            return Vec::new();
        }
        let length = self.length();
        let steps = (length / spacing).floor() as usize;
        (0..=steps)
            .filter_map(|step| self.sample_at(step as f32 * spacing))
            .map(|sample| sample.position)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shaped() -> Road {
        Road::with_nodes(
            "Main",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 10.0),
            ],
        )
    }

    #[test]
    fn test_length() {
        assert!((l_shaped().length() - 20.0).abs() < 1e-5);
        assert_eq!(Road::new("empty").length(), 0.0);
    }

    #[test]
    fn test_sample_at_second_segment() {
        let sample = l_shaped().sample_at(15.0).unwrap();
        assert!((sample.position - Vec3::new(10.0, 0.0, 5.0)).length() < 1e-5);
        assert!((sample.direction - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_sample_past_end_clamps() {
        let sample = l_shaped().sample_at(100.0).unwrap();
        assert!((sample.position - Vec3::new(10.0, 0.0, 10.0)).length() < 1e-5);
    }

    #[test]
    fn test_sample_requires_two_nodes() {
        let mut road = Road::new("stub");
        assert!(road.sample_at(0.0).is_none());
        road.push_node(Vec3::ZERO);
        assert!(road.sample_at(0.0).is_none());
        assert!(!road.is_drivable());
    }

    #[test]
    fn test_node_editing() {
        let mut road = l_shaped();
        road.insert_node(1, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(road.nodes.len(), 4);
        assert_eq!(road.segment_count(), 3);
        assert_eq!(road.remove_node(1), Some(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(road.remove_node(10), None);
    }

    #[test]
    fn test_sample_every() {
        let points = l_shaped().sample_every(5.0);
        assert_eq!(points.len(), 5);
        assert!((points[0] - Vec3::ZERO).length() < 1e-5);
        assert!((points[4] - Vec3::new(10.0, 0.0, 10.0)).length() < 1e-4);
    }
}
