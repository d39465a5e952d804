//! Planar geometry helpers shared by the graph, block and placement code
//!
//! Every planar computation works in the XZ plane (Y is up). Positions are
//! compared with a per-axis tolerance rather than exact equality, and
//! [`PositionMap`] turns that approximate equality into hash lookups by
//! quantizing coordinates onto a tolerance-sized grid.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

/// Default per-axis tolerance under which two positions are the same point
pub const DEFAULT_TOLERANCE: f32 = 0.01;

/// Determinant magnitude below which two segments count as parallel
const PARALLEL_EPSILON: f32 = 1e-6;

/// Project a position onto the XZ plane
#[inline]
pub fn flat(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// 2D cross product (z component of the 3D cross of `(a, 0)` and `(b, 0)`)
#[inline]
pub fn perp_dot(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// True when `a` and `b` differ by less than `tolerance` on every axis
#[inline]
pub fn approx_eq(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    (a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance && (a.z - b.z).abs() < tolerance
}

/// Integer grid coordinates of a quantized position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl PositionKey {
    fn offset(self, dx: i64, dy: i64, dz: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

/// Quantize a position onto a grid whose cell size equals `tolerance`
#[inline]
pub fn quantize(point: Vec3, tolerance: f32) -> PositionKey {
    PositionKey {
        x: (point.x / tolerance).floor() as i64,
        y: (point.y / tolerance).floor() as i64,
        z: (point.z / tolerance).floor() as i64,
    }
}

/// Hash map keyed by approximate position
///
/// Two points within `tolerance` of each other can land in adjacent grid
/// cells, so lookups scan the 27 cells around the query key and then apply
/// [`approx_eq`]. The first position inserted for a point is the one kept.
#[derive(Debug, Clone)]
pub struct PositionMap<T> {
    tolerance: f32,
    buckets: HashMap<PositionKey, Vec<(Vec3, T)>>,
    len: usize,
}

impl<T> PositionMap<T> {
    /// Create an empty map with the given tolerance (must be positive)
    pub fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    /// Tolerance used for matching
    #[inline]
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Number of distinct positions stored
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the map is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find the value stored for a position within tolerance of `point`
    pub fn get(&self, point: Vec3) -> Option<&T> {
        let key = quantize(point, self.tolerance);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.buckets.get(&key.offset(dx, dy, dz)) else {
                        continue;
                    };
                    if let Some((_, value)) = bucket
                        .iter()
                        .find(|(stored, _)| approx_eq(*stored, point, self.tolerance))
                    {
                        return Some(value);
                    }
                }
            }
        }
        None
    }

    /// Return the existing value for `point`, or insert the one produced by `make`
    ///
    /// The boolean is true when a new entry was created.
    pub fn get_or_insert_with<F>(&mut self, point: Vec3, make: F) -> (&T, bool)
    where
        F: FnOnce() -> T,
    {
        let key = quantize(point, self.tolerance);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = key.offset(dx, dy, dz);
                    if let Some(bucket) = self.buckets.get(&neighbor) {
                        if let Some(index) = bucket
                            .iter()
                            .position(|(stored, _)| approx_eq(*stored, point, self.tolerance))
                        {
                            found = Some((neighbor, index));
                            break 'search;
                        }
                    }
                }
            }
        }

        match found {
            Some((neighbor, index)) => (&self.buckets[&neighbor][index].1, false),
            None => {
                let bucket = self.buckets.entry(key).or_default();
                bucket.push((point, make()));
                self.len += 1;
                let stored = &bucket[bucket.len() - 1].1;
                (stored, true)
            }
        }
    }
}

/// Intersect two segments projected onto a plane
///
/// Returns the crossing point when both parameters `t` (along `p1→p2`) and
/// `u` (along `p3→p4`) fall in `[0, 1]`. Parallel and coincident segments
/// report no intersection, so exact overlaps are never detected.
pub fn segment_intersection_2d(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<Vec2> {
    let d = (p2.x - p1.x) * (p4.y - p3.y) - (p2.y - p1.y) * (p4.x - p3.x);
    if d.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = ((p3.x - p1.x) * (p4.y - p3.y) - (p3.y - p1.y) * (p4.x - p3.x)) / d;
    let u = -((p1.x - p2.x) * (p1.y - p3.y) - (p1.y - p2.y) * (p1.x - p3.x)) / d;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + (p2 - p1) * t)
    } else {
        None
    }
}

/// Check whether `point` lies on the segment `start→end` in the XZ plane
///
/// Collinearity allows a perpendicular distance below `tolerance`;
/// containment requires the projection to fall between the endpoints.
/// Segments with no horizontal extent contain nothing.
pub fn point_on_segment_2d(point: Vec3, start: Vec3, end: Vec3, tolerance: f32) -> bool {
    let a = flat(start);
    let b = flat(end);
    let p = flat(point);

    let dir = b - a;
    let squared_length = dir.length_squared();
    if squared_length < f32::EPSILON {
        return false;
    }

    let to_point = p - a;
    let distance = perp_dot(dir, to_point).abs() / squared_length.sqrt();
    if distance >= tolerance {
        return false;
    }

    let dot = to_point.dot(dir);
    dot >= 0.0 && dot <= squared_length
}

/// Distance from `point` to the closest point of segment `start→end`
pub fn distance_to_segment_2d(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let dir = end - start;
    let squared_length = dir.length_squared();
    if squared_length < f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(dir) / squared_length).clamp(0.0, 1.0);
    point.distance(start + dir * t)
}

/// Signed area of a polygon in the XZ plane (shoelace formula)
///
/// Positive for counter-clockwise winding with x to the right and z up.
pub fn signed_area_xz(vertices: &[Vec3]) -> f32 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, current) in vertices.iter().enumerate() {
        let next = vertices[(i + 1) % vertices.len()];
        twice_area += current.x * next.z - next.x * current.z;
    }
    twice_area * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_segments_intersect() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, -5.0),
            Vec2::new(5.0, 5.0),
        )
        .expect("segments cross");
        assert!((hit - Vec2::new(5.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_parallel_segments_do_not_intersect() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(10.0, 1.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_coincident_segments_are_skipped() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(8.0, 0.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_touching_endpoints_intersect() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
        )
        .expect("shared endpoint counts");
        assert!((hit - Vec2::new(10.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_disjoint_segments() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(5.0, -5.0),
            Vec2::new(5.0, 5.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_lines_crossing_before_segment_start() {
        // The infinite lines meet at x = -3, outside the first segment
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(-3.0, -5.0),
            Vec2::new(-3.0, 5.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_diagonal_crossing() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(10.0, 0.0),
        )
        .expect("diagonals cross");
        assert!((hit - Vec2::new(5.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_off_center_crossing() {
        let hit = segment_intersection_2d(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(2.0, -1.0),
            Vec2::new(2.0, 3.0),
        )
        .expect("segments cross");
        assert!((hit - Vec2::new(2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_approx_eq_per_axis() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        assert!(approx_eq(a, a + Vec3::splat(0.005), DEFAULT_TOLERANCE));
        assert!(!approx_eq(a, a + Vec3::new(0.0, 0.0, 0.05), DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_position_map_matches_across_cell_boundary() {
        let mut map = PositionMap::new(DEFAULT_TOLERANCE);
        // 0.0099 and 0.0101 quantize into different cells but are within tolerance
        let (first, inserted) = map.get_or_insert_with(Vec3::new(0.0099, 0.0, 0.0), || 1);
        assert_eq!((*first, inserted), (1, true));

        let (second, inserted) = map.get_or_insert_with(Vec3::new(0.0101, 0.0, 0.0), || 2);
        assert_eq!((*second, inserted), (1, false));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_position_map_keeps_distant_points_apart() {
        let mut map = PositionMap::new(DEFAULT_TOLERANCE);
        map.get_or_insert_with(Vec3::ZERO, || 1);
        map.get_or_insert_with(Vec3::new(0.05, 0.0, 0.0), || 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(Vec3::new(0.049, 0.0, 0.0)), Some(&2));
        assert_eq!(map.get(Vec3::new(1.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_point_on_segment() {
        let start = Vec3::ZERO;
        let end = Vec3::new(10.0, 0.0, 0.0);
        assert!(point_on_segment_2d(Vec3::new(5.0, 3.0, 0.0), start, end, 0.01));
        assert!(point_on_segment_2d(end, start, end, 0.01));
        assert!(!point_on_segment_2d(Vec3::new(5.0, 0.0, 0.5), start, end, 0.01));
        assert!(!point_on_segment_2d(Vec3::new(11.0, 0.0, 0.0), start, end, 0.01));
    }

    #[test]
    fn test_vertical_segment_contains_nothing() {
        let start = Vec3::ZERO;
        let end = Vec3::new(0.0, 5.0, 0.0);
        assert!(!point_on_segment_2d(Vec3::ZERO, start, end, 0.01));
    }

    #[test]
    fn test_distance_to_segment() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert!((distance_to_segment_2d(Vec2::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-6);
        assert!((distance_to_segment_2d(Vec2::new(-4.0, 3.0), a, b) - 5.0).abs() < 1e-6);
        assert!((distance_to_segment_2d(Vec2::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        assert!((signed_area_xz(&ccw) - 100.0).abs() < 1e-4);

        let mut cw = ccw;
        cw.reverse();
        assert!((signed_area_xz(&cw) + 100.0).abs() < 1e-4);
    }
}
