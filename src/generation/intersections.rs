//! Pairwise road segment intersection
//!
//! Every segment of every road is pooled and tested against every other one,
//! which is O(S²) in the number of segments. That is fine for town-sized
//! inputs (tens to a few hundred segments) but dominates larger networks.

use glam::Vec3;

use crate::geometry::{flat, segment_intersection_2d};
use crate::road::Road;

/// One straight piece of a road
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadSegment {
    /// Index of the owning road in the input slice
    pub road: usize,
    pub start: Vec3,
    pub end: Vec3,
}

/// Flatten all roads into a single list of segments
///
/// Roads with fewer than two nodes contribute nothing.
pub fn collect_segments(roads: &[Road]) -> Vec<RoadSegment> {
    roads
        .iter()
        .enumerate()
        .flat_map(|(road, r)| {
            r.segments().map(move |(start, end)| RoadSegment { road, start, end })
        })
        .collect()
}

/// Find every crossing between pooled segments
///
/// Segments are compared in the XZ plane; the height of a crossing is the
/// mean height of the four endpoints involved. Segments that merely share an
/// endpoint report that endpoint, which later collapses into the existing
/// graph node.
pub fn find_intersections(segments: &[RoadSegment]) -> Vec<Vec3> {
    let mut points = Vec::new();

    for (i, a) in segments.iter().enumerate() {
        for b in &segments[i + 1..] {
            let Some(hit) =
                segment_intersection_2d(flat(a.start), flat(a.end), flat(b.start), flat(b.end))
            else {
                continue;
            };

            let height = (a.start.y + a.end.y + b.start.y + b.end.y) / 4.0;
            points.push(Vec3::new(hit.x, height, hit.y));
        }
    }

    points
}

/// Convenience wrapper: collect the segments of `roads` and intersect them
pub fn find_road_intersections(roads: &[Road]) -> Vec<Vec3> {
    find_intersections(&collect_segments(roads))
}
