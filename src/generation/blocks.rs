//! City block extraction by planar face tracing
//!
//! Each graph edge is split into two half-edges, one per direction. Starting
//! from every half-edge not yet consumed, the tracer repeatedly takes the
//! rightmost turn at the next node until it comes back to the starting
//! half-edge. In a planar straight-line graph this walks exactly one face, so
//! tracking consumption per direction lets both faces bordering an edge be
//! found (including the outer boundary, which is filtered out by default).

use std::f32::consts::TAU;

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::graph::{EdgeId, NodeId, RoadGraph};
use crate::geometry::{flat, signed_area_xz};

/// Options for block extraction
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockOptions {
    /// Maximum number of steps for a single trace before it is abandoned
    pub max_iterations: usize,
    /// Keep the counter-clockwise outer boundary of each connected component
    pub include_outer_boundary: bool,
    /// Faces with an absolute area below this are dropped
    pub min_area: f32,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            include_outer_boundary: false,
            min_area: 1e-3,
        }
    }
}

/// A closed polygon traced through the road graph
///
/// Interior blocks are wound clockwise in the XZ plane; the first vertex is
/// not repeated at the end.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CityBlock {
    pub vertices: Vec<Vec3>,
}

impl CityBlock {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        Self { vertices }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Signed XZ area (negative for clockwise blocks)
    pub fn signed_area(&self) -> f32 {
        signed_area_xz(&self.vertices)
    }

    /// Unsigned XZ area
    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Average of the polygon's vertices
    pub fn centroid(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        self.vertices.iter().copied().sum::<Vec3>() / self.vertices.len() as f32
    }

    /// Length of the closed boundary
    pub fn perimeter(&self) -> f32 {
        let n = self.vertices.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.vertices[i].distance(self.vertices[(i + 1) % n]))
            .sum()
    }

    /// Even-odd point-in-polygon test in the XZ plane
    pub fn contains_point(&self, point: Vec3) -> bool {
        let p = flat(point);
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let a = flat(self.vertices[i]);
            let b = flat(self.vertices[j]);
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Counters describing how each trace ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Traces started
    pub traces: usize,
    /// Traces that returned to their starting half-edge
    pub closed: usize,
    /// Closed traces dropped as outer boundaries
    pub outer_boundaries: usize,
    /// Closed traces dropped for being smaller than `min_area`
    pub degenerate: usize,
    /// Traces that reached a node with no way forward
    pub dead_ends: usize,
    /// Traces that ran into a half-edge consumed by an earlier trace
    pub collisions: usize,
    /// Traces stopped by the iteration cap
    pub exhausted: usize,
}

/// An edge walked in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HalfEdge {
    edge: EdgeId,
    /// True when walking from the edge's `start` to its `end`
    forward: bool,
}

impl HalfEdge {
    #[inline]
    fn slot(self) -> usize {
        self.edge.0 * 2 + usize::from(!self.forward)
    }

    fn endpoints(self, graph: &RoadGraph) -> (NodeId, NodeId) {
        let edge = &graph.edges()[self.edge.0];
        if self.forward {
            (edge.start, edge.end)
        } else {
            (edge.end, edge.start)
        }
    }
}

enum Trace {
    Closed(Vec<Vec3>),
    DeadEnd,
    Collided,
    Exhausted,
}

/// Extract city blocks from a built graph
///
/// # Example
///
/// ```
/// use rust_town_layout::*;
///
/// let square = Road::with_nodes(
///     "ring",
///     vec![
///         Vec3::new(0.0, 0.0, 0.0),
///         Vec3::new(20.0, 0.0, 0.0),
///         Vec3::new(20.0, 0.0, 20.0),
///         Vec3::new(0.0, 0.0, 20.0),
///         Vec3::new(0.0, 0.0, 0.0),
///     ],
/// );
/// let graph = RoadGraph::build(&[square], DEFAULT_TOLERANCE);
/// let blocks = find_city_blocks(&graph, &BlockOptions::default());
/// assert_eq!(blocks.len(), 1);
/// assert!((blocks[0].area() - 400.0).abs() < 1e-3);
/// ```
pub fn find_city_blocks(graph: &RoadGraph, options: &BlockOptions) -> Vec<CityBlock> {
    find_city_blocks_with_stats(graph, options).0
}

/// Extract city blocks and report how every trace ended
pub fn find_city_blocks_with_stats(
    graph: &RoadGraph,
    options: &BlockOptions,
) -> (Vec<CityBlock>, BlockStats) {
    let mut blocks = Vec::new();
    let mut stats = BlockStats::default();

    if graph.is_empty() {
        tracing::warn!("road graph is empty, no city blocks to extract");
        return (blocks, stats);
    }

    let mut consumed = vec![false; graph.edge_count() * 2];

    for edge in graph.edges() {
        for forward in [true, false] {
            let seed = HalfEdge {
                edge: edge.id,
                forward,
            };
            if consumed[seed.slot()] {
                continue;
            }

            stats.traces += 1;
            match trace_face(graph, seed, &mut consumed, options.max_iterations) {
                Trace::Closed(vertices) => {
                    stats.closed += 1;
                    let block = CityBlock::new(vertices);
                    let area = block.signed_area();
                    if area.abs() < options.min_area {
                        stats.degenerate += 1;
                    } else if area > 0.0 && !options.include_outer_boundary {
                        stats.outer_boundaries += 1;
                    } else {
                        blocks.push(block);
                    }
                }
                Trace::DeadEnd => stats.dead_ends += 1,
                Trace::Collided => stats.collisions += 1,
                Trace::Exhausted => {
                    tracing::debug!(edge = edge.id.0, forward, "block trace hit the iteration cap");
                    stats.exhausted += 1;
                }
            }
        }
    }

    tracing::debug!(
        blocks = blocks.len(),
        traces = stats.traces,
        dead_ends = stats.dead_ends,
        exhausted = stats.exhausted,
        "extracted city blocks"
    );

    (blocks, stats)
}

/// Walk one face starting from `seed`
fn trace_face(
    graph: &RoadGraph,
    seed: HalfEdge,
    consumed: &mut [bool],
    max_iterations: usize,
) -> Trace {
    let mut polygon = Vec::new();
    let mut current = seed;

    for _ in 0..max_iterations {
        let (from, _) = current.endpoints(graph);
        polygon.push(graph.nodes()[from.0].position);
        consumed[current.slot()] = true;

        let Some(next) = rightmost_turn(graph, current) else {
            return Trace::DeadEnd;
        };
        if next == seed {
            return Trace::Closed(polygon);
        }
        if consumed[next.slot()] {
            return Trace::Collided;
        }
        current = next;
    }

    Trace::Exhausted
}

/// Pick the outgoing half-edge making the sharpest right turn after `incoming`
///
/// Angles are measured counter-clockwise in XZ from the direction pointing
/// back along `incoming`; the smallest one is the rightmost turn. The edge
/// just traversed is never taken, so a node of degree one is a dead end.
fn rightmost_turn(graph: &RoadGraph, incoming: HalfEdge) -> Option<HalfEdge> {
    let (from, pivot) = incoming.endpoints(graph);
    let pivot_node = &graph.nodes()[pivot.0];
    let origin = flat(pivot_node.position);
    let back = flat(graph.nodes()[from.0].position) - origin;
    let back_angle = back.y.atan2(back.x);

    pivot_node
        .edges
        .iter()
        .copied()
        .filter(|&edge| edge != incoming.edge)
        .filter_map(|edge| {
            let candidate = &graph.edges()[edge.0];
            let target = candidate.other(pivot)?;
            let out = flat(graph.nodes()[target.0].position) - origin;
            let angle = (out.y.atan2(out.x) - back_angle).rem_euclid(TAU);
            let half_edge = HalfEdge {
                edge,
                forward: candidate.start == pivot,
            };
            Some((half_edge, angle))
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(half_edge, _)| half_edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::DEFAULT_TOLERANCE;
    use crate::road::Road;

    fn line(name: &str, a: [f32; 2], b: [f32; 2]) -> Road {
        Road::with_nodes(
            name,
            vec![Vec3::new(a[0], 0.0, a[1]), Vec3::new(b[0], 0.0, b[1])],
        )
    }

    /// Three horizontal and three vertical roads forming four 10x10 blocks
    fn two_by_two_grid() -> Vec<Road> {
        let mut roads = Vec::new();
        for i in 0..3 {
            let c = i as f32 * 10.0;
            roads.push(line("h", [0.0, c], [20.0, c]));
            roads.push(line("v", [c, 0.0], [c, 20.0]));
        }
        roads
    }

    #[test]
    fn test_grid_yields_four_blocks() {
        let graph = RoadGraph::build(&two_by_two_grid(), DEFAULT_TOLERANCE);
        assert_eq!(graph.node_count(), 9);
        assert_eq!(graph.edge_count(), 12);

        let (blocks, stats) = find_city_blocks_with_stats(&graph, &BlockOptions::default());
        assert_eq!(blocks.len(), 4);
        assert_eq!(stats.closed, 5);
        assert_eq!(stats.outer_boundaries, 1);
        for block in &blocks {
            assert_eq!(block.vertex_count(), 4);
            assert!(block.is_clockwise());
            assert!((block.area() - 100.0).abs() < 1e-3);
            assert!((block.perimeter() - 40.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_every_half_edge_is_used_once() {
        let graph = RoadGraph::build(&two_by_two_grid(), DEFAULT_TOLERANCE);
        let options = BlockOptions {
            include_outer_boundary: true,
            ..Default::default()
        };
        let blocks = find_city_blocks(&graph, &options);
        assert_eq!(blocks.len(), 5);

        let used: usize = blocks.iter().map(|b| b.vertex_count()).sum();
        assert_eq!(used, graph.edge_count() * 2);

        let outer: Vec<_> = blocks.iter().filter(|b| !b.is_clockwise()).collect();
        assert_eq!(outer.len(), 1);
        assert!((outer[0].area() - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_block_centroids_are_inside() {
        let graph = RoadGraph::build(&two_by_two_grid(), DEFAULT_TOLERANCE);
        let blocks = find_city_blocks(&graph, &BlockOptions::default());
        let mut centers: Vec<(i32, i32)> = blocks
            .iter()
            .map(|b| {
                let c = b.centroid();
                assert!(b.contains_point(c));
                (c.x.round() as i32, c.z.round() as i32)
            })
            .collect();
        centers.sort();
        assert_eq!(centers, vec![(5, 5), (5, 15), (15, 5), (15, 15)]);
    }

    #[test]
    fn test_dangling_spur_does_not_hide_block() {
        let mut roads = vec![
            line("s", [0.0, 0.0], [10.0, 0.0]),
            line("e", [10.0, 0.0], [10.0, 10.0]),
            line("n", [10.0, 10.0], [0.0, 10.0]),
            line("w", [0.0, 10.0], [0.0, 0.0]),
        ];
        roads.push(line("spur", [10.0, 0.0], [25.0, 0.0]));
        let graph = RoadGraph::build(&roads, DEFAULT_TOLERANCE);

        let (blocks, stats) = find_city_blocks_with_stats(&graph, &BlockOptions::default());
        assert_eq!(blocks.len(), 1);
        assert!((blocks[0].area() - 100.0).abs() < 1e-3);
        assert!(stats.dead_ends >= 1);
    }

    #[test]
    fn test_tree_has_no_blocks() {
        let roads = vec![
            line("a", [-10.0, 0.0], [10.0, 0.0]),
            line("b", [0.0, -10.0], [0.0, 10.0]),
        ];
        let graph = RoadGraph::build(&roads, DEFAULT_TOLERANCE);
        let (blocks, stats) = find_city_blocks_with_stats(&graph, &BlockOptions::default());
        assert!(blocks.is_empty());
        assert_eq!(stats.closed, 0);
        assert_eq!(stats.traces, stats.dead_ends + stats.collisions);
    }

    #[test]
    fn test_iteration_cap_abandons_trace() {
        let roads = vec![
            line("s", [0.0, 0.0], [10.0, 0.0]),
            line("e", [10.0, 0.0], [10.0, 10.0]),
            line("n", [10.0, 10.0], [0.0, 10.0]),
            line("w", [0.0, 10.0], [0.0, 0.0]),
        ];
        let graph = RoadGraph::build(&roads, DEFAULT_TOLERANCE);
        let options = BlockOptions {
            max_iterations: 2,
            ..Default::default()
        };
        let (blocks, stats) = find_city_blocks_with_stats(&graph, &options);
        assert!(blocks.is_empty());
        assert!(stats.exhausted > 0);
    }

    #[test]
    fn test_empty_graph() {
        let graph = RoadGraph::build(&[], DEFAULT_TOLERANCE);
        assert!(find_city_blocks(&graph, &BlockOptions::default()).is_empty());
    }

    #[test]
    fn test_contains_point() {
        let block = CityBlock::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        ]);
        assert!(block.contains_point(Vec3::new(5.0, 3.0, 5.0)));
        assert!(!block.contains_point(Vec3::new(15.0, 0.0, 5.0)));
        assert!(block.is_clockwise());
    }
}
