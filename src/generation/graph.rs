//! Planar road graph construction
//!
//! Builds a node/edge graph from raw road polylines: road nodes and segment
//! crossings become deduplicated graph nodes, and every road segment is split
//! at each node lying on it so that no edge passes through another node.

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::intersections::find_road_intersections;
use crate::geometry::{point_on_segment_2d, PositionMap, DEFAULT_TOLERANCE};
use crate::road::Road;

#[cfg(feature = "spatial-index")]
use crate::spatial::SpatialIndex;

/// Index of a node in a [`RoadGraph`]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of an edge in a [`RoadGraph`]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// A road endpoint or crossing
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub position: Vec3,
    /// Edges incident to this node, in creation order
    pub edges: Vec<EdgeId>,
}

/// A straight connection between two nodes with no other node on it
///
/// Edges are undirected; `start`/`end` only record creation order.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub start: NodeId,
    pub end: NodeId,
    /// Euclidean distance between the endpoints
    pub length: f32,
}

impl GraphEdge {
    /// The endpoint opposite `node`, or `None` if `node` is not on this edge
    #[inline]
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.start {
            Some(self.end)
        } else if node == self.end {
            Some(self.start)
        } else {
            None
        }
    }

    /// Whether this edge joins `a` and `b` in either direction
    #[inline]
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.start == a && self.end == b) || (self.start == b && self.end == a)
    }
}

/// Road network graph rebuilt from scratch on every [`RoadGraph::build`]
///
/// # Example
///
/// ```
/// use rust_town_layout::*;
///
/// let roads = vec![
///     Road::with_nodes("east-west", vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0)]),
///     Road::with_nodes("north-south", vec![Vec3::new(5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, 5.0)]),
/// ];
///
/// let graph = RoadGraph::build(&roads, DEFAULT_TOLERANCE);
/// assert_eq!(graph.node_count(), 5);
/// assert_eq!(graph.edge_count(), 4);
/// ```
#[derive(Clone)]
pub struct RoadGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    intersections: Vec<Vec3>,
    lookup: PositionMap<NodeId>,

    #[cfg(feature = "spatial-index")]
    spatial_index: Option<SpatialIndex>,
}

impl RoadGraph {
    /// Build the graph for a set of roads
    ///
    /// Positions closer than `tolerance` on every axis collapse into one node.
    /// The result depends only on the input order, never on earlier builds.
    pub fn build(roads: &[Road], tolerance: f32) -> Self {
        let intersections = find_road_intersections(roads);

        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            intersections,
            lookup: PositionMap::new(tolerance),
            #[cfg(feature = "spatial-index")]
            spatial_index: None,
        };

        // Road nodes first so their positions win over nearby crossings
        let candidates: Vec<Vec3> = roads
            .iter()
            .flat_map(|road| road.nodes.iter().copied())
            .chain(graph.intersections.iter().copied())
            .collect();
        for position in candidates {
            graph.insert_node(position);
        }

        for road in roads {
            for (start, end) in road.segments() {
                graph.split_segment(start, end, tolerance);
            }
        }

        #[cfg(feature = "spatial-index")]
        {
            if !graph.nodes.is_empty() {
                let positions: Vec<Vec3> = graph.nodes.iter().map(|n| n.position).collect();
                graph.spatial_index = Some(SpatialIndex::new(&positions));
            }
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            intersections = graph.intersections.len(),
            "built road graph"
        );

        graph
    }

    fn insert_node(&mut self, position: Vec3) -> NodeId {
        let next = NodeId(self.nodes.len());
        let (&id, inserted) = self.lookup.get_or_insert_with(position, || next);
        if inserted {
            self.nodes.push(GraphNode {
                id,
                position,
                edges: Vec::new(),
            });
        }
        id
    }

    /// Create the edges covering one road segment
    fn split_segment(&mut self, start: Vec3, end: Vec3, tolerance: f32) {
        let (Some(&start_id), Some(&end_id)) = (self.lookup.get(start), self.lookup.get(end))
        else {
            return;
        };

        let mut on_segment: Vec<NodeId> = vec![start_id, end_id];
        on_segment.extend(
            self.nodes
                .iter()
                .filter(|node| node.id != start_id && node.id != end_id)
                .filter(|node| point_on_segment_2d(node.position, start, end, tolerance))
                .map(|node| node.id),
        );

        on_segment.sort_by(|a, b| {
            let da = start.distance(self.nodes[a.0].position);
            let db = start.distance(self.nodes[b.0].position);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });

        for pair in on_segment.windows(2) {
            self.connect(pair[0], pair[1]);
        }
    }

    /// Add an edge unless the pair is already connected or degenerate
    fn connect(&mut self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        if a == b || self.edge_between(a, b).is_some() {
            return None;
        }

        let id = EdgeId(self.edges.len());
        let length = self.nodes[a.0].position.distance(self.nodes[b.0].position);
        self.edges.push(GraphEdge {
            id,
            start: a,
            end: b,
            length,
        });
        self.nodes[a.0].edges.push(id);
        self.nodes[b.0].edges.push(id);
        Some(id)
    }

    /// All nodes, indexed by [`NodeId`]
    #[inline]
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// All edges, indexed by [`EdgeId`]
    #[inline]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(id.0)
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if the graph has no edges
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Raw crossing points found while building (before deduplication)
    #[inline]
    pub fn intersections(&self) -> &[Vec3] {
        &self.intersections
    }

    /// Tolerance the graph was built with
    #[inline]
    pub fn tolerance(&self) -> f32 {
        self.lookup.tolerance()
    }

    /// Node within tolerance of `position`, if any
    pub fn find_node(&self, position: Vec3) -> Option<NodeId> {
        self.lookup.get(position).copied()
    }

    /// Edge joining `a` and `b`, found by scanning `a`'s incident edges
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.node(a)?
            .edges
            .iter()
            .copied()
            .find(|&edge| self.edges[edge.0].connects(a, b))
    }

    /// Endpoint of `edge` opposite `node`
    pub fn other_end(&self, edge: EdgeId, node: NodeId) -> Option<NodeId> {
        self.edge(edge)?.other(node)
    }

    /// Number of edges incident to `node` (0 for unknown ids)
    pub fn degree(&self, node: NodeId) -> usize {
        self.node(node).map(|n| n.edges.len()).unwrap_or(0)
    }

    /// Nodes adjacent to `node`
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(node)
            .into_iter()
            .flat_map(move |n| n.edges.iter().map(move |&e| self.edges[e.0].other(node)))
            .flatten()
    }

    /// Sum of all edge lengths
    pub fn total_length(&self) -> f32 {
        self.edges.iter().map(|e| e.length).sum()
    }

    /// Nearest node to an arbitrary position (requires spatial-index feature)
    ///
    /// Useful for snapping clicks, goals or vehicles onto the network.
    /// Returns `None` for an empty graph.
    #[cfg(feature = "spatial-index")]
    pub fn find_nearest_node(&self, position: Vec3) -> Option<NodeId> {
        self.spatial_index
            .as_ref()
            .map(|index| NodeId(index.find_nearest(position)))
    }

    /// Nearest node no farther than `max_distance` in XZ
    #[cfg(feature = "spatial-index")]
    pub fn snap_to_node(&self, position: Vec3, max_distance: f32) -> Option<NodeId> {
        let index = self.spatial_index.as_ref()?;
        index
            .nearest_within(position, max_distance)
            .map(|(item, _)| NodeId(item))
    }
}

impl Default for RoadGraph {
    fn default() -> Self {
        Self::build(&[], DEFAULT_TOLERANCE)
    }
}

impl std::fmt::Debug for RoadGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("intersections", &self.intersections.len())
            .field("tolerance", &self.lookup.tolerance())
            .finish()
    }
}
