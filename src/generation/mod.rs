//! Road network analysis
//!
//! Turns raw road polylines into a planar graph and traces the city blocks
//! enclosed by it.

mod blocks;
mod graph;
mod intersections;

pub use blocks::{find_city_blocks, find_city_blocks_with_stats, BlockOptions, BlockStats, CityBlock};
pub use graph::{EdgeId, GraphEdge, GraphNode, NodeId, RoadGraph};
pub use intersections::{collect_segments, find_intersections, find_road_intersections, RoadSegment};
