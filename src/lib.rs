//! Procedural town layout generation
//!
//! A standalone library that turns hand-authored road polylines into a
//! playable town: road ribbon meshes, an intersection-aware road graph,
//! closed city blocks, roadside buildings and the terrain they stand on.
//! Meshes are plain vertex buffers, suitable for use with any game engine
//! (Bevy, Godot, etc.); collision queries go through the [`PhysicsWorld`]
//! trait, with [`CollisionWorld`] as a ready-made implementation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rust_town_layout::*;
//!
//! let roads = vec![
//!     Road::with_nodes("main", vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(200.0, 0.0, 0.0)]),
//!     Road::with_nodes("cross", vec![Vec3::new(100.0, 0.0, -100.0), Vec3::new(100.0, 0.0, 100.0)]),
//! ];
//! let prefabs = vec![BuildingPrefab::new("house", Vec3::new(8.0, 6.0, 8.0), 1.0)];
//!
//! let config = TownConfigBuilder::new().seed(42).build().unwrap();
//! let mut world = CollisionWorld::new();
//! let town = TownGenerator::new(config).generate(&roads, &prefabs, &mut world);
//!
//! println!(
//!     "{} intersections, {} blocks, {} buildings",
//!     town.graph.intersections().len(),
//!     town.blocks.len(),
//!     town.buildings.len()
//! );
//! ```
//!
//! # Features
//!
//! - `spatial-index` (default): KD-tree lookups of graph nodes near a position
//! - `serde` (default): Serialization of configuration and roads, plus JSON
//!   save files in [`save`]

// Modules
pub mod error;
pub mod config;
pub mod geometry;
pub mod road;
pub mod generation;
pub mod mesh;
pub mod terrain;
pub mod placement;
pub mod grid;
pub mod goals;
pub mod town;

#[cfg(feature = "serde")]
pub mod save;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{Result, TownError};
pub use config::{TownConfig, TownConfigBuilder, DEFAULT_ROAD_WIDTH};
pub use geometry::DEFAULT_TOLERANCE;
pub use road::{Road, RoadSample};
pub use generation::{
    find_city_blocks, find_city_blocks_with_stats, find_road_intersections, BlockOptions, BlockStats,
    CityBlock, EdgeId, GraphEdge, GraphNode, NodeId, RoadGraph,
};
pub use mesh::{
    build_road_mesh, build_road_network_mesh, build_terrain_mesh, ColorMapper, HeightGradient, MeshData,
    TerrainColor,
};
pub use terrain::{AreaBounds, Footprint, Heightmap, NoiseConfig, TerrainConfig};
pub use placement::{
    BuildingPrefab, BuildingRecord, CollisionWorld, ColliderHandle, LayerMask, PhysicsWorld, PlacedBuilding,
    PlacementConfig, PlacementReport, RayHit,
};
pub use grid::{generate_grid_city, GridCity, GridCityConfig, GridLot};
pub use goals::{choose_goal_positions, Goal, GoalConfig, GoalEvent, GoalTracker};
pub use town::{GeneratedTown, GenerationEvent, GenerationPass, GenerationPhase, TownGenerator};

#[cfg(feature = "serde")]
pub use save::CityData;

#[cfg(feature = "spatial-index")]
pub use spatial::SpatialIndex;
#[cfg(feature = "spatial-index")]
pub use goals::snap_to_graph;

pub use glam::{Quat, Vec2, Vec3};
