//! Mesh generation for roads and terrain
//!
//! Generates engine-agnostic mesh data that doubles as render and collision
//! geometry.

mod colors;
mod road;
mod terrain;

pub use colors::{ColorMapper, HeightGradient, TerrainColor};
pub use road::{build_road_mesh, build_road_network_mesh};
pub use terrain::build_terrain_mesh;

use glam::Vec3;

/// Color used for vertices of meshes appended without colors
const DEFAULT_VERTEX_COLOR: TerrainColor = [1.0, 1.0, 1.0, 1.0];

/// Engine-agnostic mesh data output
///
/// Contains raw vertex data suitable for any rendering engine:
/// - Bevy: Convert to `Mesh` with attributes
/// - Godot: Convert to `ArrayMesh`
/// - wgpu: Use directly as vertex buffers
///
/// `colors` is either empty or holds one entry per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions (3D coordinates)
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates
    pub uvs: Vec<[f32; 2]>,
    /// Optional vertex colors (RGBA)
    pub colors: Vec<[f32; 4]>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether every vertex carries a color
    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty() && self.colors.len() == self.positions.len()
    }

    /// Append another mesh, offsetting its indices
    ///
    /// Vertices are never welded. If only one side has colors the other
    /// side's vertices are filled with white.
    pub fn append(&mut self, other: &MeshData) {
        let base = self.positions.len() as u32;
        let keep_colors = self.has_colors() || other.has_colors();

        if keep_colors && !self.has_colors() {
            self.colors = vec![DEFAULT_VERTEX_COLOR; self.positions.len()];
        }

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.uvs.extend_from_slice(&other.uvs);
        self.indices.extend(other.indices.iter().map(|i| i + base));

        if keep_colors {
            if other.has_colors() {
                self.colors.extend_from_slice(&other.colors);
            } else {
                self.colors
                    .extend(std::iter::repeat(DEFAULT_VERTEX_COLOR).take(other.positions.len()));
            }
        }
    }

    /// Iterate over triangles as world-space corner triples
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                Vec3::from(self.positions[tri[0] as usize]),
                Vec3::from(self.positions[tri[1] as usize]),
                Vec3::from(self.positions[tri[2] as usize]),
            ]
        })
    }
}
