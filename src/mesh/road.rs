//! Road ribbon meshes
//!
//! Every road segment becomes an independent quad: two vertices at each end,
//! offset half the road width to either side. UV `u` is 0 on the left edge
//! and 1 on the right edge, looking along the direction of travel. UV `v`
//! follows the distance traveled along the road so a tiling texture runs
//! continuously.

use glam::Vec3;

use super::MeshData;
use crate::road::Road;

/// Build the ribbon mesh for a single road
///
/// Produces `4 * (n - 1)` vertices and `6 * (n - 1)` indices for a road of
/// `n` nodes, or an empty mesh when the road has fewer than two nodes.
/// Segments without horizontal extent collapse into zero-area quads.
pub fn build_road_mesh(road: &Road, width: f32) -> MeshData {
    let mut mesh = MeshData::default();
    if !road.is_drivable() {
        return mesh;
    }

    let half_width = width * 0.5;
    let mut traveled = 0.0;

    for (start, end) in road.segments() {
        let segment_length = start.distance(end);
        let forward = (end - start).normalize_or_zero();
        let left = Vec3::Y.cross(forward).normalize_or_zero() * half_width;

        let base = mesh.positions.len() as u32;
        for corner in [start + left, start - left, end + left, end - left] {
            mesh.positions.push(corner.to_array());
            mesh.normals.push([0.0, 1.0, 0.0]);
        }

        mesh.uvs.push([0.0, traveled]);
        mesh.uvs.push([1.0, traveled]);
        mesh.uvs.push([0.0, traveled + segment_length]);
        mesh.uvs.push([1.0, traveled + segment_length]);
        traveled += segment_length;

        // Counter-clockwise seen from above in a right-handed, Y-up frame
        mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
        mesh.indices.extend_from_slice(&[base + 1, base + 3, base + 2]);
    }

    mesh
}

/// Build and combine the ribbon meshes of every drivable road
///
/// Roads with fewer than two nodes are skipped with a warning.
pub fn build_road_network_mesh(roads: &[Road], width: f32) -> MeshData {
    let mut combined = MeshData::default();

    for road in roads {
        if !road.is_drivable() {
            tracing::warn!(road = %road.name, nodes = road.nodes.len(), "skipping road with fewer than two nodes");
            continue;
        }
        combined.append(&build_road_mesh(road, width));
    }

    combined
}
