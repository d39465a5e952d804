//! Terrain grid mesh

use glam::Vec3;

use super::{ColorMapper, MeshData};
use crate::terrain::Heightmap;

/// Triangulate a heightmap into a regular grid mesh
///
/// One vertex per sample (`width * depth`) and two triangles per grid cell.
/// Normals come from central differences, UVs span `[0, 1]` over the grid, and
/// vertex colors map `height / terrain_height` through `mapper`. Grids with
/// fewer than two samples along either axis produce an empty mesh.
pub fn build_terrain_mesh<C: ColorMapper>(
    heightmap: &Heightmap,
    terrain_height: f32,
    mapper: &C,
) -> MeshData {
    let mut mesh = MeshData::default();
    let (width, depth) = (heightmap.width(), heightmap.depth());
    if width < 2 || depth < 2 {
        return mesh;
    }

    let vertex_count = width * depth;
    mesh.positions.reserve(vertex_count);
    mesh.normals.reserve(vertex_count);
    mesh.uvs.reserve(vertex_count);
    mesh.colors.reserve(vertex_count);
    mesh.indices.reserve(6 * (width - 1) * (depth - 1));

    let height = |x: usize, z: usize| heightmap.get(x, z).unwrap_or(0.0);
    let cell = heightmap.cell_size();

    for z in 0..depth {
        for x in 0..width {
            let position = heightmap.sample_position(x, z);
            mesh.positions.push(position.to_array());

            let (x0, x1) = (x.saturating_sub(1), (x + 1).min(width - 1));
            let (z0, z1) = (z.saturating_sub(1), (z + 1).min(depth - 1));
            let slope_x = (height(x1, z) - height(x0, z)) / ((x1 - x0) as f32 * cell);
            let slope_z = (height(x, z1) - height(x, z0)) / ((z1 - z0) as f32 * cell);
            let normal = Vec3::new(-slope_x, 1.0, -slope_z).normalize();
            mesh.normals.push(normal.to_array());

            mesh.uvs.push([
                x as f32 / (width - 1) as f32,
                z as f32 / (depth - 1) as f32,
            ]);

            let normalized = if terrain_height > 0.0 {
                (position.y / terrain_height).clamp(0.0, 1.0)
            } else {
                0.0
            };
            mesh.colors.push(mapper.map_color(normalized));
        }
    }

    for z in 0..depth - 1 {
        for x in 0..width - 1 {
            let v00 = (z * width + x) as u32;
            let v10 = v00 + 1;
            let v01 = v00 + width as u32;
            let v11 = v01 + 1;
            mesh.indices.extend_from_slice(&[v00, v01, v10]);
            mesh.indices.extend_from_slice(&[v10, v01, v11]);
        }
    }

    mesh
}
