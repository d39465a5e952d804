//! Heightmap terrain around the town
//!
//! Elevations come from fractal value noise and fade to zero towards the
//! border of the grid. Building footprints are levelled and road corridors are
//! smoothed before the grid is meshed by [`crate::mesh::build_terrain_mesh`].

mod heightmap;
mod noise;

pub use heightmap::Heightmap;
pub use noise::{sample_fbm, value_noise_2d, NoiseConfig};

use glam::{Quat, Vec2, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TownError};
use crate::geometry::{distance_to_segment_2d, flat};
use crate::mesh::HeightGradient;
use crate::road::Road;

/// Configuration for terrain generation
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainConfig {
    /// Seed for the noise lattice
    pub seed: u32,
    /// Fractal noise parameters
    pub noise: NoiseConfig,
    /// Height of a noise value of 1.0
    pub terrain_height: f32,
    /// Spacing between height samples
    pub cell_size: f32,
    /// Distance the grid extends past the town bounds
    pub margin: f32,
    /// Width of the band along the grid border that fades to height zero
    pub flat_margin: f32,
    /// Number of 3x3 averaging passes applied along roads
    pub road_smoothing_passes: usize,
    /// Height-to-color gradient of the terrain mesh
    pub gradient: HeightGradient,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            noise: NoiseConfig::default(),
            terrain_height: 12.0,
            cell_size: 2.0,
            margin: 40.0,
            flat_margin: 20.0,
            road_smoothing_passes: 3,
            gradient: HeightGradient::default(),
        }
    }
}

impl TerrainConfig {
    /// Check that the parameters describe a buildable grid
    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size > 0.0) {
            return Err(TownError::InvalidConfig(format!(
                "terrain cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if !(self.terrain_height >= 0.0) {
            return Err(TownError::InvalidConfig(format!(
                "terrain_height must be non-negative, got {}",
                self.terrain_height
            )));
        }
        if self.margin < 0.0 || self.flat_margin < 0.0 {
            return Err(TownError::InvalidConfig(
                "terrain margins must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Axis-aligned rectangle in the XZ plane
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl AreaBounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Smallest rectangle holding every point, `None` when there are none
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |bounds, point| {
            let p = flat(point);
            Some(match bounds {
                None => Self { min: p, max: p },
                Some(b) => Self {
                    min: b.min.min(p),
                    max: b.max.max(p),
                },
            })
        })
    }

    /// Bounds of every node of every road
    pub fn from_roads(roads: &[Road]) -> Option<Self> {
        Self::from_points(roads.iter().flat_map(|road| road.nodes.iter().copied()))
    }

    /// Grow the rectangle by `amount` on every side
    pub fn expanded(&self, amount: f32) -> Self {
        Self::new(self.min - Vec2::splat(amount), self.max + Vec2::splat(amount))
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

/// Rotated rectangle on the ground that should be level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    /// Center in world XZ
    pub center: Vec2,
    /// Half the size along the local X and Z axes
    pub half_extents: Vec2,
    /// Rotation around +Y in radians
    pub yaw: f32,
}

impl Footprint {
    pub fn new(center: Vec2, half_extents: Vec2, yaw: f32) -> Self {
        Self {
            center,
            half_extents,
            yaw,
        }
    }

    /// Footprint of a box of `size` placed at `position` with `rotation`
    ///
    /// Only the yaw of the rotation is kept.
    pub fn from_transform(position: Vec3, rotation: Quat, size: Vec3) -> Self {
        let forward = rotation * Vec3::Z;
        let yaw = forward.x.atan2(forward.z);
        Self::new(flat(position), Vec2::new(size.x, size.z) * 0.5, yaw)
    }

    /// Local X and Z axes of the footprint in world XZ
    fn axes(&self) -> (Vec2, Vec2) {
        let (sin, cos) = self.yaw.sin_cos();
        // Matches Quat::from_rotation_y: local X -> (cos, -sin), local Z -> (sin, cos)
        (Vec2::new(cos, -sin), Vec2::new(sin, cos))
    }

    /// The four corners in world XZ
    pub fn corners(&self) -> [Vec2; 4] {
        let (ax, az) = self.axes();
        let dx = ax * self.half_extents.x;
        let dz = az * self.half_extents.y;
        [
            self.center - dx - dz,
            self.center + dx - dz,
            self.center + dx + dz,
            self.center - dx + dz,
        ]
    }

    /// Whether a world XZ point lies inside the rectangle
    pub fn contains(&self, point: Vec2) -> bool {
        let (ax, az) = self.axes();
        let local = point - self.center;
        local.dot(ax).abs() <= self.half_extents.x && local.dot(az).abs() <= self.half_extents.y
    }

    /// Radius of the circle enclosing the rectangle
    fn bounding_radius(&self) -> f32 {
        self.half_extents.length()
    }
}

/// Generate the base heightmap covering `bounds` grown by `config.margin`
///
/// Each sample is `fbm * terrain_height`, multiplied by a smooth fade that
/// reaches zero at the grid border over `flat_margin` world units. An invalid
/// config logs a warning and yields an empty heightmap.
pub fn generate_heightmap(bounds: &AreaBounds, config: &TerrainConfig) -> Heightmap {
    if let Err(err) = config.validate() {
        tracing::warn!(%err, "terrain config rejected, no terrain generated");
        return Heightmap::new(0, 0, 1.0, bounds.min);
    }

    let area = bounds.expanded(config.margin);
    let size = area.size();
    let width = ((size.x / config.cell_size).ceil() as usize + 1).max(2);
    let depth = ((size.y / config.cell_size).ceil() as usize + 1).max(2);

    let mut heightmap = Heightmap::new(width, depth, config.cell_size, area.min);
    let extent = heightmap.extent();

    for z in 0..depth {
        for x in 0..width {
            let pos = heightmap.cell_center(x, z);
            let noise = sample_fbm(pos.x, pos.y, config.seed, &config.noise);

            let local = pos - area.min;
            let edge_distance = local.x.min(local.y).min(extent.x - local.x).min(extent.y - local.y);
            let fade = border_fade(edge_distance, config.flat_margin);

            heightmap.set(x, z, noise * config.terrain_height * fade);
        }
    }

    tracing::debug!(width, depth, "generated heightmap");
    heightmap
}

/// Smoothstep from 0 at the border to 1 at `flat_margin` inside it
fn border_fade(edge_distance: f32, flat_margin: f32) -> f32 {
    if flat_margin <= 0.0 {
        return 1.0;
    }
    let t = (edge_distance / flat_margin).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Level the ground under each footprint
///
/// The level of a footprint is the average terrain height at its four
/// corners; every sample inside the footprint is set to that level. Returns
/// the level of each footprint in order.
pub fn flatten_footprints(heightmap: &mut Heightmap, footprints: &[Footprint]) -> Vec<f32> {
    let mut levels = Vec::with_capacity(footprints.len());

    for footprint in footprints {
        let corners = footprint.corners();
        let level = corners
            .iter()
            .map(|c| heightmap.height_at(c.x, c.y))
            .sum::<f32>()
            / 4.0;

        for (x, z) in samples_near(heightmap, footprint.center, footprint.bounding_radius()) {
            if footprint.contains(heightmap.cell_center(x, z)) {
                heightmap.set(x, z, level);
            }
        }
        levels.push(level);
    }

    levels
}

/// Smooth the terrain under roads with a 3x3 box filter
///
/// Samples within half a road width of any road segment are replaced by the
/// average of their in-grid 3x3 neighbourhood, `passes` times. Roads with
/// fewer than two nodes do not mark anything.
pub fn smooth_roads(heightmap: &mut Heightmap, roads: &[Road], road_width: f32, passes: usize) {
    if passes == 0 || heightmap.is_empty() {
        return;
    }

    let half_width = road_width * 0.5;
    let mut marked = vec![false; heightmap.width() * heightmap.depth()];
    let mut marked_count = 0;

    for (start, end) in roads.iter().flat_map(|road| road.segments()) {
        let (a, b) = (flat(start), flat(end));
        let center = (a + b) * 0.5;
        let reach = a.distance(b) * 0.5 + half_width;
        for (x, z) in samples_near(heightmap, center, reach) {
            let slot = z * heightmap.width() + x;
            if !marked[slot] && distance_to_segment_2d(heightmap.cell_center(x, z), a, b) <= half_width {
                marked[slot] = true;
                marked_count += 1;
            }
        }
    }

    if marked_count == 0 {
        return;
    }

    let (width, depth) = (heightmap.width(), heightmap.depth());
    for _ in 0..passes {
        let source = heightmap.clone();
        for z in 0..depth {
            for x in 0..width {
                if !marked[z * width + x] {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0;
                for nz in z.saturating_sub(1)..=(z + 1).min(depth - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        if let Some(h) = source.get(nx, nz) {
                            sum += h;
                            count += 1;
                        }
                    }
                }
                heightmap.set(x, z, sum / count as f32);
            }
        }
    }

    tracing::debug!(samples = marked_count, passes, "smoothed road corridors");
}

/// Grid samples inside the square of half-size `radius` around `center`
fn samples_near(heightmap: &Heightmap, center: Vec2, radius: f32) -> Vec<(usize, usize)> {
    if heightmap.is_empty() || heightmap.cell_size() <= 0.0 {
        return Vec::new();
    }
    let to_grid = |v: f32, origin: f32| (v - origin) / heightmap.cell_size();
    let origin = heightmap.origin();
    let max_x = heightmap.width() as f32 - 1.0;
    let max_z = heightmap.depth() as f32 - 1.0;

    let lo_x = to_grid(center.x - radius, origin.x).floor().max(0.0);
    let hi_x = to_grid(center.x + radius, origin.x).ceil().min(max_x);
    let lo_z = to_grid(center.y - radius, origin.y).floor().max(0.0);
    let hi_z = to_grid(center.y + radius, origin.y).ceil().min(max_z);
    if lo_x > hi_x || lo_z > hi_z {
        return Vec::new();
    }

    let mut samples = Vec::new();
    for z in lo_z as usize..=hi_z as usize {
        for x in lo_x as usize..=hi_x as usize {
            samples.push((x, z));
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> AreaBounds {
        AreaBounds::new(Vec2::new(0.0, 0.0), Vec2::new(40.0, 40.0))
    }

    #[test]
    fn test_heightmap_covers_margin() {
        let config = TerrainConfig {
            margin: 10.0,
            cell_size: 2.0,
            ..Default::default()
        };
        let hm = generate_heightmap(&bounds(), &config);
        assert_eq!(hm.origin(), Vec2::new(-10.0, -10.0));
        assert_eq!(hm.width(), 31);
        assert_eq!(hm.depth(), 31);
    }

    #[test]
    fn test_heights_within_range_and_border_flat() {
        let config = TerrainConfig {
            terrain_height: 8.0,
            flat_margin: 6.0,
            ..Default::default()
        };
        let hm = generate_heightmap(&bounds(), &config);
        assert!(hm.heights().iter().all(|h| (0.0..=8.0).contains(h)));
        for x in 0..hm.width() {
            assert_eq!(hm.get(x, 0), Some(0.0));
            assert_eq!(hm.get(x, hm.depth() - 1), Some(0.0));
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = TerrainConfig {
            seed: 11,
            ..Default::default()
        };
        assert_eq!(generate_heightmap(&bounds(), &config), generate_heightmap(&bounds(), &config));
    }

    #[test]
    fn test_invalid_config_gives_empty_heightmap() {
        let config = TerrainConfig {
            cell_size: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(generate_heightmap(&bounds(), &config).is_empty());
    }

    #[test]
    fn test_footprint_geometry() {
        let footprint = Footprint::new(Vec2::new(5.0, 5.0), Vec2::new(2.0, 1.0), 0.0);
        assert!(footprint.contains(Vec2::new(6.9, 5.9)));
        assert!(!footprint.contains(Vec2::new(5.0, 6.5)));

        let turned = Footprint::new(Vec2::new(5.0, 5.0), Vec2::new(2.0, 1.0), std::f32::consts::FRAC_PI_2);
        assert!(turned.contains(Vec2::new(5.0, 6.5)));
        assert!(!turned.contains(Vec2::new(6.9, 5.0)));
    }

    #[test]
    fn test_footprint_from_transform_matches_yaw() {
        let rotation = Quat::from_rotation_y(0.7);
        let footprint = Footprint::from_transform(Vec3::new(1.0, 2.0, 3.0), rotation, Vec3::new(4.0, 9.0, 2.0));
        assert!((footprint.yaw - 0.7).abs() < 1e-5);
        assert_eq!(footprint.center, Vec2::new(1.0, 3.0));
        assert_eq!(footprint.half_extents, Vec2::new(2.0, 1.0));

        // Local +X of the rotation lands on the footprint's X axis
        let world_x = rotation * Vec3::X;
        let (ax, _) = footprint.axes();
        assert!((Vec2::new(world_x.x, world_x.z) - ax).length() < 1e-5);
    }

    #[test]
    fn test_flatten_uses_corner_average() {
        let mut hm = Heightmap::new(11, 11, 1.0, Vec2::ZERO);
        for z in 0..11 {
            for x in 0..11 {
                hm.set(x, z, x as f32);
            }
        }
        let footprint = Footprint::new(Vec2::new(5.0, 5.0), Vec2::new(2.0, 2.0), 0.0);
        let levels = flatten_footprints(&mut hm, &[footprint]);

        assert_eq!(levels.len(), 1);
        assert!((levels[0] - 5.0).abs() < 1e-5);
        for z in 3..=7 {
            for x in 3..=7 {
                assert!((hm.get(x, z).unwrap() - 5.0).abs() < 1e-5);
            }
        }
        assert_eq!(hm.get(8, 5), Some(8.0));
        assert_eq!(hm.get(2, 5), Some(2.0));
    }

    #[test]
    fn test_smooth_roads_only_touches_corridor() {
        let mut hm = Heightmap::new(9, 9, 1.0, Vec2::ZERO);
        hm.set(4, 4, 9.0);
        hm.set(0, 8, 5.0);
        let road = Road::with_nodes("main", vec![Vec3::new(0.0, 0.0, 4.0), Vec3::new(8.0, 0.0, 4.0)]);

        smooth_roads(&mut hm, &[road], 1.0, 1);

        assert!((hm.get(4, 4).unwrap() - 1.0).abs() < 1e-5);
        assert!((hm.get(3, 4).unwrap() - 1.0).abs() < 1e-5);
        // Neighbours off the corridor keep their height
        assert_eq!(hm.get(4, 3), Some(0.0));
        assert_eq!(hm.get(0, 8), Some(5.0));
    }

    #[test]
    fn test_smoothing_passes_reduce_spike() {
        let mut hm = Heightmap::new(9, 9, 1.0, Vec2::ZERO);
        hm.set(4, 4, 9.0);
        let road = Road::with_nodes("main", vec![Vec3::new(0.0, 0.0, 4.0), Vec3::new(8.0, 0.0, 4.0)]);
        let mut once = hm.clone();
        smooth_roads(&mut once, std::slice::from_ref(&road), 1.0, 1);
        smooth_roads(&mut hm, &[road], 1.0, 4);
        assert!(hm.get(4, 4).unwrap() < once.get(4, 4).unwrap());
    }

    #[test]
    fn test_bounds_from_roads() {
        let roads = vec![
            Road::with_nodes("a", vec![Vec3::new(-5.0, 0.0, 2.0), Vec3::new(3.0, 1.0, 8.0)]),
            Road::new("empty"),
        ];
        let b = AreaBounds::from_roads(&roads).unwrap();
        assert_eq!(b.min, Vec2::new(-5.0, 2.0));
        assert_eq!(b.max, Vec2::new(3.0, 8.0));
        assert!(AreaBounds::from_roads(&[]).is_none());
    }
}
