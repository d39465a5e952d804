//! Manhattan-style grid city
//!
//! A fixed lattice of cells where every `road_interval`-th row and column is a
//! road and every other cell holds one box building. Cell `(x, z)` is centered
//! at `(x * block_size, 0, z * block_size)`.

use glam::{Quat, Vec3};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::placement::{BuildingPrefab, BuildingRecord};
use crate::road::Road;

/// Layout of a grid city
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GridCityConfig {
    /// Number of cells along X
    pub size_x: usize,
    /// Number of cells along Z
    pub size_z: usize,
    /// Edge length of one cell
    pub block_size: f32,
    /// A road runs along every `road_interval`-th row and column
    pub road_interval: usize,
    pub min_building_height: f32,
    pub max_building_height: f32,
}

impl Default for GridCityConfig {
    fn default() -> Self {
        Self {
            size_x: 20,
            size_z: 20,
            block_size: 25.0,
            road_interval: 4,
            min_building_height: 10.0,
            max_building_height: 40.0,
        }
    }
}

impl GridCityConfig {
    fn is_buildable(&self) -> bool {
        self.size_x > 0 && self.size_z > 0 && self.block_size > 0.0 && self.road_interval > 0
    }

    fn is_road_cell(&self, x: usize, z: usize) -> bool {
        x % self.road_interval == 0 || z % self.road_interval == 0
    }

    fn cell_position(&self, x: usize, z: usize) -> Vec3 {
        Vec3::new(x as f32 * self.block_size, 0.0, z as f32 * self.block_size)
    }
}

/// One building lot of a grid city
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GridLot {
    /// Grid coordinates
    pub cell: (usize, usize),
    /// Base center on the ground
    pub position: Vec3,
    /// Full box size; half a block wide so streets stay open
    pub size: Vec3,
}

impl GridLot {
    /// Record that rebuilds this lot from a unit-cube prefab
    pub fn record(&self, prefab: &BuildingPrefab) -> BuildingRecord {
        let unit = prefab.size.max(Vec3::splat(f32::EPSILON));
        BuildingRecord {
            prefab: prefab.name.clone(),
            position: self.position,
            rotation: Quat::IDENTITY,
            scale: self.size / unit,
        }
    }
}

/// Generated grid city
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridCity {
    /// One straight road per road row and column
    pub roads: Vec<Road>,
    pub lots: Vec<GridLot>,
}

impl GridCity {
    pub fn is_empty(&self) -> bool {
        self.roads.is_empty() && self.lots.is_empty()
    }
}

/// Centers of every road cell, usable as goal spawn candidates
pub fn road_cells(config: &GridCityConfig) -> Vec<Vec3> {
    if !config.is_buildable() {
        return Vec::new();
    }
    let mut cells = Vec::new();
    for x in 0..config.size_x {
        for z in 0..config.size_z {
            if config.is_road_cell(x, z) {
                cells.push(config.cell_position(x, z));
            }
        }
    }
    cells
}

/// Lay out roads and building lots
///
/// A zero-sized grid, non-positive block size or zero road interval logs a
/// warning and yields an empty city.
pub fn generate_grid_city<R: Rng>(config: &GridCityConfig, rng: &mut R) -> GridCity {
    if !config.is_buildable() {
        tracing::warn!(
            size_x = config.size_x,
            size_z = config.size_z,
            block_size = config.block_size,
            road_interval = config.road_interval,
            "grid city size, block size and road interval must be positive"
        );
        return GridCity::default();
    }

    let far_x = (config.size_x - 1) as f32 * config.block_size;
    let far_z = (config.size_z - 1) as f32 * config.block_size;
    let mut roads = Vec::new();

    for x in (0..config.size_x).step_by(config.road_interval) {
        let along = x as f32 * config.block_size;
        roads.push(Road::with_nodes(
            format!("avenue_{x}"),
            vec![Vec3::new(along, 0.0, 0.0), Vec3::new(along, 0.0, far_z)],
        ));
    }
    for z in (0..config.size_z).step_by(config.road_interval) {
        let along = z as f32 * config.block_size;
        roads.push(Road::with_nodes(
            format!("street_{z}"),
            vec![Vec3::new(0.0, 0.0, along), Vec3::new(far_x, 0.0, along)],
        ));
    }

    let low = config.min_building_height.min(config.max_building_height);
    let high = config.min_building_height.max(config.max_building_height);
    let footprint = config.block_size * 0.5;

    let mut lots = Vec::new();
    for x in 0..config.size_x {
        for z in 0..config.size_z {
            if config.is_road_cell(x, z) {
                continue;
            }
            let height = if high > low { rng.gen_range(low..=high) } else { low };
            lots.push(GridLot {
                cell: (x, z),
                position: config.cell_position(x, z),
                size: Vec3::new(footprint, height, footprint),
            });
        }
    }

    if lots.is_empty() {
        tracing::warn!(
            road_interval = config.road_interval,
            "grid city has no building lots, road interval or city size too small"
        );
    } else {
        tracing::info!(roads = roads.len(), lots = lots.len(), "grid city generated");
    }

    GridCity { roads, lots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small() -> GridCityConfig {
        GridCityConfig {
            size_x: 9,
            size_z: 5,
            block_size: 10.0,
            road_interval: 4,
            min_building_height: 5.0,
            max_building_height: 15.0,
        }
    }

    #[test]
    fn test_roads_and_lots() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let city = generate_grid_city(&small(), &mut rng);

        // Avenues at x = 0, 4, 8; streets at z = 0, 4
        assert_eq!(city.roads.len(), 5);
        assert_eq!(city.roads[2].nodes, vec![Vec3::new(80.0, 0.0, 0.0), Vec3::new(80.0, 0.0, 40.0)]);

        // 6 free columns times 3 free rows
        assert_eq!(city.lots.len(), 18);
        for lot in &city.lots {
            assert!(lot.cell.0 % 4 != 0 && lot.cell.1 % 4 != 0);
            assert_eq!(lot.size.x, 5.0);
            assert!((5.0..=15.0).contains(&lot.size.y));
        }
    }

    #[test]
    fn test_road_cells_complement_lots() {
        let config = small();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let city = generate_grid_city(&config, &mut rng);
        let cells = road_cells(&config);
        assert_eq!(cells.len() + city.lots.len(), config.size_x * config.size_z);
        assert!(cells.contains(&Vec3::new(40.0, 0.0, 20.0)));
    }

    #[test]
    fn test_invalid_sizes_give_empty_city() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for config in [
            GridCityConfig { size_x: 0, ..small() },
            GridCityConfig { block_size: 0.0, ..small() },
            GridCityConfig { road_interval: 0, ..small() },
        ] {
            assert!(generate_grid_city(&config, &mut rng).is_empty());
            assert!(road_cells(&config).is_empty());
        }
    }

    #[test]
    fn test_interval_one_has_no_lots() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = GridCityConfig { road_interval: 1, ..small() };
        let city = generate_grid_city(&config, &mut rng);
        assert!(city.lots.is_empty());
        assert_eq!(city.roads.len(), 9 + 5);
    }

    #[test]
    fn test_lot_record_scales_prefab() {
        let lot = GridLot {
            cell: (1, 1),
            position: Vec3::new(10.0, 0.0, 10.0),
            size: Vec3::new(5.0, 12.0, 5.0),
        };
        let record = lot.record(&BuildingPrefab::new("cube", Vec3::ONE, 1.0));
        assert_eq!(record.scale, Vec3::new(5.0, 12.0, 5.0));
        assert_eq!(record.position, lot.position);
    }
}
