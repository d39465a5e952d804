//! Town generation configuration and builder
//!
//! A [`TownConfig`] plus a road set fully determines a generated town: the
//! same configuration and roads always produce identical meshes, graph,
//! blocks and building placements.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TownError};
use crate::generation::BlockOptions;
use crate::geometry::DEFAULT_TOLERANCE;
use crate::placement::PlacementConfig;
use crate::terrain::TerrainConfig;

/// Default width of road ribbons in world units
pub const DEFAULT_ROAD_WIDTH: f32 = 8.0;

/// Configuration for a town generation pass
///
/// # Example
///
/// ```rust
/// use rust_town_layout::*;
///
/// let config = TownConfigBuilder::new()
///     .seed(42)
///     .road_width(6.0)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// # #[cfg(feature = "serde")]
/// # {
/// let json = serde_json::to_string(&config).unwrap();
/// let restored: TownConfig = serde_json::from_str(&json).unwrap();
/// assert_eq!(config, restored);
/// # }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TownConfig {
    /// Seed for weighted prefab choice and placement jitter
    pub seed: u32,

    /// Width of road ribbons, also the corridor smoothed into the terrain
    pub road_width: f32,

    /// Per-axis distance under which two road points are the same graph node
    pub tolerance: f32,

    /// Roadside building placement
    pub placement: PlacementConfig,

    /// Terrain around the town
    ///
    /// `None` skips the heightmap entirely; buildings then need ground that
    /// is already present in the physics world.
    pub terrain: Option<TerrainConfig>,

    /// City block extraction
    pub blocks: BlockOptions,
}

impl Default for TownConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            road_width: DEFAULT_ROAD_WIDTH,
            tolerance: DEFAULT_TOLERANCE,
            placement: PlacementConfig::default(),
            terrain: Some(TerrainConfig::default()),
            blocks: BlockOptions::default(),
        }
    }
}

/// Builder for creating [`TownConfig`] with validation
///
/// # Example
///
/// ```rust
/// use rust_town_layout::*;
///
/// // Flat town: no terrain, roads only get their own surfaces
/// let config = TownConfigBuilder::new()
///     .seed(7)
///     .without_terrain()
///     .tolerance(0.05)
///     .unwrap()
///     .build()
///     .unwrap();
/// assert!(config.terrain.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TownConfigBuilder {
    seed: Option<u32>,
    road_width: f32,
    tolerance: f32,
    placement: PlacementConfig,
    terrain: Option<TerrainConfig>,
    terrain_seed: Option<u32>,
    blocks: BlockOptions,
}

impl TownConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - seed: Random (generated from thread_rng)
    /// - road_width: 8.0
    /// - tolerance: 0.01
    /// - terrain: enabled, seeded like the town
    pub fn new() -> Self {
        Self {
            seed: None,
            road_width: DEFAULT_ROAD_WIDTH,
            tolerance: DEFAULT_TOLERANCE,
            placement: PlacementConfig::default(),
            terrain: Some(TerrainConfig::default()),
            terrain_seed: None,
            blocks: BlockOptions::default(),
        }
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the road ribbon width
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if width is not positive
    pub fn road_width(mut self, width: f32) -> Result<Self> {
        if !(width > 0.0) || !width.is_finite() {
            return Err(TownError::InvalidConfig(format!(
                "Road width must be positive (got {})",
                width
            )));
        }
        self.road_width = width;
        Ok(self)
    }

    /// Set the node deduplication tolerance
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if tolerance is not positive
    pub fn tolerance(mut self, tolerance: f32) -> Result<Self> {
        if !(tolerance > 0.0) || !tolerance.is_finite() {
            return Err(TownError::InvalidConfig(format!(
                "Tolerance must be positive (got {})",
                tolerance
            )));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Set the building placement configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the spacing, jitter or ray settings are unusable
    pub fn placement(mut self, placement: PlacementConfig) -> Result<Self> {
        placement.validate()?;
        self.placement = placement;
        Ok(self)
    }

    /// Enable terrain with the given configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the cell size or heights are unusable
    pub fn terrain(mut self, terrain: TerrainConfig) -> Result<Self> {
        terrain.validate()?;
        self.terrain = Some(terrain);
        Ok(self)
    }

    /// Disable terrain generation
    pub fn without_terrain(mut self) -> Self {
        self.terrain = None;
        self
    }

    /// Set a separate terrain seed
    ///
    /// If not set, the terrain seed will match the town seed.
    pub fn terrain_seed(mut self, seed: u32) -> Self {
        self.terrain_seed = Some(seed);
        self
    }

    /// Set the block extraction options
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `max_iterations` is zero or `min_area` negative
    pub fn blocks(mut self, blocks: BlockOptions) -> Result<Self> {
        if blocks.max_iterations == 0 {
            return Err(TownError::InvalidConfig(
                "Block max_iterations must be at least 1".to_string(),
            ));
        }
        if blocks.min_area < 0.0 {
            return Err(TownError::InvalidConfig(format!(
                "Block min_area must be >= 0 (got {})",
                blocks.min_area
            )));
        }
        self.blocks = blocks;
        Ok(self)
    }

    /// Build the configuration
    ///
    /// If no seed was provided, generates a random seed using thread_rng.
    pub fn build(self) -> Result<TownConfig> {
        let seed = self.seed.unwrap_or_else(rand::random);
        let terrain = self.terrain.map(|mut terrain| {
            terrain.seed = self.terrain_seed.unwrap_or(seed);
            terrain
        });

        Ok(TownConfig {
            seed,
            road_width: self.road_width,
            tolerance: self.tolerance,
            placement: self.placement,
            terrain,
            blocks: self.blocks,
        })
    }
}

impl Default for TownConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
