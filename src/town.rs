//! Town generation pipeline
//!
//! A pass runs seven phases in order:
//!
//! 1. **RoadMesh**: ribbon mesh of every road, registered as a road surface
//! 2. **Graph**: intersections and the deduplicated road graph
//! 3. **Blocks**: closed faces of the graph
//! 4. **Terrain**: heightmap with smoothed road corridors, registered as ground
//! 5. **Buildings**: roadside placement (or replay of recorded buildings)
//! 6. **Cleanup**: culling of buildings that still overlap something
//! 7. **TerrainMesh**: footprints levelled and the final terrain mesh built
//!
//! [`TownGenerator::generate`] runs a pass to completion. A frame loop that
//! must not stall can instead call [`TownGenerator::begin`] and advance the
//! returned [`GenerationPass`] one phase per frame. Every pass starts from
//! scratch; nothing carries over between passes. A pass does not remove an
//! earlier town from the world, so generating again into the same world
//! goes through [`TownGenerator::regenerate`].

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::TownConfig;
use crate::generation::{find_city_blocks_with_stats, CityBlock, RoadGraph};
use crate::mesh::{build_road_network_mesh, build_terrain_mesh, MeshData};
use crate::placement::{
    cleanup_overlaps, place_buildings, replay_buildings, BuildingPrefab, BuildingRecord,
    ColliderHandle, LayerMask, PhysicsWorld, PlacedBuilding,
};
use crate::road::Road;
use crate::terrain::{flatten_footprints, generate_heightmap, smooth_roads, AreaBounds, Heightmap};

/// Vertical difference below which a levelled building is left in place
const LEVEL_EPSILON: f32 = 1e-4;

/// Phases of a generation pass, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationPhase {
    RoadMesh,
    Graph,
    Blocks,
    Terrain,
    Buildings,
    Cleanup,
    TerrainMesh,
}

impl GenerationPhase {
    /// All phases in execution order
    pub const ALL: [GenerationPhase; 7] = [
        GenerationPhase::RoadMesh,
        GenerationPhase::Graph,
        GenerationPhase::Blocks,
        GenerationPhase::Terrain,
        GenerationPhase::Buildings,
        GenerationPhase::Cleanup,
        GenerationPhase::TerrainMesh,
    ];

    /// Phase that follows this one
    pub fn next(self) -> Option<GenerationPhase> {
        match self {
            GenerationPhase::RoadMesh => Some(GenerationPhase::Graph),
            GenerationPhase::Graph => Some(GenerationPhase::Blocks),
            GenerationPhase::Blocks => Some(GenerationPhase::Terrain),
            GenerationPhase::Terrain => Some(GenerationPhase::Buildings),
            GenerationPhase::Buildings => Some(GenerationPhase::Cleanup),
            GenerationPhase::Cleanup => Some(GenerationPhase::TerrainMesh),
            GenerationPhase::TerrainMesh => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GenerationPhase::RoadMesh => "road mesh",
            GenerationPhase::Graph => "graph",
            GenerationPhase::Blocks => "blocks",
            GenerationPhase::Terrain => "terrain",
            GenerationPhase::Buildings => "buildings",
            GenerationPhase::Cleanup => "cleanup",
            GenerationPhase::TerrainMesh => "terrain mesh",
        }
    }
}

/// Progress reported to a generation observer
#[derive(Debug, Clone, Copy)]
pub enum GenerationEvent<'a> {
    /// A phase finished; the town holds its output
    PhaseCompleted {
        phase: GenerationPhase,
        town: &'a GeneratedTown,
    },
    /// Every phase finished
    Finished(&'a GeneratedTown),
}

/// Everything produced by a generation pass
#[derive(Debug, Clone, Default)]
pub struct GeneratedTown {
    /// Roads the town was generated from
    pub roads: Vec<Road>,
    /// Combined ribbon mesh of all drivable roads
    pub road_mesh: MeshData,
    pub graph: RoadGraph,
    pub blocks: Vec<CityBlock>,
    /// Buildings alive in the physics world
    pub buildings: Vec<PlacedBuilding>,
    pub heightmap: Option<Heightmap>,
    pub terrain_mesh: Option<MeshData>,
    /// Handle of the registered road surface
    pub road_surface: Option<ColliderHandle>,
    /// Handle of the registered terrain surface
    pub terrain_surface: Option<ColliderHandle>,
}

impl GeneratedTown {
    /// Serializable records of every building
    pub fn building_records(&self) -> Vec<BuildingRecord> {
        self.buildings.iter().map(|b| b.record.clone()).collect()
    }

    /// Remove everything this town registered with `world`
    pub fn despawn_all<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for building in self.buildings.drain(..) {
            world.despawn(building.handle);
        }
        for handle in [self.road_surface.take(), self.terrain_surface.take()].into_iter().flatten() {
            world.despawn(handle);
        }
    }
}

/// Where a pass gets its buildings from
#[derive(Debug, Clone)]
enum BuildingSource {
    /// Weighted-random roadside placement
    Place,
    /// Verbatim transforms from a save
    Replay(Vec<BuildingRecord>),
}

/// An in-progress generation pass
///
/// Owns all intermediate state until it finishes. Dropping it abandons the
/// pass; objects already registered with the world stay there.
#[derive(Debug, Clone)]
pub struct GenerationPass {
    config: TownConfig,
    prefabs: Vec<BuildingPrefab>,
    source: BuildingSource,
    rng: ChaCha8Rng,
    next: Option<GenerationPhase>,
    town: GeneratedTown,
}

impl GenerationPass {
    fn new(config: &TownConfig, roads: &[Road], prefabs: &[BuildingPrefab], source: BuildingSource) -> Self {
        Self {
            config: config.clone(),
            prefabs: prefabs.to_vec(),
            source,
            rng: ChaCha8Rng::seed_from_u64(u64::from(config.seed)),
            next: Some(GenerationPhase::RoadMesh),
            town: GeneratedTown {
                roads: roads.to_vec(),
                ..Default::default()
            },
        }
    }

    /// Phase the next call to [`step`](Self::step) will run
    pub fn next_phase(&self) -> Option<GenerationPhase> {
        self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    /// Output produced so far
    pub fn town(&self) -> &GeneratedTown {
        &self.town
    }

    /// Run one phase and return it, or `None` when the pass is already done
    pub fn step<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> Option<GenerationPhase> {
        let phase = self.next?;
        let started = Instant::now();

        match phase {
            GenerationPhase::RoadMesh => self.build_road_mesh(world),
            GenerationPhase::Graph => self.build_graph(),
            GenerationPhase::Blocks => self.extract_blocks(),
            GenerationPhase::Terrain => self.build_terrain(world),
            GenerationPhase::Buildings => self.add_buildings(world),
            GenerationPhase::Cleanup => self.cleanup(world),
            GenerationPhase::TerrainMesh => self.finish_terrain(world),
        }

        tracing::debug!(
            phase = phase.name(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "generation phase complete"
        );
        self.next = phase.next();
        Some(phase)
    }

    /// Run every remaining phase
    pub fn run<W: PhysicsWorld + ?Sized>(mut self, world: &mut W) -> GeneratedTown {
        while self.step(world).is_some() {}
        self.town
    }

    /// Take the finished town, or get the pass back if phases remain
    pub fn into_town(self) -> std::result::Result<GeneratedTown, GenerationPass> {
        if self.is_finished() {
            Ok(self.town)
        } else {
            Err(self)
        }
    }

    fn build_road_mesh<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        let mesh = build_road_network_mesh(&self.town.roads, self.config.road_width);
        if !mesh.is_empty() {
            self.town.road_surface = Some(world.add_surface(&mesh, LayerMask::ROAD));
        }
        self.town.road_mesh = mesh;
    }

    fn build_graph(&mut self) {
        self.town.graph = RoadGraph::build(&self.town.roads, self.config.tolerance);
    }

    fn extract_blocks(&mut self) {
        let (blocks, stats) = find_city_blocks_with_stats(&self.town.graph, &self.config.blocks);
        tracing::debug!(?stats, "block extraction stats");
        self.town.blocks = blocks;
    }

    fn build_terrain<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        let Some(terrain) = &self.config.terrain else {
            tracing::warn!("no terrain configured, buildings rely on ground already in the world");
            return;
        };
        let Some(bounds) = AreaBounds::from_roads(&self.town.roads) else {
            tracing::warn!("no road nodes to size the terrain from, terrain skipped");
            return;
        };

        let mut heightmap = generate_heightmap(&bounds, terrain);
        if heightmap.is_empty() {
            return;
        }
        smooth_roads(
            &mut heightmap,
            &self.town.roads,
            self.config.road_width,
            terrain.road_smoothing_passes,
        );

        let mesh = build_terrain_mesh(&heightmap, terrain.terrain_height, &terrain.gradient);
        self.town.terrain_surface = Some(world.add_surface(&mesh, LayerMask::GROUND));
        self.town.heightmap = Some(heightmap);
    }

    fn add_buildings<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        self.town.buildings = match &self.source {
            BuildingSource::Place => {
                place_buildings(
                    &self.town.roads,
                    &self.prefabs,
                    &self.config.placement,
                    world,
                    &mut self.rng,
                )
                .buildings
            }
            BuildingSource::Replay(records) => replay_buildings(records, &self.prefabs, world),
        };
    }

    fn cleanup<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        // Recorded buildings are restored exactly as saved
        if matches!(self.source, BuildingSource::Replay(_)) {
            return;
        }
        cleanup_overlaps(world, &mut self.town.buildings, &self.config.placement);
    }

    fn finish_terrain<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        let (Some(terrain), Some(heightmap)) = (&self.config.terrain, self.town.heightmap.as_mut()) else {
            return;
        };

        let footprints: Vec<_> = self.town.buildings.iter().map(|b| b.footprint()).collect();
        let levels = flatten_footprints(heightmap, &footprints);

        if matches!(self.source, BuildingSource::Place) {
            for (building, level) in self.town.buildings.iter_mut().zip(levels) {
                if (building.record.position.y - level).abs() <= LEVEL_EPSILON {
                    continue;
                }
                let Some(prefab) = self.prefabs.iter().find(|p| p.name == building.record.prefab) else {
                    continue;
                };
                world.despawn(building.handle);
                building.record.position.y = level;
                building.handle = world.instantiate(
                    prefab,
                    building.record.position,
                    building.record.rotation,
                    building.record.scale,
                );
            }
        }

        let mesh = build_terrain_mesh(heightmap, terrain.terrain_height, &terrain.gradient);
        if let Some(old) = self.town.terrain_surface.take() {
            world.despawn(old);
        }
        self.town.terrain_surface = Some(world.add_surface(&mesh, LayerMask::GROUND));
        self.town.terrain_mesh = Some(mesh);
    }
}

/// Entry point for generating towns from a fixed configuration
#[derive(Debug, Clone)]
pub struct TownGenerator {
    config: TownConfig,
}

impl TownGenerator {
    pub fn new(config: TownConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TownConfig {
        &self.config
    }

    /// Start a pass that places buildings along `roads`
    pub fn begin(&self, roads: &[Road], prefabs: &[BuildingPrefab]) -> GenerationPass {
        GenerationPass::new(&self.config, roads, prefabs, BuildingSource::Place)
    }

    /// Run a full pass
    pub fn generate<W: PhysicsWorld + ?Sized>(
        &self,
        roads: &[Road],
        prefabs: &[BuildingPrefab],
        world: &mut W,
    ) -> GeneratedTown {
        self.generate_with_observer(roads, prefabs, world, |_| {})
    }

    /// Run a full pass, reporting each finished phase and the finished town
    pub fn generate_with_observer<W, F>(
        &self,
        roads: &[Road],
        prefabs: &[BuildingPrefab],
        world: &mut W,
        observer: F,
    ) -> GeneratedTown
    where
        W: PhysicsWorld + ?Sized,
        F: FnMut(GenerationEvent<'_>),
    {
        self.drive(self.begin(roads, prefabs), world, observer)
    }

    /// Replace `town` with a fresh pass over `roads`
    ///
    /// Everything the old town registered with `world` is despawned first,
    /// so its road surface, terrain and buildings cannot block the new pass.
    pub fn regenerate<W: PhysicsWorld + ?Sized>(
        &self,
        town: &mut GeneratedTown,
        roads: &[Road],
        prefabs: &[BuildingPrefab],
        world: &mut W,
    ) {
        tracing::debug!(buildings = town.buildings.len(), "tearing down previous town");
        town.despawn_all(world);
        *town = self.generate(roads, prefabs, world);
    }

    /// Regenerate a town from roads and recorded buildings
    ///
    /// Meshes, graph, blocks and terrain are rebuilt from `roads`; buildings
    /// are instantiated from `records` verbatim without rerunning placement.
    pub fn rebuild<W: PhysicsWorld + ?Sized>(
        &self,
        roads: &[Road],
        records: &[BuildingRecord],
        prefabs: &[BuildingPrefab],
        world: &mut W,
    ) -> GeneratedTown {
        let pass = GenerationPass::new(
            &self.config,
            roads,
            prefabs,
            BuildingSource::Replay(records.to_vec()),
        );
        self.drive(pass, world, |_| {})
    }

    /// Regenerate a saved city
    #[cfg(feature = "serde")]
    pub fn rebuild_from<W: PhysicsWorld + ?Sized>(
        &self,
        data: &crate::save::CityData,
        prefabs: &[BuildingPrefab],
        world: &mut W,
    ) -> GeneratedTown {
        self.rebuild(&data.roads, &data.buildings, prefabs, world)
    }

    fn drive<W, F>(&self, mut pass: GenerationPass, world: &mut W, mut observer: F) -> GeneratedTown
    where
        W: PhysicsWorld + ?Sized,
        F: FnMut(GenerationEvent<'_>),
    {
        let span = tracing::info_span!("town_generation", seed = self.config.seed);
        let _guard = span.enter();
        let started = Instant::now();

        while let Some(phase) = pass.step(world) {
            observer(GenerationEvent::PhaseCompleted {
                phase,
                town: pass.town(),
            });
        }

        let town = pass.town;
        tracing::info!(
            roads = town.roads.len(),
            nodes = town.graph.node_count(),
            edges = town.graph.edge_count(),
            blocks = town.blocks.len(),
            buildings = town.buildings.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "town generated"
        );
        observer(GenerationEvent::Finished(&town));
        town
    }
}
