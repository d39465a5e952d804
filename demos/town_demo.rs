//! Example: Generate a small town
//!
//! Runs the full pipeline on a hand-authored road set, then saves the
//! result and rebuilds it from the save file.
//!
//! Set `RUST_LOG=debug` to see per-phase timings.

use rust_town_layout::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("Town Layout Generation Example");
    println!("==============================\n");

    let roads = vec![
        Road::with_nodes(
            "ring",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(240.0, 0.0, 0.0),
                Vec3::new(240.0, 0.0, 200.0),
                Vec3::new(0.0, 0.0, 200.0),
                Vec3::new(0.0, 0.0, 0.0),
            ],
        ),
        Road::with_nodes(
            "high_street",
            vec![Vec3::new(-30.0, 0.0, 100.0), Vec3::new(120.0, 0.0, 110.0), Vec3::new(270.0, 0.0, 100.0)],
        ),
        Road::with_nodes("mill_lane", vec![Vec3::new(120.0, 0.0, -30.0), Vec3::new(120.0, 0.0, 230.0)]),
        Road::with_nodes("cul_de_sac", vec![Vec3::new(180.0, 0.0, 0.0), Vec3::new(180.0, 0.0, 60.0)]),
    ];

    let prefabs = vec![
        BuildingPrefab::new("cottage", Vec3::new(7.0, 5.0, 7.0), 5.0),
        BuildingPrefab::new("townhouse", Vec3::new(8.0, 9.0, 10.0), 3.0),
        BuildingPrefab::new("church", Vec3::new(12.0, 20.0, 18.0), 0.5),
    ];

    let config = TownConfigBuilder::new()
        .seed(42)
        .road_width(7.0)
        .unwrap()
        .build()
        .unwrap();

    println!("Configuration:");
    println!("  Seed: {}", config.seed);
    println!("  Road width: {}", config.road_width);
    println!("  Terrain: {}", if config.terrain.is_some() { "on" } else { "off" });
    println!();

    let generator = TownGenerator::new(config);
    let mut world = CollisionWorld::new();
    let town = generator.generate_with_observer(&roads, &prefabs, &mut world, |event| {
        if let GenerationEvent::PhaseCompleted { phase, .. } = event {
            println!("  finished {}", phase.name());
        }
    });

    println!("\nResults:");
    println!("  Road mesh triangles: {}", town.road_mesh.triangle_count());
    println!("  Graph nodes: {}", town.graph.node_count());
    println!("  Graph edges: {}", town.graph.edge_count());
    println!("  Intersections: {}", town.graph.intersections().len());
    println!("  City blocks: {}", town.blocks.len());
    for (i, block) in town.blocks.iter().enumerate() {
        println!(
            "    Block {}: {} corners, area {:.0}",
            i,
            block.vertex_count(),
            block.area()
        );
    }
    println!("  Buildings: {}", town.buildings.len());
    if let Some(mesh) = &town.terrain_mesh {
        println!("  Terrain triangles: {}", mesh.triangle_count());
    }

    let mut rng = rand::thread_rng();
    let candidates: Vec<Vec3> = town.roads.iter().flat_map(|r| r.sample_every(10.0)).collect();
    let mut goals = choose_goal_positions(&candidates, roads[0].nodes[0], &GoalConfig::default(), &mut rng);
    let snapped = snap_to_graph(&mut goals, &town.graph, 6.0);
    println!("  Goals: {} ({} moved onto junctions)", goals.len(), snapped);

    let path = std::env::temp_dir().join("town_demo.json");
    let data = CityData::from_town(&town, &goals);
    data.save(&path).expect("Failed to save town");
    println!("\nSaved to {}", path.display());

    let loaded = CityData::load(&path).expect("Failed to load town");
    let mut replay_world = CollisionWorld::new();
    let rebuilt = generator.rebuild_from(&loaded, &prefabs, &mut replay_world);
    println!("Rebuilt town with {} buildings", rebuilt.buildings.len());

    println!("\nGeneration complete!");
}
