//! Example: Grid city with delivery goals
//!
//! Lays out a Manhattan grid, spawns goals on road cells and drives a
//! scripted player through them.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_town_layout::grid::road_cells;
use rust_town_layout::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("Grid City Example");
    println!("=================\n");

    let config = GridCityConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let city = generate_grid_city(&config, &mut rng);

    println!("Grid: {} x {} cells of {} units", config.size_x, config.size_z, config.block_size);
    println!("  Roads: {}", city.roads.len());
    println!("  Lots: {}", city.lots.len());

    // Every lot becomes a scaled unit cube
    let cube = BuildingPrefab::new("cube", Vec3::ONE, 1.0);
    let records: Vec<BuildingRecord> = city.lots.iter().map(|lot| lot.record(&cube)).collect();
    let mut world = CollisionWorld::new();
    let town = TownGenerator::new(TownConfigBuilder::new().seed(7).without_terrain().build().unwrap())
        .rebuild(&city.roads, &records, &[cube], &mut world);
    println!("  City blocks: {}", town.blocks.len());
    println!("  Colliders: {}", world.len());

    let goal_config = GoalConfig::default();
    let positions = choose_goal_positions(&road_cells(&config), Vec3::ZERO, &goal_config, &mut rng);
    let mut tracker = GoalTracker::new(&positions, &goal_config, &mut rng);
    println!("\nGoals:");
    for goal in tracker.goals() {
        println!(
            "  ({:.0}, {:.0}) dwell {:.1}s",
            goal.position.x, goal.position.z, goal.required_dwell
        );
    }

    // Teleport onto each goal in turn and wait there
    let dt = 0.25;
    let mut elapsed = 0.0;
    while !tracker.is_cleared() && elapsed < 120.0 {
        let player = tracker.positions().first().copied().unwrap_or(Vec3::ZERO);
        match tracker.update(dt, player) {
            GoalEvent::Completed { position, remaining } => {
                println!("  t={:>5.2}s reached ({:.0}, {:.0}), {} left", elapsed, position.x, position.z, remaining)
            }
            GoalEvent::StageCleared => println!("  t={:>5.2}s stage cleared", elapsed),
            _ => {}
        }
        elapsed += dt;
    }
}
