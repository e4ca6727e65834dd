//! Stellar Drift - headless runner
//!
//! Builds a generated world, drops in a player and a mix of scripted and
//! learning pilots, runs the fixed-step loop with a null input and logs a
//! summary. Learned tables can be loaded before and saved after the run.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use stellar_drift::ai::{PilotKind, QTable};
use stellar_drift::core::types::{EntityId, Faction, Vec2};
use stellar_drift::economy::ItemCatalog;
use stellar_drift::persistence::{load_q_table_or_empty, save_q_table_file, TableSchema};
use stellar_drift::{InputState, Result, SimEvent, SimulationConfig, World};

/// Headless Stellar Drift simulation
#[derive(Parser, Debug)]
#[command(name = "stellar-drift")]
#[command(about = "Run the space combat simulation without a renderer")]
struct Args {
    /// World seed (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Steps to run
    #[arg(long, default_value_t = 1800)]
    ticks: u64,

    /// Step length in seconds
    #[arg(long, default_value_t = 0.033)]
    dt: f32,

    /// TOML file with config overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// TOML item catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Learned table for enemy pilots
    #[arg(long)]
    enemy_table: Option<PathBuf>,

    /// Learned table for ally pilots
    #[arg(long)]
    ally_table: Option<PathBuf>,

    /// Learned table for the allies' defensive drones
    #[arg(long)]
    drone_table: Option<PathBuf>,

    /// Learning enemies to spawn around the player
    #[arg(long, default_value_t = 3)]
    enemies: usize,

    /// Learning allies to spawn around the player
    #[arg(long, default_value_t = 2)]
    allies: usize,

    /// Scripted pirates to spawn
    #[arg(long, default_value_t = 2)]
    pirates: usize,

    /// Write the learned tables back after the run
    #[arg(long)]
    save_tables: bool,
}

fn load_table(path: Option<&Path>, schema: TableSchema) -> QTable {
    path.map(|p| load_q_table_or_empty(p, schema)).unwrap_or_default()
}

/// Spread `count` spawn points on a ring around `center`
fn ring(center: Vec2, radius: f32, count: usize, phase: f32) -> Vec<Vec2> {
    (0..count)
        .map(|k| center + Vec2::from_angle(phase + k as f32 * std::f32::consts::TAU / count.max(1) as f32) * radius)
        .collect()
}

fn save_tables(tables: &[(EntityId, &QTable)], schema: TableSchema, path: Option<&Path>) -> Result<()> {
    let kind = schema.name();
    let Some(path) = path else {
        tracing::warn!(kind, "no table path given, not saving");
        return Ok(());
    };
    // Learners share one file; the lowest surviving id writes it
    match tables.first() {
        Some((id, table)) => {
            save_q_table_file(path, table)?;
            tracing::info!(kind, learner = %id, states = table.len(), path = %path.display(), "table saved");
        }
        None => tracing::warn!(kind, "no surviving learner to save a table from"),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stellar_drift=info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let catalog = match &args.catalog {
        Some(path) => ItemCatalog::load(path)?,
        None => ItemCatalog::with_defaults(),
    };

    tracing::info!(seed = config.seed, ticks = args.ticks, dt = args.dt, "Stellar Drift starting...");
    let mut world = World::generate(config, catalog)?;

    let size = world.config.ship_size;
    let center = world.open_position(world.bounds.center(), size);
    let player = world.spawn_player(center);

    let enemy_table = load_table(args.enemy_table.as_deref(), TableSchema::Enemy);
    let ally_table = load_table(args.ally_table.as_deref(), TableSchema::Ally);
    let drone_table = load_table(args.drone_table.as_deref(), TableSchema::DefensiveDrone);

    for pos in ring(center, 700.0, args.enemies, 0.0) {
        let pos = world.open_position(pos, size);
        world.spawn_learning_enemy(pos, enemy_table.clone());
    }
    for pos in ring(center, 200.0, args.allies, 0.5) {
        let pos = world.open_position(pos, size);
        let ally = world.spawn_learning_ally(pos, ally_table.clone());
        world.launch_defensive_drone(ally, drone_table.clone())?;
    }
    for pos in ring(center, 1200.0, args.pirates, 1.0) {
        let pos = world.open_position(pos, size);
        world.spawn_behavior_tree("Corsair", Faction::Pirate, pos);
    }

    let input = InputState::default();
    let mut destroyed = 0usize;
    let mut shots = 0usize;
    for _ in 0..args.ticks {
        for event in world.step(args.dt, &input) {
            match event {
                SimEvent::ShipDestroyed { .. } => destroyed += 1,
                SimEvent::WeaponFired { .. } => shots += 1,
                _ => {}
            }
        }
        if world.ship(player).is_none() {
            tracing::info!(tick = world.tick, "player destroyed, stopping");
            break;
        }
    }

    tracing::info!(
        ticks = world.tick,
        seconds = world.time,
        ships = world.ships.len(),
        flagships = world.flagships.len(),
        destroyed,
        shots,
        "run finished"
    );

    if args.save_tables {
        save_tables(&world.q_tables(PilotKind::LearningEnemy), TableSchema::Enemy, args.enemy_table.as_deref())?;
        save_tables(&world.q_tables(PilotKind::LearningAlly), TableSchema::Ally, args.ally_table.as_deref())?;
        save_tables(&world.drone_tables(), TableSchema::DefensiveDrone, args.drone_table.as_deref())?;
    }

    Ok(())
}
