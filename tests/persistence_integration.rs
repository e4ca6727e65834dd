//! Persistence integration tests
//!
//! Tables written by a running world must load back into a fresh one, and
//! legacy or damaged documents must either migrate or fail cleanly.

use std::path::PathBuf;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use stellar_drift::ai::{PilotKind, QTable, StateKey};
use stellar_drift::core::types::{EntityId, Vec2};
use stellar_drift::economy::{ItemCatalog, Market};
use stellar_drift::persistence::{
    apply_markets, load_markets, load_q_table, load_q_table_file, load_q_table_or_empty, market_table, save_markets,
    save_q_table, save_q_table_file, TableSchema,
};
use stellar_drift::world::Station;
use stellar_drift::{InputState, SimError, SimulationConfig, World};

fn generated(seed: u64) -> World {
    let config = SimulationConfig { seed, ..SimulationConfig::default() };
    let mut world = World::generate(config, ItemCatalog::with_defaults()).unwrap();
    if world.galaxy.stations().next().is_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let market = Market::from_catalog(&world.catalog, &world.config, &mut rng);
        let id = world.ids.next_id();
        let system = world.galaxy.systems_mut().next().unwrap();
        let pos = system.center + Vec2::new(600.0, 0.0);
        system.stations.push(Station { id, name: "Relay".to_string(), pos, radius: 40.0, market });
    }
    world
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("stellar_drift_{}_{}.json", std::process::id(), name))
}

#[test]
fn test_market_state_survives_save_and_reload() {
    let mut source = generated(11);
    let station = source.galaxy.stations().next().unwrap().id;
    {
        let market = &mut source.galaxy.station_mut(station).unwrap().market;
        if market.stock("ore") > 0 {
            market.buy("ore", 1, u32::MAX).unwrap();
        }
    }
    let input = InputState::default();
    for _ in 0..40 {
        source.step(0.1, &input);
    }

    let json = save_markets(&source.galaxy).unwrap();
    assert!(json.contains("\"version\": 2"));

    let mut target = generated(11);
    let table = load_markets(&json).unwrap();
    let applied = apply_markets(&mut target.galaxy, &table, &target.config);
    assert_eq!(applied, source.galaxy.stations().count());
    assert_eq!(market_table(&target.galaxy), market_table(&source.galaxy));
}

#[test]
fn test_legacy_price_only_market_keeps_stock() {
    let mut world = generated(5);
    let station = world.galaxy.stations().next().unwrap();
    let (id, stock_before) = (station.id, station.market.stock("ore"));
    let base = station.market.entry("ore").unwrap().base_price;

    let legacy = format!(r#"{{"{}": {{"ore": {}}}, "999999": {{"ore": 1}}}}"#, id.0, base);
    let table = load_markets(&legacy).unwrap();
    assert_eq!(apply_markets(&mut world.galaxy, &table, &world.config), 1);

    let market = &world.galaxy.station(id).unwrap().market;
    assert_eq!(market.price("ore"), Some(base));
    assert_eq!(market.stock("ore"), stock_before);
}

#[test]
fn test_future_and_corrupt_documents_are_rejected() {
    let newer = r#"{"version": 99, "payload": {}}"#;
    assert!(matches!(load_markets(newer), Err(SimError::BadPersistence(_))));
    let newer = r#"{"version": 3, "q_table": {}}"#;
    assert!(matches!(load_q_table(newer, TableSchema::Enemy), Err(SimError::BadPersistence(_))));
    assert!(matches!(load_q_table("{not json", TableSchema::Ally), Err(SimError::BadPersistence(_))));
    assert!(matches!(load_q_table("[1, 2]", TableSchema::Ally), Err(SimError::BadPersistence(_))));

    // Current version with the wrong arity is not silently migrated
    let short = r#"{"version": 2, "q_table": {"(0, 1)": {"idle": 1.0}}}"#;
    assert!(matches!(load_q_table(short, TableSchema::Enemy), Err(SimError::BadPersistence(_))));
}

#[test]
fn test_q_table_file_round_trip() {
    let mut table = QTable::new();
    table.set(StateKey(vec![1, 0, 2, 1, 0]), "attack", 0.75);
    table.set(StateKey(vec![1, 0, 2, 1, 0]), "flee", -1.25);
    table.set(StateKey(vec![3, 1, 0, 0, 1]), "defend", 0.1);

    let path = scratch_file("enemy");
    save_q_table_file(&path, &table).unwrap();
    let loaded = load_q_table_file(&path, TableSchema::Enemy).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, table);
}

#[test]
fn test_missing_or_bad_file_starts_empty() {
    let missing = scratch_file("missing");
    assert!(load_q_table_or_empty(&missing, TableSchema::Ally).is_empty());

    let bad = scratch_file("bad");
    std::fs::write(&bad, "{\"version\": 7, \"q_table\": {}}").unwrap();
    assert!(load_q_table_or_empty(&bad, TableSchema::Ally).is_empty());
    std::fs::remove_file(&bad).ok();

    assert!(matches!(load_q_table_file(&missing, TableSchema::Ally), Err(SimError::IoError(_))));
}

#[test]
fn test_learned_tables_reload_into_a_new_run() {
    let mut world = World::new(SimulationConfig::default(), ItemCatalog::with_defaults()).unwrap();
    let center = Vec2::new(2000.0, 2000.0);
    world.spawn_player(center);
    let pos = center + Vec2::new(300.0, 0.0);
    let enemy = world.spawn_learning_enemy(pos, QTable::new());
    let input = InputState::default();
    for _ in 0..120 {
        world.step(0.05, &input);
    }

    let tables = world.q_tables(PilotKind::LearningEnemy);
    let Some((id, learned)) = tables.first() else {
        panic!("enemy pilot did not survive");
    };
    assert_eq!(*id, enemy);
    assert!(!learned.is_empty());

    let json = save_q_table(learned).unwrap();
    let reloaded = load_q_table(&json, TableSchema::Enemy).unwrap();
    assert_eq!(&reloaded, *learned);

    let mut next = World::new(SimulationConfig::default(), ItemCatalog::with_defaults()).unwrap();
    let spawned = next.spawn_learning_enemy(pos, reloaded);
    let carried = next.q_tables(PilotKind::LearningEnemy);
    assert_eq!(carried.len(), 1);
    assert_eq!(carried[0].0, spawned);
    assert_eq!(carried[0].1.len(), learned.len());
    assert_ne!(spawned, EntityId(0));
}

#[test]
fn test_defensive_drone_learns_in_flight_and_reloads() {
    let mut world = World::new(SimulationConfig::default(), ItemCatalog::with_defaults()).unwrap();
    let center = Vec2::new(2000.0, 2000.0);
    world.spawn_player(center);
    let ally = world.spawn_learning_ally(center + Vec2::new(-150.0, 0.0), QTable::new());
    let drone = world.launch_defensive_drone(ally, QTable::new()).unwrap();
    assert!(matches!(world.launch_defensive_drone(EntityId(9999), QTable::new()), Err(SimError::EntityNotFound(_))));

    let input = InputState::default();
    for _ in 0..60 {
        world.step(0.05, &input);
    }

    let tables = world.drone_tables();
    assert_eq!(tables.len(), 1);
    let (id, learned) = tables[0];
    assert_eq!(id, drone);
    assert!(!learned.is_empty());
    for (key, _) in learned.sorted() {
        assert_eq!(key.dims(), TableSchema::DefensiveDrone.dims());
    }

    let path = scratch_file("drone");
    save_q_table_file(&path, learned).unwrap();
    let reloaded = load_q_table_file(&path, TableSchema::DefensiveDrone).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(&reloaded, learned);

    let mut next = World::new(SimulationConfig::default(), ItemCatalog::with_defaults()).unwrap();
    let owner = next.spawn_learning_ally(center, QTable::new());
    let relaunched = next.launch_defensive_drone(owner, reloaded).unwrap();
    let carried = next.drone_tables();
    assert_eq!(carried.len(), 1);
    assert_eq!(carried[0].0, relaunched);
    assert_eq!(carried[0].1.len(), learned.len());
}
