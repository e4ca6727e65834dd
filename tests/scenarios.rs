//! End-to-end scenarios driven through `World::step`
//!
//! Each test builds a small hand-placed world, runs the fixed-step loop and
//! checks one observable behavior.

use stellar_drift::ai::{ally_state, Leaf, LearningAllyPilot, PilotKind, QTable, StateKey};
use stellar_drift::combat::Weapon;
use stellar_drift::core::types::{EntityId, Faction, Rect, Vec2};
use stellar_drift::economy::ItemCatalog;
use stellar_drift::entity::{Shield, Ship};
use stellar_drift::navigation::{Obstacle, Pathfinder};
use stellar_drift::persistence::{load_q_table, save_q_table, TableSchema};
use stellar_drift::world::{observe, StarSystem};
use stellar_drift::{InputState, SimEvent, SimulationConfig, World};

const DT: f32 = 0.05;

fn empty_world(config: SimulationConfig) -> World {
    World::new(config, ItemCatalog::with_defaults()).unwrap()
}

fn still() -> InputState {
    InputState::default()
}

/// Player ship carrying a single weapon
fn armed_player(world: &mut World, pos: Vec2, weapon: Weapon) -> EntityId {
    let mut ship = Ship::new(EntityId(0), "Player", Faction::Player, pos, &world.config).with_weapon(weapon);
    ship.is_player = true;
    let id = world.spawn_ship(ship);
    world.player = Some(id);
    id
}

#[test]
fn test_boost_shakes_off_an_orbiting_hunter() {
    let mut world = empty_world(SimulationConfig::default());
    let player_pos = Vec2::new(1000.0, 1000.0);
    let player = world.spawn_player(player_pos);
    let hunter = world.spawn_behavior_tree("Hunter", Faction::Pirate, Vec2::new(1200.0, 1000.0));
    world.ship_mut(hunter).unwrap().start_orbit(player, player_pos, 0.75);

    let events = world.step(DT, &InputState { boost: true, ..InputState::default() }).to_vec();
    assert!(events.contains(&SimEvent::OrbitBroken { ship: hunter, target: player }));
    let ship = world.ship(hunter).unwrap();
    assert_eq!(ship.orbit_target(), None);
    assert_eq!(ship.orbit_time(), 0.0);

    // Still boosting on the next decision: chase, don't engage
    world.step(DT, &still());
    assert!(world.ship(player).unwrap().boost.active());
    assert_eq!(world.pilots[&hunter].last_action(), Some(Leaf::Pursue));
}

#[test]
fn test_ally_never_attacks_the_player() {
    let config = SimulationConfig { q_epsilon: 0.0, ..SimulationConfig::default() };
    let mut world = empty_world(config);
    let player = world.spawn_player(Vec2::new(1000.0, 1000.0));
    let ally_pos = Vec2::new(1400.0, 1000.0);
    let ally = world.spawn_learning_ally(ally_pos, QTable::new());

    // Bias the ally's current state toward "attack"
    let snapshot = observe(&world, world.ship(ally).unwrap(), DT);
    let mut table = QTable::new();
    table.set(ally_state(&snapshot, &world.config), "attack", 10.0);
    let region = world.region_at(ally_pos);
    world.attach_pilot(ally, Box::new(LearningAllyPilot::new(table, region))).unwrap();

    let hull = world.ship(player).unwrap().hull;
    world.step(DT, &still());
    assert_eq!(world.pilots[&ally].last_action(), Some(Leaf::Pursue));

    for _ in 0..9 {
        let events = world.step(DT, &still()).to_vec();
        assert!(!events.iter().any(|e| matches!(e, SimEvent::WeaponFired { ship, .. } if *ship == ally)));
    }
    assert_eq!(world.ship(player).unwrap().hull, hull);
    assert!(world.projectiles.is_empty());
}

#[test]
fn test_guided_missile_reaches_a_still_target() {
    let mut world = empty_world(SimulationConfig::default());
    let missile = Weapon::missile(&world.config);
    let damage = missile.damage;
    armed_player(&mut world, Vec2::new(1000.0, 1000.0), missile);

    let mut dummy = Ship::new(EntityId(0), "Dummy", Faction::Pirate, Vec2::new(1300.0, 1000.0), &world.config);
    dummy.shield = Shield::new(0.0, 0.0);
    let dummy = world.spawn_ship(dummy);
    let start_hull = world.ship(dummy).unwrap().hull;

    let fire = InputState { fire: true, aim: Some(Vec2::new(1300.0, 1000.0)), ..InputState::default() };
    world.step(DT, &fire);
    assert_eq!(world.projectiles.len(), 1);

    let mut elapsed = DT;
    while elapsed < 5.0 && world.ship(dummy).unwrap().hull > start_hull - damage {
        world.step(DT, &still());
        elapsed += DT;
    }
    let lost = start_hull - world.ship(dummy).unwrap().hull;
    assert!(lost >= damage - 1e-3, "dummy only lost {} hull in {}s", lost, elapsed);
}

#[test]
fn test_light_channeler_chain_timing_and_energy() {
    let mut world = empty_world(SimulationConfig::default());
    let star = EntityId(900);
    world.galaxy.add_system(StarSystem::new(star, "Sol", Vec2::new(1000.0, 1000.0), 100.0, 100.0));
    armed_player(&mut world, Vec2::new(1000.0, 1300.0), Weapon::light_channeler());

    let fire = InputState { fire: true, aim: Some(Vec2::new(1000.0, 1000.0)), ..InputState::default() };
    world.step(DT, &fire);
    assert!(world.deployables.iter().any(|d| d.is_channeler()));

    let mut elapsed = DT;
    let mut battery_at = None;
    let mut turret_at = None;
    let mut samples = Vec::new();
    while elapsed < 6.0 {
        world.step(DT, &still());
        elapsed += DT;
        if battery_at.is_none() && world.deployables.iter().any(|d| d.is_battery()) {
            battery_at = Some(elapsed);
        }
        if turret_at.is_none() && world.deployables.iter().any(|d| d.is_turret()) {
            turret_at = Some(elapsed);
        }
        let stored: f32 = world.deployables.iter().map(|d| d.energy()).sum();
        let left = world.galaxy.system(star).unwrap().star.energy;
        assert!(stored <= 100.0 + 1e-3);
        assert!(stored + left <= 100.0 + 1e-3);
        samples.push(stored);
    }

    let battery_at = battery_at.expect("battery never deployed");
    let turret_at = turret_at.expect("turret never deployed");
    assert!((1.9..=2.15).contains(&battery_at), "battery at {}s", battery_at);
    assert!((3.9..=4.15).contains(&turret_at), "turret at {}s", turret_at);

    // One second of samples is twenty steps
    for window in samples.windows(21) {
        assert!(window[20] - window[0] <= 10.0 + 1e-3);
    }
}

#[test]
fn test_pathfinder_keeps_clear_of_planets() {
    let bounds = Rect::new(0.0, 0.0, 2000.0, 2000.0);
    let mut finder = Pathfinder::new(bounds, 100.0, 40.0);
    let planet = Vec2::new(1000.0, 1000.0);
    finder.block(Obstacle::new(planet, 50.0));

    let path = finder.find_path(Vec2::new(550.0, 1050.0), Vec2::new(1450.0, 950.0));
    assert!(path.len() > 1);
    for waypoint in &path {
        assert!(waypoint.distance(&planet) >= 90.0 - 1e-3, "waypoint {:?} too close", waypoint);
    }
}

#[test]
fn test_corner_to_corner_path_skirts_the_planet() {
    let bounds = Rect::new(0.0, 0.0, 2000.0, 2000.0);
    let mut finder = Pathfinder::new(bounds, 100.0, 40.0);
    let planet = Vec2::new(1000.0, 1000.0);
    finder.block(Obstacle::new(planet, 50.0));

    let path = finder.find_path(Vec2::new(0.0, 0.0), Vec2::new(2000.0, 2000.0));
    assert!(path.len() > 1);
    for waypoint in &path {
        assert!(waypoint.distance(&planet) >= 90.0, "waypoint {:?} too close", waypoint);
    }
}

#[test]
fn test_legacy_enemy_table_is_widened() {
    let legacy = r#"{
        "(0, 1)": {"attack": 1.5, "flee": -0.5},
        "(2, 0)": {"idle": 0.25}
    }"#;
    let table = load_q_table(legacy, TableSchema::Enemy).unwrap();
    assert_eq!(table.len(), 2);
    let key = StateKey(vec![0, 1, 1, 1, 0]);
    assert_eq!(table.value(&key, "attack"), 1.5);
    assert_eq!(table.value(&key, "flee"), -0.5);
    assert_eq!(table.value(&StateKey(vec![2, 0, 1, 1, 0]), "idle"), 0.25);

    // A 3-tuple keeps its first three values and gains the trailing defaults
    let legacy = r#"{"(1, 0, 2)": {"pursue": 3.0}}"#;
    let table = load_q_table(legacy, TableSchema::Enemy).unwrap();
    let (key, actions) = table.sorted()[0];
    assert_eq!(key, &StateKey(vec![1, 0, 2, 1, 0]));
    assert_eq!(actions.get("pursue"), Some(&3.0));

    // Saving writes the current envelope and reloads without migration
    let saved = save_q_table(&table).unwrap();
    assert!(saved.contains("\"version\""));
    assert_eq!(load_q_table(&saved, TableSchema::Enemy).unwrap(), table);
}

#[test]
fn test_legacy_ally_table_is_widened() {
    let legacy = r#"{"version": 1, "q_table": {"(0, 0, 1)": {"defend": 2.0}}}"#;
    let table = load_q_table(legacy, TableSchema::Ally).unwrap();
    assert_eq!(table.value(&StateKey(vec![0, 0, 1, 1, 1, 2, 0]), "defend"), 2.0);
}

fn skirmish(seed: u64) -> World {
    let config = SimulationConfig { seed, ..SimulationConfig::default() };
    let mut world = World::generate(config, ItemCatalog::with_defaults()).unwrap();
    let center = world.open_position(world.bounds.center(), world.config.ship_size);
    world.spawn_player(center);
    for k in 0..3 {
        let pos = world.open_position(center + Vec2::from_angle(k as f32 * 2.1) * 500.0, world.config.ship_size);
        world.spawn_learning_enemy(pos, QTable::new());
    }
    let pos = world.open_position(center + Vec2::new(-150.0, 0.0), world.config.ship_size);
    world.spawn_learning_ally(pos, QTable::new());
    let pos = world.open_position(center + Vec2::new(0.0, 700.0), world.config.ship_size);
    world.spawn_behavior_tree("Corsair", Faction::Pirate, pos);
    world
}

fn fingerprint(world: &World) -> Vec<(EntityId, u32, u32, u32)> {
    world.ships.iter().map(|s| (s.id, s.pos.x.to_bits(), s.pos.y.to_bits(), s.hull.to_bits())).collect()
}

#[test]
fn test_same_seed_same_run() {
    let mut a = skirmish(7);
    let mut b = skirmish(7);
    let input = InputState { up: true, fire: true, aim: Some(Vec2::new(0.0, 0.0)), ..InputState::default() };
    for _ in 0..300 {
        let ea = a.step(0.033, &input).to_vec();
        let eb = b.step(0.033, &input).to_vec();
        assert_eq!(ea, eb);
    }
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_eq!(a.projectiles.len(), b.projectiles.len());
    assert_eq!(a.q_tables(PilotKind::LearningEnemy).len(), b.q_tables(PilotKind::LearningEnemy).len());
    for ((_, ta), (_, tb)) in a.q_tables(PilotKind::LearningEnemy).into_iter().zip(b.q_tables(PilotKind::LearningEnemy)) {
        assert_eq!(ta, tb);
    }
}
