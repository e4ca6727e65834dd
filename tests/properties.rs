//! Property tests for invariants that must hold for any input

use std::collections::BTreeMap;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};

use stellar_drift::ai::{Coordination, StateKey};
use stellar_drift::core::types::{EntityId, Faction, Vec2};
use stellar_drift::economy::{price_bounds, ItemCatalog, Market};
use stellar_drift::entity::Ship;
use stellar_drift::persistence::{load_q_table, TableSchema};
use stellar_drift::{InputState, SimulationConfig, World};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn player_never_leaves_the_world(
        start in (0.0f32..4000.0, 0.0f32..4000.0),
        vel in (-900.0f32..900.0, -900.0f32..900.0),
        keys in prop::collection::vec(any::<u8>(), 1..60),
        dt in 0.01f32..0.2,
    ) {
        let mut world = World::new(SimulationConfig::default(), ItemCatalog::with_defaults()).unwrap();
        let start = world.bounds.clamp(Vec2::new(start.0, start.1));
        let player = world.spawn_player(start);
        world.ship_mut(player).unwrap().vel = Vec2::new(vel.0, vel.1);

        for bits in keys {
            world.step(dt, &InputState::from_bits(bits, None));
            let ship = world.ship(player).unwrap();
            prop_assert!(world.bounds.contains(ship.pos), "left bounds at {:?}", ship.pos);
            prop_assert!(ship.vel.is_finite());
        }
    }

    #[test]
    fn market_prices_stay_within_bounds(seed in any::<u64>(), steps in prop::collection::vec(0.0f32..5.0, 1..200)) {
        let config = SimulationConfig { station_price_fluct: 0.3, ..SimulationConfig::default() };
        let catalog = ItemCatalog::with_defaults();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut market = Market::from_catalog(&catalog, &config, &mut rng);

        for dt in steps {
            market.tick(dt, &config, &mut rng);
            for (item, entry) in market.entries() {
                let (lo, hi) = price_bounds(entry.base_price, &config);
                prop_assert!(entry.price >= lo && entry.price <= hi, "{} priced {} outside {}..={}", item, entry.price, lo, hi);
            }
        }
    }

    #[test]
    fn orbit_sides_alternate_among_attackers(engaged in prop::collection::btree_set(2u32..200, 1..12), idle in prop::collection::btree_set(200u32..400, 0..6)) {
        let target = EntityId(1);
        let mut registry = Coordination::new();
        for id in engaged.iter().chain(idle.iter()) {
            registry.register(EntityId(*id), Faction::Pirate);
        }
        for id in &engaged {
            registry.set_target(EntityId(*id), Some(target));
        }
        registry.assign_orbit_sides(Faction::Pirate, target);

        let sides: Vec<f32> = engaged.iter().map(|id| registry.orbit_side(EntityId(*id))).collect();
        for (k, side) in sides.iter().enumerate() {
            let expected = if k % 2 == 0 { 1.0 } else { -1.0 };
            prop_assert_eq!(*side, expected);
        }
        let balance: f32 = sides.iter().sum();
        prop_assert!(balance == 0.0 || balance == 1.0);
        for id in &idle {
            prop_assert_eq!(registry.orbit_side(EntityId(*id)), 1.0);
        }
    }

    #[test]
    fn migration_preserves_values(rows in prop::collection::btree_map((0i32..3, 0i32..2), -100.0f64..100.0, 1..20)) {
        let mut states = Map::new();
        for ((a, b), q) in &rows {
            states.insert(format!("({}, {})", a, b), json!({ "attack": q }));
        }
        let legacy = Value::Object(states).to_string();
        let table = load_q_table(&legacy, TableSchema::Enemy).unwrap();

        prop_assert_eq!(table.len(), rows.len());
        for ((a, b), q) in &rows {
            let key = StateKey(vec![*a, *b, 1, 1, 0]);
            prop_assert_eq!(table.value(&key, "attack"), *q);
        }
        for (key, _) in table.sorted() {
            prop_assert_eq!(key.dims(), TableSchema::Enemy.dims());
        }
    }

    #[test]
    fn damage_never_drives_hull_negative(hits in prop::collection::vec(0.0f32..80.0, 1..30)) {
        let config = SimulationConfig::default();
        let mut ship = Ship::new(EntityId(1), "Target", Faction::Nebula, Vec2::new(0.0, 0.0), &config);
        let mut taken = BTreeMap::new();
        for (k, amount) in hits.into_iter().enumerate() {
            let before = ship.hull;
            let hull_loss = ship.apply_damage(amount);
            taken.insert(k, hull_loss);
            prop_assert!(ship.hull >= 0.0 && ship.hull <= ship.max_hull);
            prop_assert!((before - ship.hull - hull_loss).abs() < 1e-3);
            prop_assert!(ship.shield.strength >= 0.0 && ship.shield.strength <= ship.shield.max);
        }
        let total: f32 = taken.values().sum();
        prop_assert!(total <= config.ship_hull + 1e-3);
    }
}
