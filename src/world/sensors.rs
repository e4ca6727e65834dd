//! Sensor snapshots: what an NPC pilot can see of the pre-tick world
//!
//! Snapshots are plain values built from an immutable borrow of the world, so
//! every pilot decides against the same state regardless of update order.

use std::collections::{BTreeMap, BTreeSet};

use crate::ai::{SensorSnapshot, ShipView};
use crate::combat::artifacts::AiContext;
use crate::core::types::EntityId;
use crate::entity::{Drone, MovementMode, Ship};
use crate::world::World;

/// Reach of a mining beam when an NPC looks for something to mine
const NPC_MINING_REACH: f32 = 150.0;

/// Who damaged and destroyed whom during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombatLog {
    pub hits: BTreeMap<EntityId, BTreeSet<EntityId>>,
    pub kills: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl CombatLog {
    pub fn record_hit(&mut self, attacker: EntityId, victim: EntityId) {
        self.hits.entry(attacker).or_default().insert(victim);
    }

    pub fn record_kill(&mut self, attacker: EntityId, victim: EntityId) {
        self.kills.entry(attacker).or_default().insert(victim);
    }

    pub fn hits_by(&self, attacker: EntityId) -> Vec<EntityId> {
        self.hits.get(&attacker).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub fn kills_by(&self, attacker: EntityId) -> Vec<EntityId> {
        self.kills.get(&attacker).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.kills.clear();
    }
}

/// Decoys show up on sensors as ships
fn decoy_view(drone: &Drone) -> ShipView {
    ShipView {
        id: drone.id,
        faction: drone.faction,
        pos: drone.pos,
        vel: drone.vel,
        hull: drone.hp,
        max_hull: drone.max_hp,
        shield_ratio: 0.0,
        size: drone.size,
        boosting: false,
        boost_ready: false,
    }
}

/// Build the snapshot for `ship`
pub fn observe(world: &World, ship: &Ship, dt: f32) -> SensorSnapshot {
    let config = &world.config;
    let me = ShipView::of(ship);
    let mut snapshot = SensorSnapshot::alone(me, dt);

    snapshot.player = world
        .player_ship()
        .filter(|p| p.id != ship.id && !p.destroyed() && !p.invisible())
        .map(ShipView::of);

    let in_range = |view: &ShipView| ship.pos.distance(&view.pos) <= config.detection_range;
    let mut hostiles: Vec<ShipView> = world
        .ships
        .iter()
        .filter(|s| s.id != ship.id && !s.destroyed() && !s.invisible() && !s.hyperjumping())
        .filter(|s| ship.faction.is_hostile_to(s.faction))
        .map(ShipView::of)
        .chain(world.drones.iter().filter(|d| d.is_decoy() && !d.expired()).map(decoy_view))
        .filter(|v| ship.faction.is_hostile_to(v.faction) && in_range(v))
        .collect();
    hostiles.sort_by(|a, b| {
        ship.pos
            .distance(&a.pos)
            .total_cmp(&ship.pos.distance(&b.pos))
            .then(a.id.cmp(&b.id))
    });
    snapshot.hostiles = hostiles;

    let mut threats: Vec<_> = world
        .projectiles
        .iter()
        .filter(|p| p.in_flight() && ship.faction.is_hostile_to(p.faction))
        .map(|p| (p.pos, ship.pos.distance(&p.pos)))
        .filter(|(_, d)| *d <= config.danger_range)
        .collect();
    threats.sort_by(|a, b| a.1.total_cmp(&b.1));
    snapshot.threats = threats.into_iter().map(|(pos, _)| pos).collect();

    snapshot.black_hole = world
        .hazards
        .nearest_black_hole(ship.pos)
        .filter(|(hole, d)| *d <= hole.pull_range)
        .map(|(hole, _)| (hole.pos, hole.pull_range));

    snapshot.assist_target = world.coordination.assist_target(ship.id);
    snapshot.orbit_side = world.coordination.orbit_side(ship.id);
    snapshot.autopilot_active = matches!(ship.movement, MovementMode::Autopilot { .. });
    snapshot.orbiting = matches!(ship.movement, MovementMode::Orbit { .. });
    snapshot.recent_hits = world.combat_log.hits_by(ship.id);
    snapshot.recent_kills = world.combat_log.kills_by(ship.id);
    snapshot
}

/// What an NPC knows when considering its artifacts
pub fn artifact_context(world: &World, ship: &Ship, snapshot: &SensorSnapshot) -> AiContext {
    let nearest = snapshot.nearest_hostile();
    AiContext {
        hull_ratio: ship.hull_ratio(),
        shield_ratio: ship.shield.ratio(),
        hostiles_near: snapshot.hostiles.len(),
        nearest_hostile: nearest.map(|h| h.pos),
        nearest_hostile_distance: nearest.map(|h| snapshot.distance_to(h)),
        asteroid_in_reach: world.galaxy.nearest_asteroid(ship.pos, NPC_MINING_REACH).map(|a| a.id),
        solar_link_active: ship.solar_link_active(),
        under_fire: !snapshot.threats.is_empty() || world.combat_log.hits.values().any(|v| v.contains(&ship.id)),
    }
}
