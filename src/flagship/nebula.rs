//! Nebula drone ring
//!
//! The flagship keeps a ring of aggressive drones orbiting it the "wrong" way
//! (negative orbit speed), interlocked with its engagement ring. Drones live
//! in the world's drone pool; the ring only tracks how many it owes and
//! launches replacements on a timer.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Faction, Vec2};
use crate::entity::Drone;

pub const RING_DRONES: usize = 8;
pub const RING_ORBIT_SPEED: f32 = -0.6;
/// Orbit radius as a multiple of the hull radius
pub const RING_ORBIT_FACTOR: f32 = 1.8;
/// Half thickness of the engagement ring around the drone orbit
pub const RING_HALF_WIDTH: f32 = 12.0;
pub const RESPAWN_TIME: f32 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneRing {
    pub size: usize,
    pub orbit_radius: f32,
    pub respawn_timer: f32,
    /// Next launch slot, advanced on every launch
    next_slot: usize,
}

impl DroneRing {
    pub fn new(hull_radius: f32) -> Self {
        Self { size: RING_DRONES, orbit_radius: hull_radius * RING_ORBIT_FACTOR, respawn_timer: 0.0, next_slot: 0 }
    }

    fn drone(&mut self, owner: EntityId, faction: Faction, center: Vec2, config: &SimulationConfig) -> Drone {
        let angle = self.next_slot as f32 * TAU / self.size as f32;
        self.next_slot = (self.next_slot + 1) % self.size.max(1);
        let pos = center + Vec2::from_angle(angle) * self.orbit_radius;
        Drone::aggressive(owner, faction, pos, config).with_orbit(angle, self.orbit_radius, RING_ORBIT_SPEED)
    }

    /// The full ring, launched at once
    pub fn launch_all(&mut self, owner: EntityId, faction: Faction, center: Vec2, config: &SimulationConfig) -> Vec<Drone> {
        (0..self.size).map(|_| self.drone(owner, faction, center, config)).collect()
    }

    /// One replacement per respawn period while the ring is short
    pub fn tick(
        &mut self,
        dt: f32,
        alive: usize,
        owner: EntityId,
        faction: Faction,
        center: Vec2,
        config: &SimulationConfig,
    ) -> Option<Drone> {
        if alive >= self.size {
            self.respawn_timer = 0.0;
            return None;
        }
        self.respawn_timer += dt;
        if self.respawn_timer < RESPAWN_TIME {
            return None;
        }
        self.respawn_timer = 0.0;
        tracing::debug!(flagship = %owner, alive, "relaunching ring drone");
        Some(self.drone(owner, faction, center, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_drones_counter_orbit() {
        let config = SimulationConfig::default();
        let mut ring = DroneRing::new(100.0);
        let drones = ring.launch_all(EntityId(1), Faction::Nebula, Vec2::new(500.0, 500.0), &config);
        assert_eq!(drones.len(), RING_DRONES);
        for d in &drones {
            assert!(d.orbit_speed < 0.0);
            assert!((d.pos.distance(&Vec2::new(500.0, 500.0)) - 180.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_respawn_waits_for_timer() {
        let config = SimulationConfig::default();
        let mut ring = DroneRing::new(100.0);
        let center = Vec2::new(0.0, 0.0);
        assert!(ring.tick(RESPAWN_TIME * 0.5, 7, EntityId(1), Faction::Nebula, center, &config).is_none());
        assert!(ring.tick(RESPAWN_TIME * 0.6, 7, EntityId(1), Faction::Nebula, center, &config).is_some());
        assert!(ring.tick(RESPAWN_TIME * 2.0, 8, EntityId(1), Faction::Nebula, center, &config).is_none());
    }
}
