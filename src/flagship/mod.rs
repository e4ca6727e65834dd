//! Faction flagships: capital structures with faction-specific subsystems
//!
//! Every flagship shares hull, energy and collision handling; the
//! `Subsystem` carries what the faction does each tick.

pub mod guild;
pub mod nebula;
pub mod solar;
pub mod turret;

pub use guild::{Building, BuildingShape, GuildCity};
pub use nebula::DroneRing;
pub use solar::{ChannelArm, SolarArray};
pub use turret::{pirate_turrets, rim_turrets, Munition, Turret};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Faction, Vec2};
use crate::entity::{Contact, ContactKind, Drone, Projectile};
use crate::world::galaxy::Galaxy;

pub const FLAGSHIP_RADIUS: f32 = 120.0;
pub const FLAGSHIP_HULL: f32 = 2000.0;
/// Shield aura extending past the hull
pub const FLAGSHIP_AURA: f32 = 25.0;

/// Annular hazard around a flagship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementRing {
    pub inner: f32,
    pub outer: f32,
}

impl EngagementRing {
    /// True if a circle at distance `d` from the center with radius `r`
    /// overlaps the annulus
    pub fn overlaps(&self, d: f32, r: f32) -> bool {
        d + r >= self.inner && d - r <= self.outer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Subsystem {
    Solar(SolarArray),
    Nebula(DroneRing),
    Pirate(Vec<Turret>),
    Explorers(Vec<Turret>),
    Guild(GuildCity),
}

/// Read/write view of the world a flagship needs during its tick
pub struct FlagshipContext<'a> {
    pub dt: f32,
    pub galaxy: &'a mut Galaxy,
    pub contacts: &'a [Contact],
    /// Live drones owned by this flagship
    pub owned_drones: usize,
    /// Stars claimed by solar arms so far this tick
    pub claims: &'a mut BTreeSet<EntityId>,
    pub config: &'a SimulationConfig,
}

/// Entities a flagship adds to the world
#[derive(Debug, Clone, PartialEq)]
pub enum FlagshipSpawn {
    Projectile(Projectile),
    Drone(Drone),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionFlagship {
    pub id: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub hull: f32,
    pub max_hull: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub radius: f32,
    pub aura: f32,
    pub subsystem: Subsystem,
    pub engagement_ring: Option<EngagementRing>,
}

impl FactionFlagship {
    fn with_subsystem(id: EntityId, faction: Faction, pos: Vec2, subsystem: Subsystem, config: &SimulationConfig) -> Self {
        Self {
            id,
            faction,
            pos,
            hull: FLAGSHIP_HULL,
            max_hull: FLAGSHIP_HULL,
            energy: 0.0,
            max_energy: config.flagship_max_energy,
            radius: FLAGSHIP_RADIUS,
            aura: FLAGSHIP_AURA,
            subsystem,
            engagement_ring: None,
        }
    }

    pub fn solar(id: EntityId, pos: Vec2, config: &SimulationConfig) -> Self {
        Self::with_subsystem(id, Faction::SolarDominion, pos, Subsystem::Solar(SolarArray::new(config)), config)
    }

    /// Nebula flagship; the caller launches `ring.launch_all` into the drone pool
    pub fn nebula(id: EntityId, pos: Vec2, config: &SimulationConfig) -> Self {
        let ring = DroneRing::new(FLAGSHIP_RADIUS);
        let orbit = ring.orbit_radius;
        Self {
            engagement_ring: Some(EngagementRing {
                inner: orbit - nebula::RING_HALF_WIDTH,
                outer: orbit + nebula::RING_HALF_WIDTH,
            }),
            ..Self::with_subsystem(id, Faction::Nebula, pos, Subsystem::Nebula(ring), config)
        }
    }

    pub fn pirate(id: EntityId, pos: Vec2, config: &SimulationConfig) -> Self {
        let turrets = pirate_turrets(FLAGSHIP_RADIUS, config);
        Self::with_subsystem(id, Faction::Pirate, pos, Subsystem::Pirate(turrets), config)
    }

    pub fn explorers(id: EntityId, pos: Vec2, config: &SimulationConfig) -> Self {
        let turrets = rim_turrets(FLAGSHIP_RADIUS, config);
        Self::with_subsystem(id, Faction::FreeExplorers, pos, Subsystem::Explorers(turrets), config)
    }

    pub fn guild<R: Rng>(id: EntityId, pos: Vec2, config: &SimulationConfig, rng: &mut R) -> Self {
        let city = GuildCity::generate(FLAGSHIP_RADIUS, config, rng);
        Self::with_subsystem(id, Faction::CosmicGuild, pos, Subsystem::Guild(city), config)
    }

    /// Launch the initial drone ring, if this flagship has one
    pub fn initial_drones(&mut self, config: &SimulationConfig) -> Vec<Drone> {
        let (id, faction, pos) = (self.id, self.faction, self.pos);
        match &mut self.subsystem {
            Subsystem::Nebula(ring) => ring.launch_all(id, faction, pos, config),
            _ => Vec::new(),
        }
    }

    pub fn destroyed(&self) -> bool {
        self.hull <= 0.0
    }

    pub fn apply_damage(&mut self, amount: f32) {
        self.hull = (self.hull - amount).max(0.0);
    }

    pub fn contact(&self) -> Contact {
        Contact {
            id: self.id,
            faction: self.faction,
            kind: ContactKind::Flagship,
            pos: self.pos,
            vel: Vec2::ZERO,
            size: self.radius + self.aura,
        }
    }

    /// True if a circle at (x, y) with radius r touches the hull and aura,
    /// the engagement ring annulus, or a city building
    pub fn collides_with_point(&self, x: f32, y: f32, r: f32) -> bool {
        let p = Vec2::new(x, y);
        let d = p.distance(&self.pos);
        if d < self.radius + self.aura + r {
            return true;
        }
        if self.engagement_ring.is_some_and(|ring| ring.overlaps(d, r)) {
            return true;
        }
        match &self.subsystem {
            Subsystem::Guild(city) => city.building_at(p - self.pos, r).is_some(),
            _ => false,
        }
    }

    /// Where a circle overlapping the flagship should be moved to, if it
    /// overlaps at all
    pub fn push_out(&self, pos: Vec2, r: f32) -> Option<Vec2> {
        if !self.collides_with_point(pos.x, pos.y, r) {
            return None;
        }
        let offset = pos - self.pos;
        let d = offset.length();
        let dir = if d > 1e-3 { offset.normalize() } else { Vec2::new(1.0, 0.0) };
        let hull = self.radius + self.aura + r;
        if d < hull {
            return Some(self.pos + dir * hull);
        }
        if let Some(ring) = self.engagement_ring.filter(|ring| ring.overlaps(d, r)) {
            // Out through whichever edge is closer
            let inward = d - (ring.inner - r);
            let outward = (ring.outer + r) - d;
            let target = if inward < outward { (ring.inner - r).max(hull) } else { ring.outer + r };
            return Some(self.pos + dir * target);
        }
        if let Subsystem::Guild(city) = &self.subsystem {
            if let Some(b) = city.building_at(offset, r) {
                let away = offset - b.offset;
                let away_dir = if away.length() > 1e-3 { away.normalize() } else { dir };
                return Some(self.pos + b.offset + away_dir * (b.size + r));
            }
        }
        None
    }

    /// One subsystem tick
    pub fn tick(&mut self, ctx: &mut FlagshipContext) -> Vec<FlagshipSpawn> {
        let (id, faction, pos) = (self.id, self.faction, self.pos);
        let config = ctx.config;
        let mut spawned = Vec::new();
        match &mut self.subsystem {
            Subsystem::Solar(array) => {
                array.tick(ctx.dt, pos, &mut self.energy, self.max_energy, ctx.galaxy, ctx.claims, config);
            }
            Subsystem::Nebula(ring) => {
                if let Some(drone) = ring.tick(ctx.dt, ctx.owned_drones, id, faction, pos, config) {
                    spawned.push(FlagshipSpawn::Drone(drone));
                }
            }
            Subsystem::Pirate(turrets) | Subsystem::Explorers(turrets) => {
                for turret in turrets.iter_mut() {
                    if let Some(shot) = turret.tick(ctx.dt, pos, id, faction, ctx.contacts, config) {
                        spawned.push(FlagshipSpawn::Projectile(shot));
                    }
                }
            }
            Subsystem::Guild(city) => {
                for turret in city.turrets_mut() {
                    if let Some(shot) = turret.tick(ctx.dt, pos, id, faction, ctx.contacts, config) {
                        spawned.push(FlagshipSpawn::Projectile(shot));
                    }
                }
            }
        }
        spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_hull_collision() {
        let config = SimulationConfig::default();
        let ship = FactionFlagship::pirate(EntityId(1), Vec2::new(1000.0, 1000.0), &config);
        assert!(ship.collides_with_point(1000.0 + FLAGSHIP_RADIUS + FLAGSHIP_AURA + 5.0, 1000.0, 10.0));
        assert!(!ship.collides_with_point(1000.0 + FLAGSHIP_RADIUS + FLAGSHIP_AURA + 15.0, 1000.0, 10.0));
    }

    #[test]
    fn test_engagement_ring_annulus() {
        let config = SimulationConfig::default();
        let ship = FactionFlagship::nebula(EntityId(1), Vec2::ZERO, &config);
        let ring = ship.engagement_ring.unwrap();
        let mid = (ring.inner + ring.outer) * 0.5;
        assert!(ship.collides_with_point(mid, 0.0, 1.0));
        // Gap between hull aura and ring
        let gap = (FLAGSHIP_RADIUS + FLAGSHIP_AURA + ring.inner) * 0.5;
        assert!(!ship.collides_with_point(0.0, gap, 1.0));
        assert!(!ship.collides_with_point(ring.outer + 20.0, 0.0, 1.0));
    }

    #[test]
    fn test_push_out_clears_collision() {
        let config = SimulationConfig::default();
        let ship = FactionFlagship::nebula(EntityId(1), Vec2::ZERO, &config);
        let ring = ship.engagement_ring.unwrap();
        for probe in [Vec2::new(30.0, 0.0), Vec2::new(0.0, ring.inner + 2.0), Vec2::new(ring.outer - 1.0, 0.0)] {
            let moved = ship.push_out(probe, 10.0).unwrap();
            assert!(!ship.collides_with_point(moved.x, moved.y, 9.9), "{:?} -> {:?}", probe, moved);
        }
    }

    #[test]
    fn test_guild_buildings_collide() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ship = FactionFlagship::guild(EntityId(1), Vec2::new(100.0, 100.0), &config, &mut rng);
        let Subsystem::Guild(city) = &ship.subsystem else {
            panic!("expected a city");
        };
        let b = &city.buildings[0];
        let at = ship.pos + b.offset;
        assert!(ship.collides_with_point(at.x, at.y, 1.0));
    }

    #[test]
    fn test_nebula_launches_full_ring() {
        let config = SimulationConfig::default();
        let mut ship = FactionFlagship::nebula(EntityId(1), Vec2::ZERO, &config);
        let drones = ship.initial_drones(&config);
        assert_eq!(drones.len(), nebula::RING_DRONES);
        assert!(drones.iter().all(|d| d.owner == EntityId(1) && d.faction == Faction::Nebula));
    }
}
