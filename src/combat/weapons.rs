//! Weapons: cooldown gating, charging and the entities each kind fires
//!
//! A weapon never touches the world. `fire` returns a `Spawn` and the world
//! assigns the id and inserts it into the matching pool.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::combat::laser::LaserBeam;
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Faction, Vec2};
use crate::entity::{AreaEffect, AreaKind, Deployable, Drone, Projectile, ProjectileKind};
use crate::world::galaxy::Galaxy;

/// Simultaneous drones a Drone weapon may keep out
pub const MAX_DRONES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeaponKind {
    Basic,
    Laser { length: f32, channel_time: f32 },
    /// Lays bomb drones
    Mine,
    Drone,
    Missile,
    /// Charge with `start_charging`, fire with `release`
    IonSymbiont { charge: Option<f32>, max_charge: f32 },
    /// Alternates slow fields and weak curved shots
    ChronoWhip { field_timer: f32, field_cooldown: f32, field_remaining: f32, field_duration: f32 },
    Spores,
    LightChanneler,
}

/// What the caller knows about the shooter's surroundings
#[derive(Debug, Clone, Copy)]
pub struct FireContext<'a> {
    pub faction: Faction,
    /// Locked target for guided kinds
    pub target: Option<EntityId>,
    pub owned_drones: usize,
    pub galaxy: &'a Galaxy,
    pub config: &'a SimulationConfig,
}

/// Entity produced by a weapon
#[derive(Debug, Clone, PartialEq)]
pub enum Spawn {
    Projectile(Projectile),
    Beam(LaserBeam),
    Drone(Drone),
    Effect(AreaEffect),
    Deployable(Deployable),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: f32,
    pub speed: f32,
    pub cooldown: f32,
    pub timer: f32,
    pub owner: EntityId,
    pub kind: WeaponKind,
}

impl Weapon {
    pub fn new(name: &str, kind: WeaponKind, damage: f32, speed: f32, cooldown: f32) -> Self {
        Self {
            name: name.to_string(),
            damage,
            speed,
            cooldown,
            // Ready on spawn
            timer: cooldown,
            owner: EntityId(0),
            kind,
        }
    }

    pub fn basic(damage: f32, speed: f32, cooldown: f32) -> Self {
        Self::new("Blaster", WeaponKind::Basic, damage, speed, cooldown)
    }

    pub fn laser() -> Self {
        Self::new("Laser", WeaponKind::Laser { length: 450.0, channel_time: 1.2 }, 25.0, 0.0, 3.0)
    }

    pub fn mine() -> Self {
        Self::new("Mine Layer", WeaponKind::Mine, 35.0, 0.0, 2.5)
    }

    pub fn drone() -> Self {
        Self::new("Drone Bay", WeaponKind::Drone, 4.0, 0.0, 4.0)
    }

    pub fn missile(config: &SimulationConfig) -> Self {
        Self::new("Missile", WeaponKind::Missile, 20.0, config.guided_missile_speed, 2.0)
    }

    pub fn ion_symbiont(config: &SimulationConfig) -> Self {
        let kind = WeaponKind::IonSymbiont { charge: None, max_charge: config.ion_max_charge };
        Self::new("Ion Symbiont", kind, 12.0, config.projectile_speed * 0.8, 1.5)
    }

    pub fn chrono_whip() -> Self {
        let kind = WeaponKind::ChronoWhip { field_timer: 10.0, field_cooldown: 10.0, field_remaining: 0.0, field_duration: 4.0 };
        Self::new("Chrono Whip", kind, 8.0, 420.0, 0.6)
    }

    pub fn spores() -> Self {
        Self::new("Spores", WeaponKind::Spores, 6.0, 0.0, 6.0)
    }

    pub fn light_channeler() -> Self {
        Self::new("Light Channeler", WeaponKind::LightChanneler, 0.0, 0.0, 12.0)
    }

    /// Cooldown after modifiers; a chrono whip with a live field cycles faster
    pub fn effective_cooldown(&self) -> f32 {
        match self.kind {
            WeaponKind::ChronoWhip { field_remaining, .. } if field_remaining > 0.0 => self.cooldown * 0.9,
            _ => self.cooldown,
        }
    }

    pub fn can_fire(&self) -> bool {
        self.timer >= self.effective_cooldown()
    }

    pub fn tick(&mut self, dt: f32) {
        self.timer += dt;
        match &mut self.kind {
            WeaponKind::IonSymbiont { charge: Some(charge), max_charge } => {
                *charge = (*charge + dt).min(*max_charge);
            }
            WeaponKind::ChronoWhip { field_timer, field_remaining, .. } => {
                *field_timer += dt;
                *field_remaining = (*field_remaining - dt).max(0.0);
            }
            _ => {}
        }
    }

    pub fn is_charging(&self) -> bool {
        matches!(self.kind, WeaponKind::IonSymbiont { charge: Some(_), .. })
    }

    pub fn start_charging(&mut self) {
        if let WeaponKind::IonSymbiont { charge, .. } = &mut self.kind {
            if charge.is_none() {
                *charge = Some(0.0);
            }
        }
    }

    /// Fire a charged shot. Damage is `base × (1 + charge_ratio)`.
    pub fn release(&mut self, origin: Vec2, aim: Vec2, ctx: &FireContext) -> Option<Spawn> {
        let WeaponKind::IonSymbiont { charge, max_charge } = &mut self.kind else {
            return self.fire(origin, aim, ctx);
        };
        let ratio = match charge.take() {
            Some(c) if *max_charge > 0.0 => c / *max_charge,
            _ => 0.0,
        };
        if !self.can_fire() {
            return None;
        }
        self.timer = 0.0;
        Some(Spawn::Projectile(self.ion_shot(origin, aim, ctx, ratio)))
    }

    fn ion_shot(&self, origin: Vec2, aim: Vec2, ctx: &FireContext, ratio: f32) -> Projectile {
        let config = ctx.config;
        Projectile::new(self.owner, ctx.faction, origin, aim, self.speed, self.damage * (1.0 + ratio))
            .with_kind(ProjectileKind::IonSymbiont { dot_duration: config.ion_dot_duration })
            .with_max_distance(config.projectile_max_distance)
            .with_aftermath(config.aftermath_time)
    }

    /// Fire toward `aim`. A no-op returning `None` while cooling down or when
    /// the shot has nothing to produce (no star in reach, drone cap).
    pub fn fire(&mut self, origin: Vec2, aim: Vec2, ctx: &FireContext) -> Option<Spawn> {
        if !self.can_fire() {
            return None;
        }
        let spawn = self.build(origin, aim, ctx)?;
        self.timer = 0.0;
        if let WeaponKind::ChronoWhip { field_timer, field_remaining, field_duration, .. } = &mut self.kind {
            if matches!(spawn, Spawn::Effect(_)) {
                *field_timer = 0.0;
                *field_remaining = *field_duration;
            }
        }
        Some(spawn)
    }

    fn build(&self, origin: Vec2, aim: Vec2, ctx: &FireContext) -> Option<Spawn> {
        let config = ctx.config;
        let faction = ctx.faction;
        match &self.kind {
            WeaponKind::Basic => Some(Spawn::Projectile(
                Projectile::new(self.owner, faction, origin, aim, self.speed, self.damage)
                    .with_max_distance(config.projectile_max_distance),
            )),
            WeaponKind::Laser { length, channel_time } => Some(Spawn::Beam(LaserBeam::new(
                self.owner,
                faction,
                origin,
                origin.angle_to(&aim),
                *length,
                self.damage,
                *channel_time,
            ))),
            WeaponKind::Mine => Some(Spawn::Drone(Drone::bomb(self.owner, faction, origin, self.damage, config))),
            WeaponKind::Drone => {
                if ctx.owned_drones >= MAX_DRONES {
                    return None;
                }
                let angle = ctx.owned_drones as f32 * TAU / MAX_DRONES as f32;
                let mut drone = Drone::escort(self.owner, faction, origin, config).with_orbit(angle, config.drone_orbit_radius, 1.5);
                drone.damage = self.damage;
                Some(Spawn::Drone(drone))
            }
            WeaponKind::Missile => Some(Spawn::Projectile(
                Projectile::new(self.owner, faction, origin, aim, self.speed, self.damage)
                    .with_kind(ProjectileKind::GuidedMissile {
                        target: ctx.target,
                        delay: config.guided_missile_delay,
                        turn_rate: config.homing_projectile_turn_rate,
                    })
                    .with_lifetime(config.guided_missile_lifetime)
                    .with_aftermath(config.aftermath_time),
            )),
            WeaponKind::IonSymbiont { .. } => Some(Spawn::Projectile(self.ion_shot(origin, aim, ctx, 0.0))),
            WeaponKind::ChronoWhip { field_timer, field_cooldown, field_duration, .. } => {
                if field_timer >= field_cooldown {
                    let kind = AreaKind::SlowField { radius: 150.0, slow_factor: 0.5 };
                    Some(Spawn::Effect(AreaEffect::new(self.owner, faction, aim, kind, *field_duration)))
                } else {
                    Some(Spawn::Projectile(
                        Projectile::new(self.owner, faction, origin, aim, self.speed, self.damage * 0.5)
                            .with_kind(ProjectileKind::Curved { angular_velocity: 0.8 })
                            .with_max_distance(config.projectile_max_distance * 0.5),
                    ))
                }
            }
            WeaponKind::Spores => {
                let kind = AreaKind::SporeCloud {
                    direction: origin.angle_to(&aim),
                    half_angle: 0.4,
                    range: 250.0,
                    dps: self.damage,
                    tick_timer: 0.0,
                };
                Some(Spawn::Effect(AreaEffect::new(self.owner, faction, origin, kind, 5.0)))
            }
            WeaponKind::LightChanneler => {
                let system = ctx.galaxy.nearest_star(origin)?;
                let star_center = system.center;
                if star_center.distance(&origin) - system.star.radius > config.channeler_range {
                    return None;
                }
                let outward = (origin - star_center).normalize();
                let outward = if outward.length() > 0.0 { outward } else { Vec2::new(1.0, 0.0) };
                let pos = star_center + outward * (system.star.radius + 10.0);
                Some(Spawn::Deployable(Deployable::channeler(self.owner, faction, pos, system.id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IdAllocator;
    use crate::world::galaxy::StarSystem;

    fn ctx<'a>(galaxy: &'a Galaxy, config: &'a SimulationConfig, owned_drones: usize) -> FireContext<'a> {
        FireContext { faction: Faction::Player, target: None, owned_drones, galaxy, config }
    }

    #[test]
    fn test_cooldown_gates_fire() {
        let config = SimulationConfig::default();
        let galaxy = Galaxy::empty(&config);
        let mut w = Weapon::basic(10.0, 400.0, 0.5);
        assert!(w.fire(Vec2::ZERO, Vec2::new(1.0, 0.0), &ctx(&galaxy, &config, 0)).is_some());
        assert!(!w.can_fire());
        assert!(w.fire(Vec2::ZERO, Vec2::new(1.0, 0.0), &ctx(&galaxy, &config, 0)).is_none());
        w.tick(0.5);
        assert!(w.can_fire());
    }

    #[test]
    fn test_drone_cap() {
        let config = SimulationConfig::default();
        let galaxy = Galaxy::empty(&config);
        let mut w = Weapon::drone();
        assert!(w.fire(Vec2::ZERO, Vec2::ZERO, &ctx(&galaxy, &config, MAX_DRONES)).is_none());
        assert!(w.can_fire(), "a refused launch keeps the weapon ready");
        assert!(matches!(w.fire(Vec2::ZERO, Vec2::ZERO, &ctx(&galaxy, &config, 2)), Some(Spawn::Drone(_))));
    }

    #[test]
    fn test_charged_release_scales_damage() {
        let config = SimulationConfig::default();
        let galaxy = Galaxy::empty(&config);
        let mut w = Weapon::ion_symbiont(&config);
        w.start_charging();
        for _ in 0..100 {
            w.tick(0.1);
        }
        let Some(Spawn::Projectile(p)) = w.release(Vec2::ZERO, Vec2::new(1.0, 0.0), &ctx(&galaxy, &config, 0)) else {
            panic!("expected a shot");
        };
        // Charge capped at max_charge, so ratio is 1
        assert!((p.damage - w.damage * 2.0).abs() < 1e-4);
        assert!(!w.is_charging());
    }

    #[test]
    fn test_chrono_whip_alternates_and_speeds_up() {
        let config = SimulationConfig::default();
        let galaxy = Galaxy::empty(&config);
        let mut w = Weapon::chrono_whip();
        let first = w.fire(Vec2::ZERO, Vec2::new(100.0, 0.0), &ctx(&galaxy, &config, 0));
        assert!(matches!(first, Some(Spawn::Effect(_))));
        assert!((w.effective_cooldown() - w.cooldown * 0.9).abs() < 1e-6);
        w.tick(1.0);
        let second = w.fire(Vec2::ZERO, Vec2::new(100.0, 0.0), &ctx(&galaxy, &config, 0));
        assert!(matches!(second, Some(Spawn::Projectile(_))));
        w.tick(5.0);
        assert_eq!(w.effective_cooldown(), w.cooldown);
    }

    #[test]
    fn test_light_channeler_needs_a_star() {
        let config = SimulationConfig::default();
        let mut galaxy = Galaxy::empty(&config);
        let mut w = Weapon::light_channeler();
        assert!(w.fire(Vec2::new(500.0, 500.0), Vec2::ZERO, &ctx(&galaxy, &config, 0)).is_none());

        let mut ids = IdAllocator::new();
        galaxy.add_system(StarSystem::new(ids.next_id(), "Sol", Vec2::new(1000.0, 1000.0), 60.0, 100.0));
        let spawn = w.fire(Vec2::new(1000.0, 1300.0), Vec2::ZERO, &ctx(&galaxy, &config, 0));
        let Some(Spawn::Deployable(channeler)) = spawn else {
            panic!("expected a channeler");
        };
        assert!((channeler.pos.distance(&Vec2::new(1000.0, 1000.0)) - 70.0).abs() < 1e-3);
    }
}
