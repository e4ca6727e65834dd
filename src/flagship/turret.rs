//! Hull-mounted turrets: Pirate bomb turrets, Free Explorer missile turrets
//! and the Cosmic Guild's city turrets

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::core::config::SimulationConfig;
use crate::core::types::{normalize_angle, rotate_toward, EntityId, Faction, Vec2};
use crate::entity::{nearest_hostile, Contact, Projectile, ProjectileKind};

/// A turret only fires once its barrel is this close to the bearing
pub const AIM_TOLERANCE: f32 = 0.1;

const BOMB_DAMAGE: f32 = 25.0;
const MISSILE_DAMAGE: f32 = 12.0;

/// Speed and lifetime scale for rim missiles
pub const RIM_MISSILE_SPEED_SCALE: f32 = 0.7;
pub const RIM_MISSILE_LIFETIME_SCALE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Munition {
    Bomb,
    /// Guided missile with reduced speed and lifetime
    RimMissile,
    CityMissile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turret {
    /// Mount angle around the hull center, fixed for the turret's life
    pub mount_angle: f32,
    pub mount_distance: f32,
    /// Barrel direction (radians)
    pub facing: f32,
    pub turn_rate: f32,
    pub range: f32,
    pub cooldown: f32,
    pub timer: f32,
    pub munition: Munition,
}

impl Turret {
    pub fn new(mount_angle: f32, mount_distance: f32, munition: Munition, config: &SimulationConfig) -> Self {
        Self {
            mount_angle,
            mount_distance,
            facing: mount_angle,
            turn_rate: config.pirate_turret_turn_rate,
            range: config.pirate_turret_range,
            cooldown: config.pirate_turret_cooldown,
            timer: 0.0,
            munition,
        }
    }

    /// Turret position given the hull center
    pub fn position(&self, hull_center: Vec2) -> Vec2 {
        hull_center + Vec2::from_angle(self.mount_angle) * self.mount_distance
    }

    /// Track the nearest hostile and fire when aimed and cooled down
    pub fn tick(
        &mut self,
        dt: f32,
        hull_center: Vec2,
        owner: EntityId,
        faction: Faction,
        contacts: &[Contact],
        config: &SimulationConfig,
    ) -> Option<Projectile> {
        self.timer += dt;
        let pos = self.position(hull_center);
        let target = nearest_hostile(contacts, faction, pos, self.range)?;
        let bearing = pos.angle_to(&target.pos);
        self.facing = rotate_toward(self.facing, bearing, self.turn_rate * dt);
        if normalize_angle(bearing - self.facing).abs() > AIM_TOLERANCE || self.timer < self.cooldown {
            return None;
        }
        self.timer = 0.0;
        let aim = pos + Vec2::from_angle(self.facing) * self.range;
        Some(self.shell(pos, aim, owner, faction, target.id, config))
    }

    fn shell(
        &self,
        pos: Vec2,
        aim: Vec2,
        owner: EntityId,
        faction: Faction,
        target: EntityId,
        config: &SimulationConfig,
    ) -> Projectile {
        let guided = ProjectileKind::GuidedMissile {
            target: Some(target),
            delay: config.guided_missile_delay,
            turn_rate: config.homing_projectile_turn_rate,
        };
        match self.munition {
            Munition::Bomb => Projectile::new(owner, faction, pos, aim, config.projectile_speed * 0.6, BOMB_DAMAGE)
                .with_kind(ProjectileKind::Bomb {
                    blast_radius: config.bomb_blast_radius,
                    trigger_radius: config.bomb_trigger_radius,
                })
                .with_max_distance(self.range),
            Munition::RimMissile => Projectile::new(
                owner,
                faction,
                pos,
                aim,
                config.guided_missile_speed * RIM_MISSILE_SPEED_SCALE,
                MISSILE_DAMAGE,
            )
            .with_kind(guided)
            .with_lifetime(config.guided_missile_lifetime * RIM_MISSILE_LIFETIME_SCALE)
            .with_aftermath(config.aftermath_time),
            Munition::CityMissile => Projectile::new(owner, faction, pos, aim, config.guided_missile_speed, MISSILE_DAMAGE)
                .with_kind(guided)
                .with_lifetime(config.guided_missile_lifetime)
                .with_aftermath(config.aftermath_time),
        }
    }
}

/// Four bomb turrets on the hull at 0, π/2, π, 3π/2
pub fn pirate_turrets(hull_radius: f32, config: &SimulationConfig) -> Vec<Turret> {
    (0..4)
        .map(|k| Turret::new(k as f32 * FRAC_PI_2, hull_radius, Munition::Bomb, config))
        .collect()
}

/// Four missile turrets near the outer rim, offset half a quadrant
pub fn rim_turrets(hull_radius: f32, config: &SimulationConfig) -> Vec<Turret> {
    (0..4)
        .map(|k| Turret::new(normalize_angle(FRAC_PI_4 + k as f32 * FRAC_PI_2), hull_radius * 0.9, Munition::RimMissile, config))
        .collect()
}

/// Mount angle folded into [0, 2π)
pub fn mount_angle_positive(turret: &Turret) -> f32 {
    let a = normalize_angle(turret.mount_angle);
    if a < 0.0 {
        a + 2.0 * PI
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ContactKind;

    fn contact_at(pos: Vec2) -> Contact {
        Contact { id: EntityId(40), faction: Faction::Player, kind: ContactKind::Ship, pos, vel: Vec2::ZERO, size: 15.0 }
    }

    #[test]
    fn test_pirate_turrets_on_cardinals() {
        let config = SimulationConfig::default();
        let turrets = pirate_turrets(120.0, &config);
        assert_eq!(turrets.len(), 4);
        let expected = [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2];
        for (turret, want) in turrets.iter().zip(expected) {
            assert!((mount_angle_positive(turret) - want).abs() < 1e-4);
            let offset = turret.position(Vec2::new(500.0, 500.0)).distance(&Vec2::new(500.0, 500.0));
            assert!((offset - 120.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_turret_rotation_is_bounded() {
        let config = SimulationConfig::default();
        let mut turret = Turret::new(0.0, 100.0, Munition::Bomb, &config);
        let center = Vec2::new(0.0, 0.0);
        // Target straight "up" from the turret, π/2 away from its facing
        let contacts = [contact_at(Vec2::new(100.0, 300.0))];
        let shot = turret.tick(0.1, center, EntityId(1), Faction::Pirate, &contacts, &config);
        assert!(shot.is_none());
        assert!((turret.facing - config.pirate_turret_turn_rate * 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_turret_fires_bomb_when_aimed() {
        let config = SimulationConfig::default();
        let mut turret = Turret::new(0.0, 100.0, Munition::Bomb, &config);
        let contacts = [contact_at(Vec2::new(400.0, 0.0))];
        let mut shots = Vec::new();
        for _ in 0..60 {
            if let Some(p) = turret.tick(0.05, Vec2::ZERO, EntityId(1), Faction::Pirate, &contacts, &config) {
                shots.push(p);
            }
        }
        assert!(!shots.is_empty());
        assert!(shots.iter().all(|p| p.is_bomb()));
    }

    #[test]
    fn test_rim_missiles_are_slower_and_shorter_lived() {
        let config = SimulationConfig::default();
        let mut turret = rim_turrets(100.0, &config).remove(0);
        turret.timer = turret.cooldown;
        let pos = turret.position(Vec2::ZERO);
        turret.facing = pos.angle_to(&Vec2::new(400.0, 400.0));
        let contacts = [contact_at(Vec2::new(400.0, 400.0))];
        let shot = turret.tick(0.01, Vec2::ZERO, EntityId(1), Faction::FreeExplorers, &contacts, &config);
        // Free Explorers only fight pirates
        assert!(shot.is_none());

        let pirates = [Contact { faction: Faction::Pirate, ..contacts[0] }];
        let shot = turret.tick(0.01, Vec2::ZERO, EntityId(1), Faction::FreeExplorers, &pirates, &config).unwrap();
        assert!((shot.speed - config.guided_missile_speed * RIM_MISSILE_SPEED_SCALE).abs() < 1e-3);
        assert_eq!(shot.lifetime, Some(config.guided_missile_lifetime * RIM_MISSILE_LIFETIME_SCALE));
    }
}
