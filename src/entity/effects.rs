//! Ship specials and free-standing area effects
//!
//! Specials ride on a ship and end with it. Area effects live in the world's
//! effect pool and are referenced only by the owner id.

use serde::{Deserialize, Serialize};

use crate::core::types::{normalize_angle, EntityId, Faction, Vec2};
use crate::entity::ship::Ship;

/// Saved ship state while a solar link is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarLink {
    pub remaining: f32,
    pub saved_recharge: f32,
    pub saved_cooldowns: Vec<f32>,
}

impl SolarLink {
    /// A link request; the saved values are filled in when a ship engages it
    pub fn new(duration: f32) -> Self {
        Self { remaining: duration, saved_recharge: 0.0, saved_cooldowns: Vec::new() }
    }
}

/// Transient effect attached to a ship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Special {
    /// Absorbs damage before the shield; gone at zero strength
    AreaShieldAura { strength: f32, radius: f32, remaining: f32 },
    /// Restores hull at `rate` per second
    RepairNanobots { rate: f32, remaining: f32 },
    SolarLink(SolarLink),
    /// Cuts an asteroid at `rate` hp per second while in range
    MiningBeam { asteroid: EntityId, rate: f32, range: f32, remaining: f32 },
}

/// Requests from specials and area effects that touch other parts of the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectEvent {
    Mine { ship: EntityId, asteroid: EntityId, amount: f32, range: f32 },
    /// A spore cloud's once-per-second damage pulse
    SporePulse { effect: EntityId, damage: f32 },
    /// A tractor probe arrived and collapses into a black hole
    Collapse { pos: Vec2, lifetime: f32 },
}

impl Special {
    pub fn tick(&mut self, dt: f32, ship: &mut Ship) -> Option<EffectEvent> {
        match self {
            Special::AreaShieldAura { remaining, .. } => {
                *remaining -= dt;
                None
            }
            Special::RepairNanobots { rate, remaining } => {
                let step = dt.min(remaining.max(0.0));
                ship.hull = (ship.hull + *rate * step).min(ship.max_hull);
                *remaining -= dt;
                None
            }
            Special::SolarLink(link) => {
                link.remaining -= dt;
                None
            }
            Special::MiningBeam { asteroid, rate, range, remaining } => {
                *remaining -= dt;
                Some(EffectEvent::Mine { ship: ship.id, asteroid: *asteroid, amount: *rate * dt, range: *range })
            }
        }
    }

    pub fn expired(&self) -> bool {
        match self {
            Special::AreaShieldAura { strength, remaining, .. } => *strength <= 0.0 || *remaining <= 0.0,
            Special::RepairNanobots { remaining, .. } | Special::MiningBeam { remaining, .. } => *remaining <= 0.0,
            Special::SolarLink(link) => link.remaining <= 0.0,
        }
    }

    /// Undo whatever the special changed on its ship
    pub fn release(&self, ship: &mut Ship) {
        if let Special::SolarLink(link) = self {
            ship.shield.recharge_rate = link.saved_recharge;
            for (weapon, cooldown) in ship.weapons.iter_mut().zip(&link.saved_cooldowns) {
                weapon.cooldown = *cooldown;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaKind {
    /// Expanding ring, cosmetic once the drain has been applied
    EmpWave { radius: f32, max_radius: f32 },
    /// Disc that scales hostile displacement by `slow_factor`
    SlowField { radius: f32, slow_factor: f32 },
    /// Cone that damages hostiles once per second
    SporeCloud { direction: f32, half_angle: f32, range: f32, dps: f32, tick_timer: f32 },
    /// Travels to `destination` and collapses into a temporary black hole
    TractorProbe { destination: Vec2, speed: f32, hole_lifetime: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEffect {
    pub id: EntityId,
    pub owner: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub kind: AreaKind,
    pub remaining: f32,
}

impl AreaEffect {
    pub fn new(owner: EntityId, faction: Faction, pos: Vec2, kind: AreaKind, duration: f32) -> Self {
        Self { id: EntityId(0), owner, faction, pos, kind, remaining: duration }
    }

    pub fn expired(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn tick(&mut self, dt: f32) -> Option<EffectEvent> {
        self.remaining -= dt;
        match &mut self.kind {
            AreaKind::EmpWave { radius, max_radius } => {
                *radius = (*radius + *max_radius * 2.0 * dt).min(*max_radius);
                None
            }
            AreaKind::SlowField { .. } => None,
            AreaKind::SporeCloud { dps, tick_timer, .. } => {
                *tick_timer += dt;
                if *tick_timer >= 1.0 {
                    *tick_timer -= 1.0;
                    return Some(EffectEvent::SporePulse { effect: self.id, damage: *dps });
                }
                None
            }
            AreaKind::TractorProbe { destination, speed, hole_lifetime } => {
                let step = *speed * dt;
                if self.pos.distance(destination) <= step {
                    self.pos = *destination;
                    self.remaining = 0.0;
                    return Some(EffectEvent::Collapse { pos: *destination, lifetime: *hole_lifetime });
                }
                self.pos += (*destination - self.pos).normalize() * step;
                None
            }
        }
    }

    /// Displacement multiplier this effect imposes at `pos` (1.0 if none)
    pub fn slow_at(&self, pos: Vec2) -> f32 {
        match self.kind {
            AreaKind::SlowField { radius, slow_factor } if self.pos.distance(&pos) <= radius => slow_factor,
            _ => 1.0,
        }
    }

    /// True if `pos` lies inside a spore cone
    pub fn in_cone(&self, pos: Vec2) -> bool {
        match self.kind {
            AreaKind::SporeCloud { direction, half_angle, range, .. } => {
                let d = self.pos.distance(&pos);
                d <= range && (d < 1e-3 || normalize_angle(self.pos.angle_to(&pos) - direction).abs() <= half_angle)
            }
            _ => false,
        }
    }
}
