//! Star-channeling deployables: channeler, battery and star turret
//!
//! The three stages reference each other by id. Their cross-entity update
//! (energy transfer, staged spawning, turret fire) lives in
//! `combat::channeler`.

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, Faction, Vec2};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeployableKind {
    /// Anchored at a star's edge, pumps energy into its battery
    Channeler { star: EntityId, age: f32, battery: Option<EntityId>, turret: Option<EntityId> },
    Battery { energy: f32, capacity: f32 },
    /// `facing` is the outward normal from the star; shots must stay inside
    /// the arc around it
    StarTurret { battery: EntityId, facing: f32, fire_timer: f32, connected: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployable {
    pub id: EntityId,
    pub owner: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub size: f32,
    pub kind: DeployableKind,
}

impl Deployable {
    pub fn channeler(owner: EntityId, faction: Faction, pos: Vec2, star: EntityId) -> Self {
        Self {
            id: EntityId(0),
            owner,
            faction,
            pos,
            hp: 60.0,
            max_hp: 60.0,
            size: 12.0,
            kind: DeployableKind::Channeler { star, age: 0.0, battery: None, turret: None },
        }
    }

    pub fn battery(owner: EntityId, faction: Faction, pos: Vec2, capacity: f32) -> Self {
        Self {
            id: EntityId(0),
            owner,
            faction,
            pos,
            hp: 80.0,
            max_hp: 80.0,
            size: 14.0,
            kind: DeployableKind::Battery { energy: 0.0, capacity },
        }
    }

    pub fn star_turret(owner: EntityId, faction: Faction, pos: Vec2, battery: EntityId, facing: f32) -> Self {
        Self {
            id: EntityId(0),
            owner,
            faction,
            pos,
            hp: 100.0,
            max_hp: 100.0,
            size: 16.0,
            kind: DeployableKind::StarTurret { battery, facing, fire_timer: 0.0, connected: false },
        }
    }

    pub fn expired(&self) -> bool {
        self.hp <= 0.0
    }

    pub fn apply_damage(&mut self, amount: f32) {
        self.hp = (self.hp - amount).max(0.0);
    }

    pub fn is_battery(&self) -> bool {
        matches!(self.kind, DeployableKind::Battery { .. })
    }

    pub fn is_turret(&self) -> bool {
        matches!(self.kind, DeployableKind::StarTurret { .. })
    }

    pub fn is_channeler(&self) -> bool {
        matches!(self.kind, DeployableKind::Channeler { .. })
    }

    /// Stored energy for batteries, zero for everything else
    pub fn energy(&self) -> f32 {
        match self.kind {
            DeployableKind::Battery { energy, .. } => energy,
            _ => 0.0,
        }
    }

    /// Add up to `amount` to a battery; returns what fit
    pub fn charge(&mut self, amount: f32) -> f32 {
        match &mut self.kind {
            DeployableKind::Battery { energy, capacity } => {
                let stored = amount.min(*capacity - *energy).max(0.0);
                *energy += stored;
                stored
            }
            _ => 0.0,
        }
    }

    /// Spend exactly `amount` from a battery; false if there is not enough
    pub fn spend(&mut self, amount: f32) -> bool {
        match &mut self.kind {
            DeployableKind::Battery { energy, .. } if *energy >= amount => {
                *energy -= amount;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_charge_respects_capacity() {
        let mut battery = Deployable::battery(EntityId(1), Faction::Player, Vec2::ZERO, 50.0);
        assert_eq!(battery.charge(30.0), 30.0);
        assert_eq!(battery.charge(30.0), 20.0);
        assert_eq!(battery.energy(), 50.0);
        assert!(battery.spend(10.0));
        assert!(!battery.spend(100.0));
        assert_eq!(battery.energy(), 40.0);
    }

    #[test]
    fn test_only_batteries_hold_energy() {
        let mut turret = Deployable::star_turret(EntityId(1), Faction::Player, Vec2::ZERO, EntityId(2), 0.0);
        assert_eq!(turret.charge(10.0), 0.0);
        assert!(!turret.spend(0.0));
        assert!(turret.is_turret());
    }
}
