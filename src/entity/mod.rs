//! Entity kernel - everything that moves or expires inside the world
//!
//! Every entity has a `tick` and an `expired` predicate. Cross-entity references
//! are plain `EntityId`s; the world owns all of them.

pub mod deployable;
pub mod drone;
pub mod effects;
pub mod projectile;
pub mod ship;

pub use deployable::{Deployable, DeployableKind};
pub use drone::{AggroState, BombPhase, Drone, DroneAction, DroneContext, DroneKind, DroneOutput};
pub use effects::{AreaEffect, AreaKind, EffectEvent, SolarLink, Special};
pub use projectile::{Blast, Projectile, ProjectileEffect, ProjectileKind, ProjectilePhase};
pub use ship::{hyperjump_duration, Boost, Environment, InputState, MovementMode, Shield, Ship};

use crate::core::types::{EntityId, Faction, Vec2};

/// What kind of object a contact refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Ship,
    Drone,
    Decoy,
    Flagship,
    Deployable,
}

/// Position snapshot of a damageable object, rebuilt once per tick
///
/// Weapons, drones and beams aim at contacts instead of borrowing the live
/// entities, which keeps the update phase free of aliasing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub id: EntityId,
    pub faction: Faction,
    pub kind: ContactKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
}

/// Nearest contact hostile to `faction` within `range` of `pos`
pub fn nearest_hostile(contacts: &[Contact], faction: Faction, pos: Vec2, range: f32) -> Option<&Contact> {
    contacts
        .iter()
        .filter(|c| faction.is_hostile_to(c.faction))
        .map(|c| (c, c.pos.distance(&pos)))
        .filter(|(_, d)| *d <= range)
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)))
        .map(|(c, _)| c)
}

pub fn find_contact(contacts: &[Contact], id: EntityId) -> Option<&Contact> {
    contacts.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: u32, faction: Faction, x: f32) -> Contact {
        Contact {
            id: EntityId(id),
            faction,
            kind: ContactKind::Ship,
            pos: Vec2::new(x, 0.0),
            vel: Vec2::ZERO,
            size: 10.0,
        }
    }

    #[test]
    fn test_nearest_hostile_skips_friends_and_range() {
        let contacts = vec![
            contact(1, Faction::Player, 10.0),
            contact(2, Faction::Pirate, 50.0),
            contact(3, Faction::Pirate, 30.0),
            contact(4, Faction::Pirate, 900.0),
        ];
        let found = nearest_hostile(&contacts, Faction::Player, Vec2::ZERO, 100.0).unwrap();
        assert_eq!(found.id, EntityId(3));
        assert!(nearest_hostile(&contacts, Faction::Player, Vec2::new(2000.0, 0.0), 100.0).is_none());
    }

    #[test]
    fn test_nearest_hostile_ties_break_by_id() {
        let contacts = vec![contact(7, Faction::Pirate, 20.0), contact(5, Faction::Pirate, -20.0)];
        let found = nearest_hostile(&contacts, Faction::Player, Vec2::ZERO, 100.0).unwrap();
        assert_eq!(found.id, EntityId(5));
    }
}
