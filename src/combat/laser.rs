//! Laser beam state machine: probe → channel → fizzle → done

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, Faction, Vec2};
use crate::entity::{find_contact, Contact};

/// Alpha lost per second while fizzling
const FIZZLE_RATE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BeamPhase {
    /// First tick: look for something along the ray
    Probe,
    Channel { target: EntityId, remaining: f32 },
    Fizzle { alpha: f32 },
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserBeam {
    pub id: EntityId,
    pub owner: EntityId,
    pub faction: Faction,
    pub origin: Vec2,
    pub angle: f32,
    pub length: f32,
    /// Damage per second while channeling
    pub damage_rate: f32,
    pub channel_time: f32,
    pub phase: BeamPhase,
}

impl LaserBeam {
    pub fn new(owner: EntityId, faction: Faction, origin: Vec2, angle: f32, length: f32, damage_rate: f32, channel_time: f32) -> Self {
        Self {
            id: EntityId(0),
            owner,
            faction,
            origin,
            angle,
            length,
            damage_rate,
            channel_time,
            phase: BeamPhase::Probe,
        }
    }

    pub fn expired(&self) -> bool {
        matches!(self.phase, BeamPhase::Done)
    }

    pub fn end(&self) -> Vec2 {
        self.origin + Vec2::from_angle(self.angle) * self.length
    }

    /// Nearest hostile contact crossed by the ray
    fn probe(&self, contacts: &[Contact]) -> Option<EntityId> {
        let dir = Vec2::from_angle(self.angle);
        contacts
            .iter()
            .filter(|c| self.faction.is_hostile_to(c.faction))
            .filter_map(|c| {
                let rel = c.pos - self.origin;
                let along = rel.dot(&dir);
                if along < 0.0 || along > self.length + c.size {
                    return None;
                }
                let across = (rel - dir * along).length();
                (across <= c.size).then_some((c.id, along))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    /// Advance one tick. Returns the damage dealt to the channeled target.
    ///
    /// `owner_pos` anchors the beam to its ship; `None` means the owner is
    /// gone and the beam fizzles.
    pub fn tick(&mut self, dt: f32, owner_pos: Option<Vec2>, contacts: &[Contact]) -> Option<(EntityId, f32)> {
        if let Some(pos) = owner_pos {
            self.origin = pos;
        }
        match self.phase {
            BeamPhase::Probe => {
                self.phase = match (owner_pos, self.probe(contacts)) {
                    (Some(_), Some(target)) => BeamPhase::Channel { target, remaining: self.channel_time },
                    _ => BeamPhase::Fizzle { alpha: 1.0 },
                };
                None
            }
            BeamPhase::Channel { target, remaining } => {
                let contact = owner_pos.and(find_contact(contacts, target));
                let Some(contact) = contact.filter(|c| c.pos.distance(&self.origin) <= self.length + c.size) else {
                    self.phase = BeamPhase::Fizzle { alpha: 1.0 };
                    return None;
                };
                self.angle = self.origin.angle_to(&contact.pos);
                let step = dt.min(remaining.max(0.0));
                let remaining = remaining - dt;
                self.phase = if remaining <= 0.0 {
                    BeamPhase::Fizzle { alpha: 1.0 }
                } else {
                    BeamPhase::Channel { target, remaining }
                };
                Some((target, self.damage_rate * step))
            }
            BeamPhase::Fizzle { alpha } => {
                let alpha = alpha - FIZZLE_RATE * dt;
                self.phase = if alpha <= 0.0 { BeamPhase::Done } else { BeamPhase::Fizzle { alpha } };
                None
            }
            BeamPhase::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ContactKind;

    fn target(x: f32, y: f32) -> Contact {
        Contact { id: EntityId(7), faction: Faction::Pirate, kind: ContactKind::Ship, pos: Vec2::new(x, y), vel: Vec2::ZERO, size: 15.0 }
    }

    #[test]
    fn test_beam_channels_then_fizzles() {
        let mut beam = LaserBeam::new(EntityId(1), Faction::Player, Vec2::ZERO, 0.0, 300.0, 20.0, 1.0);
        let contacts = [target(200.0, 5.0)];
        assert_eq!(beam.tick(0.1, Some(Vec2::ZERO), &contacts), None);
        assert!(matches!(beam.phase, BeamPhase::Channel { .. }));
        let mut total = 0.0;
        for _ in 0..12 {
            if let Some((_, dmg)) = beam.tick(0.1, Some(Vec2::ZERO), &contacts) {
                total += dmg;
            }
        }
        assert!((total - 20.0).abs() < 1e-3);
        assert!(matches!(beam.phase, BeamPhase::Fizzle { .. }));
        for _ in 0..6 {
            beam.tick(0.1, Some(Vec2::ZERO), &contacts);
        }
        assert!(beam.expired());
    }

    #[test]
    fn test_beam_misses_and_fizzles() {
        let mut beam = LaserBeam::new(EntityId(1), Faction::Player, Vec2::ZERO, 0.0, 300.0, 20.0, 1.0);
        let contacts = [target(0.0, 200.0)];
        beam.tick(0.1, Some(Vec2::ZERO), &contacts);
        assert!(matches!(beam.phase, BeamPhase::Fizzle { .. }));
    }

    #[test]
    fn test_beam_breaks_when_target_leaves_range() {
        let mut beam = LaserBeam::new(EntityId(1), Faction::Player, Vec2::ZERO, 0.0, 300.0, 20.0, 2.0);
        beam.tick(0.1, Some(Vec2::ZERO), &[target(200.0, 0.0)]);
        // Tracks a moving target
        assert!(beam.tick(0.1, Some(Vec2::ZERO), &[target(200.0, 100.0)]).is_some());
        assert!(beam.angle > 0.0);
        assert_eq!(beam.tick(0.1, Some(Vec2::ZERO), &[target(600.0, 0.0)]), None);
        assert!(matches!(beam.phase, BeamPhase::Fizzle { .. }));
    }
}
