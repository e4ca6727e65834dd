//! Projectiles and their phase machine
//!
//! Phases only ever advance: in-flight → attached → exploding → done. A
//! transition that would move backwards is ignored.

use serde::{Deserialize, Serialize};

use crate::core::types::{rotate_toward, EntityId, Faction, Vec2};
use crate::entity::{find_contact, Contact};

/// Flight behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProjectileKind {
    Straight,
    /// Velocity rotates at a constant rate
    Curved { angular_velocity: f32 },
    /// Follows a moving target at a bounded turn rate
    Homing { target: Option<EntityId>, turn_rate: f32 },
    /// Flies straight for `delay` seconds, then homes
    GuidedMissile { target: Option<EntityId>, delay: f32, turn_rate: f32 },
    /// Detonates at max distance or on proximity
    Bomb { blast_radius: f32, trigger_radius: f32 },
    /// Sticks to what it hits and burns for `dot_duration`
    IonSymbiont { dot_duration: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProjectilePhase {
    InFlight,
    Attached { target: EntityId, offset: Vec2, remaining: f32 },
    Exploding { timer: f32 },
    Done,
}

impl ProjectilePhase {
    pub fn ordinal(&self) -> u8 {
        match self {
            ProjectilePhase::InFlight => 0,
            ProjectilePhase::Attached { .. } => 1,
            ProjectilePhase::Exploding { .. } => 2,
            ProjectilePhase::Done => 3,
        }
    }
}

/// Area damage released by a detonation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blast {
    pub owner: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub radius: f32,
    pub damage: f32,
}

/// Side effects a projectile tick asks the world to apply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileEffect {
    /// Damage-over-time from an attached shot
    Dot { target: EntityId, amount: f32 },
    Detonate(Blast),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub vel: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub damage: f32,
    pub radius: f32,
    pub traveled: f32,
    /// Zero means unlimited range
    pub max_distance: f32,
    pub lifetime: Option<f32>,
    /// Seconds an explosion lingers
    pub aftermath: f32,
    pub kind: ProjectileKind,
    pub phase: ProjectilePhase,
}

impl Projectile {
    /// A projectile flying from `origin` toward `aim`; the world assigns the id
    pub fn new(owner: EntityId, faction: Faction, origin: Vec2, aim: Vec2, speed: f32, damage: f32) -> Self {
        let heading = origin.angle_to(&aim);
        Self {
            id: EntityId(0),
            owner,
            faction,
            pos: origin,
            vel: Vec2::from_angle(heading) * speed,
            heading,
            speed,
            damage,
            radius: 4.0,
            traveled: 0.0,
            max_distance: 0.0,
            lifetime: None,
            aftermath: 0.2,
            kind: ProjectileKind::Straight,
            phase: ProjectilePhase::InFlight,
        }
    }

    pub fn with_kind(mut self, kind: ProjectileKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_aftermath(mut self, aftermath: f32) -> Self {
        self.aftermath = aftermath;
        self
    }

    pub fn in_flight(&self) -> bool {
        matches!(self.phase, ProjectilePhase::InFlight)
    }

    pub fn expired(&self) -> bool {
        matches!(self.phase, ProjectilePhase::Done)
    }

    pub fn is_bomb(&self) -> bool {
        matches!(self.kind, ProjectileKind::Bomb { .. })
    }

    /// The entity this projectile is steering toward, if any
    pub fn target(&self) -> Option<EntityId> {
        match self.kind {
            ProjectileKind::Homing { target, .. } | ProjectileKind::GuidedMissile { target, .. } => target,
            _ => None,
        }
    }

    /// Move to `next` unless that would regress the phase
    pub fn set_phase(&mut self, next: ProjectilePhase) {
        if next.ordinal() >= self.phase.ordinal() {
            self.phase = next;
        }
    }

    fn begin_aftermath(&mut self) {
        let timer = self.aftermath;
        self.set_phase(ProjectilePhase::Exploding { timer });
    }

    /// Detonate a bomb in place; other kinds just enter their aftermath
    pub fn detonate(&mut self) -> Option<Blast> {
        if self.phase.ordinal() >= 2 {
            return None;
        }
        self.begin_aftermath();
        match self.kind {
            ProjectileKind::Bomb { blast_radius, .. } => Some(Blast {
                owner: self.owner,
                faction: self.faction,
                pos: self.pos,
                radius: blast_radius,
                damage: self.damage,
            }),
            _ => None,
        }
    }

    /// Stick to `target` (ion symbiont shots only)
    pub fn attach(&mut self, target: &Contact) {
        if let ProjectileKind::IonSymbiont { dot_duration } = self.kind {
            self.set_phase(ProjectilePhase::Attached {
                target: target.id,
                offset: self.pos - target.pos,
                remaining: dot_duration,
            });
            self.vel = Vec2::ZERO;
        }
    }

    /// Advance one tick against the post-integration contact snapshot
    pub fn tick(&mut self, dt: f32, contacts: &[Contact]) -> Option<ProjectileEffect> {
        match self.phase {
            ProjectilePhase::InFlight => self.fly(dt, contacts),
            ProjectilePhase::Attached { target, offset, remaining } => {
                let Some(host) = find_contact(contacts, target) else {
                    self.begin_aftermath();
                    return None;
                };
                self.pos = host.pos + offset;
                let step = dt.min(remaining.max(0.0));
                let remaining = remaining - dt;
                let dot_duration = match self.kind {
                    ProjectileKind::IonSymbiont { dot_duration } => dot_duration,
                    _ => 3.0,
                };
                if remaining <= 0.0 {
                    self.begin_aftermath();
                } else {
                    self.phase = ProjectilePhase::Attached { target, offset, remaining };
                }
                let amount = self.damage / dot_duration * step;
                (amount > 0.0).then_some(ProjectileEffect::Dot { target, amount })
            }
            ProjectilePhase::Exploding { timer } => {
                let timer = timer - dt;
                if timer <= 0.0 {
                    self.set_phase(ProjectilePhase::Done);
                } else {
                    self.phase = ProjectilePhase::Exploding { timer };
                }
                None
            }
            ProjectilePhase::Done => None,
        }
    }

    fn fly(&mut self, dt: f32, contacts: &[Contact]) -> Option<ProjectileEffect> {
        match self.kind {
            ProjectileKind::Curved { angular_velocity } => {
                self.heading += angular_velocity * dt;
                self.vel = Vec2::from_angle(self.heading) * self.speed;
            }
            ProjectileKind::Homing { target: Some(target), turn_rate } => {
                if !self.steer(target, turn_rate, dt, contacts) {
                    self.begin_aftermath();
                    return None;
                }
            }
            ProjectileKind::GuidedMissile { target, delay, turn_rate } => {
                let delay = delay - dt;
                self.kind = ProjectileKind::GuidedMissile { target, delay, turn_rate };
                if delay <= 0.0 {
                    if let Some(target) = target {
                        if !self.steer(target, turn_rate, dt, contacts) {
                            self.begin_aftermath();
                            return None;
                        }
                    }
                }
            }
            _ => {}
        }

        self.pos += self.vel * dt;
        self.traveled += self.speed * dt;

        if let Some(life) = self.lifetime.as_mut() {
            *life -= dt;
            if *life <= 0.0 {
                return self.detonate().map(ProjectileEffect::Detonate);
            }
        }

        if self.max_distance > 0.0 && self.traveled >= self.max_distance {
            if self.is_bomb() {
                return self.detonate().map(ProjectileEffect::Detonate);
            }
            self.set_phase(ProjectilePhase::Done);
        }
        None
    }

    /// Rotate toward the target by at most `turn_rate·dt`; false if it is gone
    fn steer(&mut self, target: EntityId, turn_rate: f32, dt: f32, contacts: &[Contact]) -> bool {
        let Some(contact) = find_contact(contacts, target) else {
            return false;
        };
        let desired = self.pos.angle_to(&contact.pos);
        self.heading = rotate_toward(self.heading, desired, turn_rate * dt);
        self.vel = Vec2::from_angle(self.heading) * self.speed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::normalize_angle;
    use crate::entity::ContactKind;

    fn target_at(id: u32, x: f32, y: f32) -> Contact {
        Contact {
            id: EntityId(id),
            faction: Faction::Pirate,
            kind: ContactKind::Ship,
            pos: Vec2::new(x, y),
            vel: Vec2::ZERO,
            size: 15.0,
        }
    }

    fn shot() -> Projectile {
        Projectile::new(EntityId(1), Faction::Player, Vec2::ZERO, Vec2::new(1.0, 0.0), 100.0, 10.0)
    }

    #[test]
    fn test_straight_shot_expires_at_max_distance() {
        let mut p = shot().with_max_distance(50.0);
        let mut ticks = 0;
        while !p.expired() {
            p.tick(0.1, &[]);
            ticks += 1;
            assert!(p.traveled <= p.max_distance + 0.1 * p.speed);
        }
        assert_eq!(ticks, 5);
    }

    #[test]
    fn test_homing_turn_is_bounded() {
        let target = target_at(9, 0.0, 100.0);
        let mut p = shot().with_kind(ProjectileKind::Homing { target: Some(target.id), turn_rate: 2.0 });
        let before = p.heading;
        p.tick(0.1, &[target]);
        assert!(normalize_angle(p.heading - before).abs() <= 0.2 + 1e-5);
    }

    #[test]
    fn test_homing_target_loss_enters_aftermath() {
        let mut p = shot().with_kind(ProjectileKind::Homing { target: Some(EntityId(9)), turn_rate: 2.0 });
        p.tick(0.1, &[]);
        assert!(matches!(p.phase, ProjectilePhase::Exploding { .. }));
        p.tick(0.25, &[]);
        assert!(p.expired());
    }

    #[test]
    fn test_guided_missile_waits_for_delay() {
        let target = target_at(9, 0.0, 100.0);
        let mut p = shot().with_kind(ProjectileKind::GuidedMissile {
            target: Some(target.id),
            delay: 0.5,
            turn_rate: 3.0,
        });
        p.tick(0.1, &[target]);
        assert_eq!(p.heading, 0.0);
        for _ in 0..5 {
            p.tick(0.1, &[target]);
        }
        assert!(p.heading > 0.0);
    }

    #[test]
    fn test_bomb_detonates_at_range() {
        let mut p = shot()
            .with_kind(ProjectileKind::Bomb { blast_radius: 60.0, trigger_radius: 20.0 })
            .with_max_distance(20.0);
        assert_eq!(p.tick(0.1, &[]), None);
        let effect = p.tick(0.1, &[]);
        assert!(matches!(effect, Some(ProjectileEffect::Detonate(b)) if b.radius == 60.0));
        // A second detonation never happens
        assert_eq!(p.detonate(), None);
    }

    #[test]
    fn test_ion_shot_sticks_and_burns() {
        let target = target_at(9, 20.0, 0.0);
        let mut p = shot().with_kind(ProjectileKind::IonSymbiont { dot_duration: 3.0 });
        p.pos = Vec2::new(15.0, 0.0);
        p.attach(&target);
        let moved = Contact { pos: Vec2::new(50.0, 10.0), ..target };
        let mut total = 0.0;
        for _ in 0..30 {
            if let Some(ProjectileEffect::Dot { amount, .. }) = p.tick(0.1, &[moved]) {
                total += amount;
            }
            if let ProjectilePhase::Attached { .. } = p.phase {
                assert_eq!(p.pos, Vec2::new(45.0, 10.0));
            }
        }
        assert!((total - 10.0).abs() < 1e-3, "total dot {}", total);
        assert!(matches!(p.phase, ProjectilePhase::Exploding { .. } | ProjectilePhase::Done));
    }

    #[test]
    fn test_phase_never_regresses() {
        let mut p = shot();
        p.set_phase(ProjectilePhase::Done);
        p.set_phase(ProjectilePhase::InFlight);
        assert!(p.expired());
    }
}
