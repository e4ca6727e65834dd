//! Artifacts: activatable ship equipment with per-artifact cooldowns
//!
//! Each artifact decides for itself when an NPC should use it through
//! `ai_policy`, so callers never need to know which concrete artifact a ship
//! carries.

use std::fmt::Debug;

use crate::core::types::{EntityId, Vec2};
use crate::entity::effects::Special;

/// Cooldown clock shared by every artifact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cooldown {
    pub duration: f32,
    pub timer: f32,
}

impl Cooldown {
    /// Starts ready
    pub fn new(duration: f32) -> Self {
        Self { duration, timer: duration }
    }

    pub fn ready(&self) -> bool {
        self.timer >= self.duration
    }

    pub fn tick(&mut self, dt: f32) {
        self.timer = (self.timer + dt).min(self.duration);
    }

    pub fn reset(&mut self) {
        self.timer = 0.0;
    }
}

/// What an activation asks the world to do
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactEffect {
    /// Attach to the activating ship
    Special(Special),
    /// Drain hostile shields in a radius and leave a visual wave
    Emp { radius: f32, shield_drain: f32 },
    /// Launch a probe that becomes a temporary black hole at `destination`
    TractorProbe { destination: Vec2, speed: f32, hole_lifetime: f32 },
    /// Start mining the nearest asteroid in reach
    Mining { rate: f32, range: f32, duration: f32 },
    Decoy { lifetime: f32, hp: f32 },
    Cloak { duration: f32 },
}

/// How an NPC wants to use an artifact this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Now,
    /// Activate, then confirm at this point
    At(Vec2),
}

/// What an NPC knows when considering an artifact
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AiContext {
    pub hull_ratio: f32,
    pub shield_ratio: f32,
    pub hostiles_near: usize,
    pub nearest_hostile: Option<Vec2>,
    pub nearest_hostile_distance: Option<f32>,
    pub asteroid_in_reach: Option<EntityId>,
    pub solar_link_active: bool,
    pub under_fire: bool,
}

pub trait Artifact: Debug {
    fn name(&self) -> &'static str;

    fn cooldown(&self) -> &Cooldown;

    fn cooldown_mut(&mut self) -> &mut Cooldown;

    fn tick(&mut self, dt: f32) {
        self.cooldown_mut().tick(dt);
    }

    fn ready(&self) -> bool {
        self.cooldown().ready()
    }

    /// Trigger the artifact. Returns `None` when not ready or when the
    /// artifact waits for `confirm`.
    fn activate(&mut self) -> Option<ArtifactEffect>;

    /// Second phase for point-targeted artifacts
    fn confirm(&mut self, _point: Vec2) -> Option<ArtifactEffect> {
        None
    }

    fn awaiting_point(&self) -> bool {
        false
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation>;
}

/// Activate immediately and restart the cooldown
fn trigger(cooldown: &mut Cooldown, effect: ArtifactEffect) -> Option<ArtifactEffect> {
    if !cooldown.ready() {
        return None;
    }
    cooldown.reset();
    Some(effect)
}

#[derive(Debug, Clone)]
pub struct AreaShield {
    cooldown: Cooldown,
    pub strength: f32,
    pub duration: f32,
}

impl Default for AreaShield {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(20.0), strength: 60.0, duration: 8.0 }
    }
}

impl Artifact for AreaShield {
    fn name(&self) -> &'static str {
        "Area Shield"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        let special = Special::AreaShieldAura { strength: self.strength, radius: 60.0, remaining: self.duration };
        trigger(&mut self.cooldown, ArtifactEffect::Special(special))
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        (self.ready() && ctx.under_fire && ctx.shield_ratio < 0.5).then_some(Activation::Now)
    }
}

#[derive(Debug, Clone)]
pub struct EmpBurst {
    cooldown: Cooldown,
    pub radius: f32,
    pub shield_drain: f32,
}

impl Default for EmpBurst {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(15.0), radius: 300.0, shield_drain: 40.0 }
    }
}

impl Artifact for EmpBurst {
    fn name(&self) -> &'static str {
        "EMP"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        trigger(&mut self.cooldown, ArtifactEffect::Emp { radius: self.radius, shield_drain: self.shield_drain })
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        let close = ctx.nearest_hostile_distance.is_some_and(|d| d <= self.radius * 0.8);
        (self.ready() && close).then_some(Activation::Now)
    }
}

/// Two-phase: `activate` arms it, `confirm(point)` launches the probe
#[derive(Debug, Clone)]
pub struct GravityTractor {
    cooldown: Cooldown,
    armed: bool,
    pub probe_speed: f32,
    pub hole_lifetime: f32,
}

impl Default for GravityTractor {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(25.0), armed: false, probe_speed: 350.0, hole_lifetime: 6.0 }
    }
}

impl Artifact for GravityTractor {
    fn name(&self) -> &'static str {
        "Gravity Tractor"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        if self.cooldown.ready() {
            self.armed = true;
        }
        None
    }

    fn confirm(&mut self, point: Vec2) -> Option<ArtifactEffect> {
        if !self.armed {
            return None;
        }
        self.armed = false;
        let effect = ArtifactEffect::TractorProbe {
            destination: point,
            speed: self.probe_speed,
            hole_lifetime: self.hole_lifetime,
        };
        trigger(&mut self.cooldown, effect)
    }

    fn awaiting_point(&self) -> bool {
        self.armed
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        if !self.ready() || ctx.hostiles_near < 2 {
            return None;
        }
        ctx.nearest_hostile.map(Activation::At)
    }
}

#[derive(Debug, Clone)]
pub struct RepairNanobots {
    cooldown: Cooldown,
    pub rate: f32,
    pub duration: f32,
}

impl Default for RepairNanobots {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(30.0), rate: 6.0, duration: 5.0 }
    }
}

impl Artifact for RepairNanobots {
    fn name(&self) -> &'static str {
        "Repair Nanobots"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        let special = Special::RepairNanobots { rate: self.rate, remaining: self.duration };
        trigger(&mut self.cooldown, ArtifactEffect::Special(special))
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        (self.ready() && ctx.hull_ratio < 0.6).then_some(Activation::Now)
    }
}

#[derive(Debug, Clone)]
pub struct SolarLinkArtifact {
    cooldown: Cooldown,
    pub duration: f32,
}

impl Default for SolarLinkArtifact {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(25.0), duration: 6.0 }
    }
}

impl Artifact for SolarLinkArtifact {
    fn name(&self) -> &'static str {
        "Solar Link"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        let link = crate::entity::effects::SolarLink::new(self.duration);
        trigger(&mut self.cooldown, ArtifactEffect::Special(Special::SolarLink(link)))
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        (self.ready() && !ctx.solar_link_active && ctx.hostiles_near > 0).then_some(Activation::Now)
    }
}

#[derive(Debug, Clone)]
pub struct MiningLaser {
    cooldown: Cooldown,
    pub rate: f32,
    pub range: f32,
    pub duration: f32,
}

impl Default for MiningLaser {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(8.0), rate: 10.0, range: 250.0, duration: 6.0 }
    }
}

impl Artifact for MiningLaser {
    fn name(&self) -> &'static str {
        "Mining Laser"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        let effect = ArtifactEffect::Mining { rate: self.rate, range: self.range, duration: self.duration };
        trigger(&mut self.cooldown, effect)
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        (self.ready() && ctx.hostiles_near == 0 && ctx.asteroid_in_reach.is_some()).then_some(Activation::Now)
    }
}

#[derive(Debug, Clone)]
pub struct DecoyLauncher {
    cooldown: Cooldown,
    pub lifetime: f32,
    pub hp: f32,
}

impl Default for DecoyLauncher {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(18.0), lifetime: 6.0, hp: 40.0 }
    }
}

impl Artifact for DecoyLauncher {
    fn name(&self) -> &'static str {
        "Decoy"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        trigger(&mut self.cooldown, ArtifactEffect::Decoy { lifetime: self.lifetime, hp: self.hp })
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        (self.ready() && ctx.under_fire && ctx.hull_ratio < 0.5).then_some(Activation::Now)
    }
}

#[derive(Debug, Clone)]
pub struct CloakingDevice {
    cooldown: Cooldown,
    pub duration: f32,
}

impl Default for CloakingDevice {
    fn default() -> Self {
        Self { cooldown: Cooldown::new(30.0), duration: 5.0 }
    }
}

impl Artifact for CloakingDevice {
    fn name(&self) -> &'static str {
        "Cloak"
    }

    fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    fn activate(&mut self) -> Option<ArtifactEffect> {
        trigger(&mut self.cooldown, ArtifactEffect::Cloak { duration: self.duration })
    }

    fn ai_policy(&self, ctx: &AiContext) -> Option<Activation> {
        (self.ready() && ctx.hull_ratio < 0.3 && ctx.hostiles_near > 0).then_some(Activation::Now)
    }
}

/// Build an artifact from its display name (used by loadouts)
pub fn artifact_by_name(name: &str) -> Option<Box<dyn Artifact>> {
    let artifact: Box<dyn Artifact> = match name {
        "Area Shield" => Box::new(AreaShield::default()),
        "EMP" => Box::new(EmpBurst::default()),
        "Gravity Tractor" => Box::new(GravityTractor::default()),
        "Repair Nanobots" => Box::new(RepairNanobots::default()),
        "Solar Link" => Box::new(SolarLinkArtifact::default()),
        "Mining Laser" => Box::new(MiningLaser::default()),
        "Decoy" => Box::new(DecoyLauncher::default()),
        "Cloak" => Box::new(CloakingDevice::default()),
        _ => return None,
    };
    Some(artifact)
}
