//! Ships: movement modes, shields, boost and the integration step
//!
//! A ship is in exactly one movement mode at a time. Pilots never touch the
//! mode directly; the world applies their intents before integration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::combat::artifacts::Artifact;
use crate::combat::weapons::Weapon;
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Faction, Vec2};
use crate::entity::effects::{EffectEvent, SolarLink, Special};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shield {
    pub strength: f32,
    pub max: f32,
    pub recharge_rate: f32,
}

impl Shield {
    pub fn new(max: f32, recharge_rate: f32) -> Self {
        Self { strength: max, max, recharge_rate }
    }

    pub fn ratio(&self) -> f32 {
        if self.max > 0.0 {
            self.strength / self.max
        } else {
            0.0
        }
    }

    pub fn recharge(&mut self, dt: f32) {
        self.strength = (self.strength + self.recharge_rate * dt).min(self.max);
    }

    /// Soak up to `amount`, returning what gets through
    pub fn absorb(&mut self, amount: f32) -> f32 {
        let soaked = amount.min(self.strength);
        self.strength -= soaked;
        amount - soaked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementMode {
    Manual,
    Autopilot { target: Vec2 },
    Orbit { target: EntityId, time: f32, speed: f32, angle: f32, radius: f32 },
    Hyperjump { origin: Vec2, destination: Vec2, timer: f32, duration: f32 },
    /// Released into manual flight on the next integration
    HyperjumpCancelled,
}

/// Boost state: charge fills over the recharge time, activation spends all of it
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Boost {
    pub charge: f32,
    pub time: f32,
}

impl Boost {
    pub fn ready(&self) -> bool {
        self.charge >= 1.0
    }

    pub fn active(&self) -> bool {
        self.time > 0.0
    }

    /// Spend the full charge; false if not charged
    pub fn activate(&mut self, duration: f32) -> bool {
        if !self.ready() {
            return false;
        }
        self.charge = 0.0;
        self.time = duration;
        true
    }

    pub fn tick(&mut self, dt: f32, recharge: f32) {
        if self.time > 0.0 {
            self.time = (self.time - dt).max(0.0);
        } else if recharge > 0.0 {
            self.charge = (self.charge + dt / recharge).min(1.0);
        }
    }
}

pub const KEY_UP: u8 = 1;
pub const KEY_DOWN: u8 = 1 << 1;
pub const KEY_LEFT: u8 = 1 << 2;
pub const KEY_RIGHT: u8 = 1 << 3;
pub const KEY_BOOST: u8 = 1 << 4;
pub const KEY_FIRE: u8 = 1 << 5;

/// Player input for one step. The default value is the null input NPC ships
/// are integrated with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub boost: bool,
    pub fire: bool,
    pub aim: Option<Vec2>,
}

impl InputState {
    pub fn from_bits(bits: u8, aim: Option<Vec2>) -> Self {
        Self {
            up: bits & KEY_UP != 0,
            down: bits & KEY_DOWN != 0,
            left: bits & KEY_LEFT != 0,
            right: bits & KEY_RIGHT != 0,
            boost: bits & KEY_BOOST != 0,
            fire: bits & KEY_FIRE != 0,
            aim,
        }
    }

    /// Thrust direction from the movement keys (not normalized)
    pub fn thrust(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.up {
            dir.y -= 1.0;
        }
        if self.down {
            dir.y += 1.0;
        }
        if self.left {
            dir.x -= 1.0;
        }
        if self.right {
            dir.x += 1.0;
        }
        dir
    }
}

/// Forces acting on a ship this step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    /// Summed black hole pull acceleration
    pub pull: Vec2,
    /// Velocity retained per second (dust clouds)
    pub drag: f32,
    /// Displacement multiplier from hostile slow fields
    pub slow: f32,
    /// Current position of the orbited body, `None` if it is gone
    pub orbit_anchor: Option<Vec2>,
}

impl Default for Environment {
    fn default() -> Self {
        Self { pull: Vec2::ZERO, drag: 1.0, slow: 1.0, orbit_anchor: None }
    }
}

/// Hyperjump duration for a jump of `distance`
///
/// Speed grows as `base·(d/d0)^scale`, so long jumps take proportionally less
/// time; the result is clamped to the configured envelope.
pub fn hyperjump_duration(distance: f32, config: &SimulationConfig) -> f32 {
    if distance <= 0.0 {
        return config.hyperjump_min_time;
    }
    let speed = config.hyperjump_base_speed * (distance / config.hyperjump_d0).powf(config.hyperjump_scale);
    let raw = if speed > 0.0 { distance / speed } else { config.hyperjump_max_time };
    raw.clamp(config.hyperjump_min_time, config.hyperjump_max_time)
}

#[derive(Debug)]
pub struct Ship {
    pub id: EntityId,
    pub name: String,
    pub faction: Faction,
    pub is_player: bool,
    pub pos: Vec2,
    pub vel: Vec2,
    pub hull: f32,
    pub max_hull: f32,
    pub shield: Shield,
    pub size: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub weapons: Vec<Weapon>,
    pub active_weapon: usize,
    pub artifacts: Vec<Box<dyn Artifact>>,
    pub specials: Vec<Special>,
    pub movement: MovementMode,
    pub boost: Boost,
    pub invisible_timer: f32,
    pub teleport_cooldown: f32,
    pub cargo: BTreeMap<String, u32>,
    pub credits: u32,
}

impl Ship {
    pub fn new(id: EntityId, name: &str, faction: Faction, pos: Vec2, config: &SimulationConfig) -> Self {
        Self {
            id,
            name: name.to_string(),
            faction,
            is_player: false,
            pos,
            vel: Vec2::ZERO,
            hull: config.ship_hull,
            max_hull: config.ship_hull,
            shield: Shield::new(config.ship_shield, config.shield_recharge_rate),
            size: config.ship_size,
            max_speed: config.ship_max_speed,
            acceleration: config.ship_acceleration,
            weapons: Vec::new(),
            active_weapon: 0,
            artifacts: Vec::new(),
            specials: Vec::new(),
            movement: MovementMode::Manual,
            boost: Boost { charge: 1.0, time: 0.0 },
            invisible_timer: 0.0,
            teleport_cooldown: 0.0,
            cargo: BTreeMap::new(),
            credits: 0,
        }
    }

    pub fn with_weapon(mut self, mut weapon: Weapon) -> Self {
        weapon.owner = self.id;
        self.weapons.push(weapon);
        self
    }

    pub fn with_artifact(mut self, artifact: Box<dyn Artifact>) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn destroyed(&self) -> bool {
        self.hull <= 0.0
    }

    pub fn hull_ratio(&self) -> f32 {
        self.hull / self.max_hull
    }

    pub fn invisible(&self) -> bool {
        self.invisible_timer > 0.0
    }

    pub fn autopilot_target(&self) -> Option<Vec2> {
        match self.movement {
            MovementMode::Autopilot { target } => Some(target),
            _ => None,
        }
    }

    pub fn orbit_target(&self) -> Option<EntityId> {
        match self.movement {
            MovementMode::Orbit { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Seconds spent in the current orbit, zero when not orbiting
    pub fn orbit_time(&self) -> f32 {
        match self.movement {
            MovementMode::Orbit { time, .. } => time,
            _ => 0.0,
        }
    }

    pub fn hyperjumping(&self) -> bool {
        matches!(self.movement, MovementMode::Hyperjump { .. })
    }

    /// Apply incoming damage: auras first, then shield, then hull.
    /// Returns the hull damage actually taken.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 || self.destroyed() {
            return 0.0;
        }
        let mut remaining = amount;
        for special in &mut self.specials {
            if let Special::AreaShieldAura { strength, .. } = special {
                let soaked = remaining.min(*strength);
                *strength -= soaked;
                remaining -= soaked;
            }
        }
        remaining = self.shield.absorb(remaining);
        let taken = remaining.min(self.hull);
        self.hull -= taken;
        taken
    }

    pub fn set_autopilot(&mut self, target: Vec2) {
        if !self.hyperjumping() {
            self.movement = MovementMode::Autopilot { target };
        }
    }

    pub fn clear_autopilot(&mut self) {
        if matches!(self.movement, MovementMode::Autopilot { .. }) {
            self.movement = MovementMode::Manual;
        }
    }

    /// Enter an orbit around `anchor` at the current distance
    pub fn start_orbit(&mut self, target: EntityId, anchor: Vec2, speed: f32) {
        if self.hyperjumping() {
            return;
        }
        let radius = self.pos.distance(&anchor).max(self.size * 2.0);
        self.movement = MovementMode::Orbit {
            target,
            time: 0.0,
            speed,
            angle: anchor.angle_to(&self.pos),
            radius,
        };
    }

    pub fn break_orbit(&mut self) {
        if matches!(self.movement, MovementMode::Orbit { .. }) {
            self.movement = MovementMode::Manual;
        }
    }

    /// Start a timed jump; false if one is already running
    pub fn begin_hyperjump(&mut self, destination: Vec2, config: &SimulationConfig) -> bool {
        if self.hyperjumping() {
            return false;
        }
        let duration = hyperjump_duration(self.pos.distance(&destination), config);
        self.movement = MovementMode::Hyperjump { origin: self.pos, destination, timer: 0.0, duration };
        self.vel = Vec2::ZERO;
        true
    }

    pub fn cancel_hyperjump(&mut self) {
        if self.hyperjumping() {
            self.movement = MovementMode::HyperjumpCancelled;
        }
    }

    pub fn activate_boost(&mut self, config: &SimulationConfig) -> bool {
        self.boost.activate(config.boost_duration)
    }

    /// Shield recharge, boost charge and the small per-ship countdowns
    pub fn tick_timers(&mut self, dt: f32, config: &SimulationConfig) {
        self.shield.recharge(dt);
        self.boost.tick(dt, config.boost_recharge);
        self.invisible_timer = (self.invisible_timer - dt).max(0.0);
        self.teleport_cooldown = (self.teleport_cooldown - dt).max(0.0);
        for weapon in &mut self.weapons {
            weapon.tick(dt);
        }
        for artifact in &mut self.artifacts {
            artifact.tick(dt);
        }
    }

    /// Advance position and velocity by one step in the current movement mode
    pub fn integrate(&mut self, dt: f32, input: &InputState, env: &Environment, config: &SimulationConfig) {
        if matches!(self.movement, MovementMode::HyperjumpCancelled) {
            self.movement = MovementMode::Manual;
        }
        let boost = if self.boost.active() { config.boost_multiplier } else { 1.0 };

        match self.movement {
            MovementMode::Manual => {
                let thrust = input.thrust();
                if thrust.length() > 0.0 {
                    self.vel += thrust.normalize() * (self.acceleration * boost * dt);
                }
                self.vel = self.vel * config.ship_friction.powf(dt * 60.0);
                self.vel += env.pull * dt;
                self.vel = self.vel * env.drag.powf(dt);
                self.vel = self.vel.clamp_length(self.max_speed * boost);
                self.pos += self.vel * (dt * env.slow);
            }
            MovementMode::Autopilot { target } => {
                let speed = config.autopilot_speed * boost;
                let step = speed * dt * env.slow;
                if self.pos.distance(&target) <= step {
                    self.pos = target;
                    self.vel = Vec2::ZERO;
                    self.movement = MovementMode::Manual;
                } else {
                    self.vel = (target - self.pos).normalize() * speed + env.pull * dt;
                    self.pos += self.vel * (dt * env.slow);
                }
            }
            MovementMode::Orbit { target, time, speed, angle, radius } => {
                let Some(anchor) = env.orbit_anchor else {
                    self.movement = MovementMode::Manual;
                    return;
                };
                let angle = angle + speed * dt;
                let time = time + dt;
                let next = anchor + Vec2::from_angle(angle) * radius;
                if dt > 0.0 {
                    self.vel = (next - self.pos) * (1.0 / dt);
                }
                self.pos = next;
                self.movement = if time >= config.orbit_duration {
                    MovementMode::Manual
                } else {
                    MovementMode::Orbit { target, time, speed, angle, radius }
                };
            }
            MovementMode::Hyperjump { origin, destination, timer, duration } => {
                let timer = timer + dt;
                self.vel = Vec2::ZERO;
                if timer >= duration {
                    self.pos = destination;
                    self.movement = MovementMode::Manual;
                } else {
                    self.movement = MovementMode::Hyperjump { origin, destination, timer, duration };
                }
            }
            MovementMode::HyperjumpCancelled => {}
        }
    }

    /// Attach a special. Solar links refresh instead of stacking, a new
    /// shield aura replaces the old one.
    pub fn attach_special(&mut self, special: Special) {
        match special {
            Special::SolarLink(link) => self.engage_solar_link(link.remaining),
            Special::AreaShieldAura { .. } => {
                self.specials.retain(|s| !matches!(s, Special::AreaShieldAura { .. }));
                self.specials.push(special);
            }
            other => self.specials.push(other),
        }
    }

    /// Double shield recharge and halve weapon cooldowns for `duration`
    pub fn engage_solar_link(&mut self, duration: f32) {
        for special in &mut self.specials {
            if let Special::SolarLink(link) = special {
                link.remaining = link.remaining.max(duration);
                return;
            }
        }
        let link = SolarLink {
            remaining: duration,
            saved_recharge: self.shield.recharge_rate,
            saved_cooldowns: self.weapons.iter().map(|w| w.cooldown).collect(),
        };
        self.shield.recharge_rate *= 2.0;
        for weapon in &mut self.weapons {
            weapon.cooldown *= 0.5;
        }
        self.specials.push(Special::SolarLink(link));
    }

    pub fn solar_link_active(&self) -> bool {
        self.specials.iter().any(|s| matches!(s, Special::SolarLink(_)))
    }

    /// Tick every special, run release hooks for the ones that ended
    pub fn tick_specials(&mut self, dt: f32) -> Vec<EffectEvent> {
        let mut specials = std::mem::take(&mut self.specials);
        let mut events = Vec::new();
        for special in &mut specials {
            if let Some(event) = special.tick(dt, self) {
                events.push(event);
            }
        }
        let (ended, kept): (Vec<Special>, Vec<Special>) = specials.into_iter().partition(|s| s.expired());
        for special in &ended {
            special.release(self);
        }
        // Anything attached while ticking goes after the survivors
        let added = std::mem::replace(&mut self.specials, kept);
        self.specials.extend(added);
        events
    }

    /// Stop a running mining beam
    pub fn stop_mining(&mut self) {
        self.specials.retain(|s| !matches!(s, Special::MiningBeam { .. }));
    }

    /// Run every release hook and drop all specials (owner destroyed)
    pub fn release_specials(&mut self) {
        let specials = std::mem::take(&mut self.specials);
        for special in &specials {
            special.release(self);
        }
    }

    pub fn add_cargo(&mut self, item: &str, amount: u32) {
        *self.cargo.entry(item.to_string()).or_insert(0) += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::weapons::Weapon;

    fn ship() -> Ship {
        Ship::new(EntityId(1), "test", Faction::Player, Vec2::new(500.0, 500.0), &SimulationConfig::default())
    }

    #[test]
    fn test_friction_scales_with_dt() {
        let config = SimulationConfig::default();
        let mut a = ship();
        let mut b = ship();
        a.vel = Vec2::new(100.0, 0.0);
        b.vel = Vec2::new(100.0, 0.0);
        let input = InputState::default();
        let env = Environment::default();
        a.integrate(1.0 / 30.0, &input, &env, &config);
        b.integrate(1.0 / 60.0, &input, &env, &config);
        b.integrate(1.0 / 60.0, &input, &env, &config);
        assert!((a.vel.x - b.vel.x).abs() < 1e-3);
    }

    #[test]
    fn test_autopilot_completes_within_one_step() {
        let config = SimulationConfig::default();
        let mut s = ship();
        s.set_autopilot(Vec2::new(505.0, 500.0));
        s.integrate(0.1, &InputState::default(), &Environment::default(), &config);
        assert_eq!(s.pos, Vec2::new(505.0, 500.0));
        assert_eq!(s.movement, MovementMode::Manual);
    }

    #[test]
    fn test_orbit_breaks_when_anchor_disappears() {
        let config = SimulationConfig::default();
        let mut s = ship();
        s.start_orbit(EntityId(2), Vec2::new(600.0, 500.0), 0.75);
        let env = Environment { orbit_anchor: Some(Vec2::new(600.0, 500.0)), ..Default::default() };
        s.integrate(0.1, &InputState::default(), &env, &config);
        assert_eq!(s.orbit_target(), Some(EntityId(2)));
        assert!((s.pos.distance(&Vec2::new(600.0, 500.0)) - 100.0).abs() < 1e-3);
        s.integrate(0.1, &InputState::default(), &Environment::default(), &config);
        assert_eq!(s.orbit_target(), None);
        assert_eq!(s.orbit_time(), 0.0);
    }

    #[test]
    fn test_hyperjump_lands_at_end_and_cancels() {
        let config = SimulationConfig::default();
        let mut s = ship();
        let dest = Vec2::new(3500.0, 500.0);
        assert!(s.begin_hyperjump(dest, &config));
        assert!(!s.begin_hyperjump(dest, &config));
        let duration = hyperjump_duration(3000.0, &config);
        let mut t = 0.0;
        while t + 0.1 < duration {
            s.integrate(0.1, &InputState::default(), &Environment::default(), &config);
            t += 0.1;
            assert_eq!(s.pos, Vec2::new(500.0, 500.0));
        }
        s.integrate(0.1, &InputState::default(), &Environment::default(), &config);
        assert_eq!(s.pos, dest);

        let mut c = ship();
        c.begin_hyperjump(dest, &config);
        c.cancel_hyperjump();
        assert_eq!(c.movement, MovementMode::HyperjumpCancelled);
        c.integrate(0.1, &InputState::default(), &Environment::default(), &config);
        assert_eq!(c.movement, MovementMode::Manual);
        assert_eq!(c.pos, Vec2::new(500.0, 500.0));
    }

    #[test]
    fn test_hyperjump_duration_envelope() {
        let config = SimulationConfig::default();
        assert_eq!(hyperjump_duration(1.0, &config), config.hyperjump_min_time);
        assert_eq!(hyperjump_duration(1.0e9, &config), config.hyperjump_max_time);
        let mid = hyperjump_duration(4000.0, &config);
        assert!(mid > config.hyperjump_min_time && mid < config.hyperjump_max_time);
    }

    #[test]
    fn test_damage_order_aura_shield_hull() {
        let mut s = ship();
        s.attach_special(Special::AreaShieldAura { strength: 20.0, radius: 60.0, remaining: 5.0 });
        let taken = s.apply_damage(80.0);
        // 20 aura, 50 shield, 10 hull
        assert_eq!(taken, 10.0);
        assert_eq!(s.shield.strength, 0.0);
        assert_eq!(s.hull, 90.0);
        s.tick_specials(0.01);
        assert!(s.specials.is_empty());
    }

    #[test]
    fn test_solar_link_restores_on_expiry_and_release() {
        let mut s = ship().with_weapon(Weapon::basic(10.0, 400.0, 0.5));
        let rate = s.shield.recharge_rate;
        s.engage_solar_link(1.0);
        s.engage_solar_link(1.0);
        assert_eq!(s.shield.recharge_rate, rate * 2.0);
        assert_eq!(s.weapons[0].cooldown, 0.25);
        for _ in 0..11 {
            s.tick_specials(0.1);
        }
        assert_eq!(s.shield.recharge_rate, rate);
        assert_eq!(s.weapons[0].cooldown, 0.5);

        s.engage_solar_link(5.0);
        s.release_specials();
        assert_eq!(s.shield.recharge_rate, rate);
        assert_eq!(s.weapons[0].cooldown, 0.5);
    }

    #[test]
    fn test_boost_recharges_after_use() {
        let config = SimulationConfig::default();
        let mut s = ship();
        assert!(s.activate_boost(&config));
        assert!(!s.activate_boost(&config));
        let steps = ((config.boost_duration + config.boost_recharge) / 0.1).ceil() as usize + 2;
        for _ in 0..steps {
            s.tick_timers(0.1, &config);
        }
        assert!(s.boost.ready());
    }

    #[test]
    fn test_input_bits() {
        let input = InputState::from_bits(KEY_UP | KEY_RIGHT | KEY_FIRE, None);
        assert!(input.up && input.right && input.fire);
        assert!(!input.down && !input.boost);
        assert_eq!(input.thrust(), Vec2::new(1.0, -1.0));
    }
}
