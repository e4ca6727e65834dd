//! Drones: escorts, aggressive interceptors, learning defenders, bomb drones
//! and decoys
//!
//! A drone only knows its owner by id. The world hands it the owner's current
//! position each tick; a drone whose owner is gone dies with it (bomb drones
//! and decoys excepted).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ai::qlearning::{QTable, StateKey};
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Faction, Vec2};
use crate::entity::projectile::{Blast, Projectile};
use crate::entity::{find_contact, nearest_hostile, Contact};

/// Seconds between learning-defender decisions
const DECISION_INTERVAL: f32 = 0.5;

/// Learning defender state: (threat distance, owner distance, hull low)
pub const DRONE_DIMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggroState {
    Idle,
    Intercept(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DroneAction {
    Patrol,
    Intercept,
    Return,
}

impl DroneAction {
    pub const ALL: [DroneAction; 3] = [DroneAction::Patrol, DroneAction::Intercept, DroneAction::Return];

    pub fn name(&self) -> &'static str {
        match self {
            DroneAction::Patrol => "patrol",
            DroneAction::Intercept => "intercept",
            DroneAction::Return => "return",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BombPhase {
    Armed,
    Exploding { timer: f32 },
    Spent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DroneKind {
    /// Orbits the owner and shoots at hostiles in range
    Escort,
    /// Orbits until a hostile shows up, then chases it inside the leash
    Aggressive { state: AggroState },
    /// Chooses patrol / intercept / return from its own Q-table
    LearningDefensive {
        table: QTable,
        action: DroneAction,
        pending: Option<(StateKey, DroneAction)>,
        decision_timer: f32,
        last_hp: f32,
    },
    /// Seeks the nearest hostile and detonates on proximity or range
    Bomb { target: Option<EntityId>, speed: f32, range: f32, traveled: f32, blast_radius: f32, phase: BombPhase },
    /// Draws hostile fire until its lifetime runs out
    Decoy,
}

/// What the world hands a drone each tick
#[derive(Debug, Clone, Copy)]
pub struct DroneContext<'a> {
    pub owner_pos: Option<Vec2>,
    pub contacts: &'a [Contact],
    pub config: &'a SimulationConfig,
}

/// Things a drone asks the world to spawn
#[derive(Debug, Clone, PartialEq)]
pub enum DroneOutput {
    Fire(Projectile),
    Detonate(Blast),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    pub id: EntityId,
    pub owner: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub vel: Vec2,
    pub orbit_angle: f32,
    pub orbit_radius: f32,
    /// Radians per second; negative orbits clockwise
    pub orbit_speed: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub size: f32,
    pub damage: f32,
    pub fire_cooldown: f32,
    pub fire_timer: f32,
    pub lifetime: Option<f32>,
    pub kind: DroneKind,
}

impl Drone {
    pub fn new(owner: EntityId, faction: Faction, pos: Vec2, kind: DroneKind, config: &SimulationConfig) -> Self {
        Self {
            id: EntityId(0),
            owner,
            faction,
            pos,
            vel: Vec2::ZERO,
            orbit_angle: 0.0,
            orbit_radius: config.drone_orbit_radius,
            orbit_speed: 1.5,
            hp: config.drone_hp,
            max_hp: config.drone_hp,
            size: 8.0,
            damage: 4.0,
            fire_cooldown: config.drone_fire_cooldown,
            fire_timer: 0.0,
            lifetime: None,
            kind,
        }
    }

    pub fn escort(owner: EntityId, faction: Faction, pos: Vec2, config: &SimulationConfig) -> Self {
        Self::new(owner, faction, pos, DroneKind::Escort, config)
    }

    pub fn aggressive(owner: EntityId, faction: Faction, pos: Vec2, config: &SimulationConfig) -> Self {
        Self::new(owner, faction, pos, DroneKind::Aggressive { state: AggroState::Idle }, config)
    }

    pub fn learning(owner: EntityId, faction: Faction, pos: Vec2, table: QTable, config: &SimulationConfig) -> Self {
        let kind = DroneKind::LearningDefensive {
            table,
            action: DroneAction::Patrol,
            pending: None,
            decision_timer: 0.0,
            last_hp: config.drone_hp,
        };
        Self::new(owner, faction, pos, kind, config)
    }

    /// A mine: sits armed until something hostile comes close
    pub fn bomb(owner: EntityId, faction: Faction, pos: Vec2, damage: f32, config: &SimulationConfig) -> Self {
        let kind = DroneKind::Bomb {
            target: None,
            speed: config.drone_intercept_speed * 0.5,
            range: config.projectile_max_distance,
            traveled: 0.0,
            blast_radius: config.bomb_blast_radius,
            phase: BombPhase::Armed,
        };
        Self { damage, lifetime: Some(20.0), ..Self::new(owner, faction, pos, kind, config) }
    }

    pub fn decoy(owner: EntityId, faction: Faction, pos: Vec2, lifetime: f32, hp: f32, config: &SimulationConfig) -> Self {
        Self { hp, max_hp: hp, size: 20.0, lifetime: Some(lifetime), ..Self::new(owner, faction, pos, DroneKind::Decoy, config) }
    }

    pub fn with_orbit(mut self, angle: f32, radius: f32, speed: f32) -> Self {
        self.orbit_angle = angle;
        self.orbit_radius = radius;
        self.orbit_speed = speed;
        self
    }

    /// The learned table, for learning defenders
    pub fn q_table(&self) -> Option<&QTable> {
        match &self.kind {
            DroneKind::LearningDefensive { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn is_decoy(&self) -> bool {
        matches!(self.kind, DroneKind::Decoy)
    }

    pub fn is_bomb(&self) -> bool {
        matches!(self.kind, DroneKind::Bomb { .. })
    }

    /// Bomb drones still in the air can be triggered by hits
    pub fn armed(&self) -> bool {
        matches!(self.kind, DroneKind::Bomb { phase: BombPhase::Armed, .. })
    }

    pub fn expired(&self) -> bool {
        match &self.kind {
            DroneKind::Bomb { phase, .. } => matches!(phase, BombPhase::Spent),
            _ => self.hp <= 0.0 || matches!(self.lifetime, Some(t) if t <= 0.0),
        }
    }

    pub fn apply_damage(&mut self, amount: f32) {
        self.hp = (self.hp - amount).max(0.0);
    }

    pub fn leash_radius(&self, config: &SimulationConfig) -> f32 {
        config.max_roam_factor * self.orbit_radius
    }

    fn slot(&self, owner: Vec2) -> Vec2 {
        owner + Vec2::from_angle(self.orbit_angle) * self.orbit_radius
    }

    fn move_toward(&mut self, point: Vec2, speed: f32, dt: f32) {
        let step = speed * dt;
        let offset = point - self.pos;
        if offset.length() <= step {
            self.vel = if dt > 0.0 { offset * (1.0 / dt) } else { Vec2::ZERO };
            self.pos = point;
        } else {
            self.vel = offset.normalize() * speed;
            self.pos += self.vel * dt;
        }
    }

    /// Pull the drone back onto the leash circle along the owner-drone ray
    fn clamp_to_leash(&mut self, owner: Vec2, config: &SimulationConfig) {
        let leash = self.leash_radius(config);
        let offset = self.pos - owner;
        if offset.length() > leash {
            self.pos = owner + offset.normalize() * leash;
        }
    }

    fn orbit(&mut self, owner: Vec2, dt: f32, config: &SimulationConfig) {
        self.orbit_angle += self.orbit_speed * dt;
        let slot = self.slot(owner);
        self.move_toward(slot, config.drone_intercept_speed.max(self.orbit_radius * self.orbit_speed.abs()) * 2.0, dt);
    }

    fn try_fire(&mut self, target: &Contact, config: &SimulationConfig) -> Option<DroneOutput> {
        if self.fire_timer < self.fire_cooldown {
            return None;
        }
        self.fire_timer = 0.0;
        let shot = Projectile::new(self.owner, self.faction, self.pos, target.pos, config.projectile_speed, self.damage)
            .with_max_distance(config.drone_detection_range);
        Some(DroneOutput::Fire(shot))
    }

    pub fn tick<R: Rng>(&mut self, dt: f32, ctx: &DroneContext, rng: &mut R) -> Option<DroneOutput> {
        let config = ctx.config;
        self.fire_timer += dt;
        if let Some(life) = self.lifetime.as_mut() {
            *life -= dt;
        }

        if self.is_bomb() {
            return self.tick_bomb(dt, ctx);
        }
        if self.is_decoy() {
            self.vel = self.vel * 0.9_f32.powf(dt * 60.0);
            self.pos += self.vel * dt;
            return None;
        }

        let Some(owner) = ctx.owner_pos else {
            self.hp = 0.0;
            return None;
        };

        let output = match self.kind {
            DroneKind::Escort => {
                self.orbit(owner, dt, config);
                let target = nearest_hostile(ctx.contacts, self.faction, self.pos, config.drone_detection_range).copied();
                target.and_then(|t| self.try_fire(&t, config))
            }
            DroneKind::Aggressive { state } => self.tick_aggressive(state, owner, dt, ctx),
            DroneKind::LearningDefensive { .. } => self.tick_learning(owner, dt, ctx, rng),
            DroneKind::Bomb { .. } | DroneKind::Decoy => None,
        };
        self.clamp_to_leash(owner, config);
        output
    }

    fn tick_aggressive(&mut self, state: AggroState, owner: Vec2, dt: f32, ctx: &DroneContext) -> Option<DroneOutput> {
        let config = ctx.config;
        match state {
            AggroState::Idle => {
                self.orbit(owner, dt, config);
                if let Some(target) = nearest_hostile(ctx.contacts, self.faction, self.pos, config.drone_detection_range) {
                    self.kind = DroneKind::Aggressive { state: AggroState::Intercept(target.id) };
                }
                None
            }
            AggroState::Intercept(id) => {
                let Some(target) = find_contact(ctx.contacts, id).copied() else {
                    self.kind = DroneKind::Aggressive { state: AggroState::Idle };
                    return None;
                };
                if self.pos.distance(&target.pos) <= config.drone_optimal_range {
                    self.kind = DroneKind::Aggressive { state: AggroState::Idle };
                    return self.try_fire(&target, config);
                }
                self.move_toward(target.pos, config.drone_intercept_speed, dt);
                None
            }
        }
    }

    fn learning_state(&self, owner: Vec2, threat: Option<&Contact>, config: &SimulationConfig) -> StateKey {
        let threat_bucket = match threat.map(|t| t.pos.distance(&owner)) {
            Some(d) if d <= config.drone_optimal_range * 2.0 => 0,
            Some(_) => 1,
            None => 2,
        };
        let owner_distance = self.pos.distance(&owner);
        let owner_bucket = if owner_distance <= self.orbit_radius * 1.5 {
            0
        } else if owner_distance < self.leash_radius(config) {
            1
        } else {
            2
        };
        let hull_low = i32::from(self.hp < self.max_hp * 0.3);
        StateKey(vec![threat_bucket, owner_bucket, hull_low])
    }

    fn tick_learning<R: Rng>(&mut self, owner: Vec2, dt: f32, ctx: &DroneContext, rng: &mut R) -> Option<DroneOutput> {
        let config = ctx.config;
        let threat = nearest_hostile(ctx.contacts, self.faction, owner, config.drone_detection_range).copied();
        let state = self.learning_state(owner, threat.as_ref(), config);
        let hp = self.hp;
        let in_range = threat.is_some_and(|t| t.pos.distance(&self.pos) <= config.drone_optimal_range);

        let action = {
            let DroneKind::LearningDefensive { table, action, pending, decision_timer, last_hp } = &mut self.kind else {
                return None;
            };
            *decision_timer -= dt;
            if *decision_timer <= 0.0 {
                *decision_timer = DECISION_INTERVAL;
                if let Some((prev_state, prev_action)) = pending.take() {
                    let mut reward = -0.1 * f64::from(*last_hp - hp);
                    match prev_action {
                        DroneAction::Intercept if in_range => reward += 0.5,
                        DroneAction::Intercept if threat.is_none() => reward -= 0.2,
                        DroneAction::Patrol if threat.is_none() => reward += 0.2,
                        DroneAction::Return if state.0[1] == 0 => reward += 0.1,
                        _ => {}
                    }
                    if state.0[1] == 2 {
                        reward -= 0.5;
                    }
                    table.update(
                        &prev_state,
                        prev_action.name(),
                        reward,
                        &state,
                        config.def_drone_alpha,
                        config.def_drone_gamma,
                    );
                }
                let names: Vec<&str> = DroneAction::ALL.iter().map(|a| a.name()).collect();
                let chosen = table.choose(&state, &names, config.def_drone_epsilon, rng);
                *action = DroneAction::from_name(&chosen).unwrap_or(DroneAction::Patrol);
                *pending = Some((state, *action));
                *last_hp = hp;
            }
            *action
        };

        match (action, threat) {
            (DroneAction::Intercept, Some(target)) => {
                if self.pos.distance(&target.pos) > config.drone_optimal_range {
                    self.move_toward(target.pos, config.drone_intercept_speed, dt);
                }
                self.try_fire(&target, config)
            }
            (DroneAction::Return, _) => {
                let slot = self.slot(owner);
                self.move_toward(slot, config.drone_intercept_speed * 1.5, dt);
                None
            }
            _ => {
                self.orbit(owner, dt, config);
                None
            }
        }
    }

    fn tick_bomb(&mut self, dt: f32, ctx: &DroneContext) -> Option<DroneOutput> {
        let config = ctx.config;
        let hp = self.hp;
        let lifetime_over = matches!(self.lifetime, Some(t) if t <= 0.0);
        let (pos, faction, owner, damage) = (self.pos, self.faction, self.owner, self.damage);
        let DroneKind::Bomb { target, speed, range, traveled, blast_radius, phase } = &mut self.kind else {
            return None;
        };

        match *phase {
            BombPhase::Armed => {
                let trigger = config.bomb_trigger_radius;
                let nearest = nearest_hostile(ctx.contacts, faction, pos, config.drone_detection_range).copied();
                *target = nearest.map(|c| c.id);
                let mut next = pos;
                if let Some(t) = nearest {
                    let step = *speed * dt;
                    let offset = t.pos - pos;
                    next = if offset.length() <= step { t.pos } else { pos + offset.normalize() * step };
                    *traveled += next.distance(&pos);
                }
                let touching = ctx
                    .contacts
                    .iter()
                    .any(|c| faction.is_hostile_to(c.faction) && c.pos.distance(&next) <= trigger + c.size);
                let radius = *blast_radius;
                let out_of_range = *traveled >= *range;
                if touching || out_of_range || hp <= 0.0 || lifetime_over {
                    *phase = BombPhase::Exploding { timer: config.aftermath_time };
                    self.pos = next;
                    self.vel = Vec2::ZERO;
                    return Some(DroneOutput::Detonate(Blast { owner, faction, pos: next, radius, damage }));
                }
                self.vel = if dt > 0.0 { (next - pos) * (1.0 / dt) } else { Vec2::ZERO };
                self.pos = next;
                None
            }
            BombPhase::Exploding { timer } => {
                let timer = timer - dt;
                *phase = if timer <= 0.0 { BombPhase::Spent } else { BombPhase::Exploding { timer } };
                None
            }
            BombPhase::Spent => None,
        }
    }
}
