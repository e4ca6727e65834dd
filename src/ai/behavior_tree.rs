//! Behavior-tree pilot: a selector without memory over five leaves
//!
//! Flee → Defend → Attack → Pursue → Idle. Each leaf has a precondition and an
//! `update` that turns the snapshot into an `Intent`. The learning pilots reuse
//! the same leaves, so the physical behavior of an action is defined once.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ai::ally::HOVER_DISTANCE;
use crate::ai::{help_request, Intent, MoveIntent, Pilot, PilotKind, SensorSnapshot, ShipView};
use crate::core::config::SimulationConfig;
use crate::core::types::{Rect, Target, Vec2};

/// Shield ratio below which a pilot goes on the defensive
const DEFEND_SHIELD_RATIO: f32 = 0.3;

/// Intercept point as a fraction of attack range
const INTERCEPT_FRACTION: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Leaf {
    Flee,
    Defend,
    Attack,
    Pursue,
    Idle,
}

impl Leaf {
    /// Selector order
    pub const ALL: [Leaf; 5] = [Leaf::Flee, Leaf::Defend, Leaf::Attack, Leaf::Pursue, Leaf::Idle];

    /// Action names as stored in Q-tables
    pub const NAMES: [&'static str; 5] = ["flee", "defend", "attack", "pursue", "idle"];

    pub fn name(&self) -> &'static str {
        match self {
            Leaf::Flee => "flee",
            Leaf::Defend => "defend",
            Leaf::Attack => "attack",
            Leaf::Pursue => "pursue",
            Leaf::Idle => "idle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.name() == name)
    }

    pub fn precondition(&self, ctx: &LeafContext) -> bool {
        let config = ctx.config;
        let me = &ctx.snapshot.me;
        let healthy = me.hull_ratio() > config.flee_threshold;
        match self {
            Leaf::Flee => me.hull_ratio() <= config.flee_threshold,
            Leaf::Defend => me.shield_ratio < DEFEND_SHIELD_RATIO || !ctx.snapshot.threats.is_empty(),
            Leaf::Attack => ctx.target.is_some_and(|t| {
                // A boosting target is chased, not engaged
                healthy && ctx.region.contains(t.pos) && ctx.snapshot.distance_to(t) <= config.attack_range && !t.boosting
            }),
            Leaf::Pursue => ctx.target.is_some_and(|t| {
                healthy && ctx.region.contains(t.pos) && ctx.snapshot.distance_to(t) <= config.detection_range
            }),
            Leaf::Idle => true,
        }
    }

    /// Produce the intent for this leaf. Leaves degrade gracefully when their
    /// precondition does not hold (the learning pilots call them directly).
    pub fn update(&self, ctx: &LeafContext, memory: &mut PilotMemory, rng: &mut ChaCha8Rng) -> Intent {
        let mut intent = Intent::with_action(*self);
        intent.target = ctx.target.map(|t| t.id);
        let snapshot = ctx.snapshot;
        let me = &snapshot.me;
        let config = ctx.config;

        match self {
            Leaf::Flee => {
                if let Some(threat) = snapshot.threat_position() {
                    let away = away_from(me.pos, threat);
                    intent.movement = MoveIntent::Autopilot(me.pos + away * config.detection_range);
                    intent.boost = me.boost_ready;
                }
            }
            Leaf::Defend => {
                let threat = snapshot.threats.first().copied().or_else(|| snapshot.nearest_hostile().map(|h| h.pos));
                if let Some(threat) = threat {
                    let bearing = (threat - me.pos).normalize();
                    let side = if snapshot.orbit_side < 0.0 { -1.0 } else { 1.0 };
                    let dodge = if bearing.length() > 0.0 { bearing.perp() * side } else { Vec2::new(0.0, side) };
                    intent.movement = MoveIntent::Autopilot(me.pos + dodge * (config.detection_range * 0.5));
                }
            }
            Leaf::Attack => match ctx.target {
                Some(target) => {
                    let hostile = snapshot.is_hostile(target);
                    if hostile {
                        intent.fire_at = Some(Target::Entity(target.id));
                    }
                    if snapshot.orbiting {
                        intent.movement = MoveIntent::Keep;
                    } else if memory.orbit_timer <= 0.0 {
                        memory.orbit_timer = config.orbit_cooldown;
                        if rng.gen::<f32>() < config.orbit_chance {
                            let speed = config.orbit_speed_base * 0.5 * snapshot.orbit_side;
                            intent.movement = MoveIntent::Orbit { target: target.id, speed };
                        } else {
                            intent.movement = MoveIntent::Autopilot(intercept_point(me.pos, target.pos, config));
                        }
                    } else {
                        intent.movement = MoveIntent::Autopilot(intercept_point(me.pos, target.pos, config));
                    }
                }
                None => return Leaf::Idle.update(ctx, memory, rng),
            },
            Leaf::Pursue => match ctx.target {
                Some(target) if snapshot.is_hostile(target) => {
                    intent.movement = MoveIntent::Autopilot(target.pos);
                    intent.boost = me.boost_ready;
                }
                Some(friend) => {
                    // Escort: close in to hover distance, never onto the friend
                    if snapshot.distance_to(friend) > HOVER_DISTANCE {
                        let toward_me = away_from(friend.pos, me.pos);
                        intent.movement = MoveIntent::Autopilot(friend.pos + toward_me * HOVER_DISTANCE);
                    }
                }
                None => {
                    let mut idle = Leaf::Idle.update(ctx, memory, rng);
                    idle.action = Some(Leaf::Pursue);
                    return idle;
                }
            },
            Leaf::Idle => {
                if !snapshot.autopilot_active || memory.last_action != Some(Leaf::Idle) {
                    memory.wander = None;
                }
                if memory.wander.is_none() {
                    let region = ctx.region;
                    let point = Vec2::new(
                        region.x + rng.gen::<f32>() * region.width,
                        region.y + rng.gen::<f32>() * region.height,
                    );
                    memory.wander = Some(point);
                    intent.movement = MoveIntent::Autopilot(point);
                }
            }
        }

        memory.last_action = intent.action;
        intent
    }
}

/// Unit vector from `threat` toward `pos` (arbitrary if they coincide)
fn away_from(pos: Vec2, threat: Vec2) -> Vec2 {
    let dir = (pos - threat).normalize();
    if dir.length() > 0.0 {
        dir
    } else {
        Vec2::new(1.0, 0.0)
    }
}

fn intercept_point(me: Vec2, target: Vec2, config: &SimulationConfig) -> Vec2 {
    target + away_from(me, target) * (config.attack_range * INTERCEPT_FRACTION)
}

/// Everything a leaf reads
#[derive(Debug, Clone, Copy)]
pub struct LeafContext<'a> {
    pub snapshot: &'a SensorSnapshot,
    pub target: Option<&'a ShipView>,
    pub region: Rect,
    pub config: &'a SimulationConfig,
}

/// Per-pilot state the leaves keep between ticks
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PilotMemory {
    pub orbit_timer: f32,
    pub wander: Option<Vec2>,
    pub last_action: Option<Leaf>,
}

impl PilotMemory {
    pub fn tick(&mut self, dt: f32) {
        self.orbit_timer = (self.orbit_timer - dt).max(0.0);
    }
}

/// First leaf whose precondition holds
pub fn select(ctx: &LeafContext) -> Leaf {
    Leaf::ALL.into_iter().find(|leaf| leaf.precondition(ctx)).unwrap_or(Leaf::Idle)
}

/// Assist target if we can see it, else the nearest hostile
pub fn pick_target(snapshot: &SensorSnapshot) -> Option<&ShipView> {
    snapshot
        .assist_target
        .and_then(|id| snapshot.view(id))
        .filter(|v| snapshot.is_hostile(v))
        .or_else(|| snapshot.nearest_hostile())
}

#[derive(Debug, Clone)]
pub struct BehaviorTreePilot {
    pub region: Rect,
    pub memory: PilotMemory,
}

impl BehaviorTreePilot {
    pub fn new(region: Rect) -> Self {
        Self { region, memory: PilotMemory::default() }
    }
}

impl Pilot for BehaviorTreePilot {
    fn kind(&self) -> PilotKind {
        PilotKind::BehaviorTree
    }

    fn decide(&mut self, snapshot: &SensorSnapshot, config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Intent {
        self.memory.tick(snapshot.dt);
        let target = pick_target(snapshot);
        let ctx = LeafContext { snapshot, target, region: self.region, config };
        let leaf = select(&ctx);
        let mut intent = leaf.update(&ctx, &mut self.memory, rng);
        intent.request_help = help_request(snapshot, target, config);
        intent
    }

    fn region(&self) -> Rect {
        self.region
    }

    fn last_action(&self) -> Option<Leaf> {
        self.memory.last_action
    }
}
