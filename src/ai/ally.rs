//! Learning ally pilot
//!
//! Flies with the player: its target is the nearest hostile in detection
//! range, else the player itself. An "attack" chosen with no hostile around is
//! flown as "pursue", so an ally never opens fire on the player.

use rand_chacha::ChaCha8Rng;

use crate::ai::behavior_tree::{Leaf, LeafContext, PilotMemory};
use crate::ai::qlearning::{QTable, StateKey};
use crate::ai::{help_request, range_bucket, shield_bucket, Intent, Pilot, PilotKind, SensorSnapshot, ShipView};
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Rect};

/// (target distance, hull low, own shield, player shield, player distance,
/// threat, near black hole)
pub const ALLY_DIMS: usize = 7;

/// Preferred escort distance from the player
pub const HOVER_DISTANCE: f32 = 150.0;

/// Slack around the hover distance that still earns the hover bonus
pub const HOVER_TOLERANCE: f32 = 30.0;

/// Nearest visible hostile, else the player
pub fn ally_target(snapshot: &SensorSnapshot) -> Option<&ShipView> {
    snapshot
        .assist_target
        .and_then(|id| snapshot.view(id))
        .filter(|v| snapshot.is_hostile(v))
        .or_else(|| snapshot.nearest_hostile())
        .or(snapshot.player.as_ref())
}

pub fn ally_state(snapshot: &SensorSnapshot, config: &SimulationConfig) -> StateKey {
    let target_distance = ally_target(snapshot).map(|t| snapshot.distance_to(t));
    let player_bucket = match snapshot.player_distance() {
        Some(d) if d <= HOVER_DISTANCE + HOVER_TOLERANCE => 0,
        Some(d) if d <= config.detection_range => 1,
        _ => 2,
    };
    let threat_bucket = if !snapshot.threats.is_empty() {
        0
    } else if !snapshot.hostiles.is_empty() {
        1
    } else {
        2
    };
    StateKey(vec![
        range_bucket(target_distance, config),
        i32::from(snapshot.me.hull_ratio() <= config.flee_threshold),
        shield_bucket(snapshot.me.shield_ratio),
        snapshot.player.as_ref().map_or(1, |p| shield_bucket(p.shield_ratio)),
        player_bucket,
        threat_bucket,
        i32::from(snapshot.black_hole.is_some()),
    ])
}

/// Inputs to the ally reward, measured between two decisions
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AllySignals {
    pub own_damage: f32,
    pub player_damage: f32,
    pub player_distance: Option<f32>,
    pub target_in_attack_range: bool,
    pub hostile_in_range: bool,
    pub near_black_hole: bool,
    pub hits: usize,
    pub kills: usize,
}

pub fn ally_reward(s: &AllySignals) -> f64 {
    let mut reward = -0.5 * f64::from(s.own_damage) - f64::from(s.player_damage);
    if s.player_distance.is_some_and(|d| (d - HOVER_DISTANCE).abs() <= HOVER_TOLERANCE) {
        reward += 0.2;
    }
    if s.target_in_attack_range {
        reward += 0.05;
    }
    if s.hostile_in_range {
        reward += 0.1;
    }
    if s.near_black_hole {
        reward -= 0.3;
    }
    reward + 0.3 * s.hits as f64 + 1.0 * s.kills as f64
}

#[derive(Debug, Clone)]
pub struct LearningAllyPilot {
    pub table: QTable,
    pub region: Rect,
    pub memory: PilotMemory,
    pub learning: bool,
    pending: Option<(StateKey, Leaf)>,
    prev_own_hull: f32,
    prev_player_hull: Option<f32>,
    /// Hostiles seen at the previous decision
    tracked: Vec<EntityId>,
}

impl LearningAllyPilot {
    pub fn new(table: QTable, region: Rect) -> Self {
        Self {
            table,
            region,
            memory: PilotMemory::default(),
            learning: true,
            pending: None,
            prev_own_hull: 0.0,
            prev_player_hull: None,
            tracked: Vec::new(),
        }
    }

    fn signals(&self, snapshot: &SensorSnapshot, config: &SimulationConfig) -> AllySignals {
        let player_damage = match (self.prev_player_hull, snapshot.player.as_ref()) {
            (Some(prev), Some(p)) => (prev - p.hull).max(0.0),
            _ => 0.0,
        };
        let target = ally_target(snapshot).filter(|t| snapshot.is_hostile(t));
        AllySignals {
            own_damage: (self.prev_own_hull - snapshot.me.hull).max(0.0),
            player_damage,
            player_distance: snapshot.player_distance(),
            target_in_attack_range: target.is_some_and(|t| snapshot.distance_to(t) <= config.attack_range),
            hostile_in_range: !snapshot.hostiles.is_empty(),
            near_black_hole: snapshot.black_hole.is_some(),
            hits: snapshot.recent_hits.iter().filter(|id| self.tracked.contains(id)).count(),
            kills: snapshot.recent_kills.iter().filter(|id| self.tracked.contains(id)).count(),
        }
    }
}

impl Pilot for LearningAllyPilot {
    fn kind(&self) -> PilotKind {
        PilotKind::LearningAlly
    }

    fn decide(&mut self, snapshot: &SensorSnapshot, config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Intent {
        self.memory.tick(snapshot.dt);
        let state = ally_state(snapshot, config);

        if let Some((prev_state, prev_action)) = self.pending.take() {
            if self.learning {
                let reward = ally_reward(&self.signals(snapshot, config));
                self.table.update(&prev_state, prev_action.name(), reward, &state, config.q_alpha, config.q_gamma);
            }
        }

        let chosen = self.table.choose(&state, &Leaf::NAMES, config.q_epsilon, rng);
        let mut action = Leaf::from_name(&chosen).unwrap_or(Leaf::Idle);
        if action == Leaf::Attack && snapshot.hostiles.is_empty() {
            action = Leaf::Pursue;
        }

        let target = ally_target(snapshot);
        let ctx = LeafContext { snapshot, target, region: self.region, config };
        let mut intent = action.update(&ctx, &mut self.memory, rng);
        intent.request_help = help_request(snapshot, target, config);

        self.pending = Some((state, action));
        self.prev_own_hull = snapshot.me.hull;
        self.prev_player_hull = snapshot.player.as_ref().map(|p| p.hull);
        self.tracked = snapshot.hostiles.iter().map(|h| h.id).collect();
        intent
    }

    fn region(&self) -> Rect {
        self.region
    }

    fn q_table(&self) -> Option<&QTable> {
        Some(&self.table)
    }

    fn last_action(&self) -> Option<Leaf> {
        self.memory.last_action
    }
}
