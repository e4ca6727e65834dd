//! NPC decision layer
//!
//! Architecture: trait + snapshot
//! - `Pilot` trait defines the interface for swappable pilot implementations
//! - `SensorSnapshot` is the pilot's read-only view of the pre-tick world
//! - `Intent` is the only thing a pilot produces; the world applies it before
//!   integrating the ship

pub mod ally;
pub mod behavior_tree;
pub mod coordination;
pub mod enemy;
pub mod qlearning;

pub use ally::{ally_reward, ally_state, LearningAllyPilot, ALLY_DIMS, HOVER_DISTANCE};
pub use behavior_tree::{BehaviorTreePilot, Leaf, LeafContext, PilotMemory};
pub use coordination::{Coordination, CoordinationEntry};
pub use enemy::{enemy_reward, enemy_state, LearningEnemyPilot, ENEMY_DIMS};
pub use qlearning::{QTable, StateKey};

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::combat::artifacts::Activation;
use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, Faction, Rect, Target, Vec2};
use crate::entity::Ship;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PilotKind {
    BehaviorTree,
    LearningEnemy,
    LearningAlly,
}

/// What a pilot can see of one ship
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipView {
    pub id: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub vel: Vec2,
    pub hull: f32,
    pub max_hull: f32,
    pub shield_ratio: f32,
    pub size: f32,
    pub boosting: bool,
    pub boost_ready: bool,
}

impl ShipView {
    pub fn of(ship: &Ship) -> Self {
        Self {
            id: ship.id,
            faction: ship.faction,
            pos: ship.pos,
            vel: ship.vel,
            hull: ship.hull,
            max_hull: ship.max_hull,
            shield_ratio: ship.shield.ratio(),
            size: ship.size,
            boosting: ship.boost.active(),
            boost_ready: ship.boost.ready(),
        }
    }

    pub fn hull_ratio(&self) -> f32 {
        if self.max_hull > 0.0 {
            self.hull / self.max_hull
        } else {
            0.0
        }
    }
}

/// Pre-tick view of the world around one NPC ship
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    pub me: ShipView,
    /// The player ship, unless destroyed or cloaked
    pub player: Option<ShipView>,
    /// Hostile ships and decoys within detection range, nearest first
    pub hostiles: Vec<ShipView>,
    /// Hostile projectiles within danger range, nearest first
    pub threats: Vec<Vec2>,
    /// Nearest black hole whose pull reaches us: (position, pull range)
    pub black_hole: Option<(Vec2, f32)>,
    pub assist_target: Option<EntityId>,
    /// +1 or −1, assigned by coordination
    pub orbit_side: f32,
    pub autopilot_active: bool,
    pub orbiting: bool,
    pub dt: f32,
    /// Hostiles this ship damaged during the previous tick
    pub recent_hits: Vec<EntityId>,
    /// Hostiles this ship destroyed during the previous tick
    pub recent_kills: Vec<EntityId>,
}

impl SensorSnapshot {
    /// Bare snapshot with nothing around
    pub fn alone(me: ShipView, dt: f32) -> Self {
        Self {
            me,
            player: None,
            hostiles: Vec::new(),
            threats: Vec::new(),
            black_hole: None,
            assist_target: None,
            orbit_side: 1.0,
            autopilot_active: false,
            orbiting: false,
            dt,
            recent_hits: Vec::new(),
            recent_kills: Vec::new(),
        }
    }

    /// Look up a visible ship by id
    pub fn view(&self, id: EntityId) -> Option<&ShipView> {
        self.hostiles
            .iter()
            .find(|v| v.id == id)
            .or_else(|| self.player.as_ref().filter(|p| p.id == id))
    }

    pub fn nearest_hostile(&self) -> Option<&ShipView> {
        self.hostiles.first()
    }

    pub fn distance_to(&self, other: &ShipView) -> f32 {
        self.me.pos.distance(&other.pos)
    }

    pub fn player_distance(&self) -> Option<f32> {
        self.player.as_ref().map(|p| self.distance_to(p))
    }

    pub fn is_hostile(&self, other: &ShipView) -> bool {
        self.me.faction.is_hostile_to(other.faction)
    }

    /// Nearest thing to run from: a hostile ship, else an incoming shot
    pub fn threat_position(&self) -> Option<Vec2> {
        self.nearest_hostile().map(|h| h.pos).or_else(|| self.threats.first().copied())
    }
}

/// Movement part of an intent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MoveIntent {
    /// Leave the current movement mode alone
    #[default]
    Keep,
    Autopilot(Vec2),
    Orbit { target: EntityId, speed: f32 },
    /// Drop autopilot or orbit and coast
    Stop,
}

/// Everything a pilot wants done this tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Intent {
    /// Leaf that produced the intent
    pub action: Option<Leaf>,
    pub movement: MoveIntent,
    pub fire_at: Option<Target>,
    pub boost: bool,
    /// Current target, reported to coordination
    pub target: Option<EntityId>,
    pub request_help: Option<EntityId>,
    /// Artifact slots to trigger, filled in by the world from `ai_policy`
    pub artifacts: Vec<(usize, Activation)>,
}

impl Intent {
    pub fn with_action(action: Leaf) -> Self {
        Self { action: Some(action), ..Self::default() }
    }
}

/// Trait for pilot implementations
pub trait Pilot: std::fmt::Debug {
    fn kind(&self) -> PilotKind;

    /// Decide this tick's intent from the pre-tick snapshot
    fn decide(&mut self, snapshot: &SensorSnapshot, config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Intent;

    /// Patrol region used for the region checks of Attack and Pursue
    fn region(&self) -> Rect;

    /// Learned table, for pilots that have one
    fn q_table(&self) -> Option<&QTable> {
        None
    }

    fn last_action(&self) -> Option<Leaf>;
}

/// Whether a pilot should broadcast for help, and against whom
///
/// Pilots hostile to the player call for help as soon as they see it within
/// detection range; any pilot calls when its hull drops below the flee
/// threshold while it has a hostile target.
pub fn help_request(snapshot: &SensorSnapshot, target: Option<&ShipView>, config: &SimulationConfig) -> Option<EntityId> {
    if let Some(player) = snapshot.player.as_ref() {
        if snapshot.is_hostile(player) && snapshot.distance_to(player) <= config.detection_range {
            return Some(player.id);
        }
    }
    let hostile_target = target.filter(|t| snapshot.is_hostile(t))?;
    (snapshot.me.hull_ratio() < config.flee_threshold).then_some(hostile_target.id)
}

/// Discretize a shield ratio into low / mid / high
pub fn shield_bucket(ratio: f32) -> i32 {
    if ratio < 0.3 {
        0
    } else if ratio < 0.7 {
        1
    } else {
        2
    }
}

/// Distance bucket: within attack range, within detection range, else
pub fn range_bucket(distance: Option<f32>, config: &SimulationConfig) -> i32 {
    match distance {
        Some(d) if d <= config.attack_range => 0,
        Some(d) if d <= config.detection_range => 1,
        _ => 2,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn view(id: u32, faction: Faction, x: f32, y: f32) -> ShipView {
        ShipView {
            id: EntityId(id),
            faction,
            pos: Vec2::new(x, y),
            vel: Vec2::ZERO,
            hull: 100.0,
            max_hull: 100.0,
            shield_ratio: 1.0,
            size: 20.0,
            boosting: false,
            boost_ready: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::view;
    use super::*;

    #[test]
    fn test_buckets() {
        let config = SimulationConfig::default();
        assert_eq!(range_bucket(Some(10.0), &config), 0);
        assert_eq!(range_bucket(Some(config.attack_range + 1.0), &config), 1);
        assert_eq!(range_bucket(Some(config.detection_range + 1.0), &config), 2);
        assert_eq!(range_bucket(None, &config), 2);
        assert_eq!(shield_bucket(0.1), 0);
        assert_eq!(shield_bucket(0.5), 1);
        assert_eq!(shield_bucket(1.0), 2);
    }

    #[test]
    fn test_help_requested_when_player_seen() {
        let config = SimulationConfig::default();
        let mut snap = SensorSnapshot::alone(view(2, Faction::Pirate, 0.0, 0.0), 0.1);
        snap.player = Some(view(1, Faction::Player, 300.0, 0.0));
        assert_eq!(help_request(&snap, None, &config), Some(EntityId(1)));

        snap.player = Some(view(1, Faction::Player, config.detection_range + 50.0, 0.0));
        assert_eq!(help_request(&snap, None, &config), None);
    }

    #[test]
    fn test_help_requested_when_hull_low() {
        let config = SimulationConfig::default();
        let mut me = view(5, Faction::Player, 0.0, 0.0);
        me.hull = 10.0;
        let snap = SensorSnapshot::alone(me, 0.1);
        let pirate = view(9, Faction::Pirate, 100.0, 0.0);
        assert_eq!(help_request(&snap, Some(&pirate), &config), Some(EntityId(9)));
        // Never against a friendly target
        let friend = view(1, Faction::Player, 50.0, 0.0);
        assert_eq!(help_request(&snap, Some(&friend), &config), None);
    }
}
