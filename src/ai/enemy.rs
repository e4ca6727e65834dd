//! Learning enemy pilot
//!
//! Tabular Q over a 5-dim state, actions are the behavior-tree leaves. The
//! chosen leaf's `update` produces the actual intent.

use rand_chacha::ChaCha8Rng;

use crate::ai::behavior_tree::{pick_target, Leaf, LeafContext, PilotMemory};
use crate::ai::qlearning::{QTable, StateKey};
use crate::ai::{help_request, range_bucket, shield_bucket, Intent, Pilot, PilotKind, SensorSnapshot};
use crate::core::config::SimulationConfig;
use crate::core::types::Rect;

/// (player distance, hull low, own shield, player shield, near black hole)
pub const ENEMY_DIMS: usize = 5;

pub fn enemy_state(snapshot: &SensorSnapshot, config: &SimulationConfig) -> StateKey {
    let distance = range_bucket(snapshot.player_distance(), config);
    let hull_low = i32::from(snapshot.me.hull_ratio() <= config.flee_threshold);
    let own_shield = shield_bucket(snapshot.me.shield_ratio);
    let player_shield = snapshot.player.as_ref().map_or(1, |p| shield_bucket(p.shield_ratio));
    let near_bh = i32::from(snapshot.black_hole.is_some());
    StateKey(vec![distance, hull_low, own_shield, player_shield, near_bh])
}

/// Damage dealt to the player minus damage taken, plus a small bonus for
/// staying in attack range
pub fn enemy_reward(player_prev: f32, player_hull: f32, own_prev: f32, own_hull: f32, in_attack_range: bool) -> f64 {
    let dealt = f64::from(player_prev - player_hull);
    let taken = f64::from(own_prev - own_hull);
    dealt - taken + if in_attack_range { 0.1 } else { 0.0 }
}

#[derive(Debug, Clone)]
pub struct LearningEnemyPilot {
    pub table: QTable,
    pub region: Rect,
    pub memory: PilotMemory,
    /// When false the table is only read
    pub learning: bool,
    pending: Option<(StateKey, Leaf)>,
    prev_player_hull: Option<f32>,
    prev_own_hull: f32,
}

impl LearningEnemyPilot {
    pub fn new(table: QTable, region: Rect) -> Self {
        Self {
            table,
            region,
            memory: PilotMemory::default(),
            learning: true,
            pending: None,
            prev_player_hull: None,
            prev_own_hull: 0.0,
        }
    }

    fn learn(&mut self, state: &StateKey, snapshot: &SensorSnapshot, config: &SimulationConfig) {
        let Some((prev_state, prev_action)) = self.pending.take() else {
            return;
        };
        if !self.learning {
            return;
        }
        let player_hull = snapshot.player.as_ref().map(|p| p.hull);
        let (player_prev, player_now) = match (self.prev_player_hull, player_hull) {
            (Some(prev), Some(now)) => (prev, now),
            _ => (0.0, 0.0),
        };
        let in_attack = snapshot.player_distance().is_some_and(|d| d <= config.attack_range);
        let reward = enemy_reward(player_prev, player_now, self.prev_own_hull, snapshot.me.hull, in_attack);
        self.table.update(&prev_state, prev_action.name(), reward, state, config.q_alpha, config.q_gamma);
    }
}

impl Pilot for LearningEnemyPilot {
    fn kind(&self) -> PilotKind {
        PilotKind::LearningEnemy
    }

    fn decide(&mut self, snapshot: &SensorSnapshot, config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Intent {
        self.memory.tick(snapshot.dt);
        let state = enemy_state(snapshot, config);
        self.learn(&state, snapshot, config);

        let chosen = self.table.choose(&state, &Leaf::NAMES, config.q_epsilon, rng);
        let action = Leaf::from_name(&chosen).unwrap_or(Leaf::Idle);

        let target = pick_target(snapshot);
        let ctx = LeafContext { snapshot, target, region: self.region, config };
        let mut intent = action.update(&ctx, &mut self.memory, rng);
        intent.request_help = help_request(snapshot, target, config);

        self.pending = Some((state, action));
        self.prev_player_hull = snapshot.player.as_ref().map(|p| p.hull);
        self.prev_own_hull = snapshot.me.hull;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::view;
    use crate::core::types::{Faction, Vec2};
    use rand::SeedableRng;

    fn snapshot(distance: f32) -> SensorSnapshot {
        let mut snap = SensorSnapshot::alone(view(2, Faction::Pirate, 1000.0, 1000.0), 0.1);
        let player = view(1, Faction::Player, 1000.0 + distance, 1000.0);
        snap.player = Some(player);
        snap.hostiles = vec![player];
        snap
    }

    #[test]
    fn test_state_has_five_dims() {
        let config = SimulationConfig::default();
        let mut snap = snapshot(200.0);
        snap.black_hole = Some((Vec2::ZERO, 600.0));
        let state = enemy_state(&snap, &config);
        assert_eq!(state.dims(), ENEMY_DIMS);
        assert_eq!(state, StateKey(vec![0, 0, 2, 2, 1]));

        snap.player = None;
        snap.black_hole = None;
        assert_eq!(enemy_state(&snap, &config), StateKey(vec![2, 0, 2, 1, 0]));
    }

    #[test]
    fn test_reward_shape() {
        assert!((enemy_reward(100.0, 90.0, 100.0, 100.0, false) - 10.0).abs() < 1e-9);
        assert!((enemy_reward(100.0, 100.0, 100.0, 95.0, true) - (-4.9)).abs() < 1e-6);
    }

    #[test]
    fn test_greedy_action_drives_leaf() {
        let config = SimulationConfig { q_epsilon: 0.0, ..SimulationConfig::default() };
        let snap = snapshot(200.0);
        let state = enemy_state(&snap, &config);
        let mut table = QTable::new();
        table.set(state, "pursue", 5.0);
        let mut pilot = LearningEnemyPilot::new(table, Rect::new(0.0, 0.0, 5000.0, 5000.0));
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let intent = pilot.decide(&snap, &config, &mut rng);
        assert_eq!(intent.action, Some(Leaf::Pursue));
        assert_eq!(pilot.last_action(), Some(Leaf::Pursue));
    }

    #[test]
    fn test_second_decision_updates_table() {
        let config = SimulationConfig { q_epsilon: 0.0, ..SimulationConfig::default() };
        let mut snap = snapshot(200.0);
        let state = enemy_state(&snap, &config);
        let mut table = QTable::new();
        table.set(state.clone(), "attack", 1.0);
        let mut pilot = LearningEnemyPilot::new(table, Rect::new(0.0, 0.0, 5000.0, 5000.0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        pilot.decide(&snap, &config, &mut rng);

        // The player lost 10 hull since the last decision
        if let Some(p) = snap.player.as_mut() {
            p.hull = 90.0;
        }
        snap.hostiles[0].hull = 90.0;
        pilot.decide(&snap, &config, &mut rng);
        assert!(pilot.table.value(&state, "attack") > 1.0);
    }
}
