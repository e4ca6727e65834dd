//! Tabular Q-learning
//!
//! States are small integer tuples, actions are named. The table is a lookup
//! structure only; anything that iterates it for output goes through a sorted
//! view so saved files are stable.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Discretized state tuple
///
/// Written as `(0, 1, 2)`; parsing also accepts `[0, 1, 2]` and `0,1,2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(pub Vec<i32>);

impl StateKey {
    pub fn dims(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

impl FromStr for StateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .or_else(|| trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')))
            .unwrap_or(trimmed);
        let values = inner
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<i32>().map_err(|e| format!("bad state component '{}': {}", part, e)))
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(format!("empty state key '{}'", s));
        }
        Ok(StateKey(values))
    }
}

impl Serialize for StateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Q(s, a) values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: AHashMap<StateKey, BTreeMap<String, f64>>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, state: &StateKey) -> bool {
        self.values.contains_key(state)
    }

    pub fn actions(&self, state: &StateKey) -> Option<&BTreeMap<String, f64>> {
        self.values.get(state)
    }

    /// Q(s, a), zero when unseen
    pub fn value(&self, state: &StateKey, action: &str) -> f64 {
        self.values.get(state).and_then(|a| a.get(action)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: StateKey, action: &str, value: f64) {
        self.values.entry(state).or_default().insert(action.to_string(), value);
    }

    /// Replace every value of one state
    pub fn insert_state(&mut self, state: StateKey, actions: BTreeMap<String, f64>) {
        self.values.insert(state, actions);
    }

    /// States in ascending order
    pub fn sorted(&self) -> Vec<(&StateKey, &BTreeMap<String, f64>)> {
        let mut entries: Vec<_> = self.values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// max_a Q(s, a); zero for unseen states
    pub fn max_value(&self, state: &StateKey) -> f64 {
        self.values
            .get(state)
            .and_then(|actions| actions.values().copied().map(OrderedFloat).max())
            .map(|v| v.0)
            .unwrap_or(0.0)
    }

    /// Greedy action among `actions`; ties go to the earliest. `None` for an
    /// unseen state.
    pub fn best_action(&self, state: &StateKey, actions: &[&str]) -> Option<String> {
        let known = self.values.get(state)?;
        let mut best: Option<(&str, OrderedFloat<f64>)> = None;
        for &action in actions {
            let v = OrderedFloat(known.get(action).copied().unwrap_or(0.0));
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((action, v));
            }
        }
        best.map(|(a, _)| a.to_string())
    }

    /// ε-greedy choice; unseen states pick uniformly at random
    pub fn choose<R: Rng>(&self, state: &StateKey, actions: &[&str], epsilon: f64, rng: &mut R) -> String {
        let explore = rng.gen::<f64>() < epsilon;
        let greedy = if explore { None } else { self.best_action(state, actions) };
        greedy
            .or_else(|| actions.choose(rng).map(|a| a.to_string()))
            .unwrap_or_default()
    }

    /// Q(s,a) ← Q(s,a) + α·(r + γ·max_a' Q(s',a') − Q(s,a))
    pub fn update(&mut self, state: &StateKey, action: &str, reward: f64, next: &StateKey, alpha: f64, gamma: f64) {
        let current = self.value(state, action);
        let target = reward + gamma * self.max_value(next);
        self.set(state.clone(), action, current + alpha * (target - current));
    }
}

impl Serialize for QTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&StateKey, &BTreeMap<String, f64>> = self.values.iter().collect();
        sorted.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = AHashMap::<StateKey, BTreeMap<String, f64>>::deserialize(deserializer)?;
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn key(v: &[i32]) -> StateKey {
        StateKey(v.to_vec())
    }

    #[test]
    fn test_state_key_formats() {
        assert_eq!(key(&[0, 1, 2]).to_string(), "(0, 1, 2)");
        assert_eq!("(0, 1, 2)".parse::<StateKey>().unwrap(), key(&[0, 1, 2]));
        assert_eq!("[3,4]".parse::<StateKey>().unwrap(), key(&[3, 4]));
        assert_eq!("5, -1".parse::<StateKey>().unwrap(), key(&[5, -1]));
        assert!("()".parse::<StateKey>().is_err());
        assert!("(a, 1)".parse::<StateKey>().is_err());
    }

    #[test]
    fn test_update_rule() {
        let mut table = QTable::new();
        let s = key(&[0]);
        let next = key(&[1]);
        table.set(next.clone(), "attack", 2.0);
        table.update(&s, "attack", 1.0, &next, 0.5, 0.9);
        // 0 + 0.5 * (1 + 0.9*2 - 0)
        assert!((table.value(&s, "attack") - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_best_action_ties_go_first() {
        let mut table = QTable::new();
        let s = key(&[0]);
        table.set(s.clone(), "pursue", 1.0);
        table.set(s.clone(), "attack", 1.0);
        assert_eq!(table.best_action(&s, &["attack", "pursue"]).as_deref(), Some("attack"));
        assert_eq!(table.best_action(&key(&[9]), &["attack"]), None);
    }

    #[test]
    fn test_choose_greedy_without_exploration() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut table = QTable::new();
        let s = key(&[0]);
        table.set(s.clone(), "flee", 5.0);
        for _ in 0..20 {
            assert_eq!(table.choose(&s, &["flee", "idle"], 0.0, &mut rng), "flee");
        }
        // Unknown states still produce one of the actions
        let picked = table.choose(&key(&[7]), &["flee", "idle"], 0.0, &mut rng);
        assert!(picked == "flee" || picked == "idle");
    }

    #[test]
    fn test_serialized_keys_are_sorted() {
        let mut table = QTable::new();
        table.set(key(&[2]), "a", 1.0);
        table.set(key(&[1]), "a", 1.0);
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.find("(1)").unwrap() < json.find("(2)").unwrap());
        let back: QTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
