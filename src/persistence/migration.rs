//! Q-table schema migration
//!
//! Version 1 tables stored shorter state tuples. Migration widens every key to
//! the current dimensionality by appending the schema's per-dimension
//! defaults for the missing positions; Q-values are carried over untouched.

use std::collections::BTreeMap;

use crate::ai::qlearning::{QTable, StateKey};
use crate::ai::{ALLY_DIMS, ENEMY_DIMS};
use crate::core::error::{Result, SimError};
use crate::entity::drone::DRONE_DIMS;

/// Which learner a table belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSchema {
    Enemy,
    Ally,
    DefensiveDrone,
}

/// Enemy: (distance, hull low, own shield, player shield, near black hole)
const ENEMY_DEFAULTS: [i32; ENEMY_DIMS] = [2, 0, 1, 1, 0];

/// Ally: (target distance, hull low, own shield, player shield, player
/// distance, threat, near black hole)
const ALLY_DEFAULTS: [i32; ALLY_DIMS] = [2, 0, 1, 1, 1, 2, 0];

/// Drone: (threat, owner distance, hull low)
const DRONE_DEFAULTS: [i32; DRONE_DIMS] = [2, 0, 0];

impl TableSchema {
    pub fn dims(&self) -> usize {
        self.defaults().len()
    }

    /// Value assumed for each dimension when an old key lacks it
    pub fn defaults(&self) -> &'static [i32] {
        match self {
            TableSchema::Enemy => &ENEMY_DEFAULTS,
            TableSchema::Ally => &ALLY_DEFAULTS,
            TableSchema::DefensiveDrone => &DRONE_DEFAULTS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableSchema::Enemy => "enemy",
            TableSchema::Ally => "ally",
            TableSchema::DefensiveDrone => "defensive_drone",
        }
    }
}

/// Widen one key to the schema's dimensionality
pub fn migrate_key(key: &StateKey, schema: TableSchema) -> Result<StateKey> {
    let defaults = schema.defaults();
    let n = key.dims();
    if n == 0 || n > defaults.len() {
        return Err(SimError::BadPersistence(format!(
            "{} state {} cannot be widened to {} dims",
            schema.name(),
            key,
            defaults.len()
        )));
    }
    let mut values = key.0.clone();
    values.extend_from_slice(&defaults[n..]);
    Ok(StateKey(values))
}

/// Widen every key of a v1 table
///
/// Keys are visited in ascending order. If two old keys widen to the same new
/// key, the action values of the first one win.
pub fn migrate_table(old: BTreeMap<StateKey, BTreeMap<String, f64>>, schema: TableSchema) -> Result<QTable> {
    let mut table = QTable::new();
    let mut collisions = 0usize;
    for (key, actions) in old {
        let widened = migrate_key(&key, schema)?;
        for (action, value) in actions {
            if table.actions(&widened).is_some_and(|a| a.contains_key(&action)) {
                collisions += 1;
                continue;
            }
            table.set(widened.clone(), &action, value);
        }
    }
    if collisions > 0 {
        tracing::warn!(schema = schema.name(), collisions, "v1 keys collided during migration");
    }
    tracing::info!(schema = schema.name(), states = table.len(), "migrated v1 q-table");
    Ok(table)
}

/// Check that every key of a current-version table has the right shape
pub fn check_dims(table: &BTreeMap<StateKey, BTreeMap<String, f64>>, schema: TableSchema) -> Result<()> {
    match table.keys().find(|k| k.dims() != schema.dims()) {
        Some(bad) => Err(SimError::BadPersistence(format!(
            "{} state {} has {} dims, expected {}",
            schema.name(),
            bad,
            bad.dims(),
            schema.dims()
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: &[i32]) -> StateKey {
        StateKey(v.to_vec())
    }

    #[test]
    fn test_enemy_v1_pair_gains_one_one_zero() {
        assert_eq!(migrate_key(&key(&[0, 1]), TableSchema::Enemy).unwrap(), key(&[0, 1, 1, 1, 0]));
    }

    #[test]
    fn test_ally_v1_triple_gains_one_one_two_zero() {
        assert_eq!(migrate_key(&key(&[1, 0, 2]), TableSchema::Ally).unwrap(), key(&[1, 0, 2, 1, 1, 2, 0]));
    }

    #[test]
    fn test_longer_enemy_key_is_padded_positionally() {
        assert_eq!(migrate_key(&key(&[2, 1, 0]), TableSchema::Enemy).unwrap(), key(&[2, 1, 0, 1, 0]));
        // Already current
        assert_eq!(migrate_key(&key(&[2, 1, 0, 1, 1]), TableSchema::Enemy).unwrap(), key(&[2, 1, 0, 1, 1]));
    }

    #[test]
    fn test_oversized_or_empty_key_rejected() {
        assert!(migrate_key(&key(&[0; 6]), TableSchema::Enemy).is_err());
        assert!(migrate_key(&StateKey(Vec::new()), TableSchema::Ally).is_err());
    }

    #[test]
    fn test_migrate_table_preserves_values() {
        let mut old = BTreeMap::new();
        old.insert(key(&[0, 1]), BTreeMap::from([("attack".to_string(), 0.5), ("flee".to_string(), -1.25)]));
        old.insert(key(&[2, 0]), BTreeMap::from([("idle".to_string(), 3.0)]));
        let table = migrate_table(old, TableSchema::Enemy).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(&key(&[0, 1, 1, 1, 0]), "flee"), -1.25);
        assert_eq!(table.value(&key(&[2, 0, 1, 1, 0]), "idle"), 3.0);
    }

    #[test]
    fn test_check_dims() {
        let mut ok = BTreeMap::new();
        ok.insert(key(&[0, 0, 0]), BTreeMap::new());
        assert!(check_dims(&ok, TableSchema::DefensiveDrone).is_ok());
        assert!(check_dims(&ok, TableSchema::Enemy).is_err());
    }
}
