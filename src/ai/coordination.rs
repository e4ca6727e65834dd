//! Coordination registry: assistance broadcasts and orbit-side assignment
//!
//! The registry is owned by the world and only mutated inside a step. Entries
//! are keyed by ship id in a `BTreeMap`, so every walk over it is in stable id
//! order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{EntityId, Faction};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinationEntry {
    pub faction: Faction,
    pub target: Option<EntityId>,
    pub assist_target: Option<EntityId>,
    /// +1 or −1
    pub orbit_side: f32,
}

impl CoordinationEntry {
    pub fn new(faction: Faction) -> Self {
        Self { faction, target: None, assist_target: None, orbit_side: 1.0 }
    }

    fn engages(&self, target: EntityId) -> bool {
        self.target == Some(target) || self.assist_target == Some(target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordination {
    entries: BTreeMap<EntityId, CoordinationEntry>,
}

impl Coordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pilot. Registering twice keeps the existing entry.
    pub fn register(&mut self, pilot: EntityId, faction: Faction) -> bool {
        if self.entries.contains_key(&pilot) {
            return false;
        }
        self.entries.insert(pilot, CoordinationEntry::new(faction));
        true
    }

    /// Remove a pilot and clear it as anyone's target. Unknown ids are a no-op.
    pub fn unregister(&mut self, pilot: EntityId) -> bool {
        let removed = self.entries.remove(&pilot).is_some();
        for entry in self.entries.values_mut() {
            if entry.assist_target == Some(pilot) {
                entry.assist_target = None;
            }
            if entry.target == Some(pilot) {
                entry.target = None;
            }
        }
        removed
    }

    pub fn contains(&self, pilot: EntityId) -> bool {
        self.entries.contains_key(&pilot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, pilot: EntityId) -> Option<&CoordinationEntry> {
        self.entries.get(&pilot)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&EntityId, &CoordinationEntry)> {
        self.entries.iter()
    }

    pub fn assist_target(&self, pilot: EntityId) -> Option<EntityId> {
        self.entries.get(&pilot).and_then(|e| e.assist_target)
    }

    pub fn orbit_side(&self, pilot: EntityId) -> f32 {
        self.entries.get(&pilot).map_or(1.0, |e| e.orbit_side)
    }

    /// Record the target a pilot is currently working on
    pub fn set_target(&mut self, pilot: EntityId, target: Option<EntityId>) {
        if let Some(entry) = self.entries.get_mut(&pilot) {
            entry.target = target;
        }
    }

    /// Point every other pilot of the caller's faction at `target`, then
    /// spread their orbit sides
    pub fn request_help(&mut self, caller: EntityId, target: EntityId) {
        let Some(faction) = self.entries.get(&caller).map(|e| e.faction) else {
            return;
        };
        let mut changed = 0;
        for (id, entry) in self.entries.iter_mut() {
            if *id != caller && entry.faction == faction && entry.assist_target != Some(target) {
                entry.assist_target = Some(target);
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::debug!(caller = %caller, target = %target, faction = faction.name(), changed, "help requested");
        }
        self.assign_orbit_sides(faction, target);
    }

    /// Alternate +1/−1 in id order among the faction's pilots engaging `target`
    pub fn assign_orbit_sides(&mut self, faction: Faction, target: EntityId) {
        let mut side = 1.0;
        for entry in self.entries.values_mut() {
            if entry.faction == faction && entry.engages(target) {
                entry.orbit_side = side;
                side = -side;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Coordination {
        let mut c = Coordination::new();
        c.register(EntityId(4), Faction::Pirate);
        c.register(EntityId(2), Faction::Pirate);
        c.register(EntityId(9), Faction::Pirate);
        c.register(EntityId(5), Faction::Nebula);
        c
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut c = registry();
        c.set_target(EntityId(4), Some(EntityId(1)));
        assert!(!c.register(EntityId(4), Faction::Pirate));
        assert_eq!(c.entry(EntityId(4)).and_then(|e| e.target), Some(EntityId(1)));
        assert_eq!(c.len(), 4);
        assert!(c.unregister(EntityId(4)));
        assert!(!c.unregister(EntityId(4)));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_request_help_reaches_same_faction_only() {
        let mut c = registry();
        c.request_help(EntityId(2), EntityId(1));
        assert_eq!(c.assist_target(EntityId(4)), Some(EntityId(1)));
        assert_eq!(c.assist_target(EntityId(9)), Some(EntityId(1)));
        assert_eq!(c.assist_target(EntityId(2)), None);
        assert_eq!(c.assist_target(EntityId(5)), None);
    }

    #[test]
    fn test_orbit_sides_alternate_by_id() {
        let mut c = registry();
        c.set_target(EntityId(2), Some(EntityId(1)));
        c.request_help(EntityId(2), EntityId(1));
        assert_eq!(c.orbit_side(EntityId(2)), 1.0);
        assert_eq!(c.orbit_side(EntityId(4)), -1.0);
        assert_eq!(c.orbit_side(EntityId(9)), 1.0);
    }

    #[test]
    fn test_unknown_caller_is_noop() {
        let mut c = registry();
        c.request_help(EntityId(77), EntityId(1));
        assert!(c.entries().all(|(_, e)| e.assist_target.is_none()));
    }

    #[test]
    fn test_unregistered_target_is_cleared() {
        let mut c = registry();
        c.request_help(EntityId(2), EntityId(9));
        assert_eq!(c.assist_target(EntityId(4)), Some(EntityId(9)));
        c.unregister(EntityId(9));
        assert_eq!(c.assist_target(EntityId(4)), None);
    }
}
