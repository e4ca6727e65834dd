//! The fixed-step simulation loop
//!
//! `tick::step` runs the phases in a fixed order; `collision` resolves hits,
//! blasts, rams and hazard contact once everything has moved.

pub mod collision;
pub mod tick;

use serde::Serialize;

use crate::core::types::{EntityId, Faction, Vec2};
use crate::world::GateKind;

/// Events raised during a step, for renderers and logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SimEvent {
    Hit { attacker: EntityId, target: EntityId, damage: f32 },
    ShipDestroyed { ship: EntityId, by: Option<EntityId> },
    FlagshipDestroyed { flagship: EntityId, faction: Faction },
    Detonation { owner: EntityId, pos: Vec2, radius: f32 },
    WeaponFired { ship: EntityId, weapon: String },
    ArtifactActivated { ship: EntityId, artifact: String },
    DroneLaunched { drone: EntityId, owner: EntityId },
    OrbitBroken { ship: EntityId, target: EntityId },
    HelpRequested { caller: EntityId, target: EntityId },
    HyperjumpCompleted { ship: EntityId },
    Teleported { ship: EntityId, gate: GateKind, from: Vec2, to: Vec2 },
    BlackHoleFormed { hole: EntityId, pos: Vec2 },
    AsteroidDepleted { asteroid: EntityId, by: EntityId },
    MarketRestocked { station: EntityId },
}
