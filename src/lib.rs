//! Stellar Drift - deterministic simulation kernel for a top-down space combat game
//!
//! The `World` owns everything; `World::step` advances it one fixed tick.

pub mod ai;
pub mod combat;
pub mod core;
pub mod economy;
pub mod entity;
pub mod flagship;
pub mod navigation;
pub mod persistence;
pub mod simulation;
pub mod world;

pub use crate::core::config::SimulationConfig;
pub use crate::core::error::{Result, SimError};
pub use crate::entity::InputState;
pub use crate::simulation::SimEvent;
pub use crate::world::World;
