pub mod config;
pub mod error;
pub mod types;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use types::{normalize_angle, rotate_toward, EntityId, Faction, IdAllocator, Rect, Target, Tick, Vec2};
