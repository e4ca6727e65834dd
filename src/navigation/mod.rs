//! Grid navigation: A* around planets and black holes

pub mod grid;
pub mod pathfinding;

pub use grid::{adjacent, Cell, Grid};
pub use pathfinding::{world_obstacles, Obstacle, Pathfinder};
