//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::fmt;

/// Unique identifier for every simulated object
///
/// Ids are handed out by the world from a monotonically increasing counter, so
/// two worlds built from the same seed assign identical ids. Ordering by id is
/// the stable tiebreak used everywhere a deterministic order is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Simulation tick counter
pub type Tick = u64;

/// Hands out sequential entity ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Generate a new unique EntityId
    pub fn next_id(&mut self) -> EntityId {
        if self.next == 0 {
            self.next = 1;
        }
        let id = EntityId(self.next);
        self.next += 1;
        id
    }
}

/// Factions a ship, drone or flagship can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// The player and every ally flying with them
    Player,
    Pirate,
    SolarDominion,
    Nebula,
    FreeExplorers,
    CosmicGuild,
    /// Traders and civilians, never hostile to anyone
    Neutral,
}

impl Faction {
    /// Returns true if ships of the two factions fight each other
    pub fn is_hostile_to(&self, other: Faction) -> bool {
        if *self == other || *self == Faction::Neutral || other == Faction::Neutral {
            return false;
        }
        // Free Explorers trade with everyone except pirates
        match (*self, other) {
            (Faction::FreeExplorers, Faction::Pirate) | (Faction::Pirate, Faction::FreeExplorers) => true,
            (Faction::FreeExplorers, _) | (_, Faction::FreeExplorers) => false,
            _ => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Faction::Player => "player",
            Faction::Pirate => "pirate",
            Faction::SolarDominion => "solar_dominion",
            Faction::Nebula => "nebula",
            Faction::FreeExplorers => "free_explorers",
            Faction::CosmicGuild => "cosmic_guild",
            Faction::Neutral => "neutral",
        }
    }
}

/// Something a pilot, weapon or drone can aim at
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Target {
    Entity(EntityId),
    Point(Vec2),
    #[default]
    None,
}

impl Target {
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Target::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Target::None)
    }
}

/// 2D position or direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing at `angle` radians
    pub fn from_angle(angle: f32) -> Self {
        Self { x: angle.cos(), y: angle.sin() }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_sq(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self { x: self.x / len, y: self.y / len }
        } else {
            Self::default()
        }
    }

    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Bearing from `self` to `other`
    pub fn angle_to(&self, other: &Self) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Counter-clockwise perpendicular
    pub fn perp(&self) -> Self {
        Self { x: -self.y, y: self.x }
    }

    /// Clamp the vector length to `max`
    pub fn clamp_length(&self, max: f32) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            *self * (max / len)
        } else {
            *self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self { x: self.x * rhs, y: self.y * rhs }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

/// Axis-aligned rectangle (sectors, patrol regions, world bounds)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.x, self.x + self.width),
            p.y.clamp(self.y, self.y + self.height),
        )
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

/// Normalize an angle difference into (−π, π]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Rotate `current` toward `desired` by at most `max_step` radians
pub fn rotate_toward(current: f32, desired: f32, max_step: f32) -> f32 {
    let diff = normalize_angle(desired - current);
    if diff.abs() <= max_step {
        desired
    } else {
        current + max_step * diff.signum()
    }
}
