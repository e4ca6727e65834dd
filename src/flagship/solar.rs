//! Solar Dominion channel arms
//!
//! Each arm locks onto the nearest star in range that no other arm has
//! claimed this tick, swings toward it at a bounded rate, and drains it once
//! aimed. Claims live in a set rebuilt every tick and shared by every Solar
//! flagship, so a star feeds at most one arm per tick.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f32::consts::TAU;

use crate::core::config::SimulationConfig;
use crate::core::types::{normalize_angle, rotate_toward, EntityId, Vec2};
use crate::world::galaxy::Galaxy;

/// An arm drains only while pointing this close to its star
pub const ARM_AIM_TOLERANCE: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelArm {
    pub angle: f32,
    pub star: Option<EntityId>,
    /// Energy drawn on the last tick
    pub drawn: f32,
}

impl ChannelArm {
    pub fn new(angle: f32) -> Self {
        Self { angle, star: None, drawn: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarArray {
    pub arms: Vec<ChannelArm>,
}

impl SolarArray {
    pub fn new(config: &SimulationConfig) -> Self {
        let n = config.solar_arm_count.max(1);
        Self { arms: (0..n).map(|k| ChannelArm::new(k as f32 * TAU / n as f32)).collect() }
    }

    /// Advance every arm; returns the total energy added to the flagship
    pub fn tick(
        &mut self,
        dt: f32,
        center: Vec2,
        energy: &mut f32,
        max_energy: f32,
        galaxy: &mut Galaxy,
        claims: &mut BTreeSet<EntityId>,
        config: &SimulationConfig,
    ) -> f32 {
        let mut total = 0.0;
        for arm in &mut self.arms {
            arm.drawn = 0.0;
            arm.star = pick_star(arm.star, center, galaxy, claims, config);
            let Some(star_id) = arm.star else {
                continue;
            };
            claims.insert(star_id);
            let Some(system) = galaxy.system_mut(star_id) else {
                continue;
            };
            let bearing = center.angle_to(&system.center);
            arm.angle = rotate_toward(arm.angle, bearing, config.solar_arm_turn_rate * dt);
            if normalize_angle(bearing - arm.angle).abs() > ARM_AIM_TOLERANCE {
                continue;
            }
            let room = (max_energy - *energy).max(0.0);
            let amount = (config.solar_arm_rate * dt).min(room);
            let drawn = system.star.drain(amount);
            *energy = (*energy + drawn).min(max_energy);
            arm.drawn = drawn;
            total += drawn;
        }
        total
    }

    pub fn claimed_stars(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.arms.iter().filter_map(|a| a.star)
    }
}

/// Keep the current star while it is valid, else pick the nearest unclaimed
/// star with energy left (ties broken by id)
fn pick_star(
    current: Option<EntityId>,
    center: Vec2,
    galaxy: &Galaxy,
    claims: &BTreeSet<EntityId>,
    config: &SimulationConfig,
) -> Option<EntityId> {
    let usable = |id: EntityId| {
        galaxy.system(id).is_some_and(|s| {
            !claims.contains(&id) && s.star.energy > 0.0 && s.center.distance(&center) <= config.solar_arm_range
        })
    };
    if let Some(id) = current.filter(|id| usable(*id)) {
        return Some(id);
    }
    galaxy
        .systems()
        .filter(|s| usable(s.id))
        .min_by(|a, b| {
            a.center
                .distance(&center)
                .total_cmp(&b.center.distance(&center))
                .then(a.id.cmp(&b.id))
        })
        .map(|s| s.id)
}
