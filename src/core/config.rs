//! Simulation configuration with documented constants
//!
//! All tunables are collected here with a note on what they drive. Every field
//! has a default, so a TOML file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{Result, SimError};

/// Configuration for the simulation kernel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === WORLD ===
    /// Seed for the world RNG; same seed + same inputs = same run
    pub seed: u64,

    /// Sectors per side (the world is `grid_size × grid_size` sectors)
    pub grid_size: usize,

    pub sector_width: f32,
    pub sector_height: f32,

    /// Star systems generated per sector (inclusive range)
    pub systems_per_sector_min: usize,
    pub systems_per_sector_max: usize,

    pub black_hole_count: usize,
    pub wormhole_pairs: usize,
    pub portal_pairs: usize,
    pub dust_cloud_count: usize,

    /// Paired hazards are never generated closer than this
    pub wormhole_min_separation: f32,

    /// Angular velocity of planets around their star (rad/s)
    pub planet_orbit_speed: f32,

    /// Upper bound for a single step's dt (seconds)
    pub max_dt: f32,

    // === SHIP ===
    pub ship_max_speed: f32,
    pub ship_acceleration: f32,

    /// Velocity retained per 1/60 s frame of reference
    ///
    /// Applied as `friction^(dt * 60)` so the retention is framerate independent.
    pub ship_friction: f32,

    pub autopilot_speed: f32,
    pub ship_size: f32,
    pub ship_hull: f32,
    pub ship_shield: f32,
    pub shield_recharge_rate: f32,

    // === ORBIT ===
    /// Base angular speed of an attack orbit (rad/s); actual = base × 0.5 × side
    pub orbit_speed_base: f32,
    /// Seconds an attack orbit lasts before the pilot re-evaluates
    pub orbit_duration: f32,
    /// Chance to start an orbit once the orbit timer has cooled down
    pub orbit_chance: f32,
    pub orbit_cooldown: f32,

    // === BOOST ===
    pub boost_multiplier: f32,
    pub boost_duration: f32,
    /// Seconds to refill boost charge from empty
    pub boost_recharge: f32,

    // === HYPERJUMP ===
    pub hyperjump_base_speed: f32,
    pub hyperjump_d0: f32,
    pub hyperjump_scale: f32,
    pub hyperjump_min_time: f32,
    pub hyperjump_max_time: f32,

    // === PROJECTILES ===
    /// Max rotation of a homing projectile (rad/s)
    pub homing_projectile_turn_rate: f32,
    pub projectile_max_distance: f32,
    pub projectile_speed: f32,
    pub guided_missile_delay: f32,
    pub guided_missile_lifetime: f32,
    pub guided_missile_speed: f32,
    pub bomb_blast_radius: f32,
    pub bomb_trigger_radius: f32,
    /// Seconds an explosion lingers before the projectile is expired
    pub aftermath_time: f32,
    pub ion_dot_duration: f32,
    pub ion_max_charge: f32,

    // === HAZARDS ===
    pub blackhole_range: f32,
    /// Pull acceleration numerator: accel = strength / distance²
    pub blackhole_strength: f32,
    pub blackhole_radius: f32,
    /// Hull damage per second inside the event radius
    pub blackhole_damage: f32,
    pub wormhole_radius: f32,
    pub teleport_cooldown: f32,
    /// Velocity retained per second inside a dust cloud
    pub dust_drag: f32,

    // === PILOTS ===
    pub detection_range: f32,
    pub attack_range: f32,
    /// Hull fraction at or below which a pilot flees
    pub flee_threshold: f32,
    /// Hostile projectiles closer than this trigger Defend
    pub danger_range: f32,

    // === LEARNING ===
    pub q_alpha: f64,
    pub q_gamma: f64,
    pub q_epsilon: f64,
    pub def_drone_alpha: f64,
    pub def_drone_gamma: f64,
    pub def_drone_epsilon: f64,

    // === DRONES ===
    /// Drones are leashed to `max_roam_factor × orbit_radius` from their owner
    pub max_roam_factor: f32,
    pub drone_orbit_radius: f32,
    pub drone_hp: f32,
    pub drone_fire_cooldown: f32,
    pub drone_detection_range: f32,
    pub drone_intercept_speed: f32,
    pub drone_optimal_range: f32,
    /// Hull exchanged per tick when a drone rams a ship
    pub ram_damage: f32,

    // === TURRETS ===
    pub pirate_turret_range: f32,
    pub pirate_turret_turn_rate: f32,
    pub pirate_turret_cooldown: f32,
    /// Firing arc of a star turret around its outward normal (radians)
    pub star_turret_arc: f32,
    pub cadence_100_rpm: f32,
    pub cadence_30_rpm: f32,
    pub star_turret_shot_cost: f32,
    /// Turret hp lost per second while its battery is empty
    pub star_turret_decay: f32,
    pub channeler_battery_delay: f32,
    pub channeler_turret_delay: f32,
    pub channeler_transfer_rate: f32,
    pub channeler_range: f32,
    pub battery_capacity: f32,

    // === FLAGSHIPS ===
    pub solar_arm_count: usize,
    pub solar_arm_rate: f32,
    pub solar_arm_range: f32,
    pub solar_arm_turn_rate: f32,
    pub flagship_max_energy: f32,

    // === ECONOMY ===
    pub station_restock_time: f32,
    pub station_price_update_period: f32,
    pub station_price_fluct: f32,
    pub station_min_price_mult: f32,
    pub station_max_price_mult: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // World
            seed: 42,
            grid_size: 3,
            sector_width: 4000.0,
            sector_height: 4000.0,
            systems_per_sector_min: 2,
            systems_per_sector_max: 4,
            black_hole_count: 3,
            wormhole_pairs: 2,
            portal_pairs: 1,
            dust_cloud_count: 4,
            wormhole_min_separation: 3000.0,
            planet_orbit_speed: 0.05,
            max_dt: 0.1,

            // Ship
            ship_max_speed: 300.0,
            ship_acceleration: 400.0,
            ship_friction: 0.96,
            autopilot_speed: 250.0,
            ship_size: 20.0,
            ship_hull: 100.0,
            ship_shield: 50.0,
            shield_recharge_rate: 5.0,

            // Orbit (base 1.5 gives the 0.75 rad/s attack orbit)
            orbit_speed_base: 1.5,
            orbit_duration: 4.0,
            orbit_chance: 0.3,
            orbit_cooldown: 3.0,

            // Boost
            boost_multiplier: 2.0,
            boost_duration: 1.5,
            boost_recharge: 5.0,

            // Hyperjump
            hyperjump_base_speed: 1500.0,
            hyperjump_d0: 1000.0,
            hyperjump_scale: 0.5,
            hyperjump_min_time: 1.0,
            hyperjump_max_time: 6.0,

            // Projectiles
            homing_projectile_turn_rate: 3.0,
            projectile_max_distance: 800.0,
            projectile_speed: 500.0,
            guided_missile_delay: 1.0,
            guided_missile_lifetime: 6.0,
            guided_missile_speed: 260.0,
            bomb_blast_radius: 80.0,
            bomb_trigger_radius: 30.0,
            aftermath_time: 0.2,
            ion_dot_duration: 3.0,
            ion_max_charge: 2.0,

            // Hazards (strength / 200² = 100 px/s² at 200 px)
            blackhole_range: 600.0,
            blackhole_strength: 4.0e6,
            blackhole_radius: 40.0,
            blackhole_damage: 30.0,
            wormhole_radius: 40.0,
            teleport_cooldown: 2.0,
            dust_drag: 0.6,

            // Pilots
            detection_range: 800.0,
            attack_range: 400.0,
            flee_threshold: 0.25,
            danger_range: 150.0,

            // Learning
            q_alpha: 0.1,
            q_gamma: 0.9,
            q_epsilon: 0.1,
            def_drone_alpha: 0.2,
            def_drone_gamma: 0.9,
            def_drone_epsilon: 0.1,

            // Drones
            max_roam_factor: 3.0,
            drone_orbit_radius: 80.0,
            drone_hp: 30.0,
            drone_fire_cooldown: 1.0,
            drone_detection_range: 500.0,
            drone_intercept_speed: 220.0,
            drone_optimal_range: 120.0,
            ram_damage: 5.0,

            // Turrets
            pirate_turret_range: 700.0,
            pirate_turret_turn_rate: 1.5,
            pirate_turret_cooldown: 2.0,
            star_turret_arc: std::f32::consts::PI,
            cadence_100_rpm: 100.0,
            cadence_30_rpm: 30.0,
            star_turret_shot_cost: 2.0,
            star_turret_decay: 2.0,
            channeler_battery_delay: 2.0,
            channeler_turret_delay: 4.0,
            channeler_transfer_rate: 10.0,
            channeler_range: 1500.0,
            battery_capacity: 200.0,

            // Flagships
            solar_arm_count: 3,
            solar_arm_rate: 20.0,
            solar_arm_range: 3000.0,
            solar_arm_turn_rate: 0.8,
            flagship_max_energy: 1000.0,

            // Economy
            station_restock_time: 60.0,
            station_price_update_period: 1.0,
            station_price_fluct: 0.05,
            station_min_price_mult: 0.5,
            station_max_price_mult: 2.0,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// World bounds: `[0, grid·sector_width] × [0, grid·sector_height]`
    pub fn world_width(&self) -> f32 {
        self.grid_size as f32 * self.sector_width
    }

    pub fn world_height(&self) -> f32 {
        self.grid_size as f32 * self.sector_height
    }

    /// Seconds between shots for a cadence given in rounds per minute
    pub fn cadence_period(rpm: f32) -> f32 {
        60.0 / rpm
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimError::InvalidConfig(msg));

        if self.grid_size == 0 {
            return invalid("grid_size must be at least 1".into());
        }
        if self.sector_width <= 0.0 || self.sector_height <= 0.0 {
            return invalid("sector dimensions must be positive".into());
        }
        if self.systems_per_sector_min == 0 || self.systems_per_sector_min > self.systems_per_sector_max {
            return invalid(format!(
                "systems_per_sector range {}..={} is empty",
                self.systems_per_sector_min, self.systems_per_sector_max
            ));
        }
        if self.max_dt <= 0.0 {
            return invalid("max_dt must be positive".into());
        }
        if !(self.ship_friction > 0.0 && self.ship_friction <= 1.0) {
            return invalid(format!("ship_friction ({}) must be in (0, 1]", self.ship_friction));
        }
        if self.shield_recharge_rate <= 0.0 {
            return invalid("shield_recharge_rate must be positive".into());
        }
        if self.boost_recharge <= 0.0 || self.boost_duration <= 0.0 {
            return invalid("boost timings must be positive".into());
        }
        if self.hyperjump_min_time > self.hyperjump_max_time {
            return invalid(format!(
                "hyperjump_min_time ({}) exceeds hyperjump_max_time ({})",
                self.hyperjump_min_time, self.hyperjump_max_time
            ));
        }
        if self.hyperjump_base_speed <= 0.0 || self.hyperjump_d0 <= 0.0 {
            return invalid("hyperjump speed parameters must be positive".into());
        }
        for (name, value) in [
            ("q_alpha", self.q_alpha),
            ("q_gamma", self.q_gamma),
            ("q_epsilon", self.q_epsilon),
            ("def_drone_alpha", self.def_drone_alpha),
            ("def_drone_gamma", self.def_drone_gamma),
            ("def_drone_epsilon", self.def_drone_epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} ({}) must be in [0, 1]", name, value));
            }
        }
        if self.attack_range > self.detection_range {
            return invalid(format!(
                "attack_range ({}) should be <= detection_range ({})",
                self.attack_range, self.detection_range
            ));
        }
        if self.station_min_price_mult <= 0.0
            || self.station_min_price_mult > 1.0
            || self.station_max_price_mult < 1.0
        {
            return invalid(format!(
                "price multipliers must satisfy 0 < min ({}) <= 1 <= max ({})",
                self.station_min_price_mult, self.station_max_price_mult
            ));
        }
        if self.station_price_update_period <= 0.0 || self.station_restock_time <= 0.0 {
            return invalid("station periods must be positive".into());
        }
        if self.cadence_100_rpm <= 0.0 || self.cadence_30_rpm <= 0.0 {
            return invalid("turret cadences must be positive".into());
        }
        if self.channeler_turret_delay < self.channeler_battery_delay {
            return invalid("channeler_turret_delay must not precede channeler_battery_delay".into());
        }
        if self.max_roam_factor < 1.0 {
            return invalid("max_roam_factor must be >= 1".into());
        }

        Ok(())
    }
}
