//! Galaxy geometry - sectors, star systems, planets, stations, asteroids
//!
//! Pure data plus the per-tick orbital advance. Stations and asteroids belong
//! to exactly one system; every system lies inside its sector.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, IdAllocator, Rect, Vec2};
use crate::economy::{ItemCatalog, Market};

/// Margin kept between a system's outermost orbit and its sector edge
const SECTOR_MARGIN: f32 = 200.0;

/// Radius of the area a system occupies (star + planet orbits)
const SYSTEM_EXTENT: f32 = 700.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub radius: f32,
    /// Energy budget flagship arms and channelers draw from
    pub energy: f32,
    pub max_energy: f32,
    pub regen_rate: f32,
}

impl Star {
    /// Remove up to `amount` energy and return what was actually drawn
    pub fn drain(&mut self, amount: f32) -> f32 {
        let drawn = amount.min(self.energy).max(0.0);
        self.energy -= drawn;
        drawn
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: EntityId,
    pub radius: f32,
    pub orbit_radius: f32,
    pub angle: f32,
    /// Multiplier applied to the configured planet orbit speed
    pub orbit_speed: f32,
    pub pos: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: EntityId,
    pub name: String,
    pub pos: Vec2,
    pub radius: f32,
    pub market: Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asteroid {
    pub id: EntityId,
    pub pos: Vec2,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    /// Item granted when mined
    pub resource: String,
}

impl Asteroid {
    pub fn depleted(&self) -> bool {
        self.hp <= 0.0
    }

    /// Whole cargo units the rock yields, at least one
    pub fn yield_units(&self, ore_per_unit: f32) -> u32 {
        ((self.max_hp / ore_per_unit).ceil() as u32).max(1)
    }

    /// Units already cut loose. A depleted rock has given its full yield.
    pub fn units_mined(&self, ore_per_unit: f32) -> u32 {
        let total = self.yield_units(ore_per_unit);
        if self.depleted() {
            return total;
        }
        (((self.max_hp - self.hp) / ore_per_unit).floor() as u32).min(total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: EntityId,
    pub name: String,
    pub center: Vec2,
    pub star: Star,
    pub planets: Vec<Planet>,
    pub stations: Vec<Station>,
    pub asteroids: Vec<Asteroid>,
}

impl StarSystem {
    /// An empty system with a single star, used by generation and tests
    pub fn new(id: EntityId, name: &str, center: Vec2, star_radius: f32, energy: f32) -> Self {
        Self {
            id,
            name: name.to_string(),
            center,
            star: Star { radius: star_radius, energy, max_energy: energy.max(1.0), regen_rate: 0.0 },
            planets: Vec::new(),
            stations: Vec::new(),
            asteroids: Vec::new(),
        }
    }

    /// Advance planet orbits
    pub fn advance(&mut self, dt: f32, base_speed: f32) {
        for planet in &mut self.planets {
            planet.angle = (planet.angle + base_speed * planet.orbit_speed * dt) % TAU;
            planet.pos = self.center + Vec2::from_angle(planet.angle) * planet.orbit_radius;
        }
        self.star.energy = (self.star.energy + self.star.regen_rate * dt).min(self.star.max_energy);
    }

    /// Add a planet on a circular orbit, placing it at `angle`
    pub fn add_planet(&mut self, id: EntityId, radius: f32, orbit_radius: f32, angle: f32, orbit_speed: f32) {
        self.planets.push(Planet {
            id,
            radius,
            orbit_radius,
            angle,
            orbit_speed,
            pos: self.center + Vec2::from_angle(angle) * orbit_radius,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub grid_x: usize,
    pub grid_y: usize,
    pub bounds: Rect,
    pub systems: Vec<StarSystem>,
}

/// The S×S sector grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Galaxy {
    pub grid_size: usize,
    pub sectors: Vec<Sector>,
}

impl Galaxy {
    /// Empty grid of sectors with no systems
    pub fn empty(config: &SimulationConfig) -> Self {
        let mut sectors = Vec::with_capacity(config.grid_size * config.grid_size);
        for gy in 0..config.grid_size {
            for gx in 0..config.grid_size {
                sectors.push(Sector {
                    grid_x: gx,
                    grid_y: gy,
                    bounds: Rect::new(
                        gx as f32 * config.sector_width,
                        gy as f32 * config.sector_height,
                        config.sector_width,
                        config.sector_height,
                    ),
                    systems: Vec::new(),
                });
            }
        }
        Self { grid_size: config.grid_size, sectors }
    }

    /// Procedurally fill every sector with 2–4 star systems
    pub fn generate<R: Rng>(
        config: &SimulationConfig,
        catalog: &ItemCatalog,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Self {
        let mut galaxy = Self::empty(config);
        let resources = ["ore", "crystal", "rare_metals"];

        for sector in &mut galaxy.sectors {
            let count = rng.gen_range(config.systems_per_sector_min..=config.systems_per_sector_max);
            let usable = Rect::new(
                sector.bounds.x + SECTOR_MARGIN + SYSTEM_EXTENT,
                sector.bounds.y + SECTOR_MARGIN + SYSTEM_EXTENT,
                (sector.bounds.width - 2.0 * (SECTOR_MARGIN + SYSTEM_EXTENT)).max(0.0),
                (sector.bounds.height - 2.0 * (SECTOR_MARGIN + SYSTEM_EXTENT)).max(0.0),
            );

            for n in 0..count {
                // Rejection-sample a center away from existing systems
                let mut center = usable.center();
                for _ in 0..20 {
                    let candidate = Vec2::new(
                        usable.x + rng.gen::<f32>() * usable.width,
                        usable.y + rng.gen::<f32>() * usable.height,
                    );
                    let clear = sector
                        .systems
                        .iter()
                        .all(|s| s.center.distance(&candidate) > SYSTEM_EXTENT * 1.2);
                    center = candidate;
                    if clear {
                        break;
                    }
                }

                let energy = rng.gen_range(200.0..600.0f32);
                let name = format!("S{}-{}-{}", sector.grid_x, sector.grid_y, n);
                let mut system = StarSystem::new(ids.next_id(), &name, center, rng.gen_range(60.0..110.0), energy);
                system.star.regen_rate = rng.gen_range(1.0..4.0);

                let planet_count = rng.gen_range(1..=4);
                for p in 0..planet_count {
                    let orbit = 180.0 + p as f32 * 120.0;
                    system.add_planet(
                        ids.next_id(),
                        rng.gen_range(20.0..45.0),
                        orbit,
                        rng.gen::<f32>() * TAU,
                        rng.gen_range(0.5..1.5),
                    );
                }

                if rng.gen_bool(0.6) {
                    let angle = rng.gen::<f32>() * TAU;
                    system.stations.push(Station {
                        id: ids.next_id(),
                        name: format!("{} Station", name),
                        pos: center + Vec2::from_angle(angle) * (SYSTEM_EXTENT - 60.0),
                        radius: 40.0,
                        market: Market::from_catalog(catalog, config, rng),
                    });
                }

                let asteroid_count = rng.gen_range(0..=6);
                for _ in 0..asteroid_count {
                    let angle = rng.gen::<f32>() * TAU;
                    let radius = rng.gen_range(10.0..25.0);
                    let hp = radius * 4.0;
                    system.asteroids.push(Asteroid {
                        id: ids.next_id(),
                        pos: center + Vec2::from_angle(angle) * rng.gen_range(300.0..SYSTEM_EXTENT - 40.0),
                        radius,
                        hp,
                        max_hp: hp,
                        resource: resources[rng.gen_range(0..resources.len())].to_string(),
                    });
                }

                sector.systems.push(system);
            }
        }

        galaxy
    }

    /// Advance every system by one tick
    pub fn advance(&mut self, dt: f32, planet_orbit_speed: f32) {
        for system in self.systems_mut() {
            system.advance(dt, planet_orbit_speed);
        }
    }

    pub fn systems(&self) -> impl Iterator<Item = &StarSystem> {
        self.sectors.iter().flat_map(|s| s.systems.iter())
    }

    pub fn systems_mut(&mut self) -> impl Iterator<Item = &mut StarSystem> {
        self.sectors.iter_mut().flat_map(|s| s.systems.iter_mut())
    }

    pub fn system(&self, id: EntityId) -> Option<&StarSystem> {
        self.systems().find(|s| s.id == id)
    }

    pub fn system_mut(&mut self, id: EntityId) -> Option<&mut StarSystem> {
        self.systems_mut().find(|s| s.id == id)
    }

    /// Add a system to whichever sector contains its center
    pub fn add_system(&mut self, system: StarSystem) {
        let target = self
            .sectors
            .iter_mut()
            .find(|s| s.bounds.contains(system.center));
        match target {
            Some(sector) => sector.systems.push(system),
            None => {
                if let Some(first) = self.sectors.first_mut() {
                    first.systems.push(system);
                }
            }
        }
    }

    /// Nearest star (by surface distance) to `pos`
    pub fn nearest_star(&self, pos: Vec2) -> Option<&StarSystem> {
        self.systems().min_by(|a, b| {
            let da = a.center.distance(&pos) - a.star.radius;
            let db = b.center.distance(&pos) - b.star.radius;
            da.total_cmp(&db)
        })
    }

    pub fn sector_at(&self, pos: Vec2) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.bounds.contains(pos))
    }

    pub fn planets(&self) -> impl Iterator<Item = &Planet> {
        self.systems().flat_map(|s| s.planets.iter())
    }

    pub fn station(&self, id: EntityId) -> Option<&Station> {
        self.systems().flat_map(|s| s.stations.iter()).find(|st| st.id == id)
    }

    pub fn station_mut(&mut self, id: EntityId) -> Option<&mut Station> {
        self.systems_mut().flat_map(|s| s.stations.iter_mut()).find(|st| st.id == id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.systems().flat_map(|s| s.stations.iter())
    }

    pub fn stations_mut(&mut self) -> impl Iterator<Item = &mut Station> {
        self.systems_mut().flat_map(|s| s.stations.iter_mut())
    }

    pub fn asteroid(&self, id: EntityId) -> Option<&Asteroid> {
        self.systems().flat_map(|s| s.asteroids.iter()).find(|a| a.id == id)
    }

    pub fn asteroid_mut(&mut self, id: EntityId) -> Option<&mut Asteroid> {
        self.systems_mut().flat_map(|s| s.asteroids.iter_mut()).find(|a| a.id == id)
    }

    /// Nearest non-depleted asteroid within `range`
    pub fn nearest_asteroid(&self, pos: Vec2, range: f32) -> Option<&Asteroid> {
        self.systems()
            .flat_map(|s| s.asteroids.iter())
            .filter(|a| !a.depleted() && a.pos.distance(&pos) <= range)
            .min_by(|a, b| a.pos.distance(&pos).total_cmp(&b.pos.distance(&pos)))
    }

    /// Remove asteroids that have been mined out
    pub fn prune_asteroids(&mut self) {
        for system in self.systems_mut() {
            system.asteroids.retain(|a| !a.depleted());
        }
    }

    /// True if a circle at `pos` with radius `r` overlaps a star or planet
    pub fn collides(&self, pos: Vec2, r: f32) -> bool {
        self.systems().any(|s| {
            s.center.distance(&pos) < s.star.radius + r
                || s.planets.iter().any(|p| p.pos.distance(&pos) < p.radius + r)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generated() -> (SimulationConfig, Galaxy) {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut ids = IdAllocator::new();
        let galaxy = Galaxy::generate(&config, &ItemCatalog::with_defaults(), &mut ids, &mut rng);
        (config, galaxy)
    }

    #[test]
    fn test_asteroid_yield_accrues_while_mined() {
        let mut rock = Asteroid {
            id: EntityId(1),
            pos: Vec2::ZERO,
            radius: 20.0,
            hp: 35.0,
            max_hp: 35.0,
            resource: "ore".to_string(),
        };
        assert_eq!(rock.yield_units(10.0), 4);
        assert_eq!(rock.units_mined(10.0), 0);
        rock.hp = 24.0;
        assert_eq!(rock.units_mined(10.0), 1);
        rock.hp = 1.0;
        assert_eq!(rock.units_mined(10.0), 3);
        rock.hp = 0.0;
        assert_eq!(rock.units_mined(10.0), 4);
    }

    #[test]
    fn test_sector_grid_dimensions() {
        let (config, galaxy) = generated();
        assert_eq!(galaxy.sectors.len(), config.grid_size * config.grid_size);
    }

    #[test]
    fn test_systems_inside_sectors() {
        let (config, galaxy) = generated();
        for sector in &galaxy.sectors {
            assert!(sector.systems.len() >= config.systems_per_sector_min);
            assert!(sector.systems.len() <= config.systems_per_sector_max);
            for system in &sector.systems {
                assert!(sector.bounds.x <= system.center.x);
                assert!(system.center.x <= sector.bounds.x + sector.bounds.width);
                assert!(sector.bounds.y <= system.center.y);
                assert!(system.center.y <= sector.bounds.y + sector.bounds.height);
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let (_, a) = generated();
        let (_, b) = generated();
        assert_eq!(a, b);
    }

    #[test]
    fn test_planets_advance_on_orbit() {
        let mut system = StarSystem::new(EntityId(1), "t", Vec2::new(0.0, 0.0), 50.0, 100.0);
        system.add_planet(EntityId(2), 20.0, 200.0, 0.0, 1.0);
        system.advance(1.0, 0.5);
        let planet = &system.planets[0];
        assert!((planet.angle - 0.5).abs() < 1e-6);
        assert!((planet.pos.distance(&system.center) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_star_drain_is_bounded() {
        let mut star = Star { radius: 10.0, energy: 5.0, max_energy: 10.0, regen_rate: 0.0 };
        assert_eq!(star.drain(3.0), 3.0);
        assert_eq!(star.drain(3.0), 2.0);
        assert_eq!(star.energy, 0.0);
    }
}
