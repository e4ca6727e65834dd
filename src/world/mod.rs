//! The world container: owns every entity, the RNG and the config
//!
//! Entities reference each other only by `EntityId`. Pilots live in a map
//! keyed by the id of the ship they fly; the coordination registry is the one
//! store shared between pilots. `step` runs the fixed-order tick in
//! `simulation::tick`.

pub mod galaxy;
pub mod hazards;
pub mod sensors;

pub use galaxy::{Asteroid, Galaxy, Planet, Sector, Star, StarSystem, Station};
pub use hazards::{BlackHole, DustCloud, Gate, GateExit, GateKind, Hazards};
pub use sensors::{artifact_context, observe, CombatLog};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use crate::ai::{BehaviorTreePilot, Coordination, LearningAllyPilot, LearningEnemyPilot, Pilot, PilotKind, QTable};
use crate::combat::artifacts::Activation;
use crate::combat::laser::LaserBeam;
use crate::combat::weapons::Weapon;
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{EntityId, Faction, IdAllocator, Rect, Tick, Vec2};
use crate::economy::ItemCatalog;
use crate::entity::{AreaEffect, Deployable, Drone, InputState, Projectile, Ship};
use crate::flagship::{FactionFlagship, FLAGSHIP_RADIUS};
use crate::simulation::{self, SimEvent};

/// Clearance kept between a flagship and any star system
const FLAGSHIP_CLEARANCE: f32 = FLAGSHIP_RADIUS * 3.0;

/// Minimum spacing between two flagships
const FLAGSHIP_SPACING: f32 = 1500.0;

const PLACEMENT_TRIES: usize = 50;

/// Probes along the spawn spiral before giving up
const OPEN_SPOT_PROBES: usize = 400;

/// Golden angle, spreads spiral probes evenly
const GOLDEN_ANGLE: f32 = 2.399_963;

pub struct World {
    pub config: SimulationConfig,
    pub catalog: ItemCatalog,
    pub rng: ChaCha8Rng,
    pub ids: IdAllocator,
    pub tick: Tick,
    /// Simulated seconds since the world was built
    pub time: f64,
    pub bounds: Rect,
    pub galaxy: Galaxy,
    pub hazards: Hazards,
    pub ships: Vec<Ship>,
    pub pilots: BTreeMap<EntityId, Box<dyn Pilot>>,
    pub projectiles: Vec<Projectile>,
    pub drones: Vec<Drone>,
    pub beams: Vec<LaserBeam>,
    pub effects: Vec<AreaEffect>,
    pub deployables: Vec<Deployable>,
    pub flagships: Vec<FactionFlagship>,
    pub coordination: Coordination,
    pub player: Option<EntityId>,
    /// Events raised by the last step
    pub events: Vec<SimEvent>,
    /// Hits and kills of the last step, read by pilots on the next one
    pub combat_log: CombatLog,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("ships", &self.ships.len())
            .field("pilots", &self.pilots.len())
            .field("projectiles", &self.projectiles.len())
            .field("drones", &self.drones.len())
            .field("flagships", &self.flagships.len())
            .finish()
    }
}

impl World {
    /// Empty sector grid with no systems, hazards or flagships
    pub fn new(config: SimulationConfig, catalog: ItemCatalog) -> Result<Self> {
        config.validate()?;
        catalog.validate()?;
        let bounds = Rect::new(0.0, 0.0, config.world_width(), config.world_height());
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            galaxy: Galaxy::empty(&config),
            config,
            catalog,
            ids: IdAllocator::new(),
            tick: 0,
            time: 0.0,
            bounds,
            hazards: Hazards::new(),
            ships: Vec::new(),
            pilots: BTreeMap::new(),
            projectiles: Vec::new(),
            drones: Vec::new(),
            beams: Vec::new(),
            effects: Vec::new(),
            deployables: Vec::new(),
            flagships: Vec::new(),
            coordination: Coordination::new(),
            player: None,
            events: Vec::new(),
            combat_log: CombatLog::default(),
        })
    }

    /// Procedural world: star systems, hazards and one flagship per faction
    pub fn generate(config: SimulationConfig, catalog: ItemCatalog) -> Result<Self> {
        let mut world = Self::new(config, catalog)?;
        world.galaxy = Galaxy::generate(&world.config, &world.catalog, &mut world.ids, &mut world.rng);
        world.hazards = Hazards::generate(&world.config, &world.galaxy, &mut world.ids, &mut world.rng);
        world.place_flagships();
        tracing::info!(
            seed = world.config.seed,
            systems = world.galaxy.systems().count(),
            black_holes = world.hazards.black_holes.len(),
            flagships = world.flagships.len(),
            "world generated"
        );
        Ok(world)
    }

    fn place_flagships(&mut self) {
        let mut factions = [
            Faction::SolarDominion,
            Faction::Nebula,
            Faction::Pirate,
            Faction::FreeExplorers,
            Faction::CosmicGuild,
        ];
        factions.shuffle(&mut self.rng);
        let inset = FLAGSHIP_CLEARANCE;
        let area = Rect::new(
            self.bounds.x + inset,
            self.bounds.y + inset,
            (self.bounds.width - 2.0 * inset).max(1.0),
            (self.bounds.height - 2.0 * inset).max(1.0),
        );

        for faction in factions {
            let mut pos = area.center();
            for _ in 0..PLACEMENT_TRIES {
                let candidate = Vec2::new(
                    area.x + self.rng.gen::<f32>() * area.width,
                    area.y + self.rng.gen::<f32>() * area.height,
                );
                pos = candidate;
                let clear = !self.galaxy.collides(candidate, FLAGSHIP_CLEARANCE)
                    && self.flagships.iter().all(|f| f.pos.distance(&candidate) >= FLAGSHIP_SPACING);
                if clear {
                    break;
                }
            }
            let id = self.ids.next_id();
            let flagship = match faction {
                Faction::SolarDominion => FactionFlagship::solar(id, pos, &self.config),
                Faction::Nebula => FactionFlagship::nebula(id, pos, &self.config),
                Faction::Pirate => FactionFlagship::pirate(id, pos, &self.config),
                Faction::FreeExplorers => FactionFlagship::explorers(id, pos, &self.config),
                _ => FactionFlagship::guild(id, pos, &self.config, &mut self.rng),
            };
            tracing::debug!(flagship = %id, faction = faction.name(), x = pos.x, y = pos.y, "flagship placed");
            self.add_flagship(flagship);
        }
    }

    /// Insert a flagship and launch whatever it starts with
    pub fn add_flagship(&mut self, mut flagship: FactionFlagship) -> EntityId {
        if flagship.id == EntityId(0) {
            flagship.id = self.ids.next_id();
        }
        let id = flagship.id;
        for mut drone in flagship.initial_drones(&self.config) {
            drone.id = self.ids.next_id();
            self.drones.push(drone);
        }
        self.flagships.push(flagship);
        id
    }

    /// Insert a ship under a fresh id; weapons are re-owned to that id
    pub fn spawn_ship(&mut self, mut ship: Ship) -> EntityId {
        let id = self.ids.next_id();
        ship.id = id;
        for weapon in &mut ship.weapons {
            weapon.owner = id;
        }
        self.ships.push(ship);
        id
    }

    /// The player ship, armed with a blaster
    pub fn spawn_player(&mut self, pos: Vec2) -> EntityId {
        let mut ship = Ship::new(EntityId(0), "Player", Faction::Player, pos, &self.config)
            .with_weapon(Weapon::basic(10.0, self.config.projectile_speed, 0.4));
        ship.is_player = true;
        let id = self.spawn_ship(ship);
        self.player = Some(id);
        id
    }

    /// Spawn an NPC ship flown by `pilot`
    pub fn spawn_npc(&mut self, name: &str, faction: Faction, pos: Vec2, pilot: Box<dyn Pilot>) -> EntityId {
        let ship = Ship::new(EntityId(0), name, faction, pos, &self.config)
            .with_weapon(Weapon::basic(8.0, self.config.projectile_speed, 0.6));
        let id = self.spawn_ship(ship);
        self.pilots.insert(id, pilot);
        self.coordination.register(id, faction);
        id
    }

    /// Hand an existing ship to a pilot
    pub fn attach_pilot(&mut self, ship: EntityId, pilot: Box<dyn Pilot>) -> Result<()> {
        let faction = self.ship(ship).ok_or(SimError::EntityNotFound(ship))?.faction;
        self.pilots.insert(ship, pilot);
        self.coordination.register(ship, faction);
        Ok(())
    }

    /// Patrol region for a pilot starting at `pos`: its sector
    pub fn region_at(&self, pos: Vec2) -> Rect {
        self.galaxy.sector_at(pos).map(|s| s.bounds).unwrap_or(self.bounds)
    }

    /// Nearest free spot on a spiral around `near` for a body of radius `r`.
    /// Falls back to `near` itself (clamped) if the spiral finds nothing.
    pub fn open_position(&self, near: Vec2, r: f32) -> Vec2 {
        let blocked = |p: Vec2| {
            self.galaxy.collides(p, r)
                || self.flagships.iter().any(|f| f.collides_with_point(p.x, p.y, r))
                || self.hazards.damage_rate_at(p, r, &self.config) > 0.0
        };
        (0..OPEN_SPOT_PROBES)
            .map(|k| self.bounds.clamp(near + Vec2::from_angle(k as f32 * GOLDEN_ANGLE) * (k as f32 * r)))
            .find(|p| !blocked(*p))
            .unwrap_or_else(|| self.bounds.clamp(near))
    }

    pub fn spawn_behavior_tree(&mut self, name: &str, faction: Faction, pos: Vec2) -> EntityId {
        let region = self.region_at(pos);
        self.spawn_npc(name, faction, pos, Box::new(BehaviorTreePilot::new(region)))
    }

    pub fn spawn_learning_enemy(&mut self, pos: Vec2, table: QTable) -> EntityId {
        let region = self.region_at(pos);
        self.spawn_npc("Raider", Faction::Pirate, pos, Box::new(LearningEnemyPilot::new(table, region)))
    }

    pub fn spawn_learning_ally(&mut self, pos: Vec2, table: QTable) -> EntityId {
        let region = self.region_at(pos);
        self.spawn_npc("Wingman", Faction::Player, pos, Box::new(LearningAllyPilot::new(table, region)))
    }

    /// Launch a learning defender that guards `owner`. Defenders of the same
    /// owner spread evenly around it.
    pub fn launch_defensive_drone(&mut self, owner: EntityId, table: QTable) -> Result<EntityId> {
        let (faction, pos) = self
            .ship(owner)
            .filter(|s| !s.destroyed())
            .map(|s| (s.faction, s.pos))
            .ok_or(SimError::EntityNotFound(owner))?;
        let slot = self.drones.iter().filter(|d| d.owner == owner && d.q_table().is_some()).count();
        let angle = slot as f32 * std::f32::consts::FRAC_PI_2;
        let mut drone = Drone::learning(owner, faction, pos, table, &self.config).with_orbit(
            angle,
            self.config.drone_orbit_radius,
            1.5,
        );
        drone.id = self.ids.next_id();
        let id = drone.id;
        tracing::debug!(drone = %id, owner = %owner, "defensive drone launched");
        self.drones.push(drone);
        Ok(id)
    }

    pub fn ship(&self, id: EntityId) -> Option<&Ship> {
        self.ships.iter().find(|s| s.id == id)
    }

    pub fn ship_mut(&mut self, id: EntityId) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| s.id == id)
    }

    pub fn ship_index(&self, id: EntityId) -> Option<usize> {
        self.ships.iter().position(|s| s.id == id)
    }

    pub fn player_ship(&self) -> Option<&Ship> {
        self.player.and_then(|id| self.ship(id))
    }

    pub fn flagship(&self, id: EntityId) -> Option<&FactionFlagship> {
        self.flagships.iter().find(|f| f.id == id)
    }

    /// Current position of a live ship, flagship, drone or planet
    pub fn entity_position(&self, id: EntityId) -> Option<Vec2> {
        self.ship(id)
            .filter(|s| !s.destroyed())
            .map(|s| s.pos)
            .or_else(|| self.flagships.iter().find(|f| f.id == id && !f.destroyed()).map(|f| f.pos))
            .or_else(|| self.drones.iter().find(|d| d.id == id && !d.expired()).map(|d| d.pos))
            .or_else(|| self.galaxy.planets().find(|p| p.id == id).map(|p| p.pos))
    }

    /// Learned tables of every pilot of `kind`, in ship id order
    pub fn q_tables(&self, kind: PilotKind) -> Vec<(EntityId, &QTable)> {
        self.pilots
            .iter()
            .filter(|(_, p)| p.kind() == kind)
            .filter_map(|(id, p)| p.q_table().map(|t| (*id, t)))
            .collect()
    }

    /// Learned tables of every live defensive drone, in drone id order
    pub fn drone_tables(&self) -> Vec<(EntityId, &QTable)> {
        let mut tables: Vec<(EntityId, &QTable)> = self
            .drones
            .iter()
            .filter(|d| !d.expired())
            .filter_map(|d| d.q_table().map(|t| (d.id, t)))
            .collect();
        tables.sort_by_key(|(id, _)| *id);
        tables
    }

    /// Pointer event: trigger an artifact slot on a ship. Point-targeted
    /// artifacts arm here and fire on `confirm_artifact`.
    pub fn activate_artifact(&mut self, ship: EntityId, slot: usize) -> bool {
        simulation::tick::trigger_artifact(self, ship, slot, Activation::Now)
    }

    /// Pointer event: second phase of a point-targeted artifact
    pub fn confirm_artifact(&mut self, ship: EntityId, slot: usize, point: Vec2) -> bool {
        let Some(artifact) = self.ship_mut(ship).and_then(|s| s.artifacts.get_mut(slot)) else {
            return false;
        };
        let Some(effect) = artifact.confirm(point) else {
            return false;
        };
        let name = artifact.name();
        simulation::tick::apply_artifact_effect(self, ship, name, effect);
        true
    }

    /// Pointer event: start a timed jump to `destination`
    pub fn begin_hyperjump(&mut self, ship: EntityId, destination: Vec2) -> bool {
        let destination = self.bounds.clamp(destination);
        let config = &self.config;
        match self.ships.iter_mut().find(|s| s.id == ship && !s.destroyed()) {
            Some(s) => {
                let started = s.begin_hyperjump(destination, config);
                if started {
                    tracing::debug!(ship = %ship, x = destination.x, y = destination.y, "hyperjump started");
                }
                started
            }
            None => false,
        }
    }

    pub fn cancel_hyperjump(&mut self, ship: EntityId) {
        if let Some(s) = self.ship_mut(ship) {
            s.cancel_hyperjump();
        }
    }

    /// Advance one fixed step; returns the events it raised
    pub fn step(&mut self, dt: f32, input: &InputState) -> &[SimEvent] {
        simulation::tick::step(self, dt, input);
        &self.events
    }

    /// Run up to `steps` steps, checking `stop` between steps only.
    /// Returns the number of steps executed.
    pub fn run<F>(&mut self, steps: u64, dt: f32, input: &InputState, mut stop: F) -> u64
    where
        F: FnMut(&World) -> bool,
    {
        let mut done = 0;
        while done < steps && !stop(self) {
            self.step(dt, input);
            done += 1;
        }
        done
    }
}
