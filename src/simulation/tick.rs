//! One fixed step, phase by phase
//!
//! Phases run in a strict order: (a) geometry, (b) pilot decisions over the
//! pre-tick world, (c) intents and integration, (d) bounds, (e) entity
//! updates, (f) collisions, (g) pruning, (h) coordination and markets.
//! Within a phase entities are visited in pool order, which is spawn order.

use std::collections::BTreeSet;

use crate::ai::{Intent, MoveIntent};
use crate::combat::artifacts::{Activation, ArtifactEffect};
use crate::combat::channeler::update_deployables;
use crate::combat::weapons::{FireContext, Spawn, WeaponKind};
use crate::core::types::{EntityId, Faction, Target, Vec2};
use crate::entity::{
    find_contact, nearest_hostile, AreaEffect, AreaKind, Blast, Contact, Drone, DroneContext, DroneKind,
    DroneOutput, EffectEvent, Environment, InputState, MovementMode, Projectile, ProjectileEffect, Special,
};
use crate::flagship::{FlagshipContext, FlagshipSpawn};
use crate::simulation::{collision, SimEvent};
use crate::world::{artifact_context, observe, BlackHole, World};

/// Radius around the aim point in which player shots lock a target
const AIM_LOCK_RADIUS: f32 = 200.0;

/// How long the EMP ring stays on screen
const EMP_WAVE_TIME: f32 = 0.5;

/// Hull points of asteroid per unit of cargo
const ORE_PER_CARGO: f32 = 10.0;

/// Orders collected in phase (c) and carried out in phase (e)
#[derive(Debug, Default)]
struct Orders {
    fire: Vec<(EntityId, Target)>,
    artifacts: Vec<(EntityId, usize, Activation)>,
}

/// Advance the world by `dt` seconds (clamped to `max_dt`)
pub fn step(world: &mut World, dt: f32, input: &InputState) {
    let dt = if dt.is_finite() { dt.clamp(0.0, world.config.max_dt) } else { 0.0 };
    world.events.clear();

    // (a)
    world.galaxy.advance(dt, world.config.planet_orbit_speed);
    world.hazards.tick(dt);

    // (b)
    let intents = decide(world, dt);
    world.combat_log.clear();

    // (c)
    let orders = apply_intents(world, intents, input);
    integrate_ships(world, dt, input);

    // (d)
    clamp_to_bounds(world);

    // (e)
    let blasts = update_entities(world, dt, input, &orders);

    // (f)
    collision::resolve(world, dt, blasts);

    // (g)
    prune(world);

    // (h)
    coordinate(world);
    trade(world, dt);

    world.tick += 1;
    world.time += f64::from(dt);
}

/// Every pilot observes the same pre-tick world; intents are buffered
fn decide(world: &mut World, dt: f32) -> Vec<(EntityId, Intent)> {
    let mut observed = Vec::with_capacity(world.pilots.len());
    for id in world.pilots.keys() {
        let Some(ship) = world.ship(*id).filter(|s| !s.destroyed()) else {
            continue;
        };
        let snapshot = observe(world, ship, dt);
        let ctx = artifact_context(world, ship, &snapshot);
        let artifacts: Vec<(usize, Activation)> = ship
            .artifacts
            .iter()
            .enumerate()
            .filter_map(|(slot, a)| a.ai_policy(&ctx).map(|act| (slot, act)))
            .collect();
        observed.push((*id, snapshot, artifacts));
    }

    let config = &world.config;
    let rng = &mut world.rng;
    let pilots = &mut world.pilots;
    observed
        .into_iter()
        .filter_map(|(id, snapshot, artifacts)| {
            let pilot = pilots.get_mut(&id)?;
            let mut intent = pilot.decide(&snapshot, config, rng);
            intent.artifacts = artifacts;
            Some((id, intent))
        })
        .collect()
}

fn apply_intents(world: &mut World, intents: Vec<(EntityId, Intent)>, input: &InputState) -> Orders {
    let mut orders = Orders::default();
    let bounds = world.bounds;

    for (id, intent) in intents {
        let anchor = match intent.movement {
            MoveIntent::Orbit { target, .. } => world.entity_position(target),
            _ => None,
        };
        let Some(ship) = world.ships.iter_mut().find(|s| s.id == id && !s.destroyed()) else {
            continue;
        };
        match intent.movement {
            MoveIntent::Keep => {}
            MoveIntent::Autopilot(point) => {
                ship.break_orbit();
                ship.set_autopilot(bounds.clamp(point));
            }
            MoveIntent::Orbit { target, speed } => {
                if let Some(anchor) = anchor {
                    ship.start_orbit(target, anchor, speed);
                }
            }
            MoveIntent::Stop => {
                ship.clear_autopilot();
                ship.break_orbit();
            }
        }
        if intent.boost {
            ship.activate_boost(&world.config);
        }
        let faction = ship.faction;

        if let Some(target) = intent.fire_at.filter(|t| !t.is_none()) {
            orders.fire.push((id, target));
        }
        orders.artifacts.extend(intent.artifacts.iter().map(|(slot, act)| (id, *slot, *act)));

        world.coordination.set_target(id, intent.target);
        if let Some(target) = intent.request_help {
            if help_is_news(world, id, faction, target) {
                world.events.push(SimEvent::HelpRequested { caller: id, target });
            }
            world.coordination.request_help(id, target);
        }
    }

    if let Some(player) = world.player.and_then(|id| world.ships.iter_mut().find(|s| s.id == id)) {
        if !player.destroyed() {
            if input.boost {
                player.activate_boost(&world.config);
            }
            if input.thrust().length() > 0.0 {
                player.clear_autopilot();
            }
        }
    }

    // A boosting target shakes off everything orbiting it
    let boosting: BTreeSet<EntityId> = world.ships.iter().filter(|s| s.boost.active()).map(|s| s.id).collect();
    for ship in &mut world.ships {
        if let Some(target) = ship.orbit_target().filter(|t| boosting.contains(t)) {
            ship.break_orbit();
            tracing::debug!(ship = %ship.id, target = %target, "orbit broken by boost");
            world.events.push(SimEvent::OrbitBroken { ship: ship.id, target });
        }
    }

    orders
}

/// True if a help request would change some faction-mate's assist target
fn help_is_news(world: &World, caller: EntityId, faction: Faction, target: EntityId) -> bool {
    world
        .coordination
        .entries()
        .any(|(id, e)| *id != caller && e.faction == faction && e.assist_target != Some(target))
}

fn integrate_ships(world: &mut World, dt: f32, input: &InputState) {
    let anchors: Vec<Option<Vec2>> = world
        .ships
        .iter()
        .map(|s| s.orbit_target().and_then(|t| world.entity_position(t)))
        .collect();

    let galaxy = &world.galaxy;
    let hazards = &world.hazards;
    let flagships = &world.flagships;
    let effects = &world.effects;
    let config = &world.config;
    for (ship, orbit_anchor) in world.ships.iter_mut().zip(anchors) {
        if ship.destroyed() {
            continue;
        }
        let slow = effects
            .iter()
            .filter(|e| e.faction.is_hostile_to(ship.faction))
            .map(|e| e.slow_at(ship.pos))
            .fold(1.0, f32::min);
        let env = Environment {
            pull: hazards.pull_at(ship.pos),
            drag: hazards.drag_at(ship.pos),
            slow,
            orbit_anchor,
        };
        let ship_input = if ship.is_player { *input } else { InputState::default() };
        let was_jumping = matches!(ship.movement, MovementMode::Hyperjump { .. });
        let prev = ship.pos;

        ship.integrate(dt, &ship_input, &env, config);

        if was_jumping && !ship.hyperjumping() {
            tracing::debug!(ship = %ship.id, "hyperjump completed");
            world.events.push(SimEvent::HyperjumpCompleted { ship: ship.id });
        }

        let size = ship.size;
        let blocked = |p: Vec2| {
            galaxy.collides(p, size)
                || flagships.iter().any(|f| !f.destroyed() && f.collides_with_point(p.x, p.y, size))
        };
        // Only a move into an obstacle is undone; a ship already overlapped
        // by an orbiting planet may still drive out
        if blocked(ship.pos) && !blocked(prev) {
            ship.pos = prev;
            ship.vel = Vec2::ZERO;
            ship.clear_autopilot();
        }
    }
}

fn clamp_to_bounds(world: &mut World) {
    let bounds = world.bounds;
    for ship in &mut world.ships {
        let clamped = bounds.clamp(ship.pos);
        if clamped != ship.pos {
            ship.pos = clamped;
            ship.vel = Vec2::ZERO;
        }
    }
}

fn update_entities(world: &mut World, dt: f32, input: &InputState, orders: &Orders) -> Vec<Blast> {
    let contacts = collision::contacts(world, false);

    for ship in world.ships.iter_mut().filter(|s| !s.destroyed()) {
        ship.tick_timers(dt, &world.config);
    }

    fire_weapons(world, input, orders, &contacts);
    for (ship, slot, activation) in &orders.artifacts {
        trigger_artifact(world, *ship, *slot, *activation);
    }
    tick_specials(world, dt);

    let mut blasts = Vec::new();
    tick_projectiles(world, dt, &contacts, &mut blasts);
    tick_drones(world, dt, &contacts, &mut blasts);
    tick_beams(world, dt, &contacts);
    tick_area_effects(world, dt);

    let shots = update_deployables(
        &mut world.deployables,
        &mut world.galaxy,
        &contacts,
        &mut world.ids,
        &world.config,
        dt,
    );
    for shot in shots {
        push_projectile(world, shot);
    }

    tick_flagships(world, dt, &contacts);
    blasts
}

fn escorts_of(drones: &[Drone], owner: EntityId) -> usize {
    drones
        .iter()
        .filter(|d| d.owner == owner && matches!(d.kind, DroneKind::Escort) && !d.expired())
        .count()
}

fn fire_weapons(world: &mut World, input: &InputState, orders: &Orders, contacts: &[Contact]) {
    let mut spawns: Vec<(EntityId, String, Spawn)> = Vec::new();
    let galaxy = &world.galaxy;
    let config = &world.config;
    let drones = &world.drones;

    let player = world.player;
    if let Some(ship) = player.and_then(|id| world.ships.iter_mut().find(|s| s.id == id)) {
        if let Some(aim) = input.aim.filter(|_| !ship.destroyed() && !ship.hyperjumping()) {
            let ctx = FireContext {
                faction: ship.faction,
                target: nearest_hostile(contacts, ship.faction, aim, AIM_LOCK_RADIUS).map(|c| c.id),
                owned_drones: escorts_of(drones, ship.id),
                galaxy,
                config,
            };
            let origin = ship.pos;
            if let Some(weapon) = ship.weapons.get_mut(ship.active_weapon) {
                let charged = matches!(weapon.kind, WeaponKind::IonSymbiont { .. });
                let fired = match (charged, input.fire) {
                    (true, true) => {
                        weapon.start_charging();
                        None
                    }
                    (true, false) if weapon.is_charging() => weapon.release(origin, aim, &ctx),
                    (false, true) => weapon.fire(origin, aim, &ctx),
                    _ => None,
                };
                if let Some(spawn) = fired {
                    spawns.push((ship.id, weapon.name.clone(), spawn));
                }
            }
        }
    }

    for (id, target) in &orders.fire {
        let aim = match target {
            Target::Entity(t) => find_contact(contacts, *t).map(|c| c.pos),
            Target::Point(p) => Some(*p),
            Target::None => None,
        };
        let Some(aim) = aim else {
            continue;
        };
        let Some(ship) = world.ships.iter_mut().find(|s| s.id == *id && !s.destroyed() && !s.hyperjumping()) else {
            continue;
        };
        let ctx = FireContext {
            faction: ship.faction,
            target: target.entity(),
            owned_drones: escorts_of(drones, ship.id),
            galaxy,
            config,
        };
        let origin = ship.pos;
        let Some(weapon) = ship.weapons.get_mut(ship.active_weapon) else {
            continue;
        };
        if let Some(spawn) = weapon.fire(origin, aim, &ctx) {
            spawns.push((ship.id, weapon.name.clone(), spawn));
        }
    }

    for (ship, weapon, spawn) in spawns {
        world.events.push(SimEvent::WeaponFired { ship, weapon });
        insert_spawn(world, spawn);
    }
}

/// Give a weapon's product an id and put it in its pool
fn insert_spawn(world: &mut World, spawn: Spawn) {
    match spawn {
        Spawn::Projectile(p) => push_projectile(world, p),
        Spawn::Beam(mut beam) => {
            beam.id = world.ids.next_id();
            world.beams.push(beam);
        }
        Spawn::Drone(d) => push_drone(world, d),
        Spawn::Effect(e) => push_effect(world, e),
        Spawn::Deployable(mut d) => {
            d.id = world.ids.next_id();
            tracing::debug!(deployable = %d.id, owner = %d.owner, "channeler deployed");
            world.deployables.push(d);
        }
    }
}

fn push_projectile(world: &mut World, mut projectile: Projectile) {
    projectile.id = world.ids.next_id();
    world.projectiles.push(projectile);
}

fn push_drone(world: &mut World, mut drone: Drone) {
    drone.id = world.ids.next_id();
    world.events.push(SimEvent::DroneLaunched { drone: drone.id, owner: drone.owner });
    world.drones.push(drone);
}

fn push_effect(world: &mut World, mut effect: AreaEffect) {
    effect.id = world.ids.next_id();
    world.effects.push(effect);
}

/// Activate an artifact slot. `At` confirms point-targeted artifacts in the
/// same call. Returns true if the artifact fired or armed.
pub(crate) fn trigger_artifact(world: &mut World, ship: EntityId, slot: usize, activation: Activation) -> bool {
    let Some(artifact) = world
        .ships
        .iter_mut()
        .find(|s| s.id == ship && !s.destroyed())
        .and_then(|s| s.artifacts.get_mut(slot))
    else {
        return false;
    };
    let mut effect = artifact.activate();
    if let Activation::At(point) = activation {
        if effect.is_none() && artifact.awaiting_point() {
            effect = artifact.confirm(point);
        }
    }
    let armed = artifact.awaiting_point();
    let name = artifact.name();
    match effect {
        Some(effect) => {
            apply_artifact_effect(world, ship, name, effect);
            true
        }
        None => armed,
    }
}

pub(crate) fn apply_artifact_effect(world: &mut World, ship: EntityId, name: &str, effect: ArtifactEffect) {
    let Some(idx) = world.ship_index(ship) else {
        return;
    };
    let (pos, vel, faction) = {
        let s = &world.ships[idx];
        (s.pos, s.vel, s.faction)
    };

    match effect {
        ArtifactEffect::Special(special) => world.ships[idx].attach_special(special),
        ArtifactEffect::Emp { radius, shield_drain } => {
            for other in world.ships.iter_mut().filter(|s| faction.is_hostile_to(s.faction)) {
                if other.pos.distance(&pos) <= radius {
                    other.shield.strength = (other.shield.strength - shield_drain).max(0.0);
                }
            }
            let wave = AreaKind::EmpWave { radius: 0.0, max_radius: radius };
            push_effect(world, AreaEffect::new(ship, faction, pos, wave, EMP_WAVE_TIME));
        }
        ArtifactEffect::TractorProbe { destination, speed, hole_lifetime } => {
            let destination = world.bounds.clamp(destination);
            let travel = if speed > 0.0 { pos.distance(&destination) / speed } else { 0.0 };
            let probe = AreaKind::TractorProbe { destination, speed, hole_lifetime };
            push_effect(world, AreaEffect::new(ship, faction, pos, probe, travel + 1.0));
        }
        ArtifactEffect::Mining { rate, range, duration } => {
            let Some(asteroid) = world.galaxy.nearest_asteroid(pos, range).map(|a| a.id) else {
                tracing::debug!(ship = %ship, "nothing to mine in reach");
                return;
            };
            let s = &mut world.ships[idx];
            s.stop_mining();
            s.attach_special(Special::MiningBeam { asteroid, rate, range, remaining: duration });
        }
        ArtifactEffect::Decoy { lifetime, hp } => {
            let mut decoy = Drone::decoy(ship, faction, pos, lifetime, hp, &world.config);
            decoy.vel = vel;
            push_drone(world, decoy);
        }
        ArtifactEffect::Cloak { duration } => {
            world.ships[idx].invisible_timer = duration;
        }
    }

    tracing::debug!(ship = %ship, artifact = name, "artifact activated");
    world.events.push(SimEvent::ArtifactActivated { ship, artifact: name.to_string() });
}

fn tick_specials(world: &mut World, dt: f32) {
    let mut mined = Vec::new();
    for ship in world.ships.iter_mut().filter(|s| !s.destroyed()) {
        mined.extend(ship.tick_specials(dt));
    }
    for event in mined {
        if let EffectEvent::Mine { ship, asteroid, amount, range } = event {
            mine(world, ship, asteroid, amount, range);
        }
    }
}

/// Chip `amount` off an asteroid, crediting each whole unit of cargo as it
/// comes loose
fn mine(world: &mut World, ship: EntityId, asteroid: EntityId, amount: f32, range: f32) {
    let Some(idx) = world.ship_index(ship) else {
        return;
    };
    let pos = world.ships[idx].pos;
    let Some(rock) = world
        .galaxy
        .asteroid_mut(asteroid)
        .filter(|a| !a.depleted() && a.pos.distance(&pos) <= range + a.radius)
    else {
        world.ships[idx].stop_mining();
        return;
    };
    let before = rock.units_mined(ORE_PER_CARGO);
    rock.hp = (rock.hp - amount).max(0.0);
    let units = rock.units_mined(ORE_PER_CARGO) - before;
    let depleted = rock.depleted();
    let resource = rock.resource.clone();

    let s = &mut world.ships[idx];
    if units > 0 {
        s.add_cargo(&resource, units);
        tracing::trace!(ship = %ship, asteroid = %asteroid, resource = %resource, units, "ore mined");
    }
    if depleted {
        s.stop_mining();
        tracing::debug!(ship = %ship, asteroid = %asteroid, "asteroid depleted");
        world.events.push(SimEvent::AsteroidDepleted { asteroid, by: ship });
    }
}

fn tick_projectiles(world: &mut World, dt: f32, contacts: &[Contact], blasts: &mut Vec<Blast>) {
    let mut dots = Vec::new();
    for projectile in &mut world.projectiles {
        match projectile.tick(dt, contacts) {
            Some(ProjectileEffect::Dot { target, amount }) => dots.push((projectile.owner, target, amount)),
            Some(ProjectileEffect::Detonate(blast)) => blasts.push(blast),
            None => {}
        }
    }
    for (owner, target, amount) in dots {
        collision::deal_damage(world, target, amount, Some(owner));
    }
}

/// Position of a live ship or flagship
fn owner_position(world: &World, owner: EntityId) -> Option<Vec2> {
    world
        .ship(owner)
        .filter(|s| !s.destroyed())
        .map(|s| s.pos)
        .or_else(|| world.flagships.iter().find(|f| f.id == owner && !f.destroyed()).map(|f| f.pos))
}

fn tick_drones(world: &mut World, dt: f32, contacts: &[Contact], blasts: &mut Vec<Blast>) {
    let owners: Vec<Option<Vec2>> = world.drones.iter().map(|d| owner_position(world, d.owner)).collect();
    let mut shots = Vec::new();
    let config = &world.config;
    let rng = &mut world.rng;
    for (drone, owner_pos) in world.drones.iter_mut().zip(owners) {
        let ctx = DroneContext { owner_pos, contacts, config };
        match drone.tick(dt, &ctx, rng) {
            Some(DroneOutput::Fire(shot)) => shots.push(shot),
            Some(DroneOutput::Detonate(blast)) => blasts.push(blast),
            None => {}
        }
    }
    for shot in shots {
        push_projectile(world, shot);
    }
}

fn tick_beams(world: &mut World, dt: f32, contacts: &[Contact]) {
    let owners: Vec<Option<Vec2>> = world.beams.iter().map(|b| owner_position(world, b.owner)).collect();
    let mut burns = Vec::new();
    for (beam, owner_pos) in world.beams.iter_mut().zip(owners) {
        if let Some((target, amount)) = beam.tick(dt, owner_pos, contacts) {
            burns.push((beam.owner, target, amount));
        }
    }
    for (owner, target, amount) in burns {
        collision::deal_damage(world, target, amount, Some(owner));
    }
}

fn tick_area_effects(world: &mut World, dt: f32) {
    let mut events = Vec::new();
    for effect in &mut world.effects {
        if let Some(event) = effect.tick(dt) {
            events.push(event);
        }
    }
    for event in events {
        match event {
            EffectEvent::SporePulse { effect, damage } => spore_pulse(world, effect, damage),
            EffectEvent::Collapse { pos, lifetime } => {
                let id = world.ids.next_id();
                let mut hole = BlackHole::from_config(id, pos, &world.config);
                hole.lifetime = Some(lifetime);
                world.hazards.black_holes.push(hole);
                tracing::info!(hole = %id, x = pos.x, y = pos.y, lifetime, "tractor probe collapsed");
                world.events.push(SimEvent::BlackHoleFormed { hole: id, pos });
            }
            EffectEvent::Mine { .. } => {}
        }
    }
}

fn spore_pulse(world: &mut World, effect: EntityId, damage: f32) {
    let Some(cloud) = world.effects.iter().find(|e| e.id == effect).cloned() else {
        return;
    };
    let victims: Vec<EntityId> = world
        .ships
        .iter()
        .filter(|s| !s.destroyed() && cloud.faction.is_hostile_to(s.faction) && cloud.in_cone(s.pos))
        .map(|s| s.id)
        .collect();
    for victim in victims {
        collision::deal_damage(world, victim, damage, Some(cloud.owner));
    }
}

fn tick_flagships(world: &mut World, dt: f32, contacts: &[Contact]) {
    let mut claims = BTreeSet::new();
    let mut spawned = Vec::new();
    for flagship in world.flagships.iter_mut().filter(|f| !f.destroyed()) {
        let owned_drones = world.drones.iter().filter(|d| d.owner == flagship.id && !d.expired()).count();
        let mut ctx = FlagshipContext {
            dt,
            galaxy: &mut world.galaxy,
            contacts,
            owned_drones,
            claims: &mut claims,
            config: &world.config,
        };
        spawned.extend(flagship.tick(&mut ctx));
    }
    for spawn in spawned {
        match spawn {
            FlagshipSpawn::Projectile(p) => push_projectile(world, p),
            FlagshipSpawn::Drone(d) => push_drone(world, d),
        }
    }
}

fn prune(world: &mut World) {
    let mut lost = Vec::new();
    for ship in world.ships.iter_mut().filter(|s| s.destroyed()) {
        ship.release_specials();
        lost.push(ship.id);
    }
    for id in lost {
        world.pilots.remove(&id);
        world.coordination.unregister(id);
    }
    world.ships.retain(|s| !s.destroyed());
    world.projectiles.retain(|p| !p.expired());
    world.drones.retain(|d| !d.expired());
    world.beams.retain(|b| !b.expired());
    world.effects.retain(|e| !e.expired());
    world.deployables.retain(|d| !d.expired());
    world.flagships.retain(|f| !f.destroyed());
    world.galaxy.prune_asteroids();
}

/// Re-balance orbit sides around every target some pilot engages
fn coordinate(world: &mut World) {
    let engaged: BTreeSet<(Faction, EntityId)> = world
        .coordination
        .entries()
        .flat_map(|(_, e)| [e.target, e.assist_target].into_iter().flatten().map(move |t| (e.faction, t)))
        .collect();
    for (faction, target) in engaged {
        world.coordination.assign_orbit_sides(faction, target);
    }
}

fn trade(world: &mut World, dt: f32) {
    let config = &world.config;
    let rng = &mut world.rng;
    for station in world.galaxy.stations_mut() {
        let tick = station.market.tick(dt, config, rng);
        if tick.restocked {
            tracing::debug!(station = %station.id, "market restocked");
            world.events.push(SimEvent::MarketRestocked { station: station.id });
        }
    }
}
