//! Collision and damage resolution, run once everything has moved
//!
//! Every damage source funnels through `deal_damage`, which records hits and
//! kills for the learning pilots and raises the matching events.

use crate::combat::damage::{blast_damage, circles_overlap};
use crate::core::types::{EntityId, Vec2};
use crate::entity::{Blast, Contact, ContactKind, DroneKind, Projectile, ProjectileKind};
use crate::simulation::SimEvent;
use crate::world::{GateKind, World};

/// Everything damageable, as contacts. Cloaked ships are left out unless
/// `include_hidden`; jumping ships are never there.
pub fn contacts(world: &World, include_hidden: bool) -> Vec<Contact> {
    let ships = world
        .ships
        .iter()
        .filter(|s| !s.destroyed() && !s.hyperjumping() && (include_hidden || !s.invisible()))
        .map(|s| Contact { id: s.id, faction: s.faction, kind: ContactKind::Ship, pos: s.pos, vel: s.vel, size: s.size });
    let drones = world.drones.iter().filter(|d| !d.expired() && !d.is_bomb()).map(|d| Contact {
        id: d.id,
        faction: d.faction,
        kind: if d.is_decoy() { ContactKind::Decoy } else { ContactKind::Drone },
        pos: d.pos,
        vel: d.vel,
        size: d.size,
    });
    let flagships = world.flagships.iter().filter(|f| !f.destroyed()).map(|f| f.contact());
    let deployables = world.deployables.iter().filter(|d| !d.expired()).map(|d| Contact {
        id: d.id,
        faction: d.faction,
        kind: ContactKind::Deployable,
        pos: d.pos,
        vel: Vec2::ZERO,
        size: d.size,
    });
    ships.chain(drones).chain(flagships).chain(deployables).collect()
}

/// Apply `amount` to whatever `target` is. Returns the damage dealt.
pub fn deal_damage(world: &mut World, target: EntityId, amount: f32, attacker: Option<EntityId>) -> f32 {
    if amount <= 0.0 {
        return 0.0;
    }

    if let Some(ship) = world.ships.iter_mut().find(|s| s.id == target && !s.destroyed()) {
        ship.apply_damage(amount);
        let killed = ship.destroyed();
        if let Some(by) = attacker {
            world.combat_log.record_hit(by, target);
            world.events.push(SimEvent::Hit { attacker: by, target, damage: amount });
            if killed {
                world.combat_log.record_kill(by, target);
            }
        }
        if killed {
            tracing::info!(ship = %target, by = ?attacker, "ship destroyed");
            world.events.push(SimEvent::ShipDestroyed { ship: target, by: attacker });
        }
        return amount;
    }

    if let Some(flagship) = world.flagships.iter_mut().find(|f| f.id == target && !f.destroyed()) {
        flagship.apply_damage(amount);
        if let Some(by) = attacker {
            world.combat_log.record_hit(by, target);
            world.events.push(SimEvent::Hit { attacker: by, target, damage: amount });
        }
        if flagship.destroyed() {
            tracing::info!(flagship = %target, faction = flagship.faction.name(), "flagship destroyed");
            world.events.push(SimEvent::FlagshipDestroyed { flagship: target, faction: flagship.faction });
        }
        return amount;
    }

    if let Some(drone) = world.drones.iter_mut().find(|d| d.id == target && !d.expired()) {
        drone.apply_damage(amount);
        if let Some(by) = attacker {
            world.combat_log.record_hit(by, target);
            if drone.expired() {
                world.combat_log.record_kill(by, target);
            }
        }
        return amount;
    }

    if let Some(deployable) = world.deployables.iter_mut().find(|d| d.id == target && !d.expired()) {
        deployable.apply_damage(amount);
        return amount;
    }

    0.0
}

/// Phase (f): projectile impacts, blasts, rams and hazards
pub fn resolve(world: &mut World, dt: f32, mut blasts: Vec<Blast>) {
    let targets = contacts(world, true);
    projectile_hits(world, &targets, &mut blasts);
    for blast in &blasts {
        apply_blast(world, blast, &targets);
    }
    rams(world, &targets);
    gates(world);
    black_holes(world, dt);
}

/// Nearest hostile contact the projectile overlaps
fn struck<'a>(contacts: &'a [Contact], p: &Projectile) -> Option<&'a Contact> {
    contacts
        .iter()
        .filter(|c| c.id != p.owner && p.faction.is_hostile_to(c.faction))
        .filter(|c| circles_overlap(p.pos, p.radius, c.pos, c.size))
        .min_by(|a, b| {
            a.pos
                .distance_sq(&p.pos)
                .total_cmp(&b.pos.distance_sq(&p.pos))
                .then(a.id.cmp(&b.id))
        })
}

fn projectile_hits(world: &mut World, contacts: &[Contact], blasts: &mut Vec<Blast>) {
    let mut hits = Vec::new();
    for p in world.projectiles.iter_mut().filter(|p| p.in_flight()) {
        if let ProjectileKind::Bomb { trigger_radius, .. } = p.kind {
            let triggered = contacts
                .iter()
                .any(|c| p.faction.is_hostile_to(c.faction) && c.pos.distance(&p.pos) <= trigger_radius + c.size);
            if triggered {
                blasts.extend(p.detonate());
            }
            continue;
        }
        let Some(contact) = struck(contacts, p) else {
            continue;
        };
        if matches!(p.kind, ProjectileKind::IonSymbiont { .. }) {
            p.attach(contact);
            continue;
        }
        hits.push((p.owner, contact.id, p.damage));
        // Spent shots linger in their aftermath before pruning
        blasts.extend(p.detonate());
    }
    for (owner, target, damage) in hits {
        deal_damage(world, target, damage, Some(owner));
    }
}

fn apply_blast(world: &mut World, blast: &Blast, contacts: &[Contact]) {
    world.events.push(SimEvent::Detonation { owner: blast.owner, pos: blast.pos, radius: blast.radius });
    let victims: Vec<(EntityId, f32)> = contacts
        .iter()
        .filter(|c| blast.faction.is_hostile_to(c.faction))
        .map(|c| (c.id, blast_damage(blast, c.pos, c.size)))
        .filter(|(_, damage)| *damage > 0.0)
        .collect();
    for (victim, damage) in victims {
        deal_damage(world, victim, damage, Some(blast.owner));
    }
}

/// Aggressive drones and the hostile ships they touch trade `ram_damage`
/// every tick they touch. Drones worn down to zero are pruned with the rest.
fn rams(world: &mut World, contacts: &[Contact]) {
    let ram_damage = world.config.ram_damage;
    let mut rams = Vec::new();
    for drone in world.drones.iter().filter(|d| matches!(d.kind, DroneKind::Aggressive { .. }) && !d.expired()) {
        for ship in contacts.iter().filter(|c| c.kind == ContactKind::Ship && drone.faction.is_hostile_to(c.faction)) {
            if circles_overlap(drone.pos, drone.size, ship.pos, ship.size) {
                rams.push((drone.id, drone.owner, ship.id));
            }
        }
    }
    for (drone, owner, target) in rams {
        deal_damage(world, target, ram_damage, Some(owner));
        deal_damage(world, drone, ram_damage, Some(target));
    }
}

fn gates(world: &mut World) {
    let bounds = world.bounds;
    let cooldown = world.config.teleport_cooldown;
    for ship in world.ships.iter_mut() {
        if ship.destroyed() || ship.hyperjumping() || ship.teleport_cooldown > 0.0 {
            continue;
        }
        let Some(exit) = world.hazards.gate_exit(ship.pos, ship.size, ship.vel) else {
            continue;
        };
        let from = ship.pos;
        ship.pos = bounds.clamp(exit.exit_pos);
        ship.teleport_cooldown = cooldown;
        if exit.kind == GateKind::Portal {
            ship.vel = Vec2::ZERO;
        }
        ship.clear_autopilot();
        ship.break_orbit();
        tracing::debug!(ship = %ship.id, gate = %exit.entry, exit = %exit.exit, "teleported");
        world.events.push(SimEvent::Teleported { ship: ship.id, gate: exit.kind, from, to: ship.pos });
    }
}

fn black_holes(world: &mut World, dt: f32) {
    let burns: Vec<(EntityId, f32)> = world
        .ships
        .iter()
        .filter(|s| !s.destroyed() && !s.hyperjumping())
        .map(|s| (s.id, world.hazards.damage_rate_at(s.pos, s.size, &world.config) * dt))
        .filter(|(_, amount)| *amount > 0.0)
        .collect();
    for (ship, amount) in burns {
        deal_damage(world, ship, amount, None);
    }
}
